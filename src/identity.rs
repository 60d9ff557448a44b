//! Identity resolution.
//!
//! The source lets `identify ... by:` be a field name or a unary function.
//! Rust has no field-name reflection, so `IdentityRule` is expressed purely
//! as a typed closure over the concrete command type; `IdentityRule::field`
//! is sugar for the common case of projecting a single field.

use crate::errors::DispatchError;
use std::fmt;
use std::sync::Arc;

/// Extracts the raw identity string from a command of type `C`.
#[derive(Clone)]
pub struct IdentityRule<C>(Arc<dyn Fn(&C) -> Option<String> + Send + Sync>);

impl<C> fmt::Debug for IdentityRule<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("IdentityRule(..)")
    }
}

impl<C> IdentityRule<C> {
    /// Build a rule from an arbitrary function `command -> raw identity`.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&C) -> Option<String> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Sugar for projecting a single `String`-valued field.
    pub fn field<F>(selector: F) -> Self
    where
        F: Fn(&C) -> String + Send + Sync + 'static,
    {
        Self(Arc::new(move |c| {
            let v = selector(c);
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        }))
    }

    pub fn resolve(&self, command: &C) -> Option<String> {
        (self.0)(command)
    }
}

/// Zero-arg function or a literal, evaluated once per dispatch.
#[derive(Clone)]
pub enum IdentityPrefix {
    None,
    Literal(String),
    Fn(Arc<dyn Fn() -> String + Send + Sync>),
}

impl fmt::Debug for IdentityPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityPrefix::None => write!(f, "IdentityPrefix::None"),
            IdentityPrefix::Literal(s) => write!(f, "IdentityPrefix::Literal({s:?})"),
            IdentityPrefix::Fn(_) => write!(f, "IdentityPrefix::Fn(..)"),
        }
    }
}

impl Default for IdentityPrefix {
    fn default() -> Self {
        IdentityPrefix::None
    }
}

impl IdentityPrefix {
    pub fn resolve(&self) -> String {
        match self {
            IdentityPrefix::None => String::new(),
            IdentityPrefix::Literal(s) => s.clone(),
            IdentityPrefix::Fn(f) => f(),
        }
    }
}

/// Resolves `stream_uuid = prefix ++ raw_identity`, failing with
/// `invalid_aggregate_identity` if the rule yields nothing usable.
pub fn resolve_stream_uuid<C>(
    rule: &IdentityRule<C>,
    prefix: &IdentityPrefix,
    command: &C,
) -> Result<String, DispatchError> {
    let raw = rule
        .resolve(command)
        .filter(|s| !s.is_empty())
        .ok_or(DispatchError::InvalidAggregateIdentity)?;
    Ok(format!("{}{}", prefix.resolve(), raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Cmd {
        account_number: String,
    }

    #[test]
    fn resolves_prefix_and_field() {
        let rule = IdentityRule::field(|c: &Cmd| c.account_number.clone());
        let prefix = IdentityPrefix::Literal("bank-account-".into());
        let cmd = Cmd {
            account_number: "ACC1".into(),
        };
        let stream_uuid = resolve_stream_uuid(&rule, &prefix, &cmd).unwrap();
        assert_eq!(stream_uuid, "bank-account-ACC1");
    }

    #[test]
    fn empty_field_is_invalid_identity() {
        let rule = IdentityRule::field(|c: &Cmd| c.account_number.clone());
        let cmd = Cmd {
            account_number: "".into(),
        };
        let err = resolve_stream_uuid(&rule, &IdentityPrefix::None, &cmd).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidAggregateIdentity));
    }
}
