//! Unified error handling for the dispatch runtime.
//!
//! Two error families exist:
//! - [`DispatchError`] — the taxonomy the Dispatcher itself can raise:
//!   unregistered commands, identity failures, retry exhaustion, timeouts.
//!   Domain errors from a handler are carried inside it, boxed, so a
//!   single `Router` can host many unrelated aggregate kinds without a
//!   shared concrete error type.
//! - [`CqrsErrorCode`] / [`CqrsError`] — a structured domain-error system
//!   handlers use for their own `Aggregate::Error`, giving `Aggregate::Error`
//!   somewhere idiomatic to live.

use std::fmt::{Debug, Display};

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors the dispatch runtime itself can surface to a caller.
///
/// `wrong_expected_version` from the event store is deliberately absent:
/// it is handled internally by the aggregate instance's retry loop and
/// must never escape to a caller.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no route registered for command kind '{0}'")]
    UnregisteredCommand(String),

    #[error("identity rule produced an empty or invalid aggregate identity")]
    InvalidAggregateIdentity,

    #[error("optimistic concurrency retries exhausted")]
    TooManyAttempts,

    #[error("aggregate execution timed out before the instance replied")]
    AggregateExecutionTimeout,

    #[error("aggregate execution failed: {0}")]
    AggregateExecutionFailed(String),

    #[error("aggregate instance stopped before the command completed")]
    AggregateStopped,

    #[error("events were appended successfully but consistency subscribers did not ack in time")]
    ConsistencyTimeout,

    #[error("router configuration error: {0}")]
    Configuration(#[from] RouterConfigError),

    #[error("{0}")]
    Domain(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DispatchError {
    pub fn domain<E>(e: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Domain(Box::new(e))
    }
}

/// Configuration-time failures raised while building a [`crate::Router`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouterConfigError {
    #[error("command kind '{0}' is already registered")]
    DuplicateCommandKind(String),

    #[error("explicit consistency subscriber '{0}' is not declared strongly-consistent")]
    SubscriberNotStronglyConsistent(String),

    #[error("lifespan module for '{0}' is missing a required hook: {1}")]
    IncompleteLifespan(String, &'static str),
}

// ============================================
// Domain error code system
// ============================================

/// Trait that all domain error codes must implement.
pub trait CqrsErrorCode: Debug + Display + Clone + Send + Sync + 'static {
    fn domain() -> &'static str;
    fn domain_prefix() -> u16;
    fn error_index(&self) -> u16;
    fn http_status(&self) -> StatusCode;

    fn internal_code(&self) -> u16 {
        Self::domain_prefix() * 1000 + self.error_index()
    }

    fn code_string(&self) -> String {
        format!("{}_{}", Self::domain().to_uppercase(), self)
    }

    fn error(&self, message: impl Into<String>) -> CqrsError
    where
        Self: Sized,
    {
        CqrsError::from_code(self, message)
    }
}

/// Internal data for [`CqrsError`]. Access fields via `Deref`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CqrsErrorData {
    pub domain: String,
    pub code: String,
    pub internal_code: u16,
    #[serde(skip)]
    pub status: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// A structured domain error, used as a handler's `Aggregate::Error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CqrsError(Box<CqrsErrorData>);

impl std::ops::Deref for CqrsError {
    type Target = CqrsErrorData;
    fn deref(&self) -> &CqrsErrorData {
        &self.0
    }
}

impl std::ops::DerefMut for CqrsError {
    fn deref_mut(&mut self) -> &mut CqrsErrorData {
        &mut self.0
    }
}

impl CqrsError {
    pub fn from_code<C: CqrsErrorCode>(code: &C, message: impl Into<String>) -> Self {
        Self(Box::new(CqrsErrorData {
            domain: C::domain().to_string(),
            code: code.code_string(),
            internal_code: code.internal_code(),
            status: code.http_status().as_u16(),
            message: message.into(),
            details: None,
        }))
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.0.details = Some(details);
        self
    }

    pub fn http_status(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl Display for CqrsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.internal_code, self.code, self.message)
    }
}

impl std::error::Error for CqrsError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GenericErrorCode {
    #[error("INTERNAL_ERROR")]
    InternalError,
    #[error("VALIDATION_FAILED")]
    ValidationFailed,
    #[error("NOT_FOUND")]
    NotFound,
    #[error("CONFLICT")]
    Conflict,
}

impl CqrsErrorCode for GenericErrorCode {
    fn domain() -> &'static str {
        "generic"
    }
    fn domain_prefix() -> u16 {
        1
    }
    fn error_index(&self) -> u16 {
        match self {
            Self::InternalError => 0,
            Self::ValidationFailed => 1,
            Self::NotFound => 2,
            Self::Conflict => 3,
        }
    }
    fn http_status(&self) -> StatusCode {
        match self {
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ValidationFailed => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
        }
    }
}

/// Defines domain-specific error codes with minimal boilerplate, mirroring
/// minimal boilerplate.
#[macro_export]
macro_rules! define_domain_errors {
    (
        domain: $domain:literal,
        prefix: $prefix:expr,
        errors: {
            $( $variant:ident => ($index:expr, $status:expr, $display:literal) ),* $(,)?
        }
    ) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, ::thiserror::Error)]
        pub enum ErrorCode {
            $(
                #[error($display)]
                $variant,
            )*
        }

        impl $crate::CqrsErrorCode for ErrorCode {
            fn domain() -> &'static str { $domain }
            fn domain_prefix() -> u16 { $prefix }

            fn error_index(&self) -> u16 {
                match self {
                    $( Self::$variant => $index, )*
                }
            }

            fn http_status(&self) -> ::http::StatusCode {
                match self {
                    $( Self::$variant => $status, )*
                }
            }
        }
    };
}
