//! The Payload/Pipeline data model and the Dispatcher's own value types.
//! `Router` (in `router.rs`) owns actually running the steps below; this
//! module owns the shapes they pass around.

use crate::consistency::Consistency;
use std::collections::HashMap;
use std::time::Duration;

/// `returning` mode on a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Returning {
    None,
    AggregateVersion,
    AggregateState,
    ExecutionResult,
}

impl Default for Returning {
    fn default() -> Self {
        Returning::None
    }
}

/// `{aggregate_uuid, aggregate_state, aggregate_version, events, metadata}`
/// projected to `serde_json::Value` so one `Router` can host many
/// unrelated `Aggregate` types behind a single return type.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ExecutionResult {
    pub aggregate_uuid: String,
    pub aggregate_state: serde_json::Value,
    pub aggregate_version: usize,
    pub events: Vec<serde_json::Value>,
    pub metadata: HashMap<String, String>,
}

/// The shape returned to a caller, after projection per `returning`.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "kind")]
pub enum DispatchOutcome {
    Ok,
    AggregateVersion { aggregate_version: usize },
    AggregateState { aggregate_state: serde_json::Value },
    Execution(ExecutionResult),
}

/// Per-call overrides, merged over router/system defaults with the
/// precedence of router/system defaults.
#[derive(Debug, Clone, Default)]
pub struct DispatchOptions {
    pub causation_id: Option<String>,
    pub correlation_id: Option<String>,
    pub metadata: HashMap<String, String>,
    pub consistency: Option<Consistency>,
    pub returning: Option<Returning>,
    pub timeout: Option<Duration>,
    pub retry_attempts: Option<u32>,
}

/// The mutable record middleware operate on. `command` is kept
/// generic over its concrete Rust type — a route is bound to exactly one
/// command type, so no type erasure is needed at this layer (only the
/// `Router`'s route table itself is erased).
pub struct Pipeline<C> {
    pub command: C,
    pub command_kind: &'static str,
    pub command_uuid: String,
    pub causation_id: String,
    pub correlation_id: String,
    pub metadata: HashMap<String, String>,
    pub consistency: Consistency,
    pub returning: Returning,
    pub timeout: Option<Duration>,
    pub retry_attempts: u32,

    /// Populated by `IdentityExtraction`; absent until then.
    pub stream_uuid: Option<String>,

    pub response: Option<Result<DispatchOutcome, crate::errors::DispatchError>>,
    pub halted: bool,
    pub assigns: HashMap<String, serde_json::Value>,
}

impl<C> Pipeline<C> {
    pub fn halt(&mut self, error: crate::errors::DispatchError) {
        self.response = Some(Err(error));
        self.halted = true;
    }

    pub fn assign(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.assigns.insert(key.into(), value);
    }
}
