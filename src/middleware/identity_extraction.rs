use super::Middleware;
use crate::dispatch::Pipeline;
use crate::identity::{resolve_stream_uuid, IdentityPrefix, IdentityRule};

/// Resolves `stream_uuid` and places it on the Pipeline; halts with
/// `invalid_aggregate_identity` on failure. Always appended last among
/// built-ins, before `ConsistencyGuarantee` in the system default
/// middleware order.
pub struct IdentityExtraction<C> {
    rule: IdentityRule<C>,
    prefix: IdentityPrefix,
}

impl<C> IdentityExtraction<C> {
    pub fn new(rule: IdentityRule<C>, prefix: IdentityPrefix) -> Self {
        Self { rule, prefix }
    }
}

#[async_trait::async_trait]
impl<C: Send + Sync> Middleware<C> for IdentityExtraction<C> {
    async fn before_dispatch(&self, pipeline: &mut Pipeline<C>) {
        match resolve_stream_uuid(&self.rule, &self.prefix, &pipeline.command) {
            Ok(stream_uuid) => pipeline.stream_uuid = Some(stream_uuid),
            Err(error) => pipeline.halt(error),
        }
    }
}
