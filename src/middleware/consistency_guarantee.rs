use super::Middleware;
use crate::consistency::ConsistencyCoordinator;
use crate::dispatch::Pipeline;
use crate::errors::DispatchError;
use std::sync::Arc;

/// Blocks the after-pass until nominated subscribers have acked the
/// produced events. Reads `aggregate_version` from `pipeline.assigns`
/// — set by the Router right after the instance replies, since not every
/// `returning` mode carries a version in the response itself.
pub struct ConsistencyGuarantee {
    coordinator: Arc<ConsistencyCoordinator>,
}

impl ConsistencyGuarantee {
    pub fn new(coordinator: Arc<ConsistencyCoordinator>) -> Self {
        Self { coordinator }
    }
}

#[async_trait::async_trait]
impl<C: Send + Sync> Middleware<C> for ConsistencyGuarantee {
    async fn after_dispatch(&self, pipeline: &mut Pipeline<C>) {
        if !matches!(pipeline.response, Some(Ok(_))) {
            return;
        }
        let Some(stream_uuid) = pipeline.stream_uuid.clone() else {
            return;
        };
        let Some(version) = pipeline
            .assigns
            .get("aggregate_version")
            .and_then(|v| v.as_u64())
        else {
            return;
        };

        let result = self
            .coordinator
            .wait(&pipeline.consistency, &stream_uuid, version as usize, pipeline.timeout)
            .await;
        if let Err(DispatchError::ConsistencyTimeout) = result {
            pipeline.response = Some(Err(DispatchError::ConsistencyTimeout));
        }
    }
}
