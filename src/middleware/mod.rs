//! Middleware Pipeline: an ordered before/after/failure chain over a
//! mutable [`crate::dispatch::Pipeline`] record.

mod consistency_guarantee;
mod identity_extraction;

pub use consistency_guarantee::ConsistencyGuarantee;
pub use identity_extraction::IdentityExtraction;

use crate::dispatch::Pipeline;

/// Before/after/failure hooks over a `Pipeline<C>`. Defaults are no-ops so
/// user middleware only needs to implement the hooks it cares about.
#[async_trait::async_trait]
pub trait Middleware<C>: Send + Sync
where
    C: Send + Sync,
{
    async fn before_dispatch(&self, _pipeline: &mut Pipeline<C>) {}
    async fn after_dispatch(&self, _pipeline: &mut Pipeline<C>) {}
    async fn after_failure(&self, _pipeline: &mut Pipeline<C>) {}
}

/// Runs the before pass in registration order; on `halted`, runs
/// `after_failure` in reverse order and returns `false`. Otherwise returns
/// `true` and the caller is expected to run [`run_after`] once dispatch
/// completes.
pub async fn run_before<C: Send + Sync>(
    chain: &[Box<dyn Middleware<C>>],
    pipeline: &mut Pipeline<C>,
) -> bool {
    for middleware in chain {
        middleware.before_dispatch(pipeline).await;
        if pipeline.halted {
            for middleware in chain.iter().rev() {
                middleware.after_failure(pipeline).await;
            }
            return false;
        }
    }
    true
}

pub async fn run_after<C: Send + Sync>(chain: &[Box<dyn Middleware<C>>], pipeline: &mut Pipeline<C>) {
    for middleware in chain.iter().rev() {
        middleware.after_dispatch(pipeline).await;
    }
}

pub async fn run_after_failure<C: Send + Sync>(
    chain: &[Box<dyn Middleware<C>>],
    pipeline: &mut Pipeline<C>,
) {
    for middleware in chain.iter().rev() {
        middleware.after_failure(pipeline).await;
    }
}
