//! Lifespan policy: after-command/after-event/after-error hooks that
//! decide whether an instance keeps running.

/// What an instance should do after an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifespanAction {
    Stop,
    Hibernate,
    TimeoutMs(u64),
    Infinity,
}

/// Consulted by the [`crate::instance::AggregateInstance`] after every
/// command, every produced event, and every error. Defaults to keeping the
/// instance alive forever, matching the system default lifespan.
#[async_trait::async_trait]
pub trait LifespanPolicy<A: crate::Aggregate>: Send + Sync {
    async fn after_command(&self, _command_kind: &str) -> LifespanAction {
        LifespanAction::Infinity
    }

    async fn after_event(&self, _event: &A::Event) -> LifespanAction {
        LifespanAction::Infinity
    }

    async fn after_error(&self, _error: &A::Error) -> LifespanAction {
        LifespanAction::Infinity
    }
}

/// The system default: never stop, never hibernate.
pub struct InfiniteLifespan;

impl<A: crate::Aggregate> LifespanPolicy<A> for InfiniteLifespan {}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn infinite_lifespan_always_infinity() {
        let policy = InfiniteLifespan;
        let action = <InfiniteLifespan as LifespanPolicy<crate::testing::TestAggregate>>::after_command(
            &policy, "anything",
        )
        .await;
        assert_eq!(action, LifespanAction::Infinity);
    }
}
