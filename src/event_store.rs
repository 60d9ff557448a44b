//! Event Store Adapter: a single trait covering stream reads, optimistic-
//! concurrency appends, and snapshotting. See DESIGN.md for why this
//! collapses what was previously three overlapping traits.

use crate::aggregate::Aggregate;
use crate::event::EventEnvelope;
use crate::snapshot::Snapshot;
use thiserror::Error;

/// Failure appending to a stream. `WrongExpectedVersion` is handled
/// internally by [`crate::instance::AggregateInstance`] and must never
/// escape past it.
#[derive(Debug, Error)]
pub enum AppendError {
    #[error("expected version {expected} for stream '{stream_uuid}' but the current version is {actual}")]
    WrongExpectedVersion {
        stream_uuid: String,
        expected: usize,
        actual: usize,
    },
    #[error("event store unreachable: {0}")]
    Unavailable(String),
}

#[async_trait::async_trait]
pub trait EventStore<A: Aggregate>: Send + Sync {
    /// Forward read starting at `from_version` (inclusive), matching
    /// `read_stream_forward(stream_uuid, from_version, batch_size)`.
    /// `batch_size = 0` means "no limit".
    async fn read_stream_forward(
        &self,
        stream_uuid: &str,
        from_version: usize,
        batch_size: usize,
    ) -> Result<Vec<EventEnvelope<A>>, AppendError>;

    /// Append with optimistic concurrency: the store must reject the write
    /// with `WrongExpectedVersion` if `expected_version` no longer matches
    /// the stream's current version.
    async fn append(
        &self,
        stream_uuid: &str,
        expected_version: usize,
        events: Vec<EventEnvelope<A>>,
    ) -> Result<(), AppendError>;

    async fn load_snapshot(&self, stream_uuid: &str) -> Option<Snapshot<A>>;

    async fn save_snapshot(&self, snapshot: Snapshot<A>);

    /// Default rehydration: folds any snapshot plus every event appended
    /// since.
    async fn load_aggregate(&self, stream_uuid: &str) -> Result<(A, usize), AppendError> {
        let (mut state, from_version) = match self.load_snapshot(stream_uuid).await {
            Some(snapshot) => (snapshot.state, snapshot.version + 1),
            None => (A::default(), 0),
        };
        let events = self.read_stream_forward(stream_uuid, from_version, 0).await?;
        let mut version = from_version.saturating_sub(1);
        for envelope in events {
            // apply() errors mean a corrupt stream; the instance has no
            // recovery for that beyond surfacing it as unavailable.
            if state.apply(envelope.payload).is_err() {
                return Err(AppendError::Unavailable(format!(
                    "stream '{stream_uuid}' could not be folded at version {}",
                    envelope.version
                )));
            }
            version = envelope.version;
        }
        Ok((state, if from_version == 0 && version == 0 { 0 } else { version }))
    }
}
