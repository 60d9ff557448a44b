//! In-memory [`EventStore`] reference implementation, grounded on the
//! teacher's `es/inmemory.rs` (`Arc<Mutex<HashMap<...>>>` journal + snapshot
//! maps) generalized over the collapsed single-trait design.

use crate::aggregate::Aggregate;
use crate::event::EventEnvelope;
use crate::event_store::{AppendError, EventStore};
use crate::snapshot::Snapshot;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct InMemoryEventStore<A: Aggregate> {
    journal: Arc<Mutex<HashMap<String, Vec<EventEnvelope<A>>>>>,
    snapshots: Arc<Mutex<HashMap<String, Snapshot<A>>>>,
}

impl<A: Aggregate> Default for InMemoryEventStore<A> {
    fn default() -> Self {
        Self {
            journal: Arc::new(Mutex::new(HashMap::new())),
            snapshots: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<A: Aggregate> InMemoryEventStore<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test/demo helper: dump every event ever appended to a stream.
    pub async fn all_events(&self, stream_uuid: &str) -> Vec<EventEnvelope<A>> {
        self.journal
            .lock()
            .await
            .get(stream_uuid)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl<A: Aggregate> EventStore<A> for InMemoryEventStore<A> {
    async fn read_stream_forward(
        &self,
        stream_uuid: &str,
        from_version: usize,
        batch_size: usize,
    ) -> Result<Vec<EventEnvelope<A>>, AppendError> {
        let journal = self.journal.lock().await;
        let events = journal.get(stream_uuid).cloned().unwrap_or_default();
        let mut filtered: Vec<_> = events
            .into_iter()
            .filter(|e| e.version >= from_version)
            .collect();
        if batch_size > 0 && filtered.len() > batch_size {
            filtered.truncate(batch_size);
        }
        Ok(filtered)
    }

    async fn append(
        &self,
        stream_uuid: &str,
        expected_version: usize,
        events: Vec<EventEnvelope<A>>,
    ) -> Result<(), AppendError> {
        if events.is_empty() {
            return Ok(());
        }
        let mut journal = self.journal.lock().await;
        let stream = journal.entry(stream_uuid.to_string()).or_default();
        let actual = stream.last().map(|e| e.version).unwrap_or(0);
        if actual != expected_version {
            return Err(AppendError::WrongExpectedVersion {
                stream_uuid: stream_uuid.to_string(),
                expected: expected_version,
                actual,
            });
        }
        stream.extend(events);
        Ok(())
    }

    async fn load_snapshot(&self, stream_uuid: &str) -> Option<Snapshot<A>> {
        self.snapshots.lock().await.get(stream_uuid).cloned()
    }

    async fn save_snapshot(&self, snapshot: Snapshot<A>) {
        self.snapshots
            .lock()
            .await
            .insert(snapshot.aggregate_id.clone(), snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{TestAggregate, TestEvent};

    fn envelope(stream_uuid: &str, version: usize, payload: TestEvent) -> EventEnvelope<TestAggregate> {
        EventEnvelope {
            event_id: format!("{stream_uuid}-{version}"),
            aggregate_id: stream_uuid.to_string(),
            version,
            payload,
            metadata: HashMap::new(),
            at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn append_then_read_roundtrips() {
        let store: InMemoryEventStore<TestAggregate> = InMemoryEventStore::new();
        store
            .append("s1", 0, vec![envelope("s1", 1, TestEvent::Created { value: 1 })])
            .await
            .unwrap();
        let events = store.read_stream_forward("s1", 0, 0).await.unwrap();
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn append_rejects_stale_expected_version() {
        let store: InMemoryEventStore<TestAggregate> = InMemoryEventStore::new();
        store
            .append("s1", 0, vec![envelope("s1", 1, TestEvent::Created { value: 1 })])
            .await
            .unwrap();
        let err = store
            .append("s1", 0, vec![envelope("s1", 2, TestEvent::Incremented { by: 1 })])
            .await
            .unwrap_err();
        assert!(matches!(err, AppendError::WrongExpectedVersion { actual: 1, expected: 0, .. }));
    }

    #[tokio::test]
    async fn load_aggregate_folds_snapshot_and_events() {
        let store: InMemoryEventStore<TestAggregate> = InMemoryEventStore::new();
        store
            .append(
                "s1",
                0,
                vec![
                    envelope("s1", 1, TestEvent::Created { value: 1 }),
                    envelope("s1", 2, TestEvent::Incremented { by: 4 }),
                ],
            )
            .await
            .unwrap();
        let (state, version) = store.load_aggregate("s1").await.unwrap();
        assert_eq!(version, 2);
        assert_eq!(state.value, 5);
    }
}
