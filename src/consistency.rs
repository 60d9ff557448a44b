//! Consistency Coordinator: blocks dispatch until nominated downstream
//! subscribers have acknowledged the produced events.

use crate::errors::DispatchError;
use crate::pubsub::{PubSub, SubscriberAck};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, RwLock};

/// The `consistency` setting on a dispatch.
#[derive(Debug, Clone)]
pub enum Consistency {
    Eventual,
    Strong,
    Only(HashSet<String>),
}

impl Default for Consistency {
    fn default() -> Self {
        Consistency::Eventual
    }
}

/// Tracks the last acked version per `(stream_uuid, subscriber_id)` and
/// wakes waiters as acks arrive. One coordinator is shared by all dispatches
/// of a host application.
pub struct ConsistencyCoordinator {
    strongly_consistent: HashSet<String>,
    acked: RwLock<HashMap<(String, String), usize>>,
    notify: Notify,
}

impl ConsistencyCoordinator {
    /// `strongly_consistent` names every subscriber the host declares as
    /// strongly-consistent — every subscriber declared as
    /// strongly-consistent in the host runtime.
    pub fn new(strongly_consistent: impl IntoIterator<Item = String>) -> Self {
        Self {
            strongly_consistent: strongly_consistent.into_iter().collect(),
            acked: RwLock::new(HashMap::new()),
            notify: Notify::new(),
        }
    }

    /// Fails configuration if an explicitly-named subscriber isn't declared
    /// strongly-consistent.
    pub fn validate_explicit_set(
        &self,
        subscribers: &HashSet<String>,
    ) -> Result<(), crate::errors::RouterConfigError> {
        for name in subscribers {
            if !self.strongly_consistent.contains(name) {
                return Err(crate::errors::RouterConfigError::SubscriberNotStronglyConsistent(
                    name.clone(),
                ));
            }
        }
        Ok(())
    }

    /// Spawns the background task that folds incoming acks into `acked` and
    /// wakes waiters. Must be called once per coordinator lifetime.
    pub fn spawn_listener(self: &Arc<Self>, pubsub: Arc<dyn PubSub>) {
        let coordinator = Arc::clone(self);
        let mut rx = pubsub.subscribe_acks();
        tokio::spawn(async move {
            while let Ok(ack) = rx.recv().await {
                coordinator.record_ack(ack).await;
            }
        });
    }

    async fn record_ack(&self, ack: SubscriberAck) {
        let mut guard = self.acked.write().await;
        let entry = guard
            .entry((ack.stream_uuid, ack.subscriber_id))
            .or_insert(0);
        if ack.up_to_version > *entry {
            *entry = ack.up_to_version;
        }
        drop(guard);
        self.notify.notify_waiters();
    }

    fn required_subscribers(&self, consistency: &Consistency) -> HashSet<String> {
        match consistency {
            Consistency::Eventual => HashSet::new(),
            Consistency::Strong => self.strongly_consistent.clone(),
            Consistency::Only(set) => set.clone(),
        }
    }

    async fn satisfied(&self, stream_uuid: &str, version: usize, required: &HashSet<String>) -> bool {
        let guard = self.acked.read().await;
        required
            .iter()
            .all(|sub| guard.get(&(stream_uuid.to_string(), sub.clone())).copied().unwrap_or(0) >= version)
    }

    /// Waits until every subscriber required by `consistency` has acked at
    /// least `version` on `stream_uuid`, or `timeout` elapses.
    pub async fn wait(
        &self,
        consistency: &Consistency,
        stream_uuid: &str,
        version: usize,
        timeout: Option<Duration>,
    ) -> Result<(), DispatchError> {
        let required = self.required_subscribers(consistency);
        if required.is_empty() {
            return Ok(());
        }

        let deadline = timeout.map(|d| tokio::time::Instant::now() + d);
        loop {
            if self.satisfied(stream_uuid, version, &required).await {
                return Ok(());
            }
            let notified = self.notify.notified();
            match deadline {
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        if self.satisfied(stream_uuid, version, &required).await {
                            return Ok(());
                        }
                        return Err(DispatchError::ConsistencyTimeout);
                    }
                }
                None => notified.await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn eventual_consistency_never_waits() {
        let coordinator = ConsistencyCoordinator::new(vec![]);
        let result = coordinator
            .wait(&Consistency::Eventual, "s1", 1, Some(Duration::from_millis(1)))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn strong_consistency_times_out_without_ack() {
        let coordinator = ConsistencyCoordinator::new(vec!["projection_x".to_string()]);
        let result = coordinator
            .wait(&Consistency::Strong, "s1", 1, Some(Duration::from_millis(20)))
            .await;
        assert!(matches!(result, Err(DispatchError::ConsistencyTimeout)));
    }

    #[tokio::test]
    async fn strong_consistency_resolves_once_acked() {
        let coordinator = Arc::new(ConsistencyCoordinator::new(vec!["projection_x".to_string()]));
        coordinator
            .record_ack(SubscriberAck {
                subscriber_id: "projection_x".into(),
                stream_uuid: "s1".into(),
                up_to_version: 2,
            })
            .await;
        let result = coordinator
            .wait(&Consistency::Strong, "s1", 2, Some(Duration::from_millis(50)))
            .await;
        assert!(result.is_ok());
    }

    #[test]
    fn explicit_subscriber_must_be_strongly_consistent() {
        let coordinator = ConsistencyCoordinator::new(vec!["projection_x".to_string()]);
        let mut set = HashSet::new();
        set.insert("projection_y".to_string());
        let err = coordinator.validate_explicit_set(&set).unwrap_err();
        assert!(matches!(
            err,
            crate::errors::RouterConfigError::SubscriberNotStronglyConsistent(_)
        ));
    }
}
