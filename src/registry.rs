//! Registry adapter: name → instance handle lookup with a race-free
//! "find-or-create" primitive, backed by an `Arc<Mutex<HashMap<...>>>`.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::Mutex;

#[async_trait::async_trait]
pub trait Registry<K, H>: Send + Sync
where
    K: Eq + Hash + Send + Sync + Clone,
    H: Clone + Send + Sync,
{
    /// Atomically returns an existing handle or invokes `factory` exactly
    /// once. The Registry, not the caller, owns the race.
    async fn start_or_lookup<F, Fut>(&self, key: K, factory: F) -> (H, bool)
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = H> + Send;

    async fn whereis(&self, key: &K) -> Option<H>;

    /// Drops a handle, e.g. after its instance stops.
    async fn deregister(&self, key: &K);
}

/// In-process registry backed by a single mutex-guarded map. The mutex is
/// held across `factory` so two concurrent `start_or_lookup` calls for the
/// same key can never both win — the registry must provide a race-free
/// find-or-create primitive.
pub struct InMemoryRegistry<K, H> {
    instances: Mutex<HashMap<K, H>>,
}

impl<K, H> Default for InMemoryRegistry<K, H>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            instances: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, H> InMemoryRegistry<K, H>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl<K, H> Registry<K, H> for InMemoryRegistry<K, H>
where
    K: Eq + Hash + Send + Sync + Clone,
    H: Clone + Send + Sync,
{
    async fn start_or_lookup<F, Fut>(&self, key: K, factory: F) -> (H, bool)
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = H> + Send,
    {
        let mut guard = self.instances.lock().await;
        if let Some(handle) = guard.get(&key) {
            return (handle.clone(), false);
        }
        let handle = factory().await;
        guard.insert(key, handle.clone());
        (handle, true)
    }

    async fn whereis(&self, key: &K) -> Option<H> {
        self.instances.lock().await.get(key).cloned()
    }

    async fn deregister(&self, key: &K) {
        self.instances.lock().await.remove(key);
    }
}

pub type SharedRegistry<K, H> = Arc<InMemoryRegistry<K, H>>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn start_or_lookup_invokes_factory_once() {
        let registry: InMemoryRegistry<String, u32> = InMemoryRegistry::new();
        let calls = AtomicUsize::new(0);

        let (h1, created1) = registry
            .start_or_lookup("a".to_string(), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                1u32
            })
            .await;
        let (h2, created2) = registry
            .start_or_lookup("a".to_string(), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                2u32
            })
            .await;

        assert_eq!(h1, 1);
        assert_eq!(h2, 1);
        assert!(created1);
        assert!(!created2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn whereis_and_deregister() {
        let registry: InMemoryRegistry<String, u32> = InMemoryRegistry::new();
        assert!(registry.whereis(&"x".to_string()).await.is_none());
        registry.start_or_lookup("x".to_string(), || async { 7u32 }).await;
        assert_eq!(registry.whereis(&"x".to_string()).await, Some(7));
        registry.deregister(&"x".to_string()).await;
        assert!(registry.whereis(&"x".to_string()).await.is_none());
    }
}
