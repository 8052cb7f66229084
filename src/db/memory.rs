use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use crate::db::{ProfileStore, StoreError, StoredProfile};

/// Process-local store used for tests and local runs.
#[derive(Default)]
pub struct InMemoryProfileStore {
    profiles: RwLock<HashMap<String, StoredProfile>>,
    failing_loads: AtomicUsize,
    failing_saves: AtomicUsize,
    latency: RwLock<Option<Duration>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `n` loads fail with `Unavailable`.
    pub fn fail_next_loads(&self, n: usize) {
        self.failing_loads.store(n, Ordering::SeqCst);
    }

    /// The next `n` saves fail with `Unavailable`.
    pub fn fail_next_saves(&self, n: usize) {
        self.failing_saves.store(n, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.write() = latency;
    }

    pub fn len(&self) -> usize {
        self.profiles.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.read().is_empty()
    }

    async fn simulate_latency(&self) {
        let latency = *self.latency.read();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

fn take_failure(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn load(&self, user_id: &str) -> Result<Option<StoredProfile>, StoreError> {
        self.simulate_latency().await;
        if take_failure(&self.failing_loads) {
            return Err(StoreError::Unavailable("injected load failure".to_string()));
        }
        Ok(self.profiles.read().get(user_id).cloned())
    }

    async fn save(
        &self,
        user_id: &str,
        document: &serde_json::Value,
        expected_version: i64,
    ) -> Result<i64, StoreError> {
        self.simulate_latency().await;
        if take_failure(&self.failing_saves) {
            return Err(StoreError::Unavailable("injected save failure".to_string()));
        }

        let mut profiles = self.profiles.write();
        let current = profiles.get(user_id).map(|p| p.version).unwrap_or(0);
        if current != expected_version {
            return Err(StoreError::Conflict {
                user_id: user_id.to_string(),
                expected: expected_version,
            });
        }

        let version = current + 1;
        profiles.insert(
            user_id.to_string(),
            StoredProfile {
                user_id: user_id.to_string(),
                document: document.clone(),
                version,
                updated_at: Utc::now(),
            },
        );
        Ok(version)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
