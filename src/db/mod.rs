pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub use memory::InMemoryProfileStore;
pub use sqlite::SqliteProfileStore;

/// A profile document as the store keeps it. `version` starts at 1 on insert
/// and grows by one on every accepted write.
#[derive(Debug, Clone)]
pub struct StoredProfile {
    pub user_id: String,
    pub document: serde_json::Value,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("version conflict for {user_id}: expected {expected}")]
    Conflict { user_id: String, expected: i64 },
    #[error("store call timed out after {0} ms")]
    Timeout(u64),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Whether repeating the identical call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Timeout(_) | StoreError::Database(_) | StoreError::Unavailable(_)
        )
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn load(&self, user_id: &str) -> Result<Option<StoredProfile>, StoreError>;

    /// Compare-and-set write. `expected_version == 0` means the profile must not
    /// exist yet. Returns the new version.
    async fn save(
        &self,
        user_id: &str,
        document: &serde_json::Value,
        expected_version: i64,
    ) -> Result<i64, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;

    fn backend(&self) -> &'static str;
}
