use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use crate::db::{ProfileStore, StoreError, StoredProfile};

const CREATE_PROFILES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS "tutor_profiles" (
    "user_id" TEXT PRIMARY KEY NOT NULL,
    "document" TEXT NOT NULL,
    "version" INTEGER NOT NULL,
    "updated_at" TEXT NOT NULL
)
"#;

#[derive(Clone)]
pub struct SqliteProfileStore {
    pool: SqlitePool,
}

impl SqliteProfileStore {
    /// Opens (creating if missing) the database at `url` and ensures the
    /// profile table exists.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let in_memory = url.contains(":memory:");
        let mut options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(30));
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // an in-memory database lives only as long as its single connection
        let pool = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_PROFILES_TABLE).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for SqliteProfileStore {
    async fn load(&self, user_id: &str) -> Result<Option<StoredProfile>, StoreError> {
        let row = sqlx::query(
            r#"SELECT "document", "version", "updated_at" FROM "tutor_profiles" WHERE "user_id" = ?"#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let raw: String = row.try_get("document")?;
        let version: i64 = row.try_get("version")?;
        let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

        Ok(Some(StoredProfile {
            user_id: user_id.to_string(),
            document: serde_json::from_str(&raw)?,
            version,
            updated_at,
        }))
    }

    async fn save(
        &self,
        user_id: &str,
        document: &serde_json::Value,
        expected_version: i64,
    ) -> Result<i64, StoreError> {
        let raw = serde_json::to_string(document)?;
        let now = Utc::now();

        let result = if expected_version == 0 {
            sqlx::query(
                r#"
                INSERT INTO "tutor_profiles" ("user_id", "document", "version", "updated_at")
                VALUES (?, ?, 1, ?)
                ON CONFLICT ("user_id") DO NOTHING
                "#,
            )
            .bind(user_id)
            .bind(&raw)
            .bind(now)
            .execute(&self.pool)
            .await?
        } else {
            sqlx::query(
                r#"
                UPDATE "tutor_profiles"
                SET "document" = ?, "version" = "version" + 1, "updated_at" = ?
                WHERE "user_id" = ? AND "version" = ?
                "#,
            )
            .bind(&raw)
            .bind(now)
            .bind(user_id)
            .bind(expected_version)
            .execute(&self.pool)
            .await?
        };

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict {
                user_id: user_id.to_string(),
                expected: expected_version,
            });
        }
        Ok(expected_version + 1)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}
