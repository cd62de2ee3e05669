// SQLite-backed user record store.
//
// One table, one row per user. The warn-once guarantee rides on SQLite's
// per-statement atomicity: `INSERT OR IGNORE` for creation and a
// state-conditioned UPDATE for the compare-and-set, both reporting whether
// they actually changed a row.

use crate::core::moderation::{ModerationError, UserRecord, UserRecordStore, UserState};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Row, Sqlite};

pub struct SqliteRecordStore {
    pool: Pool<Sqlite>,
}

impl SqliteRecordStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Run database migrations to create required tables.
    pub async fn migrate(&self) -> Result<(), ModerationError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_records (
                user_id INTEGER PRIMARY KEY,
                state TEXT NOT NULL,
                warned_at TEXT,
                exempted_at TEXT
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| ModerationError::Storage(e.to_string()))?;

        Ok(())
    }
}

fn parse_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
    value.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}

#[async_trait]
impl UserRecordStore for SqliteRecordStore {
    async fn get(&self, user_id: u64) -> Result<Option<UserRecord>, ModerationError> {
        let row = sqlx::query(
            "SELECT state, warned_at, exempted_at FROM user_records WHERE user_id = ?",
        )
        .bind(user_id as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ModerationError::Storage(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let state_str: String = row.get("state");
        let state = UserState::parse(&state_str)
            .ok_or_else(|| ModerationError::Storage(format!("unknown user state: {state_str}")))?;

        Ok(Some(UserRecord {
            user_id,
            state,
            warned_at: parse_timestamp(row.get("warned_at")),
            exempted_at: parse_timestamp(row.get("exempted_at")),
        }))
    }

    async fn try_create(&self, user_id: u64, state: UserState) -> Result<bool, ModerationError> {
        let record = UserRecord::new(user_id, state);
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO user_records (user_id, state, warned_at, exempted_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(user_id as i64)
        .bind(state.as_str())
        .bind(record.warned_at.map(|t| t.to_rfc3339()))
        .bind(record.exempted_at.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await
        .map_err(|e| ModerationError::Storage(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn compare_and_set(
        &self,
        user_id: u64,
        expected: UserState,
        new: UserState,
    ) -> Result<bool, ModerationError> {
        let now = Utc::now().to_rfc3339();

        // The WHERE clause on the old state makes this a CAS: zero rows
        // affected means another worker moved the record first.
        let query = match new {
            UserState::Warned => sqlx::query(
                r#"
                UPDATE user_records
                SET state = ?, warned_at = COALESCE(warned_at, ?)
                WHERE user_id = ? AND state = ?
                "#,
            ),
            UserState::Exempt => sqlx::query(
                r#"
                UPDATE user_records
                SET state = ?, exempted_at = COALESCE(exempted_at, ?)
                WHERE user_id = ? AND state = ?
                "#,
            ),
            UserState::Unknown => sqlx::query(
                "UPDATE user_records SET state = ? WHERE user_id = ? AND state = ?",
            ),
        };

        let result = match new {
            UserState::Unknown => query
                .bind(new.as_str())
                .bind(user_id as i64)
                .bind(expected.as_str()),
            _ => query
                .bind(new.as_str())
                .bind(&now)
                .bind(user_id as i64)
                .bind(expected.as_str()),
        }
        .execute(&self.pool)
        .await
        .map_err(|e| ModerationError::Storage(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_store() -> SqliteRecordStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite");
        let store = SqliteRecordStore::new(pool);
        store.migrate().await.expect("migrate");
        store
    }

    #[tokio::test]
    async fn missing_record_reads_as_none() {
        let store = memory_store().await;
        assert!(store.get(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn create_then_read_round_trips_state_and_timestamp() {
        let store = memory_store().await;
        assert!(store.try_create(1, UserState::Warned).await.unwrap());

        let record = store.get(1).await.unwrap().unwrap();
        assert_eq!(record.state, UserState::Warned);
        assert!(record.warned_at.is_some());
        assert!(record.exempted_at.is_none());
    }

    #[tokio::test]
    async fn second_create_is_a_no_op() {
        let store = memory_store().await;
        assert!(store.try_create(1, UserState::Warned).await.unwrap());
        let original = store.get(1).await.unwrap().unwrap();

        assert!(!store.try_create(1, UserState::Exempt).await.unwrap());
        assert_eq!(store.get(1).await.unwrap().unwrap(), original);
    }

    #[tokio::test]
    async fn compare_and_set_moves_only_from_the_expected_state() {
        let store = memory_store().await;
        store.try_create(1, UserState::Warned).await.unwrap();

        assert!(!store
            .compare_and_set(1, UserState::Unknown, UserState::Exempt)
            .await
            .unwrap());
        assert!(store
            .compare_and_set(1, UserState::Warned, UserState::Exempt)
            .await
            .unwrap());

        let record = store.get(1).await.unwrap().unwrap();
        assert_eq!(record.state, UserState::Exempt);
        assert!(record.warned_at.is_some());
        assert!(record.exempted_at.is_some());
    }

    #[tokio::test]
    async fn compare_and_set_on_missing_record_is_false() {
        let store = memory_store().await;
        assert!(!store
            .compare_and_set(404, UserState::Unknown, UserState::Warned)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn records_survive_reopening_the_database() {
        let file = tempfile::NamedTempFile::new().expect("temp db file");
        let url = format!("sqlite://{}?mode=rwc", file.path().display());

        {
            let pool = SqlitePoolOptions::new().connect(&url).await.unwrap();
            let store = SqliteRecordStore::new(pool);
            store.migrate().await.unwrap();
            store.try_create(9, UserState::Exempt).await.unwrap();
        }

        let pool = SqlitePoolOptions::new().connect(&url).await.unwrap();
        let store = SqliteRecordStore::new(pool);
        store.migrate().await.unwrap();

        let record = store.get(9).await.unwrap().unwrap();
        assert_eq!(record.state, UserState::Exempt);
    }
}
