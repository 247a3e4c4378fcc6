use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::sync::models::SyncState;
use crate::sync::repositories::SyncStateRepository;
use adsync_common::error::{AdsyncError, AdsyncResult};

const STATE_COLUMNS: &str =
    "id, source, cursor_value, status, error_message, last_synced_at, created_at, updated_at";

#[derive(Clone)]
pub struct PgSyncStateRepository {
    pool: PgPool,
}

impl PgSyncStateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_row(row: sqlx::postgres::PgRow) -> AdsyncResult<SyncState> {
        Ok(SyncState {
            id: row.get("id"),
            source: row.get("source"),
            cursor_value: row.get("cursor_value"),
            status: row.get("status"),
            error_message: row.get("error_message"),
            last_synced_at: row.get("last_synced_at"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

#[async_trait]
impl SyncStateRepository for PgSyncStateRepository {
    async fn get_or_create(&self, source: &str) -> AdsyncResult<SyncState> {
        let sql = format!(
            "insert into sync_state (id, source)
             values ($1, $2)
             on conflict (source) do update set updated_at = now()
             returning {STATE_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(source)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AdsyncError::Database(e.to_string()))?;

        Self::map_row(row)
    }

    async fn begin_run(&self, id: Uuid) -> AdsyncResult<()> {
        sqlx::query(
            "update sync_state
             set status = 'running', error_message = null, updated_at = $1
             where id = $2",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| AdsyncError::Database(e.to_string()))?;

        Ok(())
    }

    async fn save_cursor(&self, id: Uuid, cursor_value: &str) -> AdsyncResult<()> {
        sqlx::query(
            "update sync_state
             set cursor_value = $1, updated_at = $2
             where id = $3",
        )
        .bind(cursor_value)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| AdsyncError::Database(e.to_string()))?;

        Ok(())
    }

    async fn mark_completed(&self, id: Uuid) -> AdsyncResult<SyncState> {
        let sql = format!(
            "update sync_state
             set status = 'idle', last_synced_at = $1, error_message = null, updated_at = $1
             where id = $2
             returning {STATE_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(Utc::now())
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AdsyncError::Database(e.to_string()))?;

        Self::map_row(row)
    }

    async fn mark_failed(&self, id: Uuid, error_message: &str) -> AdsyncResult<SyncState> {
        let sql = format!(
            "update sync_state
             set status = 'failed', error_message = $1, updated_at = $2
             where id = $3
             returning {STATE_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(error_message)
            .bind(Utc::now())
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AdsyncError::Database(e.to_string()))?;

        Self::map_row(row)
    }
}
