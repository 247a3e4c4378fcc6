use async_trait::async_trait;
use uuid::Uuid;

use crate::sync::models::SyncState;
use adsync_common::error::AdsyncResult;

/// Persistence for one connector's resumption state. The row is looked up by
/// source name once at startup; all later writes go by row id.
#[async_trait]
pub trait SyncStateRepository: Send + Sync {
    /// Get or create the state row for a connector source.
    async fn get_or_create(&self, source: &str) -> AdsyncResult<SyncState>;

    /// Record that a run has started. Purely observational: status never
    /// gates execution, because a killed run must stay resumable without
    /// manual repair.
    async fn begin_run(&self, id: Uuid) -> AdsyncResult<()>;

    /// Persist a checkpoint blob for an in-progress run.
    async fn save_cursor(&self, id: Uuid, cursor_value: &str) -> AdsyncResult<()>;

    /// Mark a run as completed, updating last_synced_at.
    async fn mark_completed(&self, id: Uuid) -> AdsyncResult<SyncState>;

    /// Mark a run as failed with an error message. The cursor keeps the last
    /// checkpoint written before the failure.
    async fn mark_failed(&self, id: Uuid, error_message: &str) -> AdsyncResult<SyncState>;
}
