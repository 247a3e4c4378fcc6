use async_trait::async_trait;
use uuid::Uuid;

use adsync_common::error::AdsyncResult;
use adsync_db::columns::models::{CustomColumn, CustomColumnMetric};
use adsync_db::columns::repositories::ColumnStore;
use adsync_db::sync::models::SyncCursor;
use adsync_db::sync::repositories::SyncStateRepository;

/// One element of the tagged sequence the sync driver produces: either a
/// record for the warehouse or a resumption checkpoint. Keeping these in one
/// ordered stream is what guarantees a checkpoint is never persisted ahead of
/// the records it claims are complete.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    Checkpoint(SyncCursor),
    Column(CustomColumn),
    Metric(CustomColumnMetric),
}

/// Consumer of the driver's event stream.
#[async_trait]
pub trait SyncSink: Send + Sync {
    async fn emit(&self, event: SyncEvent) -> AdsyncResult<()>;
}

/// Production sink: records become Postgres upserts, checkpoints become
/// `sync_state.cursor_value` writes.
pub struct WarehouseSink<C, S> {
    state_id: Uuid,
    columns: C,
    state: S,
}

impl<C, S> WarehouseSink<C, S> {
    pub fn new(state_id: Uuid, columns: C, state: S) -> Self {
        Self {
            state_id,
            columns,
            state,
        }
    }
}

#[async_trait]
impl<C, S> SyncSink for WarehouseSink<C, S>
where
    C: ColumnStore,
    S: SyncStateRepository,
{
    async fn emit(&self, event: SyncEvent) -> AdsyncResult<()> {
        match event {
            SyncEvent::Checkpoint(cursor) => {
                let blob = cursor.to_json()?;
                tracing::debug!(cursor = %blob, "writing checkpoint");
                self.state.save_cursor(self.state_id, &blob).await
            }
            SyncEvent::Column(column) => self.columns.upsert_column(&column).await,
            SyncEvent::Metric(metric) => self.columns.upsert_metric(&metric).await,
        }
    }
}
