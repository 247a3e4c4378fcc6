use async_trait::async_trait;

use crate::columns::models::{CustomColumn, CustomColumnMetric};
use adsync_common::error::AdsyncResult;

#[async_trait]
pub trait ColumnStore: Send + Sync {
    /// Upsert one custom-column definition on (column_id, customer_id).
    async fn upsert_column(&self, column: &CustomColumn) -> AdsyncResult<()>;

    /// Upsert one metric observation on the full metrics primary key.
    async fn upsert_metric(&self, metric: &CustomColumnMetric) -> AdsyncResult<()>;
}
