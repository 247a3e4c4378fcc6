use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;

use crate::columns::models::{CustomColumn, CustomColumnMetric};
use crate::columns::repositories::ColumnStore;
use adsync_common::error::{AdsyncError, AdsyncResult};

#[derive(Clone)]
pub struct PgColumnRepository {
    pool: PgPool,
}

impl PgColumnRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ColumnStore for PgColumnRepository {
    async fn upsert_column(&self, column: &CustomColumn) -> AdsyncResult<()> {
        sqlx::query(
            "insert into custom_columns
                 (column_id, customer_id, name, description, render_type, value_type, updated_at)
             values ($1, $2, $3, $4, $5, $6, $7)
             on conflict (column_id, customer_id) do update
             set name = excluded.name,
                 description = excluded.description,
                 render_type = excluded.render_type,
                 value_type = excluded.value_type,
                 updated_at = excluded.updated_at",
        )
        .bind(&column.column_id)
        .bind(&column.customer_id)
        .bind(&column.name)
        .bind(&column.description)
        .bind(&column.render_type)
        .bind(&column.value_type)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| AdsyncError::Database(e.to_string()))?;

        Ok(())
    }

    async fn upsert_metric(&self, metric: &CustomColumnMetric) -> AdsyncResult<()> {
        sqlx::query(
            "insert into custom_column_metrics
                 (column_id, customer_id, campaign_id, date, keyword_text, keyword_match_type,
                  value, campaign_name, account_name, currency_code, clicks, impressions, cost,
                  updated_at)
             values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
             on conflict (column_id, customer_id, campaign_id, date, keyword_text, keyword_match_type)
             do update
             set value = excluded.value,
                 campaign_name = excluded.campaign_name,
                 account_name = excluded.account_name,
                 currency_code = excluded.currency_code,
                 clicks = excluded.clicks,
                 impressions = excluded.impressions,
                 cost = excluded.cost,
                 updated_at = excluded.updated_at",
        )
        .bind(&metric.column_id)
        .bind(&metric.customer_id)
        .bind(&metric.campaign_id)
        .bind(metric.date)
        .bind(&metric.keyword_text)
        .bind(&metric.keyword_match_type)
        .bind(metric.value)
        .bind(&metric.campaign_name)
        .bind(&metric.account_name)
        .bind(&metric.currency_code)
        .bind(&metric.clicks)
        .bind(&metric.impressions)
        .bind(&metric.cost)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| AdsyncError::Database(e.to_string()))?;

        Ok(())
    }
}
