use adsync_common::error::{AdsyncError, AdsyncResult};
use sqlx::PgPool;

/// Destination and state tables, declared once and applied idempotently.
///
/// Every destination write is an upsert on the table's primary key; the keys
/// below are what make at-least-once delivery safe to replay.
const SCHEMA_DDL: &[&str] = &[
    "create table if not exists custom_columns (
        column_id    text not null,
        customer_id  text not null,
        name         text not null,
        description  text not null default '',
        render_type  text not null,
        value_type   text not null,
        updated_at   timestamptz not null default now(),
        primary key (column_id, customer_id)
    )",
    "create table if not exists custom_column_metrics (
        column_id          text not null,
        customer_id        text not null,
        campaign_id        text not null,
        date               date not null,
        keyword_text       text not null default '',
        keyword_match_type text not null default '',
        value              double precision,
        campaign_name      text not null default '',
        account_name       text not null default '',
        currency_code      text not null default '',
        clicks             text not null default '0',
        impressions        text not null default '0',
        cost               text not null default '0',
        updated_at         timestamptz not null default now(),
        primary key (column_id, customer_id, campaign_id, date,
                     keyword_text, keyword_match_type)
    )",
    "create table if not exists sync_state (
        id             uuid primary key,
        source         text not null unique,
        cursor_value   text,
        status         text not null default 'idle',
        error_message  text,
        last_synced_at timestamptz,
        created_at     timestamptz not null default now(),
        updated_at     timestamptz not null default now()
    )",
];

/// Apply the schema, creating any missing tables.
pub async fn ensure_schema(pool: &PgPool) -> AdsyncResult<()> {
    for ddl in SCHEMA_DDL {
        sqlx::query(ddl)
            .execute(pool)
            .await
            .map_err(|e| AdsyncError::Database(e.to_string()))?;
    }
    Ok(())
}
