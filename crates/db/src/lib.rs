pub mod columns;
pub mod schema;
pub mod sync;

use adsync_common::error::{AdsyncError, AdsyncResult};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Create a Postgres connection pool from a database URL.
///
/// The connector is a single sequential worker, so the pool stays small.
pub async fn create_pool(database_url: &str) -> AdsyncResult<PgPool> {
    tracing::info!("connecting to database");
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|e| AdsyncError::Database(e.to_string()))
}
