mod connector;
mod sa360;
mod sink;

use adsync_config::{init_tracing, AppConfig};
use adsync_db::columns::pg_repository::PgColumnRepository;
use adsync_db::sync::pg_repository::PgSyncStateRepository;
use adsync_db::sync::repositories::SyncStateRepository;

use crate::connector::Connector;
use crate::sa360::client::{Sa360Client, Sa360ClientConfig};
use crate::sa360::sync::{Sa360Syncer, SOURCE};
use crate::sink::WarehouseSink;

#[tokio::main]
async fn main() {
    init_tracing("info");
    let _ = dotenvy::dotenv();

    tracing::info!(service = "adsync-ingest", "starting");

    let app_config = AppConfig::from_env().expect("failed to load configuration");
    let sa360_config = Sa360ClientConfig::from_env().expect("failed to load SA360 configuration");

    let pool = adsync_db::create_pool(&app_config.database_url)
        .await
        .expect("failed to connect to database");
    adsync_db::schema::ensure_schema(&pool)
        .await
        .expect("failed to apply schema");

    let state_repo = PgSyncStateRepository::new(pool.clone());
    let state = state_repo
        .get_or_create(SOURCE)
        .await
        .expect("failed to load sync state");

    let client = Sa360Client::new(sa360_config).expect("failed to create SA360 client");
    let sink = WarehouseSink::new(
        state.id,
        PgColumnRepository::new(pool.clone()),
        state_repo.clone(),
    );
    let syncer = Sa360Syncer::new(client, sink, state_repo);

    match syncer.sync().await {
        Ok(result) => {
            tracing::info!(
                source = result.source,
                upserted = result.upserted,
                skipped = result.skipped,
                checkpoints = result.checkpoints,
                "sa360 sync completed"
            );
        }
        Err(e) => {
            tracing::error!(error = %e, "sa360 sync failed");
            std::process::exit(1);
        }
    }

    tracing::info!("ingest service finished");
}
