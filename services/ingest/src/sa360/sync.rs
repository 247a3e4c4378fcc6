use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use adsync_common::error::AdsyncError;
use adsync_db::columns::models::CustomColumn;
use adsync_db::sync::models::SyncCursor;
use adsync_db::sync::repositories::SyncStateRepository;

use crate::connector::{Connector, SyncResult};
use crate::sink::{SyncEvent, SyncSink};

use super::client::{Sa360Client, Sa360ClientError};
use super::models::CustomColumnMetadata;
use super::normalize::{normalize_row, parse_row_date};
use super::paginator::SearchPages;

pub const SOURCE: &str = "sa360";

/// How far past the frontier a row's date may run before a new checkpoint is
/// written. Bounds the re-fetch a crash recovery can cost without paying for
/// per-row checkpointing.
const FRONTIER_ADVANCE_DAYS: i64 = 5;

const PROGRESS_LOG_INTERVAL: usize = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Client(#[from] Sa360ClientError),

    #[error(transparent)]
    Store(#[from] AdsyncError),
}

/// The hierarchical sync driver: walks sub-managers, then their managed
/// accounts, then date-ordered metric pages, emitting records and checkpoints
/// as one ordered event stream.
///
/// Resume discipline: every position is checkpointed before work begins on
/// it, already-processed positions are skipped without a checkpoint (the
/// cursor never regresses), and within an account the date frontier marks how
/// far the ascending-date scan is confirmed complete.
pub struct Sa360Syncer<K, R> {
    client: Sa360Client,
    sink: K,
    state_repo: R,
}

impl<K, R> Sa360Syncer<K, R>
where
    K: SyncSink,
    R: SyncStateRepository,
{
    pub fn new(client: Sa360Client, sink: K, state_repo: R) -> Self {
        Self {
            client,
            sink,
            state_repo,
        }
    }

    /// One full traversal from `cursor`, querying dates up to `today`.
    pub async fn traverse(
        &self,
        cursor: &SyncCursor,
        today: NaiveDate,
    ) -> Result<SyncResult, SyncError> {
        let mut stats = SyncResult {
            source: SOURCE.to_string(),
            upserted: 0,
            skipped: 0,
            checkpoints: 0,
        };

        let mut submanagers = self.client.config().submanager_account_ids.clone();
        sort_numeric(&mut submanagers)?;
        let submanager_set: HashSet<u64> = {
            let mut set = HashSet::with_capacity(submanagers.len());
            for id in &submanagers {
                set.insert(numeric(id)?);
            }
            set
        };

        let resume_submanager = match &cursor.submanager_cursor {
            Some(id) => numeric(id)?,
            // Config validation guarantees a non-empty id list.
            None => submanagers.first().map(|id| numeric(id)).transpose()?.unwrap_or(0),
        };

        let iterative_start = parse_opt_date(cursor.iterative_sync_cursor.as_deref())?;
        let backfill_start: NaiveDate = self
            .client
            .config()
            .backfill_start_date
            .parse()
            .map_err(|_| {
                AdsyncError::Config(format!(
                    "invalid backfill start date {:?}",
                    self.client.config().backfill_start_date
                ))
            })?;

        for submanager in &submanagers {
            let submanager_num = numeric(submanager)?;
            if submanager_num < resume_submanager {
                tracing::info!(submanager = %submanager, "fully processed in a prior run, skipping");
                continue;
            }

            // Granular cursors apply only to the sub-manager being resumed;
            // later sub-managers start fresh.
            let resuming_here = submanager_num == resume_submanager;
            let carried_managed = if resuming_here {
                cursor.managed_account_cursor.clone()
            } else {
                None
            };
            let carried_date = if resuming_here {
                cursor.column_data_cursor.clone()
            } else {
                None
            };

            tracing::info!(submanager = %submanager, "beginning sync for submanager");

            // Checkpoint before any work so a crash resumes at this
            // sub-manager even if no row gets emitted.
            self.checkpoint(
                &mut stats,
                SyncCursor {
                    submanager_cursor: Some(submanager.clone()),
                    managed_account_cursor: carried_managed.clone(),
                    iterative_sync_cursor: cursor.iterative_sync_cursor.clone(),
                    column_data_cursor: carried_date.clone(),
                },
            )
            .await?;

            let columns = self.client.fetch_custom_columns(submanager).await?;

            // Accounts that appear in both roles are traversed as
            // sub-managers only, never double-counted as managed accounts.
            let mut managed = Vec::new();
            for id in self.client.fetch_customer_clients(submanager).await? {
                if !submanager_set.contains(&numeric(&id)?) {
                    managed.push(id);
                }
            }
            sort_numeric(&mut managed)?;

            tracing::info!(
                submanager = %submanager,
                managed_accounts = managed.len(),
                custom_columns = columns.len(),
                "resolved submanager scope"
            );

            let carried_managed_num = match &carried_managed {
                Some(id) => Some(numeric(id)?),
                None => None,
            };
            let resume_managed = carried_managed_num.unwrap_or(0);

            for account in &managed {
                let account_num = numeric(account)?;
                if account_num < resume_managed {
                    tracing::info!(customer_id = %account, "fully processed in a prior run, skipping");
                    continue;
                }
                let account_date_carry = if carried_managed_num == Some(account_num) {
                    parse_opt_date(carried_date.as_deref())?
                } else {
                    None
                };

                tracing::info!(customer_id = %account, "beginning sync for managed account");

                self.checkpoint(
                    &mut stats,
                    SyncCursor {
                        submanager_cursor: Some(submanager.clone()),
                        managed_account_cursor: Some(account.clone()),
                        iterative_sync_cursor: cursor.iterative_sync_cursor.clone(),
                        column_data_cursor: account_date_carry
                            .map(|d| d.format("%Y-%m-%d").to_string()),
                    },
                )
                .await?;

                for column in &columns {
                    self.sink
                        .emit(SyncEvent::Column(to_custom_column(account, column)))
                        .await?;
                    stats.upserted += 1;
                }

                if columns.is_empty() {
                    tracing::info!(customer_id = %account, "no custom columns defined, skipping metric fetch");
                    continue;
                }

                let start_date = iterative_start
                    .or(account_date_carry)
                    .unwrap_or(backfill_start);

                self.sync_account_metrics(
                    &mut stats,
                    cursor,
                    submanager,
                    account,
                    &columns,
                    start_date,
                    today,
                )
                .await?;
            }
        }

        // Terminal checkpoint: from here on, every run is incremental from
        // this date; the granular cursors are cleared.
        self.checkpoint(
            &mut stats,
            SyncCursor {
                iterative_sync_cursor: Some(today.format("%Y-%m-%d").to_string()),
                ..SyncCursor::default()
            },
        )
        .await?;

        tracing::info!(
            upserted = stats.upserted,
            skipped = stats.skipped,
            checkpoints = stats.checkpoints,
            "traversal complete"
        );
        Ok(stats)
    }

    /// Page through one account's metrics, maintaining the date frontier.
    #[allow(clippy::too_many_arguments)]
    async fn sync_account_metrics(
        &self,
        stats: &mut SyncResult,
        run_cursor: &SyncCursor,
        submanager: &str,
        customer_id: &str,
        columns: &[CustomColumnMetadata],
        start_date: NaiveDate,
        today: NaiveDate,
    ) -> Result<(), SyncError> {
        let column_ids: Vec<String> = columns.iter().map(|c| c.id.clone()).collect();
        let mut pages =
            SearchPages::new(&self.client, customer_id, &column_ids, start_date, today)?;

        let mut frontier: Option<NaiveDate> = None;
        let mut rows_seen = 0usize;

        while let Some(page) = pages.next_page().await? {
            for row in &page.results {
                let date = parse_row_date(row)?;

                match frontier {
                    None => {
                        // First date establishes the safe restart point
                        // before anything further is processed.
                        frontier = Some(date);
                        self.frontier_checkpoint(stats, run_cursor, submanager, customer_id, date)
                            .await?;
                    }
                    Some(f) if date < f => {
                        // Reorder artifact from an API retry; rows below the
                        // frontier were already flushed, don't double-count.
                        stats.skipped += 1;
                        continue;
                    }
                    Some(f) if (date - f).num_days() > FRONTIER_ADVANCE_DAYS => {
                        frontier = Some(date);
                        self.frontier_checkpoint(stats, run_cursor, submanager, customer_id, date)
                            .await?;
                    }
                    Some(_) => {}
                }

                for record in normalize_row(customer_id, row, &page.custom_column_headers)? {
                    self.sink.emit(SyncEvent::Metric(record)).await?;
                    stats.upserted += 1;
                }

                rows_seen += 1;
                if rows_seen % PROGRESS_LOG_INTERVAL == 0 {
                    tracing::info!(
                        customer_id = %customer_id,
                        rows = rows_seen,
                        date = %date,
                        "metric fetch progress"
                    );
                }
            }
        }

        Ok(())
    }

    async fn frontier_checkpoint(
        &self,
        stats: &mut SyncResult,
        run_cursor: &SyncCursor,
        submanager: &str,
        customer_id: &str,
        frontier: NaiveDate,
    ) -> Result<(), SyncError> {
        self.checkpoint(
            stats,
            SyncCursor {
                submanager_cursor: Some(submanager.to_string()),
                managed_account_cursor: Some(customer_id.to_string()),
                iterative_sync_cursor: run_cursor.iterative_sync_cursor.clone(),
                column_data_cursor: Some(frontier.format("%Y-%m-%d").to_string()),
            },
        )
        .await
    }

    async fn checkpoint(
        &self,
        stats: &mut SyncResult,
        cursor: SyncCursor,
    ) -> Result<(), SyncError> {
        self.sink.emit(SyncEvent::Checkpoint(cursor)).await?;
        stats.checkpoints += 1;
        Ok(())
    }
}

#[async_trait]
impl<K, R> Connector for Sa360Syncer<K, R>
where
    K: SyncSink,
    R: SyncStateRepository,
{
    fn source_name(&self) -> &str {
        SOURCE
    }

    async fn sync(&self) -> Result<SyncResult, Box<dyn std::error::Error + Send + Sync>> {
        let state = self.state_repo.get_or_create(SOURCE).await?;
        self.state_repo.begin_run(state.id).await?;
        let cursor = state.cursor()?;
        let today = Utc::now().date_naive();

        match self.traverse(&cursor, today).await {
            Ok(result) => {
                self.state_repo.mark_completed(state.id).await?;
                Ok(result)
            }
            Err(e) => {
                // The cursor keeps whatever checkpoint was flushed last; the
                // next run resumes from there.
                tracing::error!(error = %e, "sa360 sync failed");
                self.state_repo.mark_failed(state.id, &e.to_string()).await?;
                Err(Box::new(e))
            }
        }
    }
}

fn to_custom_column(customer_id: &str, meta: &CustomColumnMetadata) -> CustomColumn {
    CustomColumn {
        column_id: meta.id.clone(),
        customer_id: customer_id.to_string(),
        name: meta.name.clone(),
        description: meta.description.clone(),
        render_type: meta.render_type.clone().unwrap_or_default(),
        value_type: meta.value_type.clone().unwrap_or_default(),
    }
}

/// Account ids are numeric strings; all ordering and resume comparisons use
/// the integer value, so zero-padding never changes traversal order.
fn numeric(id: &str) -> Result<u64, SyncError> {
    id.parse().map_err(|_| {
        SyncError::Client(Sa360ClientError::DataShape(format!(
            "account id {id:?} is not numeric"
        )))
    })
}

fn sort_numeric(ids: &mut [String]) -> Result<(), SyncError> {
    for id in ids.iter() {
        numeric(id)?;
    }
    ids.sort_by_key(|id| id.parse::<u64>().unwrap_or(u64::MAX));
    Ok(())
}

fn parse_opt_date(raw: Option<&str>) -> Result<Option<NaiveDate>, SyncError> {
    match raw {
        None => Ok(None),
        Some(s) => s.parse().map(Some).map_err(|_| {
            SyncError::Store(AdsyncError::State(format!("invalid cursor date {s:?}")))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sa360::client::tests::test_config;
    use crate::sa360::client::Sa360Client;
    use adsync_common::error::AdsyncResult;
    use adsync_db::sync::models::SyncState;
    use std::sync::{Arc, Mutex};
    use uuid::Uuid;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // ── Recording sink ───────────────────────────────────────────

    #[derive(Clone, Default)]
    struct RecordingSink {
        events: Arc<Mutex<Vec<SyncEvent>>>,
    }

    impl RecordingSink {
        fn events(&self) -> Vec<SyncEvent> {
            self.events.lock().unwrap().clone()
        }

        fn checkpoints(&self) -> Vec<SyncCursor> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    SyncEvent::Checkpoint(c) => Some(c),
                    _ => None,
                })
                .collect()
        }

        fn metric_dates(&self) -> Vec<String> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    SyncEvent::Metric(m) => Some(m.date.format("%Y-%m-%d").to_string()),
                    _ => None,
                })
                .collect()
        }
    }

    #[async_trait]
    impl SyncSink for RecordingSink {
        async fn emit(&self, event: SyncEvent) -> AdsyncResult<()> {
            self.events.lock().unwrap().push(event);
            Ok(())
        }
    }

    // ── Mock state repository ────────────────────────────────────

    #[derive(Clone, Default)]
    struct MockStateRepo {
        stored_cursor: Option<String>,
        saved: Arc<Mutex<Vec<String>>>,
        statuses: Arc<Mutex<Vec<String>>>,
    }

    impl MockStateRepo {
        fn state(&self) -> SyncState {
            SyncState {
                id: Uuid::new_v4(),
                source: SOURCE.to_string(),
                cursor_value: self.stored_cursor.clone(),
                status: "idle".to_string(),
                error_message: None,
                last_synced_at: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            }
        }
    }

    #[async_trait]
    impl SyncStateRepository for MockStateRepo {
        async fn get_or_create(&self, _source: &str) -> AdsyncResult<SyncState> {
            Ok(self.state())
        }

        async fn begin_run(&self, _id: Uuid) -> AdsyncResult<()> {
            self.statuses.lock().unwrap().push("running".to_string());
            Ok(())
        }

        async fn save_cursor(&self, _id: Uuid, cursor_value: &str) -> AdsyncResult<()> {
            self.saved.lock().unwrap().push(cursor_value.to_string());
            Ok(())
        }

        async fn mark_completed(&self, _id: Uuid) -> AdsyncResult<SyncState> {
            self.statuses.lock().unwrap().push("idle".to_string());
            Ok(self.state())
        }

        async fn mark_failed(&self, _id: Uuid, _error_message: &str) -> AdsyncResult<SyncState> {
            self.statuses.lock().unwrap().push("failed".to_string());
            Ok(self.state())
        }
    }

    // ── Wiremock helpers ─────────────────────────────────────────

    async fn mount_token(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok"
            })))
            .mount(server)
            .await;
    }

    async fn mount_columns(server: &MockServer, submanager: &str, ids: &[&str]) {
        let columns: Vec<serde_json::Value> = ids
            .iter()
            .map(|id| {
                serde_json::json!({
                    "id": id,
                    "name": format!("col-{id}"),
                    "description": "test column",
                    "renderType": "NUMBER",
                    "valueType": "DOUBLE"
                })
            })
            .collect();
        Mock::given(method("GET"))
            .and(path(format!("/customers/{submanager}/customColumns")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"customColumns": columns})),
            )
            .mount(server)
            .await;
    }

    async fn mount_clients(server: &MockServer, submanager: &str, clients: &[&str]) {
        let results: Vec<serde_json::Value> = clients
            .iter()
            .map(|id| serde_json::json!({"customerClient": {"id": id}}))
            .collect();
        Mock::given(method("POST"))
            .and(path(format!("/customers/{submanager}/searchAds360:search")))
            .and(body_string_contains("customer_client"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": results
            })))
            .mount(server)
            .await;
    }

    fn metric_row(date: &str, values: &[Option<f64>]) -> serde_json::Value {
        let cells: Vec<serde_json::Value> = values
            .iter()
            .map(|v| match v {
                Some(x) => serde_json::json!({"doubleValue": x}),
                None => serde_json::json!({}),
            })
            .collect();
        serde_json::json!({
            "campaign": {"id": "111", "name": "Brand"},
            "metrics": {"clicks": "1", "impressions": "2", "costMicros": "3"},
            "customer": {"descriptiveName": "Acme", "currencyCode": "USD"},
            "segments": {"date": date},
            "customColumns": cells
        })
    }

    async fn mount_metrics(
        server: &MockServer,
        customer: &str,
        header_ids: &[&str],
        rows: Vec<serde_json::Value>,
    ) {
        let headers: Vec<serde_json::Value> = header_ids
            .iter()
            .map(|id| serde_json::json!({"id": id, "name": format!("col-{id}")}))
            .collect();
        Mock::given(method("POST"))
            .and(path(format!("/customers/{customer}/searchAds360:search")))
            .and(body_string_contains("keyword_view"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": rows,
                "customColumnHeaders": headers
            })))
            .mount(server)
            .await;
    }

    fn syncer_for(
        server: &MockServer,
        submanager_ids: &[&str],
        sink: RecordingSink,
        repo: MockStateRepo,
    ) -> Sa360Syncer<RecordingSink, MockStateRepo> {
        let mut config = test_config();
        config.submanager_account_ids = submanager_ids.iter().map(|s| s.to_string()).collect();
        let client = Sa360Client::new(config)
            .unwrap()
            .with_base_url(&server.uri())
            .with_token_url(&format!("{}/token", server.uri()));
        Sa360Syncer::new(client, sink, repo)
    }

    fn today() -> NaiveDate {
        "2024-12-31".parse().unwrap()
    }

    // ── Traversal order and resume ───────────────────────────────

    #[tokio::test]
    async fn visits_submanagers_in_numeric_order() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        for id in ["2", "10"] {
            mount_columns(&server, id, &[]).await;
            mount_clients(&server, id, &[]).await;
        }

        let sink = RecordingSink::default();
        let syncer = syncer_for(&server, &["10", "2"], sink.clone(), MockStateRepo::default());
        syncer.traverse(&SyncCursor::default(), today()).await.unwrap();

        let submanager_order: Vec<String> = sink
            .checkpoints()
            .into_iter()
            .filter_map(|c| c.submanager_cursor)
            .collect();
        assert_eq!(submanager_order, vec!["2", "10"]);
    }

    #[tokio::test]
    async fn resume_cursor_skips_lower_submanagers_without_checkpoints() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        // "2" must never be contacted.
        mount_columns(&server, "10", &[]).await;
        mount_clients(&server, "10", &[]).await;

        let sink = RecordingSink::default();
        let syncer = syncer_for(&server, &["10", "2"], sink.clone(), MockStateRepo::default());
        let cursor = SyncCursor {
            submanager_cursor: Some("5".to_string()),
            ..SyncCursor::default()
        };
        syncer.traverse(&cursor, today()).await.unwrap();

        let checkpoints = sink.checkpoints();
        assert!(checkpoints
            .iter()
            .all(|c| c.submanager_cursor.as_deref() != Some("2")));
        assert_eq!(checkpoints[0].submanager_cursor.as_deref(), Some("10"));
    }

    #[tokio::test]
    async fn managed_accounts_sorted_numerically_and_submanagers_excluded() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        mount_columns(&server, "2", &[]).await;
        // "10" is itself a sub-manager: it must not be visited as a managed
        // account even though the hierarchy reports it.
        mount_clients(&server, "2", &["300", "10", "41"]).await;
        mount_columns(&server, "10", &[]).await;
        mount_clients(&server, "10", &[]).await;

        let sink = RecordingSink::default();
        let syncer = syncer_for(&server, &["2", "10"], sink.clone(), MockStateRepo::default());
        syncer.traverse(&SyncCursor::default(), today()).await.unwrap();

        let managed_order: Vec<String> = sink
            .checkpoints()
            .into_iter()
            .filter_map(|c| c.managed_account_cursor)
            .collect();
        assert_eq!(managed_order, vec!["41", "300"]);
    }

    #[tokio::test]
    async fn resume_within_submanager_skips_lower_managed_accounts() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        mount_columns(&server, "2", &["900"]).await;
        mount_clients(&server, "2", &["41", "300"]).await;
        // Only "300" gets a metrics fetch, resuming from the date cursor.
        Mock::given(method("POST"))
            .and(path("/customers/300/searchAds360:search"))
            .and(body_string_contains("BETWEEN '2024-02-10'"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [],
                "customColumnHeaders": [{"id": "900"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let sink = RecordingSink::default();
        let syncer = syncer_for(&server, &["2"], sink.clone(), MockStateRepo::default());
        let cursor = SyncCursor {
            submanager_cursor: Some("2".to_string()),
            managed_account_cursor: Some("300".to_string()),
            column_data_cursor: Some("2024-02-10".to_string()),
            ..SyncCursor::default()
        };
        syncer.traverse(&cursor, today()).await.unwrap();

        let checkpoints = sink.checkpoints();
        assert!(checkpoints
            .iter()
            .all(|c| c.managed_account_cursor.as_deref() != Some("41")));
    }

    #[tokio::test]
    async fn date_cursor_does_not_leak_into_fresh_accounts() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        mount_columns(&server, "2", &["900"]).await;
        mount_clients(&server, "2", &["300", "400"]).await;

        // Resumed account continues from its date cursor...
        Mock::given(method("POST"))
            .and(path("/customers/300/searchAds360:search"))
            .and(body_string_contains("BETWEEN '2024-02-10'"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [],
                "customColumnHeaders": [{"id": "900"}]
            })))
            .expect(1)
            .mount(&server)
            .await;
        // ...while the next account starts from the backfill date.
        Mock::given(method("POST"))
            .and(path("/customers/400/searchAds360:search"))
            .and(body_string_contains("BETWEEN '2023-01-01'"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [],
                "customColumnHeaders": [{"id": "900"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let sink = RecordingSink::default();
        let syncer = syncer_for(&server, &["2"], sink.clone(), MockStateRepo::default());
        let cursor = SyncCursor {
            submanager_cursor: Some("2".to_string()),
            managed_account_cursor: Some("300".to_string()),
            column_data_cursor: Some("2024-02-10".to_string()),
            ..SyncCursor::default()
        };
        syncer.traverse(&cursor, today()).await.unwrap();
    }

    #[tokio::test]
    async fn iterative_cursor_supersedes_date_cursor() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        mount_columns(&server, "2", &["900"]).await;
        mount_clients(&server, "2", &["300"]).await;

        Mock::given(method("POST"))
            .and(path("/customers/300/searchAds360:search"))
            .and(body_string_contains("BETWEEN '2024-06-01'"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [],
                "customColumnHeaders": [{"id": "900"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let sink = RecordingSink::default();
        let syncer = syncer_for(&server, &["2"], sink.clone(), MockStateRepo::default());
        let cursor = SyncCursor {
            submanager_cursor: Some("2".to_string()),
            managed_account_cursor: Some("300".to_string()),
            iterative_sync_cursor: Some("2024-06-01".to_string()),
            column_data_cursor: Some("2024-02-10".to_string()),
        };
        syncer.traverse(&cursor, today()).await.unwrap();
    }

    // ── Columns and empty cases ──────────────────────────────────

    #[tokio::test]
    async fn zero_columns_skips_metric_fetch_but_account_counts_as_processed() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        mount_columns(&server, "2", &[]).await;
        mount_clients(&server, "2", &["300"]).await;
        // No metrics request may be issued.
        Mock::given(method("POST"))
            .and(path("/customers/300/searchAds360:search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(0)
            .mount(&server)
            .await;

        let sink = RecordingSink::default();
        let syncer = syncer_for(&server, &["2"], sink.clone(), MockStateRepo::default());
        let result = syncer.traverse(&SyncCursor::default(), today()).await.unwrap();

        assert_eq!(result.upserted, 0);
        let checkpoints = sink.checkpoints();
        assert!(checkpoints
            .iter()
            .any(|c| c.managed_account_cursor.as_deref() == Some("300")));
    }

    #[tokio::test]
    async fn empty_managed_account_list_completes_with_zero_processed() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        mount_columns(&server, "2", &["900"]).await;
        mount_clients(&server, "2", &[]).await;

        let sink = RecordingSink::default();
        let syncer = syncer_for(&server, &["2"], sink.clone(), MockStateRepo::default());
        let result = syncer.traverse(&SyncCursor::default(), today()).await.unwrap();

        assert_eq!(result.upserted, 0);
        // Sub-manager entry checkpoint + terminal checkpoint.
        assert_eq!(result.checkpoints, 2);
    }

    #[tokio::test]
    async fn emits_column_definitions_per_managed_account() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        mount_columns(&server, "2", &["900", "901"]).await;
        mount_clients(&server, "2", &["300"]).await;
        mount_metrics(&server, "300", &["900", "901"], vec![]).await;

        let sink = RecordingSink::default();
        let syncer = syncer_for(&server, &["2"], sink.clone(), MockStateRepo::default());
        syncer.traverse(&SyncCursor::default(), today()).await.unwrap();

        let columns: Vec<CustomColumn> = sink
            .events()
            .into_iter()
            .filter_map(|e| match e {
                SyncEvent::Column(c) => Some(c),
                _ => None,
            })
            .collect();
        assert_eq!(columns.len(), 2);
        assert!(columns.iter().all(|c| c.customer_id == "300"));
        assert_eq!(columns[0].column_id, "900");
        assert_eq!(columns[0].name, "col-900");
        assert_eq!(columns[0].render_type, "NUMBER");
    }

    // ── Frontier behavior ────────────────────────────────────────

    #[tokio::test]
    async fn frontier_drops_reordered_rows_and_advances_past_window() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        mount_columns(&server, "2", &["900"]).await;
        mount_clients(&server, "2", &["300"]).await;
        mount_metrics(
            &server,
            "300",
            &["900"],
            vec![
                metric_row("2024-01-01", &[Some(1.0)]),
                metric_row("2024-01-03", &[Some(2.0)]),
                metric_row("2023-12-20", &[Some(9.9)]), // behind the frontier: dropped
                metric_row("2024-01-10", &[Some(3.0)]), // 9 days ahead: advances
                metric_row("2024-01-11", &[Some(4.0)]),
            ],
        )
        .await;

        let sink = RecordingSink::default();
        let syncer = syncer_for(&server, &["2"], sink.clone(), MockStateRepo::default());
        let result = syncer.traverse(&SyncCursor::default(), today()).await.unwrap();

        assert_eq!(
            sink.metric_dates(),
            vec!["2024-01-01", "2024-01-03", "2024-01-10", "2024-01-11"]
        );
        assert_eq!(result.skipped, 1);

        let frontier_dates: Vec<String> = sink
            .checkpoints()
            .into_iter()
            .filter_map(|c| c.column_data_cursor)
            .collect();
        assert_eq!(frontier_dates, vec!["2024-01-01", "2024-01-10"]);
    }

    #[tokio::test]
    async fn frontier_does_not_advance_within_window() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        mount_columns(&server, "2", &["900"]).await;
        mount_clients(&server, "2", &["300"]).await;
        mount_metrics(
            &server,
            "300",
            &["900"],
            vec![
                metric_row("2024-01-01", &[Some(1.0)]),
                metric_row("2024-01-06", &[Some(2.0)]), // exactly 5 days: no advance
            ],
        )
        .await;

        let sink = RecordingSink::default();
        let syncer = syncer_for(&server, &["2"], sink.clone(), MockStateRepo::default());
        syncer.traverse(&SyncCursor::default(), today()).await.unwrap();

        let frontier_dates: Vec<String> = sink
            .checkpoints()
            .into_iter()
            .filter_map(|c| c.column_data_cursor)
            .collect();
        assert_eq!(frontier_dates, vec!["2024-01-01"]);
    }

    #[tokio::test]
    async fn checkpoints_precede_records_and_terminal_resets_cursors() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        mount_columns(&server, "2", &["900"]).await;
        mount_clients(&server, "2", &["300"]).await;
        mount_metrics(
            &server,
            "300",
            &["900"],
            vec![metric_row("2024-01-01", &[Some(1.0)])],
        )
        .await;

        let sink = RecordingSink::default();
        let syncer = syncer_for(&server, &["2"], sink.clone(), MockStateRepo::default());
        syncer.traverse(&SyncCursor::default(), today()).await.unwrap();

        let events = sink.events();
        assert!(matches!(&events[0], SyncEvent::Checkpoint(c)
            if c.submanager_cursor.as_deref() == Some("2")
            && c.managed_account_cursor.is_none()));
        assert!(matches!(&events[1], SyncEvent::Checkpoint(c)
            if c.managed_account_cursor.as_deref() == Some("300")));

        let terminal = match events.last().unwrap() {
            SyncEvent::Checkpoint(c) => c.clone(),
            other => panic!("expected terminal checkpoint, got {other:?}"),
        };
        assert_eq!(terminal.iterative_sync_cursor.as_deref(), Some("2024-12-31"));
        assert!(terminal.submanager_cursor.is_none());
        assert!(terminal.managed_account_cursor.is_none());
        assert!(terminal.column_data_cursor.is_none());
    }

    #[tokio::test]
    async fn expands_each_row_into_per_column_metrics() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        mount_columns(&server, "2", &["900", "901"]).await;
        mount_clients(&server, "2", &["300"]).await;
        mount_metrics(
            &server,
            "300",
            &["900", "901"],
            vec![
                metric_row("2024-01-01", &[Some(1.0), None]),
                metric_row("2024-01-02", &[Some(2.0), Some(3.0)]),
            ],
        )
        .await;

        let sink = RecordingSink::default();
        let syncer = syncer_for(&server, &["2"], sink.clone(), MockStateRepo::default());
        let result = syncer.traverse(&SyncCursor::default(), today()).await.unwrap();

        let metrics: Vec<_> = sink
            .events()
            .into_iter()
            .filter(|e| matches!(e, SyncEvent::Metric(_)))
            .collect();
        assert_eq!(metrics.len(), 4); // 2 rows x 2 columns
        // 2 column definitions + 4 metric records
        assert_eq!(result.upserted, 6);
    }

    // ── Connector lifecycle ──────────────────────────────────────

    #[tokio::test]
    async fn successful_run_marks_completed() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        mount_columns(&server, "2", &[]).await;
        mount_clients(&server, "2", &[]).await;

        let repo = MockStateRepo::default();
        let syncer = syncer_for(&server, &["2"], RecordingSink::default(), repo.clone());
        let result = syncer.sync().await.unwrap();

        assert_eq!(result.source, "sa360");
        assert_eq!(
            repo.statuses.lock().unwrap().clone(),
            vec!["running", "idle"]
        );
    }

    #[tokio::test]
    async fn failed_run_marks_failed_and_keeps_last_checkpoint() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("GET"))
            .and(path("/customers/2/customColumns"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let repo = MockStateRepo::default();
        let sink = RecordingSink::default();
        let syncer = syncer_for(&server, &["2"], sink.clone(), repo.clone());
        let err = syncer.sync().await.unwrap_err();

        assert!(err.to_string().contains("500"));
        assert_eq!(
            repo.statuses.lock().unwrap().clone(),
            vec!["running", "failed"]
        );
        // The position checkpoint written before the failing fetch survives.
        assert_eq!(sink.checkpoints().len(), 1);
        assert_eq!(
            sink.checkpoints()[0].submanager_cursor.as_deref(),
            Some("2")
        );
    }

    #[tokio::test]
    async fn resumes_from_stored_cursor_blob() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        mount_columns(&server, "10", &[]).await;
        mount_clients(&server, "10", &[]).await;

        let repo = MockStateRepo {
            stored_cursor: Some(r#"{"submanager_cursor":"10"}"#.to_string()),
            ..MockStateRepo::default()
        };
        let sink = RecordingSink::default();
        let syncer = syncer_for(&server, &["2", "10"], sink.clone(), repo);
        syncer.sync().await.unwrap();

        // "2" is skipped entirely; no request and no checkpoint for it.
        assert!(sink
            .checkpoints()
            .iter()
            .all(|c| c.submanager_cursor.as_deref() != Some("2")));
    }
}
