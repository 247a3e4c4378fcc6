use async_trait::async_trait;

/// Outcome counters for one sync run.
#[derive(Debug)]
pub struct SyncResult {
    pub source: String,
    /// Records delivered downstream (column definitions + metric rows).
    pub upserted: usize,
    /// Rows dropped as already-delivered reorder artifacts.
    pub skipped: usize,
    /// Checkpoints written during the run.
    pub checkpoints: usize,
}

#[async_trait]
pub trait Connector: Send + Sync {
    #[allow(dead_code)]
    fn source_name(&self) -> &str;
    async fn sync(&self) -> Result<SyncResult, Box<dyn std::error::Error + Send + Sync>>;
}
