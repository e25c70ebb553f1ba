use crate::Result;
use crate::import::models::{ImportSummary, Record, TableName};
use async_trait::async_trait;

/// A feed produces the full current snapshot of its records on every fetch.
///
/// Feed implementations live in `drone_integrations`. Deduplication is the
/// engine's job; a fetch may return the same key more than once.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Feed identifier (stable, used for selection and logging).
    fn id(&self) -> &'static str;

    /// Destination table for this feed's records.
    fn table(&self) -> &TableName;

    /// Fetch the current snapshot. Failures are not retried.
    async fn fetch(&self) -> Result<Vec<Record>>;
}

/// Per-feed result of a concurrent `import_all` call.
#[derive(Debug)]
pub struct FeedOutcome {
    pub feed: &'static str,
    pub table: TableName,
    pub result: Result<ImportSummary>,
}
