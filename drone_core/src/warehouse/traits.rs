use crate::Result;
use crate::import::models::{ImportLog, Record, TableName};
use async_trait::async_trait;
use std::collections::HashSet;

/// Append-only warehouse the import engine writes to.
///
/// Implementations are not required to reject duplicate keys; the engine filters
/// them before calling `append_rows`. Rows that are accepted must not be dropped.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Return the subset of `keys` already stored in `table` (full table history).
    async fn existing_keys(&self, table: &TableName, keys: &[String]) -> Result<HashSet<String>>;

    async fn append_rows(&self, table: &TableName, rows: &[Record]) -> Result<()>;

    async fn record_import(&self, log: &ImportLog) -> Result<()>;
}
