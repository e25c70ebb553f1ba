use crate::import::models::{ImportLog, ImportSummary, Record};
use crate::import::traits::{FeedOutcome, FeedSource};
use crate::warehouse::traits::Warehouse;
use crate::{Error, Result};
use futures_util::future::join_all;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Default import orchestrator.
///
/// Each run is strictly sequential: fetch, dedupe, append, log. Two concurrent
/// runs of the same feed against the same table are not mutually exclusive here;
/// callers schedule one job per feed.
pub struct ImportEngine {
    warehouse: Arc<dyn Warehouse>,
}

impl ImportEngine {
    pub fn new(warehouse: Arc<dyn Warehouse>) -> Self {
        Self { warehouse }
    }

    /// Run one import cycle for `feed`.
    #[tracing::instrument(
        level = "info",
        name = "drone.import",
        skip(self, feed, cancel),
        fields(feed = feed.id(), table = %feed.table())
    )]
    pub async fn import(
        &self,
        feed: &dyn FeedSource,
        cancel: &CancellationToken,
    ) -> Result<ImportSummary> {
        match self.run(feed, cancel).await {
            Ok(summary) => {
                tracing::info!(
                    records_fetched = summary.records_fetched,
                    duplicates_in_batch = summary.duplicates_in_batch,
                    already_present = summary.already_present,
                    records_inserted = summary.records_inserted,
                    "import completed"
                );
                Ok(summary)
            }
            Err(e) => {
                tracing::warn!(error = %e, kind = ?e.kind(), "import failed");
                Err(e)
            }
        }
    }

    /// Run several feeds concurrently. Each feed must target a distinct table.
    ///
    /// A failing feed does not stop the others; its error is reported in its
    /// `FeedOutcome`.
    #[tracing::instrument(level = "info", skip_all, fields(feeds = feeds.len()))]
    pub async fn import_all(
        &self,
        feeds: &[Arc<dyn FeedSource>],
        cancel: &CancellationToken,
    ) -> Result<Vec<FeedOutcome>> {
        let mut tables = HashSet::new();
        for feed in feeds {
            if !tables.insert(feed.table().clone()) {
                return Err(Error::Configuration(format!(
                    "table '{}' is targeted by more than one feed (second: '{}')",
                    feed.table(),
                    feed.id()
                )));
            }
        }

        let runs = feeds.iter().map(|feed| async move {
            FeedOutcome {
                feed: feed.id(),
                table: feed.table().clone(),
                result: self.import(feed.as_ref(), cancel).await,
            }
        });
        Ok(join_all(runs).await)
    }

    async fn run(
        &self,
        feed: &dyn FeedSource,
        cancel: &CancellationToken,
    ) -> Result<ImportSummary> {
        let table = feed.table().clone();

        let fetched = cancellable(cancel, "fetch", feed.fetch()).await?;
        let records_fetched = fetched.len() as u64;

        let unique = collapse_duplicates(fetched);
        let duplicates_in_batch = records_fetched - unique.len() as u64;

        let keys: Vec<String> = unique.iter().map(|r| r.key().to_string()).collect();
        let existing = if keys.is_empty() {
            HashSet::new()
        } else {
            cancellable(
                cancel,
                "existence check",
                self.warehouse.existing_keys(&table, &keys),
            )
            .await?
        };

        let fresh: Vec<Record> = unique
            .into_iter()
            .filter(|r| !existing.contains(r.key()))
            .collect();
        let already_present = records_fetched - duplicates_in_batch - fresh.len() as u64;

        if !fresh.is_empty() {
            cancellable(cancel, "append", self.warehouse.append_rows(&table, &fresh)).await?;
            tracing::debug!(rows = fresh.len(), "rows appended");
        }

        let log = ImportLog::new(table.clone(), None);
        cancellable(cancel, "import log", self.warehouse.record_import(&log)).await?;

        Ok(ImportSummary {
            table,
            records_fetched,
            duplicates_in_batch,
            already_present,
            records_inserted: fresh.len() as u64,
            log,
        })
    }
}

/// Keep the first record for each key, preserving fetch order.
fn collapse_duplicates(records: Vec<Record>) -> Vec<Record> {
    let mut seen = HashSet::with_capacity(records.len());
    records
        .into_iter()
        .filter(|r| seen.insert(r.key().to_string()))
        .collect()
}

async fn cancellable<T>(
    cancel: &CancellationToken,
    step: &str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled(step.to_string())),
        res = fut => res,
    }
}
