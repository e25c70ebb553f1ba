use crate::cli::{BigQueryArgs, Cli, Commands, FeedArgs};
use anyhow::bail;
use drone_core::{BigQueryWarehouse, FeedOutcome, ImportEngine, MemoryWarehouse, Warehouse};
use drone_integrations::feeds::FEED_IDS;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Import {
            feeds,
            dry_run,
            bigquery,
            feed_opts,
        } => import(&feeds, dry_run, &bigquery, &feed_opts).await,
        Commands::Feeds => {
            for line in feed_lines(&FeedArgs {
                abusech_auth_key: None,
            })? {
                println!("{line}");
            }
            Ok(())
        }
        Commands::Config { bigquery } => {
            let cfg = bigquery.configure()?;
            println!("{cfg:#?}");
            Ok(())
        }
    }
}

#[tracing::instrument(level = "info", skip(bigquery, feed_opts))]
async fn import(
    names: &[String],
    dry_run: bool,
    bigquery: &BigQueryArgs,
    feed_opts: &FeedArgs,
) -> anyhow::Result<()> {
    // Resolve feeds and configuration before anything is fetched.
    let feeds = drone_integrations::select(names, &feed_opts.options())?;
    let warehouse: Arc<dyn Warehouse> = if dry_run {
        tracing::info!("dry run: using in-memory warehouse");
        Arc::new(MemoryWarehouse::new())
    } else {
        let cfg = bigquery.configure()?;
        Arc::new(BigQueryWarehouse::connect(cfg).await?)
    };

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; cancelling imports");
            on_interrupt.cancel();
        }
    });

    let engine = ImportEngine::new(warehouse);
    let outcomes = engine.import_all(&feeds, &cancel).await?;
    for line in outcome_lines(&outcomes) {
        println!("{line}");
    }

    let failed: Vec<&FeedOutcome> = outcomes.iter().filter(|o| o.result.is_err()).collect();
    if !failed.is_empty() {
        let names: Vec<&str> = failed.iter().map(|o| o.feed).collect();
        bail!("{} feed(s) failed: {}", failed.len(), names.join(", "));
    }
    Ok(())
}

fn feed_lines(feed_opts: &FeedArgs) -> anyhow::Result<Vec<String>> {
    let feeds = drone_integrations::select(&[], &feed_opts.options())?;
    debug_assert_eq!(feeds.len(), FEED_IDS.len());
    Ok(feeds
        .iter()
        .map(|f| format!("{:<12} -> {}", f.id(), f.table()))
        .collect())
}

fn outcome_lines(outcomes: &[FeedOutcome]) -> Vec<String> {
    outcomes
        .iter()
        .map(|o| match &o.result {
            Ok(s) => format!(
                "{}: fetched={} duplicates={} present={} inserted={} table={}",
                o.feed,
                s.records_fetched,
                s.duplicates_in_batch,
                s.already_present,
                s.records_inserted,
                o.table
            ),
            Err(e) => format!("{}: FAILED ({e}) table={}", o.feed, o.table),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use drone_core::{Error, ImportLog, ImportSummary, TableName};

    #[test]
    fn lists_every_feed_with_its_table() {
        let lines = feed_lines(&FeedArgs {
            abusech_auth_key: None,
        })
        .unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("feodo"));
        assert!(lines[0].ends_with("abusech_feodo"));
    }

    #[test]
    fn outcome_lines_report_counts_and_failures() {
        let table = TableName::new("abusech_feodo").unwrap();
        let outcomes = vec![
            FeedOutcome {
                feed: "feodo",
                table: table.clone(),
                result: Ok(ImportSummary {
                    table: table.clone(),
                    records_fetched: 5,
                    duplicates_in_batch: 1,
                    already_present: 2,
                    records_inserted: 2,
                    log: ImportLog::new(table.clone(), None),
                }),
            },
            FeedOutcome {
                feed: "threatfox",
                table: TableName::new("abusech_threatfox").unwrap(),
                result: Err(Error::FetchMessage("timed out".to_string())),
            },
        ];
        let lines = outcome_lines(&outcomes);
        assert_eq!(
            lines[0],
            "feodo: fetched=5 duplicates=1 present=2 inserted=2 table=abusech_feodo"
        );
        assert!(lines[1].contains("FAILED"));
        assert!(lines[1].contains("timed out"));
    }
}
