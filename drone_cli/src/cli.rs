use clap::{Args, Parser, Subcommand};
use drone_core::config::DEFAULT_IMPORT_LOG_TABLE;
use drone_core::{BigQueryConfig, Result};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "drone", version, about = "Threat-intelligence feed importer")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Fetch feeds and append new records to the warehouse.
    Import {
        /// Feed to import (repeatable). Defaults to every feed.
        #[arg(long = "feed", short = 'f')]
        feeds: Vec<String>,

        /// Use an in-memory warehouse instead of BigQuery; nothing is persisted.
        #[arg(long)]
        dry_run: bool,

        #[command(flatten)]
        bigquery: BigQueryArgs,

        #[command(flatten)]
        feed_opts: FeedArgs,
    },

    /// List available feeds and their destination tables.
    Feeds,

    /// Print the validated warehouse configuration (redacted secrets).
    Config {
        #[command(flatten)]
        bigquery: BigQueryArgs,
    },
}

#[derive(Clone, Args)]
pub struct BigQueryArgs {
    /// BigQuery project ID.
    #[arg(long = "bq-project-id", env = "DRONE_BIGQUERY_PROJECT_ID")]
    pub project_id: Option<String>,

    /// BigQuery dataset ID.
    #[arg(long = "bq-dataset-id", env = "DRONE_BIGQUERY_DATASET_ID")]
    pub dataset_id: Option<String>,

    /// BigQuery service account key data (JSON).
    #[arg(
        long = "bq-sa-key-data",
        env = "DRONE_BIGQUERY_SA_KEY_DATA",
        hide_env_values = true
    )]
    pub sa_key_data: Option<String>,

    /// BigQuery service account key file.
    #[arg(long = "bq-sa-key-file", env = "DRONE_BIGQUERY_SA_KEY_FILE")]
    pub sa_key_file: Option<PathBuf>,

    /// Table receiving one row per completed import.
    #[arg(
        long = "bq-import-log-table",
        env = "DRONE_BIGQUERY_IMPORT_LOG_TABLE",
        default_value = DEFAULT_IMPORT_LOG_TABLE
    )]
    pub import_log_table: String,
}

impl BigQueryArgs {
    /// Build and validate the warehouse configuration.
    pub fn configure(&self) -> Result<BigQueryConfig> {
        BigQueryConfig::new(
            self.project_id.clone(),
            self.dataset_id.clone(),
            self.sa_key_data.clone(),
            self.sa_key_file.clone(),
        )?
        .with_import_log_table(self.import_log_table.clone())
    }
}

#[derive(Clone, Args)]
pub struct FeedArgs {
    /// abuse.ch Auth-Key sent with feed downloads.
    #[arg(
        long = "abusech-auth-key",
        env = "DRONE_ABUSECH_AUTH_KEY",
        hide_env_values = true
    )]
    pub abusech_auth_key: Option<String>,
}

impl fmt::Debug for BigQueryArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BigQueryArgs")
            .field("project_id", &self.project_id)
            .field("dataset_id", &self.dataset_id)
            .field("sa_key_data", &self.sa_key_data.as_ref().map(|_| "<redacted>"))
            .field("sa_key_file", &self.sa_key_file)
            .field("import_log_table", &self.import_log_table)
            .finish()
    }
}

impl FeedArgs {
    pub fn options(&self) -> drone_integrations::FeedOptions {
        drone_integrations::FeedOptions {
            abusech_auth_key: self.abusech_auth_key.clone(),
        }
    }
}

impl fmt::Debug for FeedArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedArgs")
            .field(
                "abusech_auth_key",
                &self.abusech_auth_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}
