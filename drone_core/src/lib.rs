//! drone core library: feed import engine, warehouse port and shared models.

pub mod config;
pub mod error;
pub mod import;
pub mod o11y;
pub mod warehouse;

pub use config::{BigQueryConfig, Credentials};
pub use error::{Error, ErrorKind, Result};
pub use import::engine::ImportEngine;
pub use import::models::{ImportLog, ImportSummary, NATURAL_KEY_COLUMN, Record, TableName};
pub use import::traits::{FeedOutcome, FeedSource};
pub use warehouse::bigquery::BigQueryWarehouse;
pub use warehouse::memory::MemoryWarehouse;
pub use warehouse::traits::Warehouse;
