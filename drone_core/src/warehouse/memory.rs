use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::traits::Warehouse;
use crate::import::models::{ImportLog, Record, TableName};
use crate::{Error, Result};

#[derive(Default)]
struct State {
    tables: HashMap<TableName, Vec<Record>>,
    inserted: Vec<(TableName, Record)>,
    logs: Vec<ImportLog>,
    fail_appends: Option<String>,
    fail_record_import: Option<String>,
}

/// In-memory warehouse for dry runs and unit tests.
///
/// Semantics:
/// - every appended row is retained in append order, duplicates included
/// - `existing_keys` answers from everything previously appended to the table
/// - failures can be injected for appends and log recording
#[derive(Clone, Default)]
pub struct MemoryWarehouse {
    state: Arc<Mutex<State>>,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every row ever appended, across all tables, in append order.
    pub async fn inserted_rows(&self) -> Vec<(TableName, Record)> {
        self.state.lock().await.inserted.clone()
    }

    /// Rows stored for one table.
    pub async fn rows(&self, table: &TableName) -> Vec<Record> {
        self.state
            .lock()
            .await
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn import_logs(&self) -> Vec<ImportLog> {
        self.state.lock().await.logs.clone()
    }

    /// Make subsequent `append_rows` calls fail with `StorageMessage(message)`.
    pub async fn fail_appends(&self, message: impl Into<String>) {
        self.state.lock().await.fail_appends = Some(message.into());
    }

    /// Make subsequent `record_import` calls fail with `StorageMessage(message)`.
    pub async fn fail_record_import(&self, message: impl Into<String>) {
        self.state.lock().await.fail_record_import = Some(message.into());
    }

    pub async fn clear_failures(&self) {
        let mut state = self.state.lock().await;
        state.fail_appends = None;
        state.fail_record_import = None;
    }
}

#[async_trait]
impl Warehouse for MemoryWarehouse {
    async fn existing_keys(&self, table: &TableName, keys: &[String]) -> Result<HashSet<String>> {
        let state = self.state.lock().await;
        let Some(rows) = state.tables.get(table) else {
            return Ok(HashSet::new());
        };
        let wanted: HashSet<&str> = keys.iter().map(String::as_str).collect();
        Ok(rows
            .iter()
            .filter(|r| wanted.contains(r.key()))
            .map(|r| r.key().to_string())
            .collect())
    }

    async fn append_rows(&self, table: &TableName, rows: &[Record]) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(msg) = &state.fail_appends {
            return Err(Error::StorageMessage(msg.clone()));
        }
        state
            .tables
            .entry(table.clone())
            .or_default()
            .extend(rows.iter().cloned());
        state
            .inserted
            .extend(rows.iter().map(|r| (table.clone(), r.clone())));
        Ok(())
    }

    async fn record_import(&self, log: &ImportLog) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(msg) = &state.fail_record_import {
            return Err(Error::StorageMessage(msg.clone()));
        }
        state.logs.push(log.clone());
        Ok(())
    }
}
