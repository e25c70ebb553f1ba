//! ThreatFox recent IOC export (last 48 hours).
//!
//! The export maps each IOC id to a list of entries; the id is the natural key.

use crate::feeds::http::FeedClient;
use async_trait::async_trait;
use drone_core::{Error, FeedSource, Record, Result, TableName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::instrument;

pub const FEED_ID: &str = "threatfox";
pub const TABLE: &str = "abusech_threatfox";
pub const DEFAULT_URL: &str = "https://threatfox.abuse.ch/export/json/recent/";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatFoxEntry {
    pub ioc_value: String,
    #[serde(default)]
    pub ioc_type: Option<String>,
    #[serde(default)]
    pub threat_type: Option<String>,
    #[serde(default)]
    pub malware: Option<String>,
    #[serde(default)]
    pub malware_alias: Option<String>,
    #[serde(default)]
    pub malware_printable: Option<String>,
    #[serde(default)]
    pub first_seen_utc: Option<String>,
    #[serde(default)]
    pub last_seen_utc: Option<String>,
    #[serde(default)]
    pub confidence_level: Option<u32>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub reporter: Option<String>,
}

/// Stored row: the entry plus its ThreatFox id.
#[derive(Serialize)]
struct StoredIoc<'a> {
    id: &'a str,
    #[serde(flatten)]
    entry: &'a ThreatFoxEntry,
}

pub type ThreatFoxExport = BTreeMap<String, Vec<ThreatFoxEntry>>;

#[derive(Clone)]
pub struct ThreatFox {
    client: FeedClient,
    url: String,
    table: TableName,
}

impl ThreatFox {
    pub fn new(auth_key: Option<&str>) -> Result<Self> {
        Self::with_url(DEFAULT_URL, auth_key)
    }

    pub fn with_url(url: impl Into<String>, auth_key: Option<&str>) -> Result<Self> {
        Ok(Self {
            client: FeedClient::new(auth_key)?,
            url: url.into(),
            table: TableName::new(TABLE)?,
        })
    }
}

pub fn to_records(export: &ThreatFoxExport) -> Result<Vec<Record>> {
    let mut out = Vec::with_capacity(export.len());
    for (id, entries) in export {
        for entry in entries {
            let rec = Record::from_serializable(id.as_str(), &StoredIoc { id, entry })
                .map_err(|e| Error::FetchMessage(format!("{FEED_ID}: {e}")))?;
            out.push(rec);
        }
    }
    Ok(out)
}

#[async_trait]
impl FeedSource for ThreatFox {
    fn id(&self) -> &'static str {
        FEED_ID
    }

    fn table(&self) -> &TableName {
        &self.table
    }

    #[instrument(level = "info", name = "drone.feed.threatfox.fetch", skip(self), fields(url = %self.url))]
    async fn fetch(&self) -> Result<Vec<Record>> {
        let export: ThreatFoxExport = self.client.get_json(FEED_ID, &self.url).await?;
        tracing::debug!(iocs = export.len(), "threatfox export downloaded");
        to_records(&export)
    }
}
