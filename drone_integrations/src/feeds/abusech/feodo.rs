//! Feodo Tracker botnet C2 IP blocklist.
//!
//! The JSON blocklist is a full snapshot of currently tracked C2 servers; each
//! entry is keyed by its `ip:port` endpoint.

use crate::feeds::http::FeedClient;
use async_trait::async_trait;
use drone_core::{Error, FeedSource, Record, Result, TableName};
use serde::{Deserialize, Serialize};
use tracing::instrument;

pub const FEED_ID: &str = "feodo";
pub const TABLE: &str = "abusech_feodo";
pub const DEFAULT_URL: &str = "https://feodotracker.abuse.ch/downloads/ipblocklist.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeodoEntry {
    pub ip_address: String,
    pub port: u16,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub as_number: Option<u64>,
    #[serde(default)]
    pub as_name: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub first_seen: Option<String>,
    #[serde(default)]
    pub last_online: Option<String>,
    #[serde(default)]
    pub malware: Option<String>,
}

impl FeodoEntry {
    pub fn natural_key(&self) -> String {
        format!("{}:{}", self.ip_address.trim(), self.port)
    }
}

#[derive(Clone)]
pub struct Feodo {
    client: FeedClient,
    url: String,
    table: TableName,
}

impl Feodo {
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

/// Convert blocklist entries into records; entries without an address are a feed error.
pub fn to_records(entries: &[FeodoEntry]) -> Result<Vec<Record>> {
    entries
        .iter()
        .map(|e| {
            if e.ip_address.trim().is_empty() {
                return Err(Error::FetchMessage(format!(
                    "{FEED_ID}: entry without ip_address (port {})",
                    e.port
                )));
            }
            Record::from_serializable(e.natural_key(), e)
                .map_err(|err| Error::FetchMessage(format!("{FEED_ID}: {err}")))
        })
        .collect()
}

#[async_trait]
impl FeedSource for Feodo {
    fn id(&self) -> &'static str {
        FEED_ID
    }

    fn table(&self) -> &TableName {
        &self.table
    }

    #[instrument(level = "info", name = "drone.feed.feodo.fetch", skip(self), fields(url = %self.url))]
    async fn fetch(&self) -> Result<Vec<Record>> {
        let entries: Vec<FeodoEntry> = self.client.get_json(FEED_ID, &self.url).await?;
        tracing::debug!(entries = entries.len(), "feodo blocklist downloaded");
        to_records(&entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drone_core::{ErrorKind, ImportEngine, MemoryWarehouse};
    use mockito::Server;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn blocklist() -> serde_json::Value {
        serde_json::json!([
            {
                "ip_address": "162.243.103.246",
                "port": 8080,
                "status": "offline",
                "hostname": null,
                "as_number": 14061,
                "as_name": "DIGITALOCEAN-ASN",
                "country": "US",
                "first_seen": "2022-06-12 19:13:11",
                "last_online": "2024-02-06",
                "malware": "Emotet"
            },
            {
                "ip_address": "50.16.216.118",
                "port": 443,
                "status": "online",
                "hostname": "ec2-50-16-216-118.compute-1.amazonaws.com",
                "as_number": 14618,
                "as_name": "AMAZON-AES",
                "country": "US",
                "first_seen": "2023-10-30 18:11:18",
                "last_online": "2024-02-07",
                "malware": "Pikabot"
            },
            {
                "ip_address": "50.16.216.118",
                "port": 443,
                "status": "online",
                "malware": "Pikabot"
            }
        ])
    }

    #[test]
    fn entries_are_keyed_by_endpoint() {
        let entries: Vec<FeodoEntry> = serde_json::from_value(blocklist()).unwrap();
        let records = to_records(&entries).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].key(), "162.243.103.246:8080");
        assert_eq!(
            records[1].payload().get("malware"),
            Some(&serde_json::json!("Pikabot"))
        );
    }

    #[test]
    fn entry_without_address_is_a_fetch_error() {
        let entries = vec![FeodoEntry {
            ip_address: " ".to_string(),
            port: 80,
            status: None,
            hostname: None,
            as_number: None,
            as_name: None,
            country: None,
            first_seen: None,
            last_online: None,
            malware: None,
        }];
        assert_eq!(to_records(&entries).unwrap_err().kind(), ErrorKind::Fetch);
    }

    #[tokio::test]
    async fn import_twice_inserts_once_and_logs_twice() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/downloads/ipblocklist.json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(blocklist().to_string())
            .expect(2)
            .create_async()
            .await;

        let feed = Feodo::with_url(format!("{}/downloads/ipblocklist.json", server.url()), None)
            .unwrap();
        let wh = MemoryWarehouse::new();
        let engine = ImportEngine::new(Arc::new(wh.clone()));
        let cancel = CancellationToken::new();

        // first time
        engine.import(&feed, &cancel).await.unwrap();
        let first_len = wh.inserted_rows().await.len();
        assert_eq!(first_len, 2);
        let logs = wh.import_logs().await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].table_name.as_str(), "abusech_feodo");

        // second time
        engine.import(&feed, &cancel).await.unwrap();
        assert_eq!(wh.inserted_rows().await.len(), first_len);
        assert_eq!(wh.import_logs().await.len(), 2);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn server_error_is_a_fetch_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/downloads/ipblocklist.json")
            .with_status(502)
            .create_async()
            .await;

        let feed = Feodo::with_url(format!("{}/downloads/ipblocklist.json", server.url()), None)
            .unwrap();
        let err = feed.fetch().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Fetch);
    }

    #[tokio::test]
    async fn auth_key_is_sent_when_configured() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/downloads/ipblocklist.json")
            .match_header("auth-key", "abc123")
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let feed = Feodo::with_url(
            format!("{}/downloads/ipblocklist.json", server.url()),
            Some("abc123"),
        )
        .unwrap();
        assert!(feed.fetch().await.unwrap().is_empty());
        mock.assert_async().await;
    }

    /// Hits the live blocklist; set `DRONE_TEST_NETWORK=1` to run.
    #[tokio::test]
    async fn live_blocklist_imports_idempotently() {
        if std::env::var("DRONE_TEST_NETWORK").ok().as_deref() != Some("1") {
            return;
        }
        let key = std::env::var("DRONE_ABUSECH_AUTH_KEY").ok();
        let feed = Feodo::new(key.as_deref()).unwrap();
        let wh = MemoryWarehouse::new();
        let engine = ImportEngine::new(Arc::new(wh.clone()));
        let cancel = CancellationToken::new();

        engine.import(&feed, &cancel).await.unwrap();
        let first_len = wh.inserted_rows().await.len();
        engine.import(&feed, &cancel).await.unwrap();
        assert_eq!(wh.inserted_rows().await.len(), first_len);
        assert_eq!(wh.import_logs().await.len(), 2);
    }
}
