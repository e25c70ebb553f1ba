//! BigQuery warehouse over the REST v2 API.
//!
//! Rows are streamed with `tabledata.insertAll`; existence checks run a
//! parameterized standard-SQL query against the destination table.

use crate::config::BigQueryConfig;
use crate::import::models::{ImportLog, NATURAL_KEY_COLUMN, Record, TableName};
use crate::warehouse::auth::{AccessTokenSource, GoogleTokenSource};
use crate::warehouse::traits::Warehouse;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// insertAll recommends at most 500 rows per request.
const INSERT_BATCH_SIZE: usize = 500;
const KEY_QUERY_BATCH_SIZE: usize = 1000;
const QUERY_TIMEOUT_MS: u64 = 30_000;
const MAX_QUERY_POLLS: usize = 20;

pub struct BigQueryWarehouse {
    client: Client,
    config: BigQueryConfig,
    tokens: Arc<dyn AccessTokenSource>,
}

impl BigQueryWarehouse {
    /// Validate `config`, resolve credentials and build the HTTP client.
    #[tracing::instrument(level = "info", name = "drone.warehouse.bigquery.connect", skip_all)]
    pub async fn connect(config: BigQueryConfig) -> Result<Self> {
        config.validate()?;
        let tokens = GoogleTokenSource::from_credentials(&config.credentials).await?;
        Self::with_token_source(config, Arc::new(tokens))
    }

    pub fn with_token_source(
        config: BigQueryConfig,
        tokens: Arc<dyn AccessTokenSource>,
    ) -> Result<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Configuration(format!("bigquery http client: {e}")))?;
        Ok(Self {
            client,
            config,
            tokens,
        })
    }

    fn table_ref(&self, table: &TableName) -> String {
        format!(
            "`{}.{}.{}`",
            self.config.project_id, self.config.dataset_id, table
        )
    }

    fn insert_all_url(&self, table: &TableName) -> String {
        format!(
            "{}/projects/{}/datasets/{}/tables/{}/insertAll",
            self.config.api_base, self.config.project_id, self.config.dataset_id, table
        )
    }

    fn queries_url(&self) -> String {
        format!(
            "{}/projects/{}/queries",
            self.config.api_base, self.config.project_id
        )
    }

    async fn send<T: DeserializeOwned>(&self, op: &str, req: RequestBuilder) -> Result<T> {
        let token = self.tokens.access_token().await?;
        let resp = req
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| Error::storage(format!("bigquery {op}"), e))?;
        decode(op, resp).await
    }

    #[tracing::instrument(level = "debug", skip(self, rows), fields(rows = rows.len()))]
    async fn insert_all(&self, table: &TableName, rows: Vec<InsertRow>) -> Result<()> {
        for chunk in rows.chunks(INSERT_BATCH_SIZE) {
            let body = serde_json::json!({
                "rows": chunk,
                "skipInvalidRows": false,
                "ignoreUnknownValues": false,
            });
            let req = self.client.post(self.insert_all_url(table)).json(&body);
            let resp: InsertAllResponse = self.send("insertAll", req).await?;
            if let Some(first) = resp.insert_errors.first() {
                let detail = first
                    .errors
                    .iter()
                    .map(|e| {
                        format!(
                            "{}: {}",
                            e.reason.as_deref().unwrap_or("unknown"),
                            e.message.as_deref().unwrap_or("")
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("; ");
                return Err(Error::StorageMessage(format!(
                    "insertAll into '{table}' rejected {} row(s); first at index {}: {detail}",
                    resp.insert_errors.len(),
                    first.index
                )));
            }
        }
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self, keys), fields(keys = keys.len()))]
    async fn query_keys(&self, table: &TableName, keys: &[String]) -> Result<HashSet<String>> {
        let sql = format!(
            "SELECT DISTINCT {NATURAL_KEY_COLUMN} FROM {} WHERE {NATURAL_KEY_COLUMN} IN UNNEST(@keys)",
            self.table_ref(table)
        );
        let values: Vec<_> = keys
            .iter()
            .map(|k| serde_json::json!({ "value": k }))
            .collect();
        let body = serde_json::json!({
            "query": sql,
            "useLegacySql": false,
            "parameterMode": "NAMED",
            "timeoutMs": QUERY_TIMEOUT_MS,
            "queryParameters": [{
                "name": "keys",
                "parameterType": { "type": "ARRAY", "arrayType": { "type": "STRING" } },
                "parameterValue": { "arrayValues": values },
            }],
        });

        let req = self.client.post(self.queries_url()).json(&body);
        let mut resp: QueryResponse = self.send("query", req).await?;
        let mut found = HashSet::new();

        for _ in 0..MAX_QUERY_POLLS {
            if resp.job_complete {
                collect_keys(&resp.rows, &mut found)?;
                if resp.page_token.is_none() {
                    return Ok(found);
                }
            }
            let job = resp.job_reference.as_ref().ok_or_else(|| {
                Error::StorageMessage("query response is missing jobReference".to_string())
            })?;
            let mut params = vec![("timeoutMs", QUERY_TIMEOUT_MS.to_string())];
            if let Some(location) = &job.location {
                params.push(("location", location.clone()));
            }
            if resp.job_complete {
                if let Some(token) = &resp.page_token {
                    params.push(("pageToken", token.clone()));
                }
            }
            let url = format!("{}/{}", self.queries_url(), job.job_id);
            let req = self.client.get(url).query(&params);
            let next: QueryResponse = self.send("getQueryResults", req).await?;
            resp = QueryResponse {
                job_reference: next.job_reference.or(resp.job_reference),
                ..next
            };
        }

        Err(Error::StorageMessage(format!(
            "existence query on '{table}' did not complete after {MAX_QUERY_POLLS} polls"
        )))
    }
}

#[async_trait]
impl Warehouse for BigQueryWarehouse {
    #[tracing::instrument(level = "debug", skip(self, keys))]
    async fn existing_keys(&self, table: &TableName, keys: &[String]) -> Result<HashSet<String>> {
        let mut found = HashSet::new();
        for chunk in keys.chunks(KEY_QUERY_BATCH_SIZE) {
            found.extend(self.query_keys(table, chunk).await?);
        }
        Ok(found)
    }

    #[tracing::instrument(level = "debug", skip(self, rows))]
    async fn append_rows(&self, table: &TableName, rows: &[Record]) -> Result<()> {
        let rows = rows
            .iter()
            .map(|r| InsertRow {
                insert_id: r.key().to_string(),
                json: r.to_row(),
            })
            .collect();
        self.insert_all(table, rows).await
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn record_import(&self, log: &ImportLog) -> Result<()> {
        let row = InsertRow {
            insert_id: Uuid::new_v4().to_string(),
            json: log.to_row(),
        };
        self.insert_all(&self.config.import_log_table, vec![row])
            .await
    }
}

async fn decode<T: DeserializeOwned>(op: &str, resp: Response) -> Result<T> {
    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|e| Error::storage(format!("read bigquery {op} response"), e))?;
    if !status.is_success() {
        return Err(Error::StorageMessage(format!(
            "bigquery {op} returned {status}: {body}"
        )));
    }
    serde_json::from_str(&body).map_err(|e| Error::storage(format!("decode bigquery {op}"), e))
}

fn collect_keys(rows: &[TableRow], out: &mut HashSet<String>) -> Result<()> {
    for row in rows {
        match row.f.first().map(|c| &c.v) {
            Some(serde_json::Value::String(key)) => {
                out.insert(key.clone());
            }
            Some(serde_json::Value::Null) => {}
            other => {
                return Err(Error::StorageMessage(format!(
                    "unexpected {NATURAL_KEY_COLUMN} cell in query result: {other:?}"
                )));
            }
        }
    }
    Ok(())
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct InsertRow {
    insert_id: String,
    json: serde_json::Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertAllResponse {
    #[serde(default)]
    insert_errors: Vec<InsertError>,
}

#[derive(Debug, Deserialize)]
struct InsertError {
    #[serde(default)]
    index: u64,
    #[serde(default)]
    errors: Vec<ErrorProto>,
}

#[derive(Debug, Deserialize)]
struct ErrorProto {
    reason: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    job_complete: bool,
    #[serde(default)]
    rows: Vec<TableRow>,
    page_token: Option<String>,
    job_reference: Option<JobReference>,
}

#[derive(Debug, Deserialize)]
struct TableRow {
    #[serde(default)]
    f: Vec<TableCell>,
}

#[derive(Debug, Deserialize)]
struct TableCell {
    #[serde(default)]
    v: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id: String,
    location: Option<String>,
}
