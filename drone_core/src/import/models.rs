use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Warehouse column holding a record's natural key.
pub const NATURAL_KEY_COLUMN: &str = "natural_key";

const MAX_TABLE_NAME_LEN: usize = 1024;

/// Destination table identifier (unqualified; the warehouse scopes it to a dataset).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TableName(String);

impl TableName {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::InvalidInput("table name is empty".to_string()));
        }
        if name.len() > MAX_TABLE_NAME_LEN {
            return Err(Error::InvalidInput(format!(
                "table name exceeds {MAX_TABLE_NAME_LEN} characters"
            )));
        }
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(Error::InvalidInput(format!(
                "table name '{name}' may only contain ASCII letters, digits and underscores"
            )));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TableName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<TableName> for String {
    fn from(value: TableName) -> Self {
        value.0
    }
}

/// One canonical feed record: a natural key plus feed-specific fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    key: String,
    payload: serde_json::Map<String, serde_json::Value>,
}

impl Record {
    pub fn new(key: impl Into<String>, payload: serde_json::Value) -> Result<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(Error::InvalidInput("record key is empty".to_string()));
        }
        let serde_json::Value::Object(payload) = payload else {
            return Err(Error::InvalidInput(format!(
                "record '{key}' payload must be a JSON object"
            )));
        };
        if payload.contains_key(NATURAL_KEY_COLUMN) {
            return Err(Error::InvalidInput(format!(
                "record '{key}' payload uses reserved column '{NATURAL_KEY_COLUMN}'"
            )));
        }
        Ok(Self { key, payload })
    }

    /// Build a record from any serializable feed entry.
    pub fn from_serializable<T: Serialize>(key: impl Into<String>, entry: &T) -> Result<Self> {
        let key = key.into();
        let payload = serde_json::to_value(entry).map_err(|e| {
            Error::InvalidInput(format!("record '{key}' payload is not serializable: {e}"))
        })?;
        Self::new(key, payload)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn payload(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.payload
    }

    /// Row as written to the warehouse: payload fields plus the natural key column.
    pub fn to_row(&self) -> serde_json::Value {
        let mut row = self.payload.clone();
        row.insert(
            NATURAL_KEY_COLUMN.to_string(),
            serde_json::Value::String(self.key.clone()),
        );
        serde_json::Value::Object(row)
    }
}

/// Audit entry proving an import run completed for a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportLog {
    pub table_name: TableName,
    pub timestamp: DateTime<Utc>,
}

impl ImportLog {
    pub fn new(table_name: TableName, now: Option<DateTime<Utc>>) -> Self {
        Self {
            table_name,
            timestamp: now.unwrap_or_else(Utc::now),
        }
    }

    pub fn to_row(&self) -> serde_json::Value {
        serde_json::json!({
            "table_name": self.table_name.as_str(),
            "timestamp": self.timestamp.to_rfc3339(),
        })
    }
}

/// Outcome of one successful import run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub table: TableName,
    pub records_fetched: u64,
    /// Records dropped because an earlier record in the same fetch had the same key.
    pub duplicates_in_batch: u64,
    pub already_present: u64,
    pub records_inserted: u64,
    pub log: ImportLog,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn table_name_rejects_invalid_identifiers() {
        assert!(TableName::new("abusech_feodo").is_ok());
        assert!(TableName::new("").is_err());
        assert!(TableName::new("   ").is_err());
        assert!(TableName::new("feeds.feodo").is_err());
        assert!(TableName::new("feodo-tracker").is_err());
        assert!(TableName::new("a".repeat(MAX_TABLE_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn table_name_deserialization_validates() {
        let ok: TableName = serde_json::from_value(json!("import_logs")).unwrap();
        assert_eq!(ok.as_str(), "import_logs");
        assert!(serde_json::from_value::<TableName>(json!("bad name")).is_err());
    }

    #[test]
    fn record_requires_key_and_object_payload() {
        assert!(Record::new("", json!({})).is_err());
        assert!(Record::new("1.2.3.4:443", json!(["not", "an", "object"])).is_err());
        assert!(Record::new("1.2.3.4:443", json!({"natural_key": "x"})).is_err());
    }

    #[test]
    fn row_carries_natural_key_column() {
        let rec = Record::new("1.2.3.4:443", json!({"malware": "Emotet"})).unwrap();
        assert_eq!(
            rec.to_row(),
            json!({"malware": "Emotet", "natural_key": "1.2.3.4:443"})
        );
    }

    #[test]
    fn record_from_serializable_struct() {
        #[derive(Serialize)]
        struct Entry {
            ip_address: String,
            port: u16,
        }
        let rec = Record::from_serializable(
            "10.0.0.1:8080",
            &Entry {
                ip_address: "10.0.0.1".to_string(),
                port: 8080,
            },
        )
        .unwrap();
        assert_eq!(rec.key(), "10.0.0.1:8080");
        assert_eq!(rec.payload().get("port"), Some(&json!(8080)));
    }

    #[test]
    fn import_log_row_uses_rfc3339_timestamp() {
        let at = DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let log = ImportLog::new(TableName::new("abusech_feodo").unwrap(), Some(at));
        assert_eq!(
            log.to_row(),
            json!({"table_name": "abusech_feodo", "timestamp": "2024-05-01T12:00:00+00:00"})
        );
    }
}
