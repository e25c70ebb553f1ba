use crate::import::models::TableName;
use crate::{Error, Result};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_IMPORT_LOG_TABLE: &str = "import_logs";
pub const DEFAULT_BIGQUERY_API_BASE: &str = "https://bigquery.googleapis.com/bigquery/v2";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// How the BigQuery adapter obtains access tokens.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Service-account key JSON supplied inline.
    ServiceAccountKey(String),
    /// Path to a service-account key JSON file.
    ServiceAccountFile(PathBuf),
    /// Application-default credentials from the environment / metadata server.
    ApplicationDefault,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::ServiceAccountKey(_) => f.write_str("ServiceAccountKey(<redacted>)"),
            Credentials::ServiceAccountFile(path) => {
                f.debug_tuple("ServiceAccountFile").field(path).finish()
            }
            Credentials::ApplicationDefault => f.write_str("ApplicationDefault"),
        }
    }
}

/// Destination warehouse configuration. Validated once, before any feed runs.
#[derive(Debug, Clone)]
pub struct BigQueryConfig {
    pub project_id: String,
    pub dataset_id: String,
    pub credentials: Credentials,
    pub import_log_table: TableName,
    pub api_base: String,
    pub timeout: Duration,
}

impl BigQueryConfig {
    #[tracing::instrument(level = "debug", skip(sa_key_data))]
    pub fn new(
        project_id: Option<String>,
        dataset_id: Option<String>,
        sa_key_data: Option<String>,
        sa_key_file: Option<PathBuf>,
    ) -> Result<Self> {
        let project_id = non_empty(project_id)
            .ok_or_else(|| Error::Configuration("BigQuery project ID is empty".to_string()))?;
        let dataset_id = non_empty(dataset_id)
            .ok_or_else(|| Error::Configuration("BigQuery dataset ID is empty".to_string()))?;

        let sa_key_file = sa_key_file.filter(|p| !p.as_os_str().is_empty());
        let credentials = match (non_empty(sa_key_data), sa_key_file) {
            (Some(_), Some(_)) => {
                return Err(Error::Configuration(
                    "BigQuery service account key data and key file are mutually exclusive"
                        .to_string(),
                ));
            }
            (Some(data), None) => Credentials::ServiceAccountKey(data),
            (None, Some(path)) => Credentials::ServiceAccountFile(path),
            (None, None) => Credentials::ApplicationDefault,
        };

        let import_log_table = TableName::new(DEFAULT_IMPORT_LOG_TABLE)?;
        let cfg = Self {
            project_id,
            dataset_id,
            credentials,
            import_log_table,
            api_base: DEFAULT_BIGQUERY_API_BASE.to_string(),
            timeout: DEFAULT_TIMEOUT,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn with_import_log_table(mut self, table: impl Into<String>) -> Result<Self> {
        self.import_log_table = TableName::new(table)
            .map_err(|e| Error::Configuration(format!("import log table: {e}")))?;
        Ok(self)
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Result<Self> {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self.validate()?;
        Ok(self)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.timeout = timeout;
        self.validate()?;
        Ok(self)
    }

    #[tracing::instrument(level = "debug")]
    pub fn validate(&self) -> Result<()> {
        if self.project_id.trim().is_empty() {
            return Err(Error::Configuration(
                "BigQuery project ID is empty".to_string(),
            ));
        }
        if self.dataset_id.trim().is_empty() {
            return Err(Error::Configuration(
                "BigQuery dataset ID is empty".to_string(),
            ));
        }
        if !self
            .dataset_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(Error::Configuration(format!(
                "BigQuery dataset ID '{}' may only contain letters, digits and underscores",
                self.dataset_id
            )));
        }
        if let Some(c) = self
            .project_id
            .chars()
            .find(|c| matches!(c, '`' | '/' | '?' | '#') || c.is_whitespace())
        {
            return Err(Error::Configuration(format!(
                "BigQuery project ID '{}' contains invalid character {c:?}",
                self.project_id
            )));
        }
        if !(self.api_base.starts_with("http://") || self.api_base.starts_with("https://")) {
            return Err(Error::Configuration(format!(
                "BigQuery API base '{}' must be an http(s) URL",
                self.api_base
            )));
        }
        if self.timeout.is_zero() {
            return Err(Error::Configuration(
                "BigQuery timeout must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn cfg(data: Option<&str>, file: Option<&str>) -> Result<BigQueryConfig> {
        BigQueryConfig::new(
            Some("sec-project".to_string()),
            Some("threat_intel".to_string()),
            data.map(str::to_string),
            file.map(PathBuf::from),
        )
    }

    #[test]
    fn missing_identifiers_are_configuration_errors() {
        let err = BigQueryConfig::new(None, Some("ds".to_string()), None, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        let err =
            BigQueryConfig::new(Some("p".to_string()), Some("  ".to_string()), None, None)
                .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn invalid_dataset_is_rejected() {
        let err = BigQueryConfig::new(
            Some("p".to_string()),
            Some("threat-intel".to_string()),
            None,
            None,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn project_id_must_be_url_safe() {
        for bad in ["sec/project", "sec?project", "sec#project", "sec project", "sec`project"] {
            let err = BigQueryConfig::new(
                Some(bad.to_string()),
                Some("threat_intel".to_string()),
                None,
                None,
            )
            .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Configuration, "{bad}");
        }
        assert!(
            BigQueryConfig::new(
                Some("example.com:sec-project".to_string()),
                Some("threat_intel".to_string()),
                None,
                None,
            )
            .is_ok()
        );
    }

    #[test]
    fn credentials_are_resolved_from_key_inputs() {
        assert_eq!(
            cfg(None, None).unwrap().credentials,
            Credentials::ApplicationDefault
        );
        assert_eq!(
            cfg(None, Some("/etc/drone/sa.json")).unwrap().credentials,
            Credentials::ServiceAccountFile(PathBuf::from("/etc/drone/sa.json"))
        );
        assert!(matches!(
            cfg(Some("{\"type\":\"service_account\"}"), None)
                .unwrap()
                .credentials,
            Credentials::ServiceAccountKey(_)
        ));
        let err = cfg(Some("{}"), Some("/etc/drone/sa.json")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn debug_output_redacts_key_material() {
        let c = cfg(Some("super-secret-private-key"), None).unwrap();
        let out = format!("{c:?}");
        assert!(!out.contains("super-secret-private-key"));
        assert!(out.contains("<redacted>"));
    }

    #[test]
    fn builders_validate() {
        let c = cfg(None, None).unwrap();
        assert_eq!(c.import_log_table.as_str(), DEFAULT_IMPORT_LOG_TABLE);
        let c = c
            .with_import_log_table("feed_import_logs")
            .unwrap()
            .with_api_base("http://127.0.0.1:9050/")
            .unwrap();
        assert_eq!(c.api_base, "http://127.0.0.1:9050");
        assert!(c.clone().with_import_log_table("bad.name").is_err());
        assert!(c.clone().with_api_base("ftp://x").is_err());
        assert!(c.with_timeout(Duration::ZERO).is_err());
    }
}
