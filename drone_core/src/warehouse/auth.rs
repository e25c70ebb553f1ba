use crate::config::Credentials;
use crate::{Error, Result};
use async_trait::async_trait;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use std::sync::Arc;

const BIGQUERY_SCOPE: &str = "https://www.googleapis.com/auth/bigquery";

/// Supplies bearer tokens for warehouse API calls.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

/// Fixed token (tests, or tokens minted outside the process).
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl AccessTokenSource for StaticToken {
    async fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Google OAuth tokens minted by `gcp_auth` (cached and refreshed by the provider).
pub struct GoogleTokenSource {
    provider: Arc<dyn TokenProvider>,
}

impl GoogleTokenSource {
    #[tracing::instrument(level = "debug", name = "drone.warehouse.auth", skip_all)]
    pub async fn from_credentials(credentials: &Credentials) -> Result<Self> {
        let provider: Arc<dyn TokenProvider> = match credentials {
            Credentials::ServiceAccountKey(json) => Arc::new(
                CustomServiceAccount::from_json(json)
                    .map_err(|e| Error::Configuration(format!("service account key data: {e}")))?,
            ),
            Credentials::ServiceAccountFile(path) => Arc::new(
                CustomServiceAccount::from_file(path).map_err(|e| {
                    Error::Configuration(format!(
                        "service account key file '{}': {e}",
                        path.display()
                    ))
                })?,
            ),
            Credentials::ApplicationDefault => gcp_auth::provider().await.map_err(|e| {
                Error::Configuration(format!("application default credentials: {e}"))
            })?,
        };
        Ok(Self { provider })
    }
}

#[async_trait]
impl AccessTokenSource for GoogleTokenSource {
    async fn access_token(&self) -> Result<String> {
        let token = self
            .provider
            .token(&[BIGQUERY_SCOPE])
            .await
            .map_err(|e| Error::storage("obtain bigquery access token", e))?;
        Ok(token.as_str().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[tokio::test]
    async fn static_token_is_returned_verbatim() {
        let src = StaticToken::new("ya29.test");
        assert_eq!(src.access_token().await.unwrap(), "ya29.test");
    }

    #[tokio::test]
    async fn malformed_key_data_is_a_configuration_error() {
        let creds = Credentials::ServiceAccountKey("not json".to_string());
        let err = GoogleTokenSource::from_credentials(&creds)
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn missing_key_file_is_a_configuration_error() {
        let creds = Credentials::ServiceAccountFile("/nonexistent/drone/sa.json".into());
        let err = GoogleTokenSource::from_credentials(&creds)
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
