use drone_core::{Error, Result};
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;
use std::time::Duration;

const FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// HTTP client shared by feeds that download a JSON snapshot.
#[derive(Clone)]
pub(crate) struct FeedClient {
    client: Client,
    headers: HeaderMap,
}

impl FeedClient {
    pub(crate) fn new(auth_key: Option<&str>) -> Result<Self> {
        let client = Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| Error::Configuration(format!("feed http client: {e}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("drone/", env!("CARGO_PKG_VERSION"))),
        );
        if let Some(key) = auth_key.map(str::trim).filter(|k| !k.is_empty()) {
            headers.insert(
                "Auth-Key",
                HeaderValue::from_str(key)
                    .map_err(|e| Error::Configuration(format!("invalid feed auth key: {e}")))?,
            );
        }
        Ok(Self { client, headers })
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub(crate) async fn get_json<T: DeserializeOwned>(&self, feed: &str, url: &str) -> Result<T> {
        let resp = self
            .client
            .get(url)
            .headers(self.headers.clone())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::fetch(format!("{feed}: GET {url}"), e))?;
        resp.json::<T>()
            .await
            .map_err(|e| Error::fetch(format!("{feed}: decode response"), e))
    }
}
