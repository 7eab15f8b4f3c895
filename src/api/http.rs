//! HTTP JSON source client built on a shared reqwest connection pool.

use crate::api::SourceClient;
use crate::error::{FetchError, Result};
use crate::utils::CancelToken;
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// A remote JSON provider reachable over HTTP GET.
///
/// Status mapping: 2xx is success, 404 is a valid absence (JSON `null`,
/// cacheable), 429/5xx/timeouts are transient, any other 4xx is fatal.
/// The per-attempt timeout combined with the retry policy bounds a branch's
/// worst-case latency at `timeout * (retries + 1)` plus backoff.
pub struct HttpFetcher {
    client: Client,
    base_url: Url,
    name: String,
}

impl HttpFetcher {
    pub fn new(name: &str, base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| FetchError::Config(format!("invalid base url '{}': {}", base_url, e)))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url,
            name: name.to_string(),
        })
    }
}

#[async_trait]
impl SourceClient for HttpFetcher {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_json(
        &self,
        path: &str,
        params: &[(String, String)],
        cancel: &CancelToken,
    ) -> Result<Value> {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| FetchError::Config(format!("invalid endpoint path '{}': {}", path, e)))?;
        for (name, value) in params {
            url.query_pairs_mut().append_pair(name, value);
        }

        debug!("GET {}", url);
        let response = self.client.get(url.clone()).send().await?;

        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        let status = response.status();
        if status.is_success() {
            response
                .json::<Value>()
                .await
                .map_err(|e| FetchError::Parse(format!("invalid JSON from {}: {}", url, e)))
        } else if status == StatusCode::NOT_FOUND {
            debug!("{} returned 404 for {}, caching as absence", self.name, path);
            Ok(Value::Null)
        } else if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("{} rate limited on {}", self.name, path);
            Err(FetchError::RateLimited(format!("{} ({})", self.name, path)))
        } else {
            warn!("HTTP {} from {} ({})", status, self.name, path);
            Err(FetchError::Upstream {
                status: status.as_u16(),
                endpoint: path.to_string(),
            })
        }
    }
}
