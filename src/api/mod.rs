//! Provider-facing API surface: the source client trait, the HTTP
//! implementation, and the retry executor wrapping both.

pub mod http;
pub mod retry;

pub use http::HttpFetcher;
pub use retry::RetryPolicy;

use crate::error::Result;
use crate::utils::CancelToken;
use async_trait::async_trait;
use serde_json::Value;

/// Common interface over the remote JSON providers the catalog depends on.
///
/// Implementations must map HTTP 404 to `Ok(Value::Null)` (a valid, cacheable
/// absence) and honor the cancellation token at their await points.
#[async_trait]
pub trait SourceClient: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_json(
        &self,
        path: &str,
        params: &[(String, String)],
        cancel: &CancelToken,
    ) -> Result<Value>;
}
