use thiserror::Error;

/// Error taxonomy for the fetching and aggregation layer.
///
/// Variants are `Clone` so a single failure can be shared across every caller
/// coalesced onto the same in-flight request.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Caller withdrew the request. Never retried, never logged as an error.
    #[error("Request cancelled")]
    Cancelled,

    /// Valid empty result (HTTP 404). Cached, not retried.
    #[error("Not Found: {0}")]
    NotFound(String),

    /// Connection-level failures
    #[error("Network Error: {0}")]
    Network(String),

    /// Per-attempt request timeout
    #[error("Timeout Error: {0}")]
    Timeout(String),

    /// HTTP 429 from an upstream provider
    #[error("Rate Limited: {0}")]
    RateLimited(String),

    /// Non-2xx status other than 404/429
    #[error("Upstream Error: HTTP {status} from {endpoint}")]
    Upstream { status: u16, endpoint: String },

    /// Malformed payloads and serde failures
    #[error("Parse Error: {0}")]
    Parse(String),

    /// Configuration errors
    #[error("Config Error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Parse(format!("JSON serialization/deserialization error: {}", err))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(err.to_string())
        } else if err.is_decode() {
            FetchError::Parse(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

impl FetchError {
    /// Determines if an error is recoverable at all (possibly after waiting).
    pub fn is_recoverable(&self) -> bool {
        match self {
            FetchError::Cancelled => false, // withdrawal, not a failure
            FetchError::NotFound(_) => false, // valid absence
            FetchError::Network(_) => true,
            FetchError::Timeout(_) => true,
            FetchError::RateLimited(_) => true,
            FetchError::Upstream { status, .. } => *status >= 500 || *status == 408,
            FetchError::Parse(_) => false, // data format issues aren't recoverable
            FetchError::Config(_) => false, // config needs fixing
        }
    }

    /// Determines if the operation should be retried with backoff.
    ///
    /// 5xx, 429 and timeouts are transient; any other 4xx is fatal and must
    /// surface to the caller unretried.
    pub fn should_retry(&self) -> bool {
        self.is_recoverable()
            && matches!(
                self,
                FetchError::Network(_)
                    | FetchError::Timeout(_)
                    | FetchError::RateLimited(_)
                    | FetchError::Upstream { .. }
            )
    }

    /// Categorizes error for metrics and logging.
    pub fn categorize(&self) -> ErrorCategory {
        match self {
            FetchError::Cancelled => ErrorCategory::Cancelled,
            FetchError::NotFound(_) => ErrorCategory::Data,
            FetchError::Network(_) | FetchError::Timeout(_) => ErrorCategory::Network,
            FetchError::RateLimited(_) => ErrorCategory::Network,
            FetchError::Upstream { .. } => ErrorCategory::Upstream,
            FetchError::Parse(_) => ErrorCategory::Data,
            FetchError::Config(_) => ErrorCategory::Configuration,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ErrorCategory {
    Network,
    Upstream,
    Data,
    Configuration,
    Cancelled,
}

pub type Result<T> = std::result::Result<T, FetchError>;
