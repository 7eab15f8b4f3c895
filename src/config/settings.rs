use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub catalog_base_url: String,
    pub cache_namespace: String,
    pub cache_file: Option<String>,
    pub cache_max_entries: usize,
    pub catalog_ttl_secs: u64,
    pub meta_ttl_secs: u64,
    pub request_timeout_ms: u64,
    pub fetch_max_retries: u32,
    pub retry_initial_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub activity_recency_window_ms: i64,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            catalog_base_url: env::var("CATALOG_BASE_URL")
                .unwrap_or_else(|_| "https://catalog.example.com/v3/".to_string()),
            cache_namespace: env::var("CACHE_NAMESPACE")
                .unwrap_or_else(|_| "catalog:".to_string()),
            cache_file: env::var("CACHE_FILE").ok(),
            cache_max_entries: env::var("CACHE_MAX_ENTRIES")
                .unwrap_or_else(|_| "50".to_string())
                .parse()
                .unwrap_or(50),
            catalog_ttl_secs: env::var("CATALOG_TTL_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .unwrap_or(300),
            meta_ttl_secs: env::var("META_TTL_SECS")
                .unwrap_or_else(|_| "86400".to_string())
                .parse()
                .unwrap_or(86400),
            request_timeout_ms: env::var("REQUEST_TIMEOUT_MS")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .unwrap_or(5000),
            fetch_max_retries: env::var("FETCH_MAX_RETRIES")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .unwrap_or(3),
            retry_initial_delay_ms: env::var("RETRY_INITIAL_DELAY_MS")
                .unwrap_or_else(|_| "250".to_string())
                .parse()
                .unwrap_or(250),
            retry_max_delay_ms: env::var("RETRY_MAX_DELAY_MS")
                .unwrap_or_else(|_| "4000".to_string())
                .parse()
                .unwrap_or(4000),
            activity_recency_window_ms: env::var("ACTIVITY_RECENCY_WINDOW_MS")
                .unwrap_or_else(|_| "300000".to_string())
                .parse()
                .unwrap_or(300_000),
        }
    }

    pub fn test_default() -> Self {
        Config {
            catalog_base_url: "http://127.0.0.1:9000/v3/".to_string(),
            cache_namespace: "test:".to_string(),
            cache_file: None,
            cache_max_entries: 50,
            catalog_ttl_secs: 300,
            meta_ttl_secs: 86400,
            request_timeout_ms: 500,
            fetch_max_retries: 1,
            retry_initial_delay_ms: 5,
            retry_max_delay_ms: 20,
            activity_recency_window_ms: 300_000,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn catalog_ttl(&self) -> Duration {
        Duration::from_secs(self.catalog_ttl_secs)
    }

    pub fn meta_ttl(&self) -> Duration {
        Duration::from_secs(self.meta_ttl_secs)
    }

    pub fn validate_and_log(&self) {
        log::info!(
            "Config: catalog={} cache={} (max {} entries) ttl={}s/{}s timeout={}ms retries={}",
            self.catalog_base_url,
            self.cache_file.as_deref().unwrap_or("<memory>"),
            self.cache_max_entries,
            self.catalog_ttl_secs,
            self.meta_ttl_secs,
            self.request_timeout_ms,
            self.fetch_max_retries,
        );
    }
}
