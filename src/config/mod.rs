pub mod settings;

pub use settings::Config;

use crate::error::FetchError;
use std::sync::Arc;

/// Loads and validates the application configuration from the environment.
pub fn load_config() -> Result<Arc<Config>, FetchError> {
    dotenv::dotenv().ok();

    let config = Config::from_env();
    if config.catalog_base_url.is_empty() {
        return Err(FetchError::Config(
            "CATALOG_BASE_URL cannot be empty".to_string(),
        ));
    }
    if config.cache_max_entries == 0 {
        return Err(FetchError::Config(
            "CACHE_MAX_ENTRIES must be positive".to_string(),
        ));
    }
    config.validate_and_log();

    Ok(Arc::new(config))
}
