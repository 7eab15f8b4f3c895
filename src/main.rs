use log::info;
use media_catalog_bot::aggregator::{BranchSpec, ThemeSpec};
use media_catalog_bot::config::{load_config, Config};
use media_catalog_bot::utils::{setup_logging, CancelToken};
use media_catalog_bot::{CacheStore, CatalogAggregator, HttpFetcher, RequestCoordinator, RetryPolicy, SourceClient};
use std::sync::Arc;
use std::time::Duration;

fn catalog_branch(config: &Config, kind: &str, category: &str) -> BranchSpec {
    BranchSpec {
        path: format!("catalog/{}/{}", kind, category),
        params: vec![("limit".to_string(), "20".to_string())],
        ttl: config.catalog_ttl(),
    }
}

fn default_themes(config: &Config) -> Vec<ThemeSpec> {
    vec![
        ThemeSpec {
            title: "Trending".to_string(),
            movies: catalog_branch(config, "movie", "trending"),
            shows: catalog_branch(config, "series", "trending"),
        },
        ThemeSpec {
            title: "New Releases".to_string(),
            movies: catalog_branch(config, "movie", "new"),
            shows: catalog_branch(config, "series", "new"),
        },
    ]
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_logging()?;
    let config = load_config()?;
    info!("Catalog aggregator starting...");

    let cache = Arc::new(match &config.cache_file {
        Some(path) => CacheStore::with_persistence(&config.cache_namespace, config.cache_max_entries, path),
        None => CacheStore::new(&config.cache_namespace, config.cache_max_entries),
    });
    let retry = RetryPolicy::new(
        config.fetch_max_retries,
        Duration::from_millis(config.retry_initial_delay_ms),
        Duration::from_millis(config.retry_max_delay_ms),
    );
    let coordinator = Arc::new(RequestCoordinator::new(Arc::clone(&cache), retry));
    let client: Arc<dyn SourceClient> = Arc::new(HttpFetcher::new(
        "catalog",
        &config.catalog_base_url,
        config.request_timeout(),
    )?);
    let aggregator = CatalogAggregator::new(client, Arc::clone(&coordinator));

    let themes = default_themes(&config);
    let cancel = CancelToken::new();
    let view = aggregator.build_view(&themes, &cancel).await;
    for row in &view.rows {
        info!("row '{}' resolved with {} items", row.title, row.items.len());
    }

    // Let any stale-revalidation refreshes settle before reporting.
    coordinator.wait_idle().await;
    info!("done; cache holds {} entries", cache.len());
    Ok(())
}
