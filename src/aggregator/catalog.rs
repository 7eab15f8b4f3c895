//! Multi-source catalog aggregation: parallel branch fetches with per-branch
//! failure containment, round-robin row merging, and best-effort enrichment.

use crate::aggregator::types::{
    BranchPayload, BranchSpec, CatalogView, DisplayRow, MediaItem, MediaRef, ProfileContext,
    ThemeSpec,
};
use crate::api::SourceClient;
use crate::data::RequestCoordinator;
use crate::error::{FetchError, Result};
use crate::utils::CancelToken;
use futures::future::join_all;
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;

/// Cap on items per rendered row.
pub const ROW_ITEM_CAP: usize = 20;

/// Round-robin merge of two ranked lists: `a[0], b[0], a[1], b[1], ...`,
/// tolerating unequal lengths, capped at `cap` items.
pub fn interleave<T: Clone>(a: &[T], b: &[T], cap: usize) -> Vec<T> {
    let mut merged = Vec::with_capacity(cap.min(a.len() + b.len()));
    let mut index = 0;
    while merged.len() < cap && (index < a.len() || index < b.len()) {
        if let Some(item) = a.get(index) {
            merged.push(item.clone());
            if merged.len() >= cap {
                break;
            }
        }
        if let Some(item) = b.get(index) {
            merged.push(item.clone());
        }
        index += 1;
    }
    merged
}

/// Fans out every configured branch fetch through the request coordinator and
/// merges the settled results into one display model.
pub struct CatalogAggregator {
    client: Arc<dyn SourceClient>,
    coordinator: Arc<RequestCoordinator>,
}

impl CatalogAggregator {
    pub fn new(client: Arc<dyn SourceClient>, coordinator: Arc<RequestCoordinator>) -> Self {
        Self {
            client,
            coordinator,
        }
    }

    /// Builds the full catalog view. Settle-all semantics: every branch is
    /// awaited to completion and a failed branch contributes an empty
    /// section, so the result is always fully defined.
    pub async fn build_view(&self, themes: &[ThemeSpec], cancel: &CancelToken) -> CatalogView {
        let rows = join_all(themes.iter().map(|theme| self.build_row(theme, cancel))).await;
        CatalogView { rows }
    }

    async fn build_row(&self, theme: &ThemeSpec, cancel: &CancelToken) -> DisplayRow {
        let (movies, shows) = tokio::join!(
            self.fetch_branch(&theme.movies, cancel),
            self.fetch_branch(&theme.shows, cancel),
        );
        let movies = self.branch_or_default(&theme.title, "movies", movies);
        let shows = self.branch_or_default(&theme.title, "shows", shows);
        DisplayRow {
            title: theme.title.clone(),
            items: interleave(&movies, &shows, ROW_ITEM_CAP),
        }
    }

    fn branch_or_default(
        &self,
        theme: &str,
        branch: &str,
        result: Result<Vec<MediaItem>>,
    ) -> Vec<MediaItem> {
        match result {
            Ok(items) => items,
            Err(FetchError::Cancelled) => {
                debug!("{} branch of '{}' withdrawn", branch, theme);
                Vec::new()
            }
            Err(err) => {
                warn!(
                    "{} branch of '{}' failed, rendering empty section: {}",
                    branch, theme, err
                );
                Vec::new()
            }
        }
    }

    /// Fetches one branch through the coordinator (dedup + SWR + retry).
    /// A 404 body resolves to an empty list.
    pub async fn fetch_branch(
        &self,
        spec: &BranchSpec,
        cancel: &CancelToken,
    ) -> Result<Vec<MediaItem>> {
        let key = self.coordinator.cache().key_for(&spec.path, &spec.params);
        let client = Arc::clone(&self.client);
        let path = spec.path.clone();
        let params = spec.params.clone();
        let cancel = cancel.clone();

        let value = self
            .coordinator
            .resolve(&key, spec.ttl, move || {
                let client = Arc::clone(&client);
                let path = path.clone();
                let params = params.clone();
                let cancel = cancel.clone();
                async move { client.fetch_json(&path, &params, &cancel).await }
            })
            .await?;

        if value.is_null() {
            return Ok(Vec::new());
        }
        let payload: BranchPayload = serde_json::from_value(value)
            .map_err(|e| FetchError::Parse(format!("branch {}: {}", spec.path, e)))?;
        Ok(payload.items)
    }

    /// The profile-scoped continue-watching rail. Errors surface to the
    /// caller here; this is a single personal list, not a themed aggregate.
    pub async fn continue_watching(
        &self,
        profile: &ProfileContext,
        ttl: Duration,
        cancel: &CancelToken,
    ) -> Result<Vec<MediaItem>> {
        let spec = BranchSpec {
            path: "library/continue".to_string(),
            params: vec![("profile".to_string(), profile.profile_id.clone())],
            ttl,
        };
        self.fetch_branch(&spec, cancel).await
    }

    /// Best-effort enrichment: resolves canonical records for externally
    /// surfaced references fully in parallel. A reference whose lookup fails
    /// or comes back absent is dropped, never failing the aggregation.
    pub async fn enrich_refs(
        &self,
        refs: &[MediaRef],
        ttl: Duration,
        cancel: &CancelToken,
    ) -> Vec<MediaItem> {
        let lookups = refs.iter().map(|media_ref| {
            let path = format!("meta/{}/{}", media_ref.kind.as_path(), media_ref.id);
            async move {
                match self.lookup_meta(&path, ttl, cancel).await {
                    Ok(item) => Some(item),
                    Err(FetchError::NotFound(_)) => {
                        debug!("no canonical record for {}, dropping", path);
                        None
                    }
                    Err(err) => {
                        debug!("enrichment lookup {} failed, dropping: {}", path, err);
                        None
                    }
                }
            }
        });
        join_all(lookups).await.into_iter().flatten().collect()
    }

    async fn lookup_meta(
        &self,
        path: &str,
        ttl: Duration,
        cancel: &CancelToken,
    ) -> Result<MediaItem> {
        let key = self.coordinator.cache().key_for(path, &[]);
        let client = Arc::clone(&self.client);
        let fetch_path = path.to_string();
        let cancel = cancel.clone();

        let value = self
            .coordinator
            .resolve(&key, ttl, move || {
                let client = Arc::clone(&client);
                let path = fetch_path.clone();
                let cancel = cancel.clone();
                async move { client.fetch_json(&path, &[], &cancel).await }
            })
            .await?;

        if value.is_null() {
            return Err(FetchError::NotFound(path.to_string()));
        }
        serde_json::from_value(value)
            .map_err(|e| FetchError::Parse(format!("meta {}: {}", path, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn interleave_round_robins_unequal_lists() {
        assert_eq!(interleave(&["a1", "a2"], &["b1"], 20), vec!["a1", "b1", "a2"]);
        assert_eq!(interleave::<&str>(&[], &["b1", "b2"], 20), vec!["b1", "b2"]);
        assert_eq!(interleave::<&str>(&[], &[], 20), Vec::<&str>::new());
    }

    #[test]
    fn interleave_respects_cap() {
        let a = ["a1", "a2", "a3"];
        let b = ["b1", "b2", "b3"];
        assert_eq!(interleave(&a, &b, 3), vec!["a1", "b1", "a2"]);
        assert_eq!(interleave(&a, &b, 4), vec!["a1", "b1", "a2", "b2"]);
    }
}
