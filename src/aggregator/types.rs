//! Display-model and fetch-descriptor types consumed by the UI layer.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Show,
}

impl MediaKind {
    /// Path segment the metadata provider uses for this kind.
    pub fn as_path(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Show => "series",
        }
    }
}

/// Canonical catalog entry as rendered in a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: String,
    pub title: String,
    pub kind: MediaKind,
    #[serde(default)]
    pub poster: Option<String>,
    #[serde(default)]
    pub year: Option<u16>,
}

/// Wire shape of a catalog branch response.
#[derive(Debug, Clone, Deserialize)]
pub struct BranchPayload {
    #[serde(default)]
    pub items: Vec<MediaItem>,
}

/// Reference to an item surfaced by a tertiary source, pending enrichment
/// against the canonical metadata provider.
#[derive(Debug, Clone)]
pub struct MediaRef {
    pub id: String,
    pub kind: MediaKind,
}

/// One independent category/source fetch.
#[derive(Debug, Clone)]
pub struct BranchSpec {
    pub path: String,
    pub params: Vec<(String, String)>,
    pub ttl: Duration,
}

/// A themed row combining a movie branch and a show branch.
#[derive(Debug, Clone)]
pub struct ThemeSpec {
    pub title: String,
    pub movies: BranchSpec,
    pub shows: BranchSpec,
}

#[derive(Debug, Clone)]
pub struct DisplayRow {
    pub title: String,
    pub items: Vec<MediaItem>,
}

/// The fully-defined aggregate handed to the UI; failed branches render as
/// empty sections, never as errors.
#[derive(Debug, Clone, Default)]
pub struct CatalogView {
    pub rows: Vec<DisplayRow>,
}

/// Active user/profile context scoping personal aggregations.
#[derive(Debug, Clone)]
pub struct ProfileContext {
    pub profile_id: String,
}
