//! Aggregation layer: merges parallel source fetches into display
//! collections and folds watch events into the activity rail.

pub mod activity;
pub mod catalog;
pub mod types;

pub use activity::{
    ActivityAggregator, ActivityRecord, RawWatchEvent, WatchEvent, Watcher, RECENCY_WINDOW_MS,
};
pub use catalog::{interleave, CatalogAggregator, ROW_ITEM_CAP};
pub use types::{
    BranchSpec, CatalogView, DisplayRow, MediaItem, MediaKind, MediaRef, ProfileContext, ThemeSpec,
};
