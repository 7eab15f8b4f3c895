//! Groups per-entity watch events into one record per title, with a
//! recency-window liveness flag ("who is watching what right now").

use log::debug;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

/// A contributor counts as live while their newest event is younger than this.
pub const RECENCY_WINDOW_MS: i64 = 5 * 60 * 1000;

/// Raw events arrive in per-source legacy shapes; the `source` tag selects
/// the adapter that normalizes them.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum RawWatchEvent {
    Social(SocialWatchEvent),
    Progress(ProgressWatchEvent),
}

/// Shape pushed by the social feed.
#[derive(Debug, Clone, Deserialize)]
pub struct SocialWatchEvent {
    pub item_id: Value,
    pub name: String,
    #[serde(default)]
    pub poster: Option<String>,
    pub user: String,
    #[serde(default)]
    pub season: Option<u32>,
    #[serde(default)]
    pub episode: Option<u32>,
    #[serde(default)]
    pub progress: f64,
    pub ts: i64,
}

/// Shape emitted by the watch-progress backend.
#[derive(Debug, Clone, Deserialize)]
pub struct ProgressWatchEvent {
    pub video_id: Value,
    pub title: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    pub profile: String,
    #[serde(default)]
    pub season: Option<u32>,
    #[serde(default)]
    pub episode: Option<u32>,
    #[serde(default)]
    pub percent_complete: f64,
    pub updated_at: i64,
}

/// Canonical event shape after normalization. `progress` is 0.0..=1.0.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchEvent {
    pub entity_id: String,
    pub title: String,
    pub poster: Option<String>,
    pub contributor: String,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub progress: f64,
    pub timestamp: i64,
}

/// Entity ids arrive as numbers or strings depending on the source; group on
/// the stringified form.
fn stringify_id(raw: &Value) -> String {
    match raw {
        Value::String(id) => id.clone(),
        other => other.to_string(),
    }
}

fn from_social(event: SocialWatchEvent) -> WatchEvent {
    WatchEvent {
        entity_id: stringify_id(&event.item_id),
        title: event.name,
        poster: event.poster,
        contributor: event.user,
        season: event.season,
        episode: event.episode,
        progress: event.progress,
        timestamp: event.ts,
    }
}

fn from_progress(event: ProgressWatchEvent) -> WatchEvent {
    WatchEvent {
        entity_id: stringify_id(&event.video_id),
        title: event.title,
        poster: event.thumbnail,
        contributor: event.profile,
        season: event.season,
        episode: event.episode,
        progress: event.percent_complete / 100.0,
        timestamp: event.updated_at,
    }
}

pub fn normalize(raw: RawWatchEvent) -> WatchEvent {
    match raw {
        RawWatchEvent::Social(event) => from_social(event),
        RawWatchEvent::Progress(event) => from_progress(event),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Watcher {
    pub contributor: String,
    pub progress: f64,
    pub timestamp: i64,
    pub is_live: bool,
}

/// One record per distinct entity. Headline fields (contributor,
/// season/episode) follow the newest event seen for the entity.
#[derive(Debug, Clone)]
pub struct ActivityRecord {
    pub entity_id: String,
    pub title: String,
    pub poster: Option<String>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub contributor: String,
    pub watchers: Vec<Watcher>,
    pub latest_timestamp: i64,
    pub is_live: bool,
}

/// Folds a flat event stream into per-entity activity records. Records are
/// recomputed on every pass, never persisted.
pub struct ActivityAggregator {
    recency_window_ms: i64,
}

impl ActivityAggregator {
    pub fn new() -> Self {
        Self {
            recency_window_ms: RECENCY_WINDOW_MS,
        }
    }

    /// Override the liveness window, mainly for deterministic tests.
    pub fn with_window(recency_window_ms: i64) -> Self {
        Self { recency_window_ms }
    }

    fn is_live(&self, now: i64, timestamp: i64) -> bool {
        now - timestamp < self.recency_window_ms
    }

    /// Groups events by entity id. Each merge strictly adds a watcher or
    /// advances the most-recent pointer; liveness is the OR across watchers.
    /// Output is ordered newest-activity-first for the rail.
    pub fn aggregate(&self, raw_events: Vec<RawWatchEvent>, now: i64) -> Vec<ActivityRecord> {
        let mut records: Vec<ActivityRecord> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for raw in raw_events {
            let event = normalize(raw);
            let live = self.is_live(now, event.timestamp);
            let watcher = Watcher {
                contributor: event.contributor.clone(),
                progress: event.progress,
                timestamp: event.timestamp,
                is_live: live,
            };

            match index.get(&event.entity_id) {
                Some(&position) => {
                    let record = &mut records[position];
                    record.watchers.push(watcher);
                    record.is_live = record.is_live || live;
                    if event.timestamp > record.latest_timestamp {
                        record.latest_timestamp = event.timestamp;
                        record.season = event.season;
                        record.episode = event.episode;
                        record.contributor = event.contributor;
                    }
                }
                None => {
                    index.insert(event.entity_id.clone(), records.len());
                    records.push(ActivityRecord {
                        entity_id: event.entity_id,
                        title: event.title,
                        poster: event.poster,
                        season: event.season,
                        episode: event.episode,
                        contributor: event.contributor,
                        watchers: vec![watcher],
                        latest_timestamp: event.timestamp,
                        is_live: live,
                    });
                }
            }
        }

        debug!("aggregated {} activity records", records.len());
        records.sort_by(|a, b| b.latest_timestamp.cmp(&a.latest_timestamp));
        records
    }
}

impl Default for ActivityAggregator {
    fn default() -> Self {
        Self::new()
    }
}
