//! Caching and request-coordination layer shared by every source fetch.

pub mod cache;
pub mod coordinator;

pub use cache::{CacheStore, Cached, DEFAULT_MAX_ENTRIES, HARD_EXPIRY, SCHEMA_VERSION};
pub use coordinator::{RequestCoordinator, TaskSupervisor};
