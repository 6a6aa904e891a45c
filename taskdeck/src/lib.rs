//! `TaskDeck` — client-side task synchronization engine.
//!
//! Keeps an in-memory task collection consistent across a bulk fetch from
//! the remote data service, that service's push-based change feed, and
//! locally-initiated optimistic mutations. The [`engine::SyncEngine`] facade
//! is the surface the surrounding application talks to.

pub mod completion;
pub mod config;
pub mod engine;
pub mod logging;
pub mod service;
pub mod stats;
pub mod store;
pub mod sync;

pub use engine::{EngineEvent, SyncEngine};
pub use service::{MemoryService, ServiceError, TaskFeed, TaskService};
pub use stats::TaskStats;
pub use store::{StoreError, TaskStore};
