//! Asynchronous job tracking.
//!
//! After a workflow is submitted, a [`JobWatcher`] follows its change
//! events and keeps the persisted snapshot current while a [`LogTailer`]
//! copies its container output into the record store. Both run under
//! one cancellation scope per job, managed by the [`JobTracker`].
//! [`JobService`] is the facade the HTTP layer calls.

pub mod config;
pub mod directory;
pub mod error;
pub mod registry;
pub mod service;
pub mod tailer;
pub mod tracker;
pub mod watcher;

pub use config::TrackerConfig;
pub use error::ServiceError;
pub use service::JobService;
pub use tailer::{LogTailer, TailOutcome};
pub use tracker::JobTracker;
pub use watcher::{JobWatcher, WatchOutcome};
