//! Sync orchestration.
//!
//! # Module Structure
//!
//! - [`types`] - categories, scopes, options and run reports
//! - [`progress`] - progress reporting: `SyncProgress`, `ProgressCallback`, `emit()`
//! - [`orchestrator`] - the engine: dependency ordering, failure isolation, audit trail

mod error;
pub mod orchestrator;
mod progress;
mod types;

pub use error::{Result, SyncError};
pub use orchestrator::{SyncEngine, SyncEngineBuilder, TriggerAccepted};
pub use progress::{ProgressCallback, SyncProgress, emit};
pub use types::{
    Category, CategoryCounts, CategoryOutcome, CategoryStatus, DEFAULT_BATCH_SIZE,
    DEFAULT_CATEGORY_TIMEOUT, RunReport, SyncOptions, SyncScope, UnknownCategory,
};
