//! Progress events for sync runs.

use uuid::Uuid;

use super::types::{Category, CategoryCounts, SyncScope};

/// Progress events emitted while a run executes.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum SyncProgress {
    /// A run started.
    RunStarted {
        run_id: Uuid,
        scope: SyncScope,
        categories: Vec<Category>,
    },

    /// A category is being fetched from its source.
    CategoryStarted {
        category: Category,
        source: &'static str,
    },

    /// The source returned every record of a category; writing is next.
    CategoryFetched {
        category: Category,
        records: usize,
        /// Malformed records dropped by the adapter.
        skipped: usize,
    },

    /// A category was written and committed.
    CategoryFinished {
        category: Category,
        counts: CategoryCounts,
    },

    /// A category was not attempted because a dependency did not succeed.
    CategorySkipped {
        category: Category,
        dependency: Category,
    },

    /// A category failed. Previously committed data for it is untouched.
    CategoryFailed {
        category: Category,
        error: String,
        /// Best-effort categories do not fail the run.
        best_effort: bool,
    },

    /// A run ended.
    RunFinished {
        run_id: Uuid,
        succeeded: usize,
        failed: usize,
        skipped: usize,
        cancelled: bool,
    },
}

/// Callback type for progress reporting.
pub type ProgressCallback = Box<dyn Fn(SyncProgress) + Send + Sync>;

/// Helper to emit progress if a callback is provided.
#[inline]
pub fn emit(on_progress: Option<&ProgressCallback>, event: SyncProgress) {
    if let Some(cb) = on_progress {
        cb(event);
    }
}
