use thiserror::Error;

use crate::source::SourceError;
use crate::store::StoreError;

use super::types::Category;

/// Errors raised by the sync engine.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A run is already in progress against this store.
    #[error("A sync run is already in progress")]
    AlreadyRunning,

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The category did not finish within its time budget.
    #[error("Category '{category}' timed out after {seconds}s")]
    Timeout { category: Category, seconds: u64 },

    #[error("Sync cancelled")]
    Cancelled,

    /// Missing required field in builder.
    #[error("Missing required field: {field}")]
    MissingField { field: &'static str },

    /// No registered source serves the category.
    #[error("No source configured for category '{category}'")]
    NoSource { category: Category },

    /// A hard dependency did not succeed earlier in the same run.
    #[error("dependency '{dependency}' did not succeed")]
    DependencyFailed { dependency: Category },

    /// The background task running a triggered sync panicked or was aborted.
    #[error("Sync task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl SyncError {
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Source(e) => e.is_cancelled(),
            _ => false,
        }
    }
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchError;

    #[test]
    fn messages_name_the_category() {
        let err = SyncError::Timeout {
            category: Category::Items,
            seconds: 300,
        };
        assert_eq!(err.to_string(), "Category 'items' timed out after 300s");

        let err = SyncError::DependencyFailed {
            dependency: Category::Vehicles,
        };
        assert_eq!(err.to_string(), "dependency 'vehicles' did not succeed");
    }

    #[test]
    fn cancellation_is_detected_through_source_errors() {
        assert!(SyncError::Cancelled.is_cancelled());
        assert!(SyncError::Source(SourceError::Fetch(FetchError::Cancelled)).is_cancelled());
        assert!(!SyncError::AlreadyRunning.is_cancelled());
    }
}
