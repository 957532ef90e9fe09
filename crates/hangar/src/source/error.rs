use thiserror::Error;

use crate::fetch::FetchError;
use crate::sync::Category;

/// Errors raised by source adapters.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The adapter was asked for a category it does not serve.
    #[error("source '{source_name}' does not provide category '{category}'")]
    UnsupportedCategory {
        source_name: &'static str,
        category: Category,
    },
}

impl SourceError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Fetch(e) if e.is_cancelled())
    }
}

/// Result type for source operations.
pub type Result<T> = std::result::Result<T, SourceError>;
