use sea_orm::DbErr;
use thiserror::Error;

/// Errors raised while writing to or reading from the reference store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from sea-orm.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// A dynamically built statement was malformed.
    #[error("Query build error: {0}")]
    Query(#[from] sea_orm::sea_query::error::Error),

    /// Invalid input data.
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
