//! Per-backend batching rules.
//!
//! SQLite and PostgreSQL accept a different number of bound parameters per statement. The
//! [`Dialect`] is picked once from the connection's backend and handed to every writer, so
//! batch sizing never branches on the backend at call sites.

use sea_orm::DatabaseBackend;

/// Statement limits for one database backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
}

impl Dialect {
    /// Select the dialect for a connection's backend.
    ///
    /// MySQL is treated like SQLite.
    pub fn from_backend(backend: DatabaseBackend) -> Self {
        match backend {
            DatabaseBackend::Postgres => Self::Postgres,
            _ => Self::Sqlite,
        }
    }

    /// Maximum bound parameters accepted in one statement.
    pub fn max_bind_params(self) -> usize {
        match self {
            // SQLITE_MAX_VARIABLE_NUMBER since 3.32
            Self::Sqlite => 32_766,
            Self::Postgres => 65_535,
        }
    }

    /// Rows per INSERT batch for a table with `columns` bound values per row.
    ///
    /// Never exceeds `requested` nor the bind-parameter limit, and is at least 1.
    pub fn batch_rows(self, requested: usize, columns: usize) -> usize {
        let by_params = self.max_bind_params() / columns.max(1);
        requested.min(by_params).max(1)
    }
}
