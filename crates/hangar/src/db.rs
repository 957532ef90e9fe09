//! Database connection utilities.

use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};

/// Pragmas applied to every SQLite connection.
///
/// - `journal_mode=WAL`: readers don't block the single writer
/// - `busy_timeout=5000`: wait for locks instead of failing immediately
/// - `synchronous=NORMAL`: safe with WAL
const SQLITE_PRAGMAS: [&str; 3] = [
    "PRAGMA journal_mode=WAL",
    "PRAGMA busy_timeout=5000",
    "PRAGMA synchronous=NORMAL",
];

async fn configure_sqlite(db: &DatabaseConnection) -> Result<(), DbErr> {
    for pragma in SQLITE_PRAGMAS {
        db.execute(Statement::from_string(
            db.get_database_backend(),
            pragma.to_string(),
        ))
        .await?;
    }
    Ok(())
}

fn is_file_backed_sqlite(database_url: &str) -> bool {
    database_url.starts_with("sqlite://")
}

/// Establish a connection to the reference store.
///
/// File-backed SQLite databases get the WAL/busy-timeout pragmas.
///
/// # Errors
/// Returns `DbErr` if the connection cannot be established.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect(database_url).await?;

    if is_file_backed_sqlite(database_url) {
        configure_sqlite(&db).await?;
    }

    Ok(db)
}

/// Connect and run all pending migrations.
///
/// ```ignore
/// let db = hangar::connect_and_migrate("sqlite://hangar.db?mode=rwc").await?;
/// ```
#[cfg(feature = "migrate")]
pub async fn connect_and_migrate(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    use sea_orm_migration::MigratorTrait;

    let db = connect(database_url).await?;
    crate::migration::Migrator::up(&db, None).await?;
    Ok(db)
}

/// Fresh migrated in-memory database for unit tests.
#[cfg(all(test, feature = "sqlite", feature = "migrate"))]
pub(crate) async fn memory_db() -> DatabaseConnection {
    connect_and_migrate("sqlite::memory:")
        .await
        .expect("in-memory database should migrate")
}
