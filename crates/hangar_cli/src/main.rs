mod commands;
mod config;
mod progress;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::Term;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use commands::status::OutputFormat;
use commands::sync::SyncArgs;

const EXAMPLES: &str = "\
EXAMPLES:
    hangar migrate up                 Create or upgrade the reference store
    hangar sync all                   Sync every category in dependency order
    hangar sync vehicles              Sync one category
    hangar sync paints --timeout 60   Sync with a shorter per-category timeout
    hangar status                     Show the latest outcome per category
    hangar status -o json             Same, as JSON
    hangar status --run <RUN_ID>      Every category row of one run

CONFIGURATION:
    ~/.config/hangar/config.toml and ./hangar.toml, later files overriding earlier ones.
    Sections: [database] [rate_limit] [sync] [wiki] [store] [corpus] [legacy]

ENVIRONMENT VARIABLES:
    HANGAR_DATABASE__URL                      Database URL (sqlite:// or postgres://)
    HANGAR_RATE_LIMIT__REQUESTS_PER_SECOND    Outbound request rate
    HANGAR_CORPUS__TOKEN                      Access token for the paint/loaner corpus
    RUST_LOG                                  Log filter (default: hangar=info,hangar_cli=info)";

#[derive(Parser)]
#[command(name = "hangar")]
#[command(version)]
#[command(about = "Sync vehicle reference data from several upstreams into one store")]
#[command(
    long_about = "Hangar pulls manufacturers, vehicles, items, storefront listings, paints, \
loaners and images from independent upstream APIs, reconciles them against each other and \
writes the merged result into a relational reference store. Each category is synced \
atomically and recorded in an audit trail."
)]
#[command(after_long_help = EXAMPLES)]
struct Cli {
    /// Database URL, overriding config and environment
    #[arg(long, global = true, value_name = "URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a sync for one category or all of them
    Sync(SyncArgs),
    /// Show the latest sync outcome for every category
    Status {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,

        /// Show every audit row of one run instead
        #[arg(long, value_name = "RUN_ID")]
        run: Option<Uuid>,
    },
    /// Manage database migrations
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate man pages
    Man {
        /// Directory to write man pages into (prints the main page to stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug, Clone, Copy)]
pub(crate) enum MigrateAction {
    /// Apply all pending migrations
    Up,
    /// Rollback the last migration
    Down,
    /// Show migration status
    Status,
    /// Drop all tables and reapply all migrations
    Fresh,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Progress bars carry per-category info on a terminal; logs stay quieter there.
    let default_filter = if Term::stdout().is_term() {
        "hangar=warn,hangar_cli=warn"
    } else {
        "hangar=info,hangar_cli=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = config::Config::load();
    let cli = Cli::parse();

    // Handle commands that don't require database access first
    match &cli.command {
        Commands::Completions { shell } => {
            commands::meta::handle_completions(*shell)?;
            return Ok(());
        }
        Commands::Man { output } => {
            commands::meta::handle_man(output.clone())?;
            return Ok(());
        }
        _ => {}
    }

    let database_url = cli
        .database_url
        .clone()
        .or_else(|| config.database_url())
        .ok_or("Could not determine a database URL; set [database] url in hangar.toml")?;

    ensure_sqlite_parent_dir(&database_url)?;

    match cli.command {
        Commands::Sync(args) => {
            let cancel = CancellationToken::new();
            shutdown::setup_shutdown_handler(cancel.clone());

            let succeeded =
                commands::sync::handle_sync(args, &config, &database_url, cancel).await?;
            if !succeeded {
                std::process::exit(1);
            }
        }
        Commands::Status { output, run } => {
            commands::status::handle_status(output, run, &database_url).await?;
        }
        Commands::Migrate { action } => {
            commands::migrate::handle_migrate(action, &database_url).await?;
        }
        Commands::Completions { .. } | Commands::Man { .. } => {}
    }

    Ok(())
}

/// Create the directory holding a SQLite database file.
fn ensure_sqlite_parent_dir(database_url: &str) -> std::io::Result<()> {
    let Some(db_path) = database_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    // Strip query parameters (e.g., ?mode=rwc) before path operations
    let db_path = db_path.split('?').next().unwrap_or(db_path);
    if db_path.is_empty() || db_path.starts_with(':') {
        return Ok(());
    }
    let db_path = std::path::Path::new(db_path);

    if db_path.is_relative() {
        tracing::warn!(
            "Database path '{}' is relative - behavior depends on current directory. \
             Consider using an absolute path.",
            db_path.display()
        );
    }

    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use hangar::sync::{Category, SyncScope};

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn sync_scope_defaults_to_all() {
        let cli = Cli::try_parse_from(["hangar", "sync"]).unwrap();
        match cli.command {
            Commands::Sync(args) => assert_eq!(args.scope, SyncScope::All),
            _ => panic!("expected sync"),
        }
    }

    #[test]
    fn sync_accepts_a_single_category() {
        let cli = Cli::try_parse_from(["hangar", "sync", "game-versions", "--timeout", "30"])
            .unwrap();
        match cli.command {
            Commands::Sync(args) => {
                assert_eq!(args.scope, SyncScope::Only(Category::GameVersions));
                assert_eq!(args.timeout, Some(30));
            }
            _ => panic!("expected sync"),
        }
    }

    #[test]
    fn unknown_category_is_rejected() {
        assert!(Cli::try_parse_from(["hangar", "sync", "spaceships"]).is_err());
    }

    #[test]
    fn global_database_url_is_accepted_after_subcommand() {
        let cli =
            Cli::try_parse_from(["hangar", "status", "--database-url", "sqlite::memory:"]).unwrap();
        assert_eq!(cli.database_url.as_deref(), Some("sqlite::memory:"));
    }

    #[test]
    fn status_accepts_a_run_id() {
        let run = "6f1c1a7e-3a52-4a0e-9d1f-2b7c9a4e5d10";
        let cli = Cli::try_parse_from(["hangar", "status", "--run", run]).unwrap();
        match cli.command {
            Commands::Status { run: Some(id), .. } => assert_eq!(id.to_string(), run),
            _ => panic!("expected status with a run id"),
        }
        assert!(Cli::try_parse_from(["hangar", "status", "--run", "yesterday"]).is_err());
    }

    #[test]
    fn sqlite_parent_dir_is_created() {
        let dir = std::env::temp_dir().join(format!("hangar-db-test-{}", std::process::id()));
        let url = format!("sqlite://{}/nested/hangar.db?mode=rwc", dir.display());

        ensure_sqlite_parent_dir(&url).unwrap();
        assert!(dir.join("nested").is_dir());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn non_sqlite_urls_are_ignored() {
        ensure_sqlite_parent_dir("postgres://localhost/hangar").unwrap();
        ensure_sqlite_parent_dir("sqlite::memory:").unwrap();
    }
}
