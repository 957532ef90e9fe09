//! Configuration file support for hangar.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (prefixed with `HANGAR_`, `__` between nested keys,
//!    e.g. `HANGAR_RATE_LIMIT__REQUESTS_PER_SECOND`)
//! 3. Config file (./hangar.toml, then ~/.config/hangar/config.toml)
//! 4. Built-in defaults
//!
//! The database URL defaults to `sqlite://~/.local/state/hangar/hangar.db` on Linux
//! (using the XDG state directory) if not explicitly configured.
//!
//! Example config file:
//! ```toml
//! [database]
//! url = "sqlite://~/.local/state/hangar/hangar.db?mode=rwc"  # optional, this is the default
//!
//! [rate_limit]
//! requests_per_second = 5
//! burst = 10
//!
//! [sync]
//! category_timeout_secs = 300
//! batch_size = 100
//! page_size = 100
//!
//! [wiki]
//! base_url = "https://api.star-citizen.wiki/api/v2"
//!
//! [store]
//! url = "https://robertsspaceindustries.com/graphql"
//! page_limit = 100
//!
//! [corpus]
//! owner = "example"
//! repo = "ship-paints"
//! branch = "main"
//! token = "..."  # or use HANGAR_CORPUS__TOKEN env var
//!
//! [legacy]
//! base_url = "https://legacy.example.com/api"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use hangar::fetch::{DEFAULT_BURST, DEFAULT_PAGE_SIZE, DEFAULT_REQUESTS_PER_SECOND, RateLimitConfig};
use hangar::source::git_corpus::{DEFAULT_API_BASE, DEFAULT_CORPUS_CONCURRENCY, DEFAULT_RAW_BASE};
use hangar::source::graphql::{DEFAULT_PAGE_LIMIT, DEFAULT_STORE_URL};
use hangar::source::rest::DEFAULT_WIKI_BASE_URL;
use hangar::source::{CorpusConfig, LegacyConfig, StoreConfig, WikiConfig};
use hangar::sync::{DEFAULT_BATCH_SIZE, DEFAULT_CATEGORY_TIMEOUT, SyncOptions};
use serde::Deserialize;

const APP_NAME: &str = "hangar";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    /// Outbound request budget shared by every upstream.
    pub rate_limit: RateLimitSection,
    pub sync: SyncConfig,
    /// Paginated REST upstream.
    pub wiki: WikiSection,
    /// GraphQL storefront upstream.
    pub store: StoreSection,
    /// Git-hosted JSON corpus (paints and loaners).
    pub corpus: CorpusSection,
    /// Image-only REST upstream.
    pub legacy: LegacySection,
}

/// Database configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database connection URL.
    /// Supports sqlite:// and postgres:// schemes.
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RateLimitSection {
    pub requests_per_second: u32,
    pub burst: u32,
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self {
            requests_per_second: DEFAULT_REQUESTS_PER_SECOND,
            burst: DEFAULT_BURST,
        }
    }
}

/// Default sync options.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// A category running longer than this is cancelled and recorded as an error.
    pub category_timeout_secs: u64,
    /// Rows per INSERT batch, clamped by the backend's bind parameter limit.
    pub batch_size: usize,
    /// Records requested per page from paginated upstreams.
    pub page_size: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            category_timeout_secs: DEFAULT_CATEGORY_TIMEOUT.as_secs(),
            batch_size: DEFAULT_BATCH_SIZE,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WikiSection {
    pub base_url: String,
}

impl Default for WikiSection {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_WIKI_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub url: String,
    pub page_limit: u32,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            url: DEFAULT_STORE_URL.to_string(),
            page_limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

/// Git corpus configuration. The corpus source is only enabled once `owner` and `repo` are set.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CorpusSection {
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub branch: String,
    pub api_base: String,
    pub raw_base: String,
    pub paints_prefix: String,
    pub loaners_prefix: String,
    pub concurrency: usize,
    /// Access token for a higher upstream quota.
    /// Can also be set via HANGAR_CORPUS__TOKEN environment variable.
    pub token: Option<String>,
}

impl Default for CorpusSection {
    fn default() -> Self {
        Self {
            owner: None,
            repo: None,
            branch: "main".to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            raw_base: DEFAULT_RAW_BASE.to_string(),
            paints_prefix: "paints/".to_string(),
            loaners_prefix: "loaners/".to_string(),
            concurrency: DEFAULT_CORPUS_CONCURRENCY,
            token: None,
        }
    }
}

/// Legacy image API. Disabled unless `base_url` is set.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LegacySection {
    pub base_url: Option<String>,
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file (~/.config/hangar/config.toml)
    /// 3. Local config file (./hangar.toml)
    /// 4. Environment variables with HANGAR_ prefix
    pub fn load() -> Self {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = Self::default_config_path()
            && path.exists()
        {
            tracing::debug!("Loading config from {:?}", path);
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }

        let local_config = PathBuf::from("hangar.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./hangar.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        builder = builder.add_source(Self::environment());

        match builder.build().and_then(|c| c.try_deserialize::<Config>()) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config, using defaults: {}", e);
                Config::default()
            }
        }
    }

    /// `HANGAR_SYNC__BATCH_SIZE` -> `sync.batch_size`.
    fn environment() -> Environment {
        Environment::with_prefix("HANGAR")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    /// Get the database URL, falling back to the default state directory path.
    ///
    /// The `mode=rwc` parameter creates the SQLite file if it doesn't exist.
    pub fn database_url(&self) -> Option<String> {
        self.database.url.clone().or_else(|| {
            Self::default_state_dir().map(|state_dir| {
                let db_path = state_dir.join("hangar.db");
                format!("sqlite://{}?mode=rwc", db_path.display())
            })
        })
    }

    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig {
            requests_per_second: self.rate_limit.requests_per_second,
            burst: self.rate_limit.burst,
        }
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            category_timeout: Duration::from_secs(self.sync.category_timeout_secs),
            batch_size: self.sync.batch_size,
            ..SyncOptions::default()
        }
    }

    pub fn wiki(&self) -> WikiConfig {
        WikiConfig {
            base_url: self.wiki.base_url.clone(),
            page_size: self.sync.page_size,
        }
    }

    pub fn store(&self) -> StoreConfig {
        StoreConfig {
            url: self.store.url.clone(),
            page_limit: self.store.page_limit,
        }
    }

    /// The corpus adapter settings, or `None` if no repository is configured.
    pub fn corpus(&self) -> Option<CorpusConfig> {
        let section = &self.corpus;
        let (owner, repo) = match (&section.owner, &section.repo) {
            (Some(owner), Some(repo)) if !owner.is_empty() && !repo.is_empty() => {
                (owner.clone(), repo.clone())
            }
            _ => return None,
        };

        Some(CorpusConfig {
            owner,
            repo,
            branch: section.branch.clone(),
            api_base: section.api_base.clone(),
            raw_base: section.raw_base.clone(),
            paints_prefix: section.paints_prefix.clone(),
            loaners_prefix: section.loaners_prefix.clone(),
            concurrency: section.concurrency,
            token: section.token.clone().filter(|t| !t.is_empty()),
        })
    }

    pub fn legacy(&self) -> Option<LegacyConfig> {
        self.legacy
            .base_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .map(|url| LegacyConfig {
                page_size: self.sync.page_size,
                ..LegacyConfig::new(url)
            })
    }

    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get the default state directory path.
    ///
    /// On Linux, this is `$XDG_STATE_HOME/hangar` or `~/.local/state/hangar`.
    /// On macOS/Windows, falls back to the data directory.
    pub fn default_state_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", APP_NAME).map(|dirs| {
            dirs.state_dir()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| dirs.data_dir().to_path_buf())
        })
    }
}

/// Build a [`Config`] from in-memory TOML layers, later layers overriding earlier ones.
#[cfg(test)]
fn from_toml_layers(layers: &[&str]) -> Result<Config, config::ConfigError> {
    layers
        .iter()
        .fold(ConfigBuilder::builder(), |builder, layer| {
            builder.add_source(File::from_str(layer, FileFormat::Toml))
        })
        .build()?
        .try_deserialize()
}
