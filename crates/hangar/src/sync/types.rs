//! Shared sync types, the category table and run options.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::sync_status::SyncStatus;
use crate::retry::RetryConfig;

/// Default per-category timeout.
pub const DEFAULT_CATEGORY_TIMEOUT: Duration = Duration::from_secs(300);

/// Default rows per INSERT batch (further clamped by the dialect's bind limit).
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// A unit of synchronization, recorded as one audit row per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Manufacturers,
    GameVersions,
    Vehicles,
    Items,
    Store,
    Paints,
    Loaners,
    Images,
}

impl Category {
    /// Every category in execution order.
    pub const ALL: [Category; 8] = [
        Category::Manufacturers,
        Category::GameVersions,
        Category::Vehicles,
        Category::Items,
        Category::Store,
        Category::Paints,
        Category::Loaners,
        Category::Images,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Manufacturers => "manufacturers",
            Category::GameVersions => "game_versions",
            Category::Vehicles => "vehicles",
            Category::Items => "items",
            Category::Store => "store",
            Category::Paints => "paints",
            Category::Loaners => "loaners",
            Category::Images => "images",
        }
    }

    /// Categories that must succeed earlier in the same run before this one may start.
    pub fn dependencies(self) -> &'static [Category] {
        match self {
            Category::Manufacturers | Category::GameVersions => &[],
            Category::Vehicles | Category::Items => &[Category::Manufacturers],
            Category::Store | Category::Paints | Category::Loaners | Category::Images => {
                &[Category::Vehicles]
            }
        }
    }

    /// A best-effort category fails without being reported as a run failure.
    pub fn is_best_effort(self) -> bool {
        matches!(self, Category::GameVersions)
    }

    /// Position in [`Category::ALL`].
    pub fn order(self) -> usize {
        Category::ALL
            .iter()
            .position(|c| *c == self)
            .unwrap_or(Category::ALL.len())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category '{0}'")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

/// What a run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncScope {
    All,
    Only(Category),
}

impl SyncScope {
    /// Categories covered, in execution order.
    pub fn categories(self) -> Vec<Category> {
        match self {
            SyncScope::All => Category::ALL.to_vec(),
            SyncScope::Only(c) => vec![c],
        }
    }
}

impl FromStr for SyncScope {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(SyncScope::All)
        } else {
            s.parse().map(SyncScope::Only)
        }
    }
}

impl fmt::Display for SyncScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncScope::All => f.write_str("all"),
            SyncScope::Only(c) => c.fmt(f),
        }
    }
}

/// Options for a sync engine.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// A category exceeding this is cancelled and marked `error`.
    pub category_timeout: Duration,
    /// Requested rows per INSERT batch.
    pub batch_size: usize,
    /// Backoff for transient database errors.
    pub retry: RetryConfig,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            category_timeout: DEFAULT_CATEGORY_TIMEOUT,
            batch_size: DEFAULT_BATCH_SIZE,
            retry: RetryConfig::default(),
        }
    }
}

/// Counts produced by writing one category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryCounts {
    /// Records written.
    pub records: usize,
    /// Records persisted without their cross-link.
    pub unmatched: usize,
    /// Records skipped as malformed or unroutable.
    pub skipped: usize,
}

/// Final state of one category in one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryOutcome {
    pub category: Category,
    pub source: String,
    pub status: SyncStatus,
    pub counts: CategoryCounts,
    pub error: Option<String>,
}

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub outcomes: Vec<CategoryOutcome>,
    /// True if the run stopped early because its token was cancelled.
    pub cancelled: bool,
}

impl RunReport {
    pub fn outcome(&self, category: Category) -> Option<&CategoryOutcome> {
        self.outcomes.iter().find(|o| o.category == category)
    }

    pub fn count(&self, status: SyncStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    /// True if every non best-effort category succeeded.
    pub fn is_success(&self) -> bool {
        !self.cancelled
            && self
                .outcomes
                .iter()
                .all(|o| o.status == SyncStatus::Success || o.category.is_best_effort())
    }
}

/// Latest audit row for one category, as exposed by the status surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryStatus {
    pub endpoint: String,
    pub source: String,
    pub last_sync_at: Option<DateTime<FixedOffset>>,
    pub total_records: i32,
    pub status: SyncStatus,
    pub error_message: Option<String>,
}
