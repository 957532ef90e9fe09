//! Outcome of one category within a sync run.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[sea_orm(string_value = "pending")]
    #[default]
    Pending,
    #[sea_orm(string_value = "running")]
    Running,
    #[sea_orm(string_value = "success")]
    Success,
    #[sea_orm(string_value = "error")]
    Error,
    /// Not attempted because a dependency did not succeed in the same run.
    #[sea_orm(string_value = "skipped")]
    Skipped,
}

impl SyncStatus {
    /// Whether the status is final for its run.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Error | Self::Skipped)
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Running => "running",
            SyncStatus::Success => "success",
            SyncStatus::Error => "error",
            SyncStatus::Skipped => "skipped",
        };
        f.write_str(s)
    }
}
