//! Append-only audit trail of sync runs.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::entity::sync_status::SyncStatus;

/// One row per (source, category) per run.
///
/// Created as `running` when the category starts and closed exactly once by the same run.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sync_history")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Groups the rows written by one run.
    pub run_id: Uuid,
    pub source: String,
    pub category: String,
    pub status: SyncStatus,
    pub record_count: i32,
    /// Records persisted without their cross-link because the resolver found no match.
    pub unmatched_count: i32,
    /// Malformed or unroutable records that were skipped.
    pub skipped_count: i32,
    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,
    pub started_at: DateTimeWithTimeZone,
    pub completed_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
