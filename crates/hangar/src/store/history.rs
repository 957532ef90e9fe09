//! Sync audit trail.
//!
//! One row per (source, category) per run. A row is opened as `running` and closed exactly
//! once by the same run; rows are never deleted.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::entity::prelude::*;
use crate::sync::{Category, CategoryCounts, CategoryStatus};

use super::errors::Result;

fn count(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

/// Open a `running` row for a category and return its id.
pub async fn start<C: ConnectionTrait>(
    conn: &C,
    run_id: Uuid,
    source: &str,
    category: Category,
) -> Result<Uuid> {
    let id = Uuid::new_v4();
    SyncHistoryActiveModel {
        id: Set(id),
        run_id: Set(run_id),
        source: Set(source.to_string()),
        category: Set(category.as_str().to_string()),
        status: Set(SyncStatus::Running),
        record_count: Set(0),
        unmatched_count: Set(0),
        skipped_count: Set(0),
        error_message: Set(None),
        started_at: Set(Utc::now().fixed_offset()),
        completed_at: Set(None),
    }
    .insert(conn)
    .await?;
    Ok(id)
}

/// Close a row with its final status and counts.
pub async fn finish<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
    status: SyncStatus,
    counts: CategoryCounts,
    error_message: Option<String>,
) -> Result<()> {
    SyncHistoryActiveModel {
        id: Set(id),
        status: Set(status),
        record_count: Set(count(counts.records)),
        unmatched_count: Set(count(counts.unmatched)),
        skipped_count: Set(count(counts.skipped)),
        error_message: Set(error_message),
        completed_at: Set(Some(Utc::now().fixed_offset())),
        ..Default::default()
    }
    .update(conn)
    .await?;
    Ok(())
}

/// Record a category that was not attempted.
pub async fn record_skipped<C: ConnectionTrait>(
    conn: &C,
    run_id: Uuid,
    source: &str,
    category: Category,
    message: &str,
) -> Result<()> {
    let now = Utc::now().fixed_offset();
    SyncHistoryActiveModel {
        id: Set(Uuid::new_v4()),
        run_id: Set(run_id),
        source: Set(source.to_string()),
        category: Set(category.as_str().to_string()),
        status: Set(SyncStatus::Skipped),
        record_count: Set(0),
        unmatched_count: Set(0),
        skipped_count: Set(0),
        error_message: Set(Some(message.to_string())),
        started_at: Set(now),
        completed_at: Set(Some(now)),
    }
    .insert(conn)
    .await?;
    Ok(())
}

/// Rows written by one run, in start order.
pub async fn rows_for_run<C: ConnectionTrait>(
    conn: &C,
    run_id: Uuid,
) -> Result<Vec<SyncHistoryModel>> {
    Ok(SyncHistory::find()
        .filter(SyncHistoryColumn::RunId.eq(run_id))
        .order_by_asc(SyncHistoryColumn::StartedAt)
        .all(conn)
        .await?)
}

/// Latest row per category, in execution order. Categories never synced are omitted.
pub async fn latest_per_category<C: ConnectionTrait>(conn: &C) -> Result<Vec<CategoryStatus>> {
    let mut statuses = Vec::new();
    for category in Category::ALL {
        let latest = SyncHistory::find()
            .filter(SyncHistoryColumn::Category.eq(category.as_str()))
            .order_by_desc(SyncHistoryColumn::StartedAt)
            .one(conn)
            .await?;

        if let Some(row) = latest {
            statuses.push(CategoryStatus {
                endpoint: row.category,
                source: row.source,
                last_sync_at: row.completed_at.or(Some(row.started_at)),
                total_records: row.record_count,
                status: row.status,
                error_message: row.error_message,
            });
        }
    }
    Ok(statuses)
}
