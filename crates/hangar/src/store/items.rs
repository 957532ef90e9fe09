//! Item routing and writes.
//!
//! Upstream items carry a free-form `type` string. [`ItemRouter`] maps each known type to
//! one of the item subtype tables; new types are added to the table below, never to the
//! dispatch code.

use std::collections::{BTreeMap, HashMap, HashSet};

use sea_orm::sea_query::{Alias, Expr, OnConflict, Query, SimpleExpr};
use sea_orm::ConnectionTrait;
use uuid::Uuid;

use crate::dialect::Dialect;
use crate::source::ItemRecord;

use super::errors::Result;
use super::lookup::ManufacturerIndex;

/// Item subtype tables, in migration order.
pub const ITEM_TABLES: [&str; 5] = [
    "vehicle_components",
    "fps_weapons",
    "fps_armour",
    "fps_attachments",
    "fps_utilities",
];

/// Upstream item type → subtype table.
const ITEM_ROUTES: &[(&str, &str)] = &[
    ("cooler", "vehicle_components"),
    ("powerplant", "vehicle_components"),
    ("shield", "vehicle_components"),
    ("quantumdrive", "vehicle_components"),
    ("quantuminterdictiongenerator", "vehicle_components"),
    ("weapongun", "vehicle_components"),
    ("weapondefensive", "vehicle_components"),
    ("weaponmining", "vehicle_components"),
    ("missile", "vehicle_components"),
    ("missilelauncher", "vehicle_components"),
    ("turret", "vehicle_components"),
    ("turretbase", "vehicle_components"),
    ("radar", "vehicle_components"),
    ("emp", "vehicle_components"),
    ("fueltank", "vehicle_components"),
    ("quantumfueltank", "vehicle_components"),
    ("fuelintake", "vehicle_components"),
    ("weaponpersonal", "fps_weapons"),
    ("char_armor_helmet", "fps_armour"),
    ("char_armor_torso", "fps_armour"),
    ("char_armor_arms", "fps_armour"),
    ("char_armor_legs", "fps_armour"),
    ("char_armor_backpack", "fps_armour"),
    ("char_armor_undersuit", "fps_armour"),
    ("weaponattachment", "fps_attachments"),
    ("fps_consumable", "fps_utilities"),
    ("gadget", "fps_utilities"),
    ("drink", "fps_utilities"),
    ("food", "fps_utilities"),
];

/// Columns written per item row.
const ITEM_COLUMNS: [&str; 10] = [
    "id",
    "uuid",
    "name",
    "class_name",
    "item_type",
    "sub_type",
    "size",
    "grade",
    "manufacturer_id",
    "data",
];

/// Explicit type → table mapping, built once.
#[derive(Debug, Clone)]
pub struct ItemRouter {
    routes: HashMap<String, &'static str>,
}

impl Default for ItemRouter {
    fn default() -> Self {
        Self {
            routes: ITEM_ROUTES
                .iter()
                .map(|(item_type, table)| (item_type.to_string(), *table))
                .collect(),
        }
    }
}

impl ItemRouter {
    /// Table for an upstream type string, case-insensitive.
    pub fn route(&self, item_type: &str) -> Option<&'static str> {
        self.routes.get(&item_type.trim().to_lowercase()).copied()
    }

    /// Route an additional type. `table` must be one of [`ITEM_TABLES`].
    pub fn insert(&mut self, item_type: &str, table: &'static str) -> bool {
        if !ITEM_TABLES.contains(&table) {
            return false;
        }
        self.routes.insert(item_type.trim().to_lowercase(), table);
        true
    }

    pub fn tables(&self) -> &'static [&'static str] {
        &ITEM_TABLES
    }
}

/// Rows written and items skipped as unroutable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ItemWrite {
    pub written: usize,
    pub unrouted: usize,
    pub unmatched_manufacturers: usize,
    /// Rows removed from a table the item no longer routes to.
    pub moved: usize,
}

/// Upsert items into their subtype tables, keyed on the upstream `uuid`.
///
/// Existing rows keep their primary key; everything else is overwritten. An item whose type
/// now routes to a different table is removed from the table it was in.
pub async fn write_items<C: ConnectionTrait>(
    conn: &C,
    dialect: Dialect,
    router: &ItemRouter,
    manufacturers: &ManufacturerIndex,
    records: &[ItemRecord],
    batch_size: usize,
) -> Result<ItemWrite> {
    let mut outcome = ItemWrite::default();
    let mut by_table: BTreeMap<&'static str, Vec<[SimpleExpr; 10]>> = BTreeMap::new();
    let mut uuids_by_table: BTreeMap<&'static str, Vec<String>> = BTreeMap::new();
    let mut seen: HashSet<&str> = HashSet::new();

    // Last occurrence of a uuid wins; one statement may not touch a row twice.
    for record in records.iter().rev() {
        if !seen.insert(record.uuid.as_str()) {
            continue;
        }
        let Some(table) = router.route(&record.item_type) else {
            tracing::debug!(
                item_type = %record.item_type,
                uuid = %record.uuid,
                "No table for item type, skipping"
            );
            outcome.unrouted += 1;
            continue;
        };

        let manufacturer_id = match &record.manufacturer {
            Some(reference) => {
                let id = manufacturers.resolve(reference);
                if id.is_none() {
                    tracing::warn!(
                        uuid = %record.uuid,
                        manufacturer = ?reference,
                        "Item manufacturer not found, writing without it"
                    );
                    outcome.unmatched_manufacturers += 1;
                }
                id
            }
            None => None,
        };

        uuids_by_table
            .entry(table)
            .or_default()
            .push(record.uuid.clone());
        by_table.entry(table).or_default().push([
            Uuid::new_v4().into(),
            record.uuid.clone().into(),
            record.name.clone().into(),
            record.class_name.clone().into(),
            record.item_type.clone().into(),
            record.sub_type.clone().into(),
            record.size.into(),
            record.grade.clone().into(),
            manufacturer_id.into(),
            record.data.clone().into(),
        ]);
    }

    let chunk = dialect.batch_rows(batch_size, ITEM_COLUMNS.len());
    for (table, rows) in by_table {
        for batch in rows.chunks(chunk) {
            let mut insert = Query::insert();
            insert
                .into_table(Alias::new(table))
                .columns(ITEM_COLUMNS.iter().map(|c| Alias::new(*c)))
                .on_conflict(
                    OnConflict::column(Alias::new("uuid"))
                        .update_columns(ITEM_COLUMNS[2..].iter().map(|c| Alias::new(*c)))
                        .to_owned(),
                );
            for row in batch {
                insert.values(row.iter().cloned())?;
            }
            conn.execute(conn.get_database_backend().build(&insert))
                .await?;
            outcome.written += batch.len();
            tracing::debug!(table, rows = batch.len(), "Flushed item batch");
        }
    }

    let chunk = dialect.batch_rows(batch_size, 1);
    for (table, uuids) in &uuids_by_table {
        for other in ITEM_TABLES.iter().filter(|t| *t != table) {
            for batch in uuids.chunks(chunk) {
                let mut delete = Query::delete();
                delete
                    .from_table(Alias::new(*other))
                    .and_where(Expr::col(Alias::new("uuid")).is_in(batch.iter().cloned()));
                let removed = conn
                    .execute(conn.get_database_backend().build(&delete))
                    .await?
                    .rows_affected();
                if removed > 0 {
                    tracing::debug!(from = *other, to = *table, removed, "Moved items between tables");
                    outcome.moved += removed as usize;
                }
            }
        }
    }

    Ok(outcome)
}
