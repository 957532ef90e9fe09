//! Upsert/merge writer.
//!
//! Every category is written as one unit: lookups are loaded once, rows are batched, and
//! the whole unit runs in a single transaction that is retried from scratch on transient
//! database errors. A failure leaves the previously committed data untouched.

use std::collections::{BTreeSet, HashMap};

use sea_orm::sea_query::{Alias, Expr, Func, OnConflict, SimpleExpr};
use sea_orm::{
    Condition, ConnectionTrait, DatabaseConnection, EntityTrait, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::dialect::Dialect;
use crate::entity::prelude::*;
use crate::resolve::{AliasTable, normalize_paint};
use crate::retry::{RetryConfig, with_db_retry};
use crate::source::{
    CategoryRecords, GameVersionRecord, ImageRecord, ItemRecord, LoanerRecord,
    ManufacturerRecord, PaintRecord, PortArena, StoreListingRecord, VehicleRecord,
};
use crate::sync::CategoryCounts;

use super::errors::Result;
use super::items::{ItemRouter, write_items};
use super::lookup::{GameVersionIndex, ManufacturerIndex, PaintIndex, VehicleIndex};
use super::replace::{replace_children, scoped_replace, upsert_batches};

/// `COALESCE(NULLIF(excluded.col, ''), table.col)`: an empty or NULL text never
/// replaces a stored value.
fn keep_text<E>(column: E::Column) -> SimpleExpr
where
    E: EntityTrait,
{
    Func::coalesce([
        SimpleExpr::from(
            Func::cust(Alias::new("NULLIF"))
                .arg(Expr::col((Alias::new("excluded"), column)))
                .arg(""),
        ),
        Expr::col((E::default(), column)).into(),
    ])
    .into()
}

/// `COALESCE(excluded.col, table.col)` for non-text columns.
fn keep_value<E>(column: E::Column) -> SimpleExpr
where
    E: EntityTrait,
{
    Func::coalesce([
        SimpleExpr::from(Expr::col((Alias::new("excluded"), column))),
        Expr::col((E::default(), column)).into(),
    ])
    .into()
}

/// Collects rows keyed by primary key; a later row for the same key replaces the earlier.
struct UniqueRows<T> {
    rows: Vec<(Uuid, T)>,
    positions: HashMap<Uuid, usize>,
}

impl<T> UniqueRows<T> {
    fn new() -> Self {
        Self {
            rows: Vec::new(),
            positions: HashMap::new(),
        }
    }

    fn push(&mut self, id: Uuid, row: T) {
        match self.positions.get(&id) {
            Some(&i) => self.rows[i].1 = row,
            None => {
                self.positions.insert(id, self.rows.len());
                self.rows.push((id, row));
            }
        }
    }

    fn len(&self) -> usize {
        self.rows.len()
    }

    fn into_parts(self) -> Vec<(Uuid, T)> {
        self.rows
    }
}

/// Writes intermediate records into the reference store.
#[derive(Debug, Clone)]
pub struct StoreWriter {
    db: DatabaseConnection,
    dialect: Dialect,
    batch_size: usize,
    retry: RetryConfig,
    aliases: AliasTable,
    items: ItemRouter,
}

impl StoreWriter {
    pub fn new(
        db: DatabaseConnection,
        batch_size: usize,
        retry: RetryConfig,
        aliases: AliasTable,
    ) -> Self {
        let dialect = Dialect::from_backend(db.get_database_backend());
        Self {
            db,
            dialect,
            batch_size,
            retry,
            aliases,
            items: ItemRouter::default(),
        }
    }

    #[must_use]
    pub fn with_item_router(mut self, router: ItemRouter) -> Self {
        self.items = router;
        self
    }

    /// Write one category's records.
    pub async fn write(&self, records: &CategoryRecords) -> Result<CategoryCounts> {
        match records {
            CategoryRecords::Manufacturers(r) => self.write_manufacturers(r).await,
            CategoryRecords::GameVersions(r) => self.write_game_versions(r).await,
            CategoryRecords::Vehicles(r) => self.write_vehicles(r).await,
            CategoryRecords::Items(r) => self.write_items(r).await,
            CategoryRecords::Store(r) => self.write_store_listings(r).await,
            CategoryRecords::Paints(r) => self.write_paints(r).await,
            CategoryRecords::Loaners(r) => self.write_loaners(r).await,
            CategoryRecords::Images(r) => self.write_images(r).await,
        }
    }

    pub async fn write_manufacturers(
        &self,
        records: &[ManufacturerRecord],
    ) -> Result<CategoryCounts> {
        with_db_retry(self.retry.clone(), move || async move {
            let txn = self.db.begin().await?;
            let counts = self.manufacturers_in(&txn, records).await?;
            txn.commit().await?;
            Ok(counts)
        })
        .await
    }

    pub async fn write_game_versions(
        &self,
        records: &[GameVersionRecord],
    ) -> Result<CategoryCounts> {
        with_db_retry(self.retry.clone(), move || async move {
            let txn = self.db.begin().await?;
            let counts = self.game_versions_in(&txn, records).await?;
            txn.commit().await?;
            Ok(counts)
        })
        .await
    }

    pub async fn write_vehicles(&self, records: &[VehicleRecord]) -> Result<CategoryCounts> {
        with_db_retry(self.retry.clone(), move || async move {
            let txn = self.db.begin().await?;
            let counts = self.vehicles_in(&txn, records).await?;
            txn.commit().await?;
            Ok(counts)
        })
        .await
    }

    pub async fn write_items(&self, records: &[ItemRecord]) -> Result<CategoryCounts> {
        with_db_retry(self.retry.clone(), move || async move {
            let txn = self.db.begin().await?;
            let manufacturers = ManufacturerIndex::load(&txn).await?;
            let outcome = write_items(
                &txn,
                self.dialect,
                &self.items,
                &manufacturers,
                records,
                self.batch_size,
            )
            .await?;
            txn.commit().await?;
            Ok(CategoryCounts {
                records: outcome.written,
                unmatched: outcome.unmatched_manufacturers,
                skipped: outcome.unrouted,
            })
        })
        .await
    }

    pub async fn write_store_listings(
        &self,
        records: &[StoreListingRecord],
    ) -> Result<CategoryCounts> {
        with_db_retry(self.retry.clone(), move || async move {
            let txn = self.db.begin().await?;
            let counts = self.store_listings_in(&txn, records).await?;
            txn.commit().await?;
            Ok(counts)
        })
        .await
    }

    pub async fn write_paints(&self, records: &[PaintRecord]) -> Result<CategoryCounts> {
        with_db_retry(self.retry.clone(), move || async move {
            let txn = self.db.begin().await?;
            let counts = self.paints_in(&txn, records).await?;
            txn.commit().await?;
            Ok(counts)
        })
        .await
    }

    pub async fn write_loaners(&self, records: &[LoanerRecord]) -> Result<CategoryCounts> {
        with_db_retry(self.retry.clone(), move || async move {
            let txn = self.db.begin().await?;
            let counts = self.loaners_in(&txn, records).await?;
            txn.commit().await?;
            Ok(counts)
        })
        .await
    }

    pub async fn write_images(&self, records: &[ImageRecord]) -> Result<CategoryCounts> {
        with_db_retry(self.retry.clone(), move || async move {
            let txn = self.db.begin().await?;
            let counts = self.images_in(&txn, records).await?;
            txn.commit().await?;
            Ok(counts)
        })
        .await
    }

    // ─── Units ──────────────────────────────────────────────────────────────

    async fn manufacturers_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        records: &[ManufacturerRecord],
    ) -> Result<CategoryCounts> {
        let mut index = ManufacturerIndex::load(conn).await?;
        let mut counts = CategoryCounts::default();
        let mut rows = UniqueRows::new();

        for record in records {
            let by_uuid = record.uuid.as_deref().and_then(|u| index.by_uuid(u));
            let by_slug = index.by_slug(&record.slug);
            let id = match (by_uuid, by_slug) {
                (Some(a), Some(b)) if a != b => {
                    tracing::warn!(
                        slug = %record.slug,
                        uuid = ?record.uuid,
                        "Manufacturer slug belongs to a different uuid, skipping"
                    );
                    counts.skipped += 1;
                    continue;
                }
                (None, Some(id)) => {
                    if let (Some(incoming), Some(stored)) =
                        (record.uuid.as_deref(), index.uuid_of(id))
                    {
                        tracing::warn!(
                            slug = %record.slug,
                            stored,
                            incoming,
                            "Manufacturer uuid changed upstream, replacing the stored uuid"
                        );
                    }
                    id
                }
                (Some(id), _) => id,
                (None, None) => Uuid::new_v4(),
            };
            index.insert(id, record.uuid.as_deref(), &record.slug);

            rows.push(
                id,
                ManufacturerActiveModel {
                    id: Set(id),
                    uuid: Set(record.uuid.clone()),
                    slug: Set(record.slug.clone()),
                    name: Set(record.name.clone()),
                    code: Set(record.code.clone()),
                },
            );
        }

        counts.records = rows.len();
        let on_conflict = OnConflict::column(ManufacturerColumn::Id)
            .update_columns([ManufacturerColumn::Slug, ManufacturerColumn::Name])
            .value(
                ManufacturerColumn::Uuid,
                keep_text::<Manufacturer>(ManufacturerColumn::Uuid),
            )
            .value(
                ManufacturerColumn::Code,
                keep_text::<Manufacturer>(ManufacturerColumn::Code),
            )
            .to_owned();
        let models = rows.into_parts().into_iter().map(|(_, m)| m).collect();
        upsert_batches::<Manufacturer, _>(conn, self.dialect, models, self.batch_size, on_conflict)
            .await?;
        Ok(counts)
    }

    async fn game_versions_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        records: &[GameVersionRecord],
    ) -> Result<CategoryCounts> {
        let mut index = GameVersionIndex::load(conn).await?;
        let mut counts = CategoryCounts::default();
        let mut rows = UniqueRows::new();

        for record in records {
            let by_uuid = record.uuid.as_deref().and_then(|u| index.by_uuid(u));
            let by_code = index.by_code(&record.code);
            let id = match (by_uuid, by_code) {
                (Some(a), Some(b)) if a != b => {
                    tracing::warn!(
                        code = %record.code,
                        uuid = ?record.uuid,
                        "Game version code belongs to a different uuid, skipping"
                    );
                    counts.skipped += 1;
                    continue;
                }
                (Some(id), _) | (None, Some(id)) => id,
                (None, None) => Uuid::new_v4(),
            };
            index.insert(id, record.uuid.as_deref(), &record.code);

            rows.push(
                id,
                GameVersionActiveModel {
                    id: Set(id),
                    uuid: Set(record.uuid.clone()),
                    code: Set(record.code.clone()),
                    channel: Set(record.channel.clone()),
                    is_default: Set(record.is_default),
                },
            );
        }

        counts.records = rows.len();
        let on_conflict = OnConflict::column(GameVersionColumn::Id)
            .update_columns([GameVersionColumn::Code, GameVersionColumn::IsDefault])
            .value(
                GameVersionColumn::Uuid,
                keep_text::<GameVersion>(GameVersionColumn::Uuid),
            )
            .value(
                GameVersionColumn::Channel,
                keep_text::<GameVersion>(GameVersionColumn::Channel),
            )
            .to_owned();
        let models = rows.into_parts().into_iter().map(|(_, m)| m).collect();
        upsert_batches::<GameVersion, _>(conn, self.dialect, models, self.batch_size, on_conflict)
            .await?;
        Ok(counts)
    }

    async fn vehicles_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        records: &[VehicleRecord],
    ) -> Result<CategoryCounts> {
        let manufacturers = ManufacturerIndex::load(conn).await?;
        let versions = GameVersionIndex::load(conn).await?;
        let existing = VehicleIndex::load(conn).await?;

        let mut counts = CategoryCounts::default();
        let mut assigned: HashMap<&str, Uuid> = HashMap::new();
        let mut rows = UniqueRows::new();

        for record in records {
            let id = assigned
                .get(record.slug.as_str())
                .copied()
                .or_else(|| existing.by_slug(&record.slug))
                .unwrap_or_else(Uuid::new_v4);
            assigned.insert(&record.slug, id);

            let mut unresolved = false;
            let manufacturer_id = record.manufacturer.as_ref().and_then(|reference| {
                let found = manufacturers.resolve(reference);
                if found.is_none() {
                    tracing::warn!(
                        slug = %record.slug,
                        manufacturer = ?reference,
                        "Vehicle manufacturer not found, writing without it"
                    );
                    unresolved = true;
                }
                found
            });
            let game_version_id = record.game_version.as_ref().and_then(|reference| {
                let found = versions.resolve(reference);
                if found.is_none() {
                    tracing::warn!(
                        slug = %record.slug,
                        game_version = ?reference,
                        "Vehicle game version not found, writing without it"
                    );
                    unresolved = true;
                }
                found
            });
            if unresolved {
                counts.unmatched += 1;
            }

            let model = VehicleActiveModel {
                id: Set(id),
                uuid: Set(record.uuid.clone()),
                slug: Set(record.slug.clone()),
                name: Set(record.name.clone()),
                class_name: Set(record.class_name.clone()),
                size: Set(record.size.clone()),
                role: Set(record.role.clone()),
                length: Set(record.length),
                beam: Set(record.beam),
                height: Set(record.height),
                mass: Set(record.mass),
                cargo_capacity: Set(record.cargo_capacity),
                crew_min: Set(record.crew_min),
                crew_max: Set(record.crew_max),
                scm_speed: Set(record.scm_speed),
                max_speed: Set(record.max_speed),
                manufacturer_id: Set(manufacturer_id),
                game_version_id: Set(game_version_id),
                ..Default::default()
            };
            rows.push(id, (model, port_rows(id, &record.ports)));
        }

        counts.records = rows.len();
        let mut ids = Vec::with_capacity(rows.len());
        let mut models = Vec::with_capacity(rows.len());
        let mut ports = Vec::new();
        for (id, (model, port_rows)) in rows.into_parts() {
            ids.push(id);
            models.push(model);
            ports.extend(port_rows);
        }

        upsert_batches::<Vehicle, _>(
            conn,
            self.dialect,
            models,
            self.batch_size,
            vehicle_on_conflict(),
        )
        .await?;
        replace_children::<Port, _>(
            conn,
            self.dialect,
            PortColumn::VehicleId,
            &ids,
            ports,
            self.batch_size,
        )
        .await?;

        Ok(counts)
    }

    async fn store_listings_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        records: &[StoreListingRecord],
    ) -> Result<CategoryCounts> {
        let vehicles = VehicleIndex::load(conn).await?;
        let resolver = vehicles.resolver(self.aliases.clone());
        let mut counts = CategoryCounts::default();
        let mut rows = UniqueRows::new();

        for listing in records {
            let matched = resolver.resolve(&listing.name).first();
            let Some((id, model)) = matched.and_then(|id| existing_vehicle(&vehicles, id)) else {
                counts.unmatched += 1;
                continue;
            };
            rows.push(
                id,
                VehicleActiveModel {
                    store_url: Set(listing.store_url.clone()),
                    pledge_price: Set(listing.pledge_price),
                    image_url: Set(listing.image_url.clone()),
                    image_small: Set(listing.images.small.clone()),
                    image_medium: Set(listing.images.medium.clone()),
                    image_large: Set(listing.images.large.clone()),
                    ..model
                },
            );
        }

        counts.records = rows.len();
        let on_conflict = keep_existing_on_conflict(
            &[
                VehicleColumn::StoreUrl,
                VehicleColumn::ImageUrl,
                VehicleColumn::ImageSmall,
                VehicleColumn::ImageMedium,
                VehicleColumn::ImageLarge,
            ],
            &[VehicleColumn::PledgePrice],
        );
        let models = rows.into_parts().into_iter().map(|(_, m)| m).collect();
        upsert_batches::<Vehicle, _>(conn, self.dialect, models, self.batch_size, on_conflict)
            .await?;
        Ok(counts)
    }

    async fn images_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        records: &[ImageRecord],
    ) -> Result<CategoryCounts> {
        let vehicles = VehicleIndex::load(conn).await?;
        let resolver = vehicles.resolver(self.aliases.clone());
        let mut counts = CategoryCounts::default();
        let mut rows = UniqueRows::new();

        for record in records {
            let matched = vehicles
                .by_slug(&record.slug)
                .or_else(|| resolver.resolve(&record.slug).first());
            let Some((id, model)) = matched.and_then(|id| existing_vehicle(&vehicles, id)) else {
                counts.unmatched += 1;
                continue;
            };
            rows.push(
                id,
                VehicleActiveModel {
                    image_url: Set(record.image_url.clone()),
                    image_small: Set(record.images.small.clone()),
                    image_medium: Set(record.images.medium.clone()),
                    image_large: Set(record.images.large.clone()),
                    ..model
                },
            );
        }

        counts.records = rows.len();
        let on_conflict = keep_existing_on_conflict(
            &[
                VehicleColumn::ImageUrl,
                VehicleColumn::ImageSmall,
                VehicleColumn::ImageMedium,
                VehicleColumn::ImageLarge,
            ],
            &[],
        );
        let models = rows.into_parts().into_iter().map(|(_, m)| m).collect();
        upsert_batches::<Vehicle, _>(conn, self.dialect, models, self.batch_size, on_conflict)
            .await?;
        Ok(counts)
    }

    async fn paints_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        records: &[PaintRecord],
    ) -> Result<CategoryCounts> {
        let resolver = VehicleIndex::load(conn)
            .await?
            .resolver(self.aliases.clone());
        let existing = PaintIndex::load(conn).await?;

        let mut counts = CategoryCounts::default();
        let mut assigned: HashMap<&str, Uuid> = HashMap::new();
        let mut rows = UniqueRows::new();

        for paint in records {
            let id = assigned
                .get(paint.class_name.as_str())
                .copied()
                .or_else(|| existing.get(&paint.class_name))
                .unwrap_or_else(Uuid::new_v4);
            assigned.insert(&paint.class_name, id);

            // Untagged paints are matched on their own class name.
            let tags: Vec<&str> = if paint.tags.is_empty() {
                vec![paint.class_name.as_str()]
            } else {
                paint.tags.iter().map(String::as_str).collect()
            };
            let vehicles: BTreeSet<Uuid> = tags
                .iter()
                .flat_map(|tag| resolver.resolve(tag).ids)
                .collect();

            let model = PaintActiveModel {
                id: Set(id),
                class_name: Set(paint.class_name.clone()),
                name: Set(paint.name.clone()),
                slug: Set(normalize_paint(&paint.class_name)),
                description: Set(paint.description.clone()),
            };
            rows.push(id, (model, vehicles));
        }

        let parts = rows.into_parts();
        counts.records = parts.len();
        counts.unmatched = parts
            .iter()
            .filter(|(_, (_, vehicles))| vehicles.is_empty())
            .count();

        let mut ids = Vec::with_capacity(parts.len());
        let mut models = Vec::with_capacity(parts.len());
        let mut links = Vec::new();
        for (paint_id, (model, vehicles)) in parts {
            ids.push(paint_id);
            models.push(model);
            links.extend(vehicles.into_iter().map(|vehicle_id| PaintVehicleActiveModel {
                paint_id: Set(paint_id),
                vehicle_id: Set(vehicle_id),
            }));
        }

        let on_conflict = OnConflict::column(PaintColumn::Id)
            .update_columns([PaintColumn::Name, PaintColumn::Slug])
            .value(
                PaintColumn::Description,
                keep_text::<Paint>(PaintColumn::Description),
            )
            .to_owned();
        upsert_batches::<Paint, _>(conn, self.dialect, models, self.batch_size, on_conflict)
            .await?;

        replace_children::<PaintVehicle, _>(
            conn,
            self.dialect,
            PaintVehicleColumn::PaintId,
            &ids,
            links,
            self.batch_size,
        )
        .await?;

        Ok(counts)
    }

    async fn loaners_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        records: &[LoanerRecord],
    ) -> Result<CategoryCounts> {
        let resolver = VehicleIndex::load(conn)
            .await?
            .resolver(self.aliases.clone());
        let mut counts = CategoryCounts::default();
        let mut pairs: BTreeSet<(Uuid, Uuid)> = BTreeSet::new();

        for record in records {
            let Some(vehicle_id) = resolver.resolve(&record.vehicle).first() else {
                counts.unmatched += 1;
                continue;
            };
            let mut missing = false;
            for tag in &record.loaners {
                match resolver.resolve(tag).first() {
                    Some(loaner_id) => {
                        pairs.insert((vehicle_id, loaner_id));
                    }
                    None => missing = true,
                }
            }
            if missing {
                counts.unmatched += 1;
            }
        }

        let rows = pairs
            .into_iter()
            .map(|(vehicle_id, loaner_id)| VehicleLoanerActiveModel {
                vehicle_id: Set(vehicle_id),
                loaner_id: Set(loaner_id),
            })
            .collect();
        let written = scoped_replace::<VehicleLoaner, _>(
            conn,
            self.dialect,
            Condition::all(),
            rows,
            self.batch_size,
        )
        .await?;
        counts.records = written as usize;
        Ok(counts)
    }
}

/// Key columns of a loaded vehicle, for an upsert that only touches some of its columns.
fn existing_vehicle(vehicles: &VehicleIndex, id: Uuid) -> Option<(Uuid, VehicleActiveModel)> {
    let vehicle = vehicles.get(id)?;
    let model = VehicleActiveModel {
        id: Set(id),
        slug: Set(vehicle.slug.clone()),
        name: Set(vehicle.name.clone()),
        ..Default::default()
    };
    Some((id, model))
}

/// Conflict on the vehicle id, merging `text` and `values` with keep-existing semantics.
fn keep_existing_on_conflict(text: &[VehicleColumn], values: &[VehicleColumn]) -> OnConflict {
    let mut on_conflict = OnConflict::column(VehicleColumn::Id);
    for &column in text {
        on_conflict.value(column, keep_text::<Vehicle>(column));
    }
    for &column in values {
        on_conflict.value(column, keep_value::<Vehicle>(column));
    }
    on_conflict
}

fn vehicle_on_conflict() -> OnConflict {
    let text = [
        VehicleColumn::Uuid,
        VehicleColumn::ClassName,
        VehicleColumn::Size,
        VehicleColumn::Role,
    ];
    let values = [
        VehicleColumn::Length,
        VehicleColumn::Beam,
        VehicleColumn::Height,
        VehicleColumn::Mass,
        VehicleColumn::CargoCapacity,
        VehicleColumn::CrewMin,
        VehicleColumn::CrewMax,
        VehicleColumn::ScmSpeed,
        VehicleColumn::MaxSpeed,
        VehicleColumn::ManufacturerId,
        VehicleColumn::GameVersionId,
    ];

    let mut on_conflict = keep_existing_on_conflict(&text, &values);
    on_conflict.update_columns([VehicleColumn::Slug, VehicleColumn::Name]);
    on_conflict
}

/// Port rows for one vehicle. Ids are derived from the vehicle id and the port path, so
/// a re-sync of an unchanged tree produces identical rows.
fn port_rows(vehicle_id: Uuid, arena: &PortArena) -> Vec<PortActiveModel> {
    let ids: Vec<Uuid> = arena
        .nodes
        .iter()
        .map(|node| Uuid::new_v5(&vehicle_id, node.path.as_bytes()))
        .collect();

    arena
        .nodes
        .iter()
        .zip(&ids)
        .map(|(node, id)| PortActiveModel {
            id: Set(*id),
            vehicle_id: Set(vehicle_id),
            parent_port_id: Set(node.parent.and_then(|p| ids.get(p).copied())),
            path: Set(node.path.clone()),
            name: Set(node.name.clone()),
            category: Set(node.category.clone()),
            size_min: Set(node.size_min),
            size_max: Set(node.size_max),
            equipped_item_uuid: Set(node.equipped_item_uuid.clone()),
            depth: Set(i32::try_from(node.depth).unwrap_or(i32::MAX)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use sea_orm::sea_query::{Query, SqliteQueryBuilder};
    use serde_json::json;

    use super::*;

    #[test]
    fn keep_text_renders_coalesce_nullif() {
        let sql = Query::insert()
            .into_table(Vehicle)
            .columns([VehicleColumn::Id, VehicleColumn::Role])
            .values_panic([Uuid::nil().into(), "Exploration".into()])
            .on_conflict(vehicle_on_conflict())
            .to_string(SqliteQueryBuilder);

        assert!(
            sql.contains(
                r#""role" = COALESCE(NULLIF("excluded"."role", ''), "vehicles"."role")"#
            ),
            "{sql}"
        );
        assert!(
            sql.contains(r#""mass" = COALESCE("excluded"."mass", "vehicles"."mass")"#),
            "{sql}"
        );
        assert!(sql.contains(r#""name" = "excluded"."name""#), "{sql}");
    }

    #[test]
    fn port_ids_are_stable_and_parents_link() {
        let arena = PortArena::flatten(&json!([
            {"name": "turret", "ports": [{"name": "gun"}]}
        ]));
        let vehicle = Uuid::new_v4();
        let first = port_rows(vehicle, &arena);
        let second = port_rows(vehicle, &arena);

        assert_eq!(first.len(), 2);
        assert_eq!(first[0].id, second[0].id);
        assert_eq!(first[1].parent_port_id, Set(Some(*first[0].id.as_ref())));
        assert_ne!(
            port_rows(Uuid::new_v4(), &arena)[0].id,
            first[0].id,
            "ids are scoped to the vehicle"
        );
    }

    #[test]
    fn unique_rows_keeps_last_value_in_first_position() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut rows = UniqueRows::new();
        rows.push(a, 1);
        rows.push(b, 2);
        rows.push(a, 3);
        assert_eq!(rows.into_parts(), vec![(a, 3), (b, 2)]);
    }
}
