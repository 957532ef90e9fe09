//! Batched writes: scoped replace (delete the children of a set of owners, then insert the
//! new set) and keyed upsert.
//!
//! These functions never open or commit a transaction themselves. Callers run them on a
//! [`DatabaseTransaction`](sea_orm::DatabaseTransaction) so that the delete and every
//! insert batch commit together or not at all.

use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityName, EntityTrait, IntoActiveModel,
    Iterable, QueryFilter,
};
use uuid::Uuid;

use crate::dialect::Dialect;

use super::errors::Result;

/// Delete every row of `E` matching `scope`, then insert `rows` in batches.
///
/// Returns the number of rows inserted.
pub async fn scoped_replace<E, C>(
    conn: &C,
    dialect: Dialect,
    scope: Condition,
    rows: Vec<E::ActiveModel>,
    batch_size: usize,
) -> Result<u64>
where
    E: EntityTrait,
    E::ActiveModel: ActiveModelTrait<Entity = E> + Send,
    E::Model: IntoActiveModel<E::ActiveModel>,
    C: ConnectionTrait,
{
    let deleted = E::delete_many().filter(scope).exec(conn).await?;
    tracing::debug!(
        table = %E::default().table_name(),
        deleted = deleted.rows_affected,
        "Cleared scope before replace"
    );
    insert_batches::<E, C>(conn, dialect, rows, batch_size).await
}

/// Delete every row of `E` whose `owner` column is one of `owners`, then insert `rows` in
/// batches.
///
/// Owners are deleted with one `IN` list per chunk of `batch_size`. Returns the number of
/// rows inserted.
pub async fn replace_children<E, C>(
    conn: &C,
    dialect: Dialect,
    owner: E::Column,
    owners: &[Uuid],
    rows: Vec<E::ActiveModel>,
    batch_size: usize,
) -> Result<u64>
where
    E: EntityTrait,
    E::ActiveModel: ActiveModelTrait<Entity = E> + Send,
    E::Model: IntoActiveModel<E::ActiveModel>,
    C: ConnectionTrait,
{
    let mut deleted = 0;
    for chunk in owners.chunks(dialect.batch_rows(batch_size, 1)) {
        deleted += E::delete_many()
            .filter(owner.is_in(chunk.iter().copied()))
            .exec(conn)
            .await?
            .rows_affected;
    }
    tracing::debug!(
        table = %E::default().table_name(),
        owners = owners.len(),
        deleted,
        "Cleared owners before replace"
    );
    insert_batches::<E, C>(conn, dialect, rows, batch_size).await
}

/// Insert `rows` in chunks bounded by the requested batch size and the bind limit.
pub async fn insert_batches<E, C>(
    conn: &C,
    dialect: Dialect,
    rows: Vec<E::ActiveModel>,
    batch_size: usize,
) -> Result<u64>
where
    E: EntityTrait,
    E::ActiveModel: ActiveModelTrait<Entity = E> + Send,
    E::Model: IntoActiveModel<E::ActiveModel>,
    C: ConnectionTrait,
{
    let chunk = dialect.batch_rows(batch_size, E::Column::iter().count());
    let mut rows = rows.into_iter().peekable();
    let mut written = 0u64;

    while rows.peek().is_some() {
        let batch: Vec<E::ActiveModel> = rows.by_ref().take(chunk).collect();
        let len = batch.len() as u64;
        E::insert_many(batch).exec_without_returning(conn).await?;
        written += len;
        tracing::debug!(
            table = %E::default().table_name(),
            rows = len,
            "Flushed insert batch"
        );
    }

    Ok(written)
}

/// Insert-or-update `rows` in batches with the given conflict clause.
pub async fn upsert_batches<E, C>(
    conn: &C,
    dialect: Dialect,
    rows: Vec<E::ActiveModel>,
    batch_size: usize,
    on_conflict: OnConflict,
) -> Result<u64>
where
    E: EntityTrait,
    E::ActiveModel: ActiveModelTrait<Entity = E> + Send,
    E::Model: IntoActiveModel<E::ActiveModel>,
    C: ConnectionTrait,
{
    let chunk = dialect.batch_rows(batch_size, E::Column::iter().count());
    let mut rows = rows.into_iter().peekable();
    let mut written = 0u64;

    while rows.peek().is_some() {
        let batch: Vec<E::ActiveModel> = rows.by_ref().take(chunk).collect();
        let len = batch.len() as u64;
        E::insert_many(batch)
            .on_conflict(on_conflict.clone())
            .exec_without_returning(conn)
            .await?;
        written += len;
    }

    Ok(written)
}

#[cfg(all(test, feature = "sqlite", feature = "migrate"))]
mod tests {
    use sea_orm::{DatabaseConnection, QueryOrder, Set, TransactionTrait};

    use super::*;
    use crate::db::memory_db;
    use crate::entity::prelude::*;

    async fn setup() -> (DatabaseConnection, Uuid) {
        let db = memory_db().await;

        let vehicle_id = Uuid::new_v4();
        Vehicle::insert(VehicleActiveModel {
            id: Set(vehicle_id),
            slug: Set("carrack".to_string()),
            name: Set("Carrack".to_string()),
            ..Default::default()
        })
        .exec_without_returning(&db)
        .await
        .expect("vehicle");
        (db, vehicle_id)
    }

    fn port(vehicle_id: Uuid, id: Uuid, path: &str) -> PortActiveModel {
        PortActiveModel {
            id: Set(id),
            vehicle_id: Set(vehicle_id),
            parent_port_id: Set(None),
            path: Set(path.to_string()),
            name: Set(path.to_string()),
            category: Set(None),
            size_min: Set(None),
            size_max: Set(None),
            equipped_item_uuid: Set(None),
            depth: Set(0),
        }
    }

    async fn paths<C: ConnectionTrait>(conn: &C, vehicle_id: Uuid) -> Vec<String> {
        Port::find()
            .filter(PortColumn::VehicleId.eq(vehicle_id))
            .order_by_asc(PortColumn::Path)
            .all(conn)
            .await
            .expect("ports")
            .into_iter()
            .map(|p| p.path)
            .collect()
    }

    #[tokio::test]
    async fn replaces_children_across_batches() {
        let (db, vehicle_id) = setup().await;
        let old: Vec<_> = ["a", "b"]
            .iter()
            .map(|p| port(vehicle_id, Uuid::new_v4(), p))
            .collect();
        insert_batches::<Port, _>(&db, Dialect::Sqlite, old, 10)
            .await
            .expect("seed");

        let new: Vec<_> = ["c", "d", "e"]
            .iter()
            .map(|p| port(vehicle_id, Uuid::new_v4(), p))
            .collect();
        let txn = db.begin().await.expect("begin");
        let written = scoped_replace::<Port, _>(
            &txn,
            Dialect::Sqlite,
            Condition::all().add(PortColumn::VehicleId.eq(vehicle_id)),
            new,
            2,
        )
        .await
        .expect("replace");
        txn.commit().await.expect("commit");

        assert_eq!(written, 3);
        assert_eq!(paths(&db, vehicle_id).await, vec!["c", "d", "e"]);
    }

    #[tokio::test]
    async fn replaces_children_of_several_owners_together() {
        let (db, carrack) = setup().await;
        let gladius = Uuid::new_v4();
        Vehicle::insert(VehicleActiveModel {
            id: Set(gladius),
            slug: Set("gladius".to_string()),
            name: Set("Gladius".to_string()),
            ..Default::default()
        })
        .exec_without_returning(&db)
        .await
        .expect("vehicle");

        let old = vec![
            port(carrack, Uuid::new_v4(), "a"),
            port(gladius, Uuid::new_v4(), "b"),
        ];
        insert_batches::<Port, _>(&db, Dialect::Sqlite, old, 10)
            .await
            .expect("seed");

        // Gladius loses every port; the owner list still clears it.
        let new = vec![
            port(carrack, Uuid::new_v4(), "c"),
            port(carrack, Uuid::new_v4(), "d"),
        ];
        let txn = db.begin().await.expect("begin");
        let written = replace_children::<Port, _>(
            &txn,
            Dialect::Sqlite,
            PortColumn::VehicleId,
            &[carrack, gladius],
            new,
            1,
        )
        .await
        .expect("replace");
        txn.commit().await.expect("commit");

        assert_eq!(written, 2);
        assert_eq!(paths(&db, carrack).await, vec!["c", "d"]);
        assert!(paths(&db, gladius).await.is_empty());
    }

    #[tokio::test]
    async fn failure_in_a_later_batch_keeps_the_old_set() {
        let (db, vehicle_id) = setup().await;
        let old: Vec<_> = ["a", "b"]
            .iter()
            .map(|p| port(vehicle_id, Uuid::new_v4(), p))
            .collect();
        insert_batches::<Port, _>(&db, Dialect::Sqlite, old, 10)
            .await
            .expect("seed");

        // Batch 1 = [c, d] succeeds; batch 2 repeats c's primary key and fails.
        let dup = Uuid::new_v4();
        let new = vec![
            port(vehicle_id, dup, "c"),
            port(vehicle_id, Uuid::new_v4(), "d"),
            port(vehicle_id, dup, "e"),
        ];

        let txn = db.begin().await.expect("begin");
        let result = scoped_replace::<Port, _>(
            &txn,
            Dialect::Sqlite,
            Condition::all().add(PortColumn::VehicleId.eq(vehicle_id)),
            new,
            2,
        )
        .await;
        assert!(result.is_err(), "duplicate key in batch 2 must fail");
        txn.rollback().await.expect("rollback");

        assert_eq!(paths(&db, vehicle_id).await, vec!["a", "b"]);
    }
}
