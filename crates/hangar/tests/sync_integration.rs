//! End-to-end sync runs against mocked upstreams and an in-memory store.

#![cfg(all(feature = "sqlite", feature = "migrate"))]

mod common;

use std::time::Duration;

use hangar::http::MockTransport;
use hangar::source::{CategoryRecords, ImageSet, LoanerRecord, PaintRecord, StoreListingRecord};
use hangar::sync::{Category, SyncError, SyncScope};
use hangar::{
    GameVersion, Manufacturer, ManufacturerColumn, Paint, PaintColumn, PaintVehicle,
    PaintVehicleColumn, Port, PortColumn, SyncHistory, SyncHistoryColumn, SyncStatus, Vehicle,
    VehicleColumn, VehicleLoaner, VehicleModel,
};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use common::*;

/// If a run takes longer than this, something is hung.
const RUN_TIMEOUT: Duration = Duration::from_secs(10);

async fn vehicle(db: &DatabaseConnection, slug: &str) -> VehicleModel {
    Vehicle::find()
        .filter(VehicleColumn::Slug.eq(slug))
        .one(db)
        .await
        .expect("query")
        .unwrap_or_else(|| panic!("vehicle {slug} missing"))
}

async fn manufacturer_id(db: &DatabaseConnection, slug: &str) -> Uuid {
    Manufacturer::find()
        .filter(ManufacturerColumn::Slug.eq(slug))
        .one(db)
        .await
        .expect("query")
        .unwrap_or_else(|| panic!("manufacturer {slug} missing"))
        .id
}

#[derive(Debug, PartialEq)]
struct Snapshot {
    manufacturers: Vec<hangar::ManufacturerModel>,
    game_versions: Vec<hangar::GameVersionModel>,
    vehicles: Vec<VehicleModel>,
    ports: Vec<hangar::PortModel>,
    components: u64,
    weapons: u64,
}

async fn snapshot(db: &DatabaseConnection) -> Snapshot {
    Snapshot {
        manufacturers: Manufacturer::find()
            .order_by_asc(ManufacturerColumn::Slug)
            .all(db)
            .await
            .expect("manufacturers"),
        game_versions: GameVersion::find().all(db).await.expect("game versions"),
        vehicles: Vehicle::find()
            .order_by_asc(VehicleColumn::Slug)
            .all(db)
            .await
            .expect("vehicles"),
        ports: Port::find()
            .order_by_asc(PortColumn::Id)
            .all(db)
            .await
            .expect("ports"),
        components: count_rows(db, "vehicle_components").await,
        weapons: count_rows(db, "fps_weapons").await,
    }
}

#[tokio::test]
async fn carrack_links_to_previously_synced_manufacturer() {
    let db = memory_db().await;
    let transport = MockTransport::new();
    serve_page(
        &transport,
        WIKI,
        "manufacturers",
        json!([{"uuid": "m1", "slug": "anvil", "name": "Anvil Aerospace"}]),
    );
    serve_page(
        &transport,
        WIKI,
        "vehicles",
        json!([{"uuid": "v1", "slug": "carrack", "name": "Carrack", "manufacturer": {"uuid": "m1"}}]),
    );
    let engine = engine(db.clone(), &transport);
    let cancel = CancellationToken::new();

    let first = engine
        .run(SyncScope::Only(Category::Manufacturers), &cancel)
        .await
        .expect("manufacturers run");
    assert!(first.is_success());
    let second = engine
        .run(SyncScope::Only(Category::Vehicles), &cancel)
        .await
        .expect("vehicles run");
    assert!(second.is_success());

    let carrack = vehicle(&db, "carrack").await;
    assert_eq!(carrack.manufacturer_id, Some(manufacturer_id(&db, "anvil").await));
    assert_eq!(carrack.uuid.as_deref(), Some("v1"));
}

#[tokio::test]
async fn second_full_run_is_idempotent() {
    let db = memory_db().await;
    let transport = MockTransport::new();
    serve_wiki(&transport);
    serve_page(
        &transport,
        LEGACY,
        "vehicles",
        json!([{"slug": "carrack", "image": "https://img.test/carrack.jpg"}]),
    );
    let engine = engine(db.clone(), &transport);
    let cancel = CancellationToken::new();

    let first = tokio::time::timeout(RUN_TIMEOUT, engine.run(SyncScope::All, &cancel))
        .await
        .expect("run timed out")
        .expect("first run");
    let before = snapshot(&db).await;

    let second = tokio::time::timeout(RUN_TIMEOUT, engine.run(SyncScope::All, &cancel))
        .await
        .expect("run timed out")
        .expect("second run");
    let after = snapshot(&db).await;

    assert_eq!(before, after);
    assert_eq!(after.vehicles.len(), 3);
    assert_eq!(after.ports.len(), 4);
    assert_eq!(after.components, 1);
    assert_eq!(after.weapons, 1);

    for category in [
        Category::Manufacturers,
        Category::GameVersions,
        Category::Vehicles,
        Category::Items,
        Category::Images,
    ] {
        let a = first.outcome(category).expect("first outcome");
        let b = second.outcome(category).expect("second outcome");
        assert_eq!(a.status, SyncStatus::Success, "{category}");
        assert_eq!(a.counts, b.counts, "{category}");
    }

    let rows = SyncHistory::find()
        .filter(SyncHistoryColumn::RunId.eq(second.run_id))
        .filter(SyncHistoryColumn::Category.eq("items"))
        .all(&db)
        .await
        .expect("history");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].record_count, 2);
    // Flair_Cockpit has no table.
    assert_eq!(rows[0].skipped_count, 1);
}

#[tokio::test]
async fn item_failure_is_isolated() {
    let db = memory_db().await;
    let transport = MockTransport::new();
    serve_page(&transport, WIKI, "manufacturers", manufacturers());
    serve_page(&transport, WIKI, "game-versions", game_versions());
    serve_page(&transport, WIKI, "vehicles", vehicles());
    fail_page(&transport, WIKI, "items");
    let engine = engine(db.clone(), &transport);

    let report = engine
        .run(SyncScope::All, &CancellationToken::new())
        .await
        .expect("run");

    for category in [Category::Manufacturers, Category::GameVersions, Category::Vehicles] {
        assert_eq!(
            report.outcome(category).map(|o| o.status),
            Some(SyncStatus::Success),
            "{category}"
        );
    }
    let items = report.outcome(Category::Items).expect("items outcome");
    assert_eq!(items.status, SyncStatus::Error);
    assert!(items.error.as_deref().is_some_and(|e| e.contains("500")));

    // Vehicles stay queryable and images still ran (its dependency succeeded).
    assert_eq!(vehicle(&db, "carrack").await.name, "Carrack");
    assert_ne!(
        report.outcome(Category::Images).map(|o| o.status),
        Some(SyncStatus::Skipped)
    );

    let status = engine.status().await.expect("status");
    let items_status = status
        .iter()
        .find(|s| s.endpoint == "items")
        .expect("items status");
    assert_eq!(items_status.status, SyncStatus::Error);
    assert!(items_status.error_message.is_some());
}

#[tokio::test]
async fn image_sync_preserves_unrelated_fields() {
    let db = memory_db().await;
    let transport = MockTransport::new();
    serve_wiki(&transport);
    serve_page(
        &transport,
        LEGACY,
        "vehicles",
        json!([
            {"slug": "carrack", "image_url": "https://img.test/carrack.jpg",
             "images": {"small": "https://img.test/carrack-s.jpg", "large": ""}},
            {"name": "Aurora MR", "image_url": ""}
        ]),
    );
    let engine = engine(db.clone(), &transport);
    let cancel = CancellationToken::new();

    for category in [Category::Manufacturers, Category::Vehicles] {
        engine
            .run(SyncScope::Only(category), &cancel)
            .await
            .expect("seed run");
    }
    let before = vehicle(&db, "carrack").await;
    assert!(before.manufacturer_id.is_some());

    let report = engine
        .run(SyncScope::Only(Category::Images), &cancel)
        .await
        .expect("images run");
    assert!(report.is_success());

    let after = vehicle(&db, "carrack").await;
    assert_eq!(after.name, before.name);
    assert_eq!(after.manufacturer_id, before.manufacturer_id);
    assert_eq!(after.length, before.length);
    assert_eq!(after.image_url.as_deref(), Some("https://img.test/carrack.jpg"));
    assert_eq!(after.image_small.as_deref(), Some("https://img.test/carrack-s.jpg"));
    assert_eq!(after.image_large, None);

    // A later vehicle sync does not clear the images.
    engine
        .run(SyncScope::Only(Category::Vehicles), &cancel)
        .await
        .expect("vehicles again");
    let again = vehicle(&db, "carrack").await;
    assert_eq!(again.image_url, after.image_url);
    assert_eq!(again.image_small, after.image_small);
}

#[tokio::test]
async fn empty_upstream_values_do_not_clear_vehicle_columns() {
    let db = memory_db().await;
    let transport = MockTransport::new();
    serve_wiki(&transport);
    let engine = engine(db.clone(), &transport);
    let cancel = CancellationToken::new();
    for category in [Category::Manufacturers, Category::Vehicles] {
        engine
            .run(SyncScope::Only(category), &cancel)
            .await
            .expect("seed run");
    }

    let sparse = MockTransport::new();
    serve_page(
        &sparse,
        WIKI,
        "vehicles",
        json!([{"slug": "carrack", "name": "Carrack", "focus": "", "ports": []}]),
    );
    let sparse_engine = common::engine(db.clone(), &sparse);
    sparse_engine
        .run(SyncScope::Only(Category::Vehicles), &cancel)
        .await
        .expect("sparse run");

    let carrack = vehicle(&db, "carrack").await;
    assert_eq!(carrack.role.as_deref(), Some("Expedition"));
    assert_eq!(carrack.length, Some(126.5));
    assert!(carrack.manufacturer_id.is_some());
    // Child collections are replaced, not merged.
    let ports = Port::find()
        .filter(PortColumn::VehicleId.eq(carrack.id))
        .all(&db)
        .await
        .expect("ports");
    assert!(ports.is_empty());
}

#[tokio::test]
async fn overlapping_runs_are_rejected() {
    let db = memory_db().await;
    let transport = MockTransport::new();
    serve_wiki(&transport);
    let engine = engine(db.clone(), &transport);

    let accepted = engine
        .trigger(SyncScope::Only(Category::Manufacturers))
        .expect("first trigger accepted");
    assert_eq!(accepted.categories, vec![Category::Manufacturers]);
    assert!(engine.is_running());

    let err = engine
        .trigger(SyncScope::All)
        .err()
        .expect("second trigger rejected");
    assert!(matches!(err, SyncError::AlreadyRunning));

    let run_id = accepted.run_id;
    let report = tokio::time::timeout(RUN_TIMEOUT, accepted.join())
        .await
        .expect("run timed out")
        .expect("join");
    assert_eq!(report.run_id, run_id);
    assert!(report.is_success());
    assert!(!engine.is_running());

    // The guard is released: a new run is accepted.
    engine
        .run(SyncScope::Only(Category::GameVersions), &CancellationToken::new())
        .await
        .expect("run after release");
}

#[tokio::test]
async fn cancelled_run_stops_before_the_next_category() {
    let db = memory_db().await;
    let transport = MockTransport::new();
    serve_wiki(&transport);
    let engine = engine(db.clone(), &transport);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = engine.run(SyncScope::All, &cancel).await.expect("run");
    assert!(report.cancelled);
    assert!(report.outcomes.is_empty());
    assert!(!report.is_success());
}

fn paint(class_name: &str, name: &str, tags: &[&str]) -> PaintRecord {
    PaintRecord {
        class_name: class_name.to_string(),
        name: name.to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        description: None,
    }
}

/// Slugs of the vehicles linked to a paint, sorted.
async fn painted_slugs(db: &DatabaseConnection, class_name: &str) -> Vec<String> {
    let paint = Paint::find()
        .filter(PaintColumn::ClassName.eq(class_name))
        .one(db)
        .await
        .expect("query")
        .unwrap_or_else(|| panic!("paint {class_name} missing"));
    let links = PaintVehicle::find()
        .filter(PaintVehicleColumn::PaintId.eq(paint.id))
        .all(db)
        .await
        .expect("links");
    let mut slugs = Vec::new();
    for link in links {
        let vehicle = Vehicle::find_by_id(link.vehicle_id)
            .one(db)
            .await
            .expect("query")
            .expect("linked vehicle");
        slugs.push(vehicle.slug);
    }
    slugs.sort();
    slugs
}

#[tokio::test]
async fn paint_tags_link_every_matching_vehicle() {
    let db = memory_db().await;
    seed_fleet(&db).await;

    let counts = writer(&db)
        .write(&CategoryRecords::Paints(vec![
            paint("Paint_Hornet_Ghost", "Ghost", &["hornet"]),
            paint("Paint_Carrack", "Stealth", &[]),
            paint("Paint_Idris_Black", "Black", &["idris_p"]),
        ]))
        .await
        .expect("paints");

    assert_eq!(counts.records, 3);
    assert_eq!(counts.unmatched, 1);
    assert_eq!(
        painted_slugs(&db, "Paint_Hornet_Ghost").await,
        vec!["f7c-hornet-mk-ii", "f7c-m-super-hornet"]
    );
    // Untagged paints match on their class name.
    assert_eq!(painted_slugs(&db, "Paint_Carrack").await, vec!["carrack"]);
    // Unmatched paints are kept, without links.
    assert!(painted_slugs(&db, "Paint_Idris_Black").await.is_empty());
    assert_eq!(count_rows(&db, "paint_vehicles").await, 3);
}

#[tokio::test]
async fn paint_resync_replaces_links() {
    let db = memory_db().await;
    seed_fleet(&db).await;
    let writer = writer(&db);

    writer
        .write(&CategoryRecords::Paints(vec![
            paint("Paint_Hornet_Ghost", "Ghost", &["hornet"]),
            paint("Paint_Pisces_Sand", "Sand", &["c8_pisces"]),
        ]))
        .await
        .expect("first paints");
    let ghost_before = Paint::find()
        .filter(PaintColumn::ClassName.eq("Paint_Hornet_Ghost"))
        .one(&db)
        .await
        .expect("query")
        .expect("ghost");

    let counts = writer
        .write(&CategoryRecords::Paints(vec![
            paint("Paint_Hornet_Ghost", "Ghost Mk II", &["f7c_m"]),
            paint("Paint_Pisces_Sand", "Sand", &["nothing_matches"]),
        ]))
        .await
        .expect("second paints");

    assert_eq!(counts.unmatched, 1);
    assert_eq!(
        painted_slugs(&db, "Paint_Hornet_Ghost").await,
        vec!["f7c-m-super-hornet"]
    );
    assert!(painted_slugs(&db, "Paint_Pisces_Sand").await.is_empty());
    assert_eq!(count_rows(&db, "paint_vehicles").await, 1);

    let ghost_after = Paint::find_by_id(ghost_before.id)
        .one(&db)
        .await
        .expect("query")
        .expect("ghost keeps its id");
    assert_eq!(ghost_after.name, "Ghost Mk II");
    assert_eq!(count_rows(&db, "paints").await, 2);
}

#[tokio::test]
async fn loaners_replace_the_whole_table() {
    let db = memory_db().await;
    seed_fleet(&db).await;
    let writer = writer(&db);

    let counts = writer
        .write(&CategoryRecords::Loaners(vec![
            LoanerRecord {
                vehicle: "carrack".to_string(),
                loaners: vec!["c8_pisces".to_string(), "ursa".to_string()],
            },
            LoanerRecord {
                vehicle: "aurora".to_string(),
                loaners: vec!["carrack".to_string()],
            },
            LoanerRecord {
                vehicle: "javelin".to_string(),
                loaners: vec!["carrack".to_string()],
            },
        ]))
        .await
        .expect("loaners");
    assert_eq!(counts.records, 2);
    // One missing loaner tag, one unknown pledged vehicle.
    assert_eq!(counts.unmatched, 2);
    assert_eq!(count_rows(&db, "vehicle_loaners").await, 2);

    writer
        .write(&CategoryRecords::Loaners(vec![LoanerRecord {
            vehicle: "f7c_m".to_string(),
            loaners: vec!["f7c-hornet-mk-ii".to_string()],
        }]))
        .await
        .expect("second loaners");

    let rows = VehicleLoaner::find().all(&db).await.expect("loaners");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].vehicle_id, vehicle(&db, "f7c-m-super-hornet").await.id);
    assert_eq!(rows[0].loaner_id, vehicle(&db, "f7c-hornet-mk-ii").await.id);
}

#[tokio::test]
async fn store_listing_merge_keeps_existing_columns() {
    let db = memory_db().await;
    seed_fleet(&db).await;
    let writer = writer(&db);
    let before = vehicle(&db, "carrack").await;

    let counts = writer
        .write(&CategoryRecords::Store(vec![
            StoreListingRecord {
                name: "Carrack".to_string(),
                store_url: Some("https://store.test/carrack".to_string()),
                pledge_price: Some(600.0),
                image_url: Some("https://img.test/carrack.jpg".to_string()),
                images: ImageSet {
                    small: Some("https://img.test/carrack-s.jpg".to_string()),
                    ..Default::default()
                },
            },
            StoreListingRecord {
                name: "Javelin".to_string(),
                store_url: Some("https://store.test/javelin".to_string()),
                pledge_price: Some(3000.0),
                image_url: None,
                images: ImageSet::default(),
            },
        ]))
        .await
        .expect("store");
    assert_eq!(counts.records, 1);
    assert_eq!(counts.unmatched, 1);

    writer
        .write(&CategoryRecords::Store(vec![StoreListingRecord {
            name: "Carrack".to_string(),
            store_url: None,
            pledge_price: None,
            image_url: Some(String::new()),
            images: ImageSet {
                medium: Some("https://img.test/carrack-m.jpg".to_string()),
                ..Default::default()
            },
        }]))
        .await
        .expect("sparse store");

    let after = vehicle(&db, "carrack").await;
    assert_eq!(after.store_url.as_deref(), Some("https://store.test/carrack"));
    assert_eq!(after.pledge_price, Some(600.0));
    assert_eq!(after.image_url.as_deref(), Some("https://img.test/carrack.jpg"));
    assert_eq!(after.image_small.as_deref(), Some("https://img.test/carrack-s.jpg"));
    assert_eq!(after.image_medium.as_deref(), Some("https://img.test/carrack-m.jpg"));
    assert_eq!(after.name, before.name);
    assert_eq!(after.manufacturer_id, before.manufacturer_id);
    assert_eq!(count_rows(&db, "vehicles").await, 5);
}

#[tokio::test]
async fn manufacturer_uuid_change_keeps_the_row() {
    let db = memory_db().await;
    let transport = MockTransport::new();
    serve_page(&transport, WIKI, "manufacturers", manufacturers());
    let cancel = CancellationToken::new();
    engine(db.clone(), &transport)
        .run(SyncScope::Only(Category::Manufacturers), &cancel)
        .await
        .expect("first run");
    let anvil = manufacturer_id(&db, "anvil").await;

    let renumbered = MockTransport::new();
    serve_page(
        &renumbered,
        WIKI,
        "manufacturers",
        json!([{"uuid": "m9", "slug": "anvil", "name": "Anvil Aerospace"}]),
    );
    let report = engine(db.clone(), &renumbered)
        .run(SyncScope::Only(Category::Manufacturers), &cancel)
        .await
        .expect("second run");
    assert!(report.is_success());

    let rows = Manufacturer::find()
        .filter(ManufacturerColumn::Slug.eq("anvil"))
        .all(&db)
        .await
        .expect("query");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, anvil);
    assert_eq!(rows[0].uuid.as_deref(), Some("m9"));
}
