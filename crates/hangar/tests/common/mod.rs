//! Shared fixtures for integration tests.
//!
//! Upstreams are served by an in-memory [`MockTransport`]; the store is a fresh
//! in-memory SQLite database per test.

#![allow(dead_code)]

use std::sync::Arc;

use hangar::fetch::{ApiRateLimiter, FetchClient, page_url};
use hangar::http::{HttpMethod, HttpResponse, MockTransport};
use hangar::resolve::AliasTable;
use hangar::retry::RetryConfig;
use hangar::source::{LegacyConfig, LegacyImageSource, WikiConfig, WikiSource};
use hangar::store::StoreWriter;
use hangar::sync::{Category, SyncEngine, SyncOptions, SyncScope};
use sea_orm::{ConnectionTrait, DatabaseConnection, Statement};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

pub const WIKI: &str = "https://wiki.test/api/v2";
pub const LEGACY: &str = "https://legacy.test/api";
pub const PAGE_SIZE: u32 = 100;

pub async fn memory_db() -> DatabaseConnection {
    hangar::connect_and_migrate("sqlite::memory:")
        .await
        .expect("Failed to create test database")
}

/// Rows currently in `table`.
pub async fn count_rows(db: &DatabaseConnection, table: &str) -> u64 {
    let row = db
        .query_one(Statement::from_string(
            db.get_database_backend(),
            format!("SELECT COUNT(*) AS n FROM {table}"),
        ))
        .await
        .expect("count query")
        .expect("count row");
    row.try_get::<i64>("", "n").expect("count column") as u64
}

/// Writer with the default alias table, for categories whose upstream is not mocked.
pub fn writer(db: &DatabaseConnection) -> StoreWriter {
    StoreWriter::new(
        db.clone(),
        2,
        RetryConfig::default().with_jitter(false),
        AliasTable::default(),
    )
}

pub fn client(transport: &MockTransport) -> FetchClient {
    FetchClient::new(Arc::new(transport.clone()), ApiRateLimiter::unlimited())
}

/// Serve `data` as the single page of `{base}/{path}`.
pub fn serve_page(transport: &MockTransport, base: &str, path: &str, data: Value) {
    transport.push_json(
        page_url(&format!("{base}/{path}"), 1, PAGE_SIZE).expect("page url"),
        &json!({"data": data, "meta": {"current_page": 1, "last_page": 1, "per_page": PAGE_SIZE}}),
    );
}

/// Make every request for `{base}/{path}` fail with a 500.
pub fn fail_page(transport: &MockTransport, base: &str, path: &str) {
    transport.push_response(
        HttpMethod::Get,
        page_url(&format!("{base}/{path}"), 1, PAGE_SIZE).expect("page url"),
        HttpResponse::json(500, &json!({"message": "Server Error"})),
    );
}

pub fn wiki(transport: &MockTransport) -> WikiSource {
    WikiSource::new(
        client(transport),
        WikiConfig {
            base_url: WIKI.to_string(),
            page_size: PAGE_SIZE,
        },
    )
}

pub fn legacy(transport: &MockTransport) -> LegacyImageSource {
    LegacyImageSource::new(client(transport), LegacyConfig::new(LEGACY))
}

/// Engine over the wiki and legacy image sources.
pub fn engine(db: DatabaseConnection, transport: &MockTransport) -> SyncEngine {
    SyncEngine::builder()
        .database(db)
        .source(Arc::new(wiki(transport)))
        .source(Arc::new(legacy(transport)))
        .options(SyncOptions::default())
        .build()
        .expect("engine")
}

pub fn manufacturers() -> Value {
    json!([
        {"uuid": "m1", "slug": "anvil", "name": "Anvil Aerospace", "code": "ANVL"},
        {"uuid": "m2", "name": "Roberts Space Industries", "code": "RSIN"}
    ])
}

pub fn game_versions() -> Value {
    json!([
        {"uuid": "gv1", "code": "4.0.1-LIVE", "channel": "LIVE", "is_default": true}
    ])
}

pub fn vehicles() -> Value {
    json!([
        {
            "uuid": "v1", "slug": "carrack", "name": "Carrack",
            "manufacturer": {"uuid": "m1"},
            "game_version": "4.0.1-LIVE",
            "size": "large", "focus": "Expedition",
            "sizes": {"length": 126.5, "beam": 76.5, "height": 30},
            "crew": {"min": 4, "max": 6},
            "ports": [
                {"name": "hardpoint_turret_top", "ports": [{"name": "gun"}, {"name": "gun"}]},
                {"name": "hardpoint_shield"}
            ]
        },
        {
            "uuid": "v2", "slug": "aurora-mr", "name": "Aurora MR",
            "manufacturer": {"slug": "roberts-space-industries"}
        },
        {
            "uuid": "v3", "slug": "f7c-hornet-mk-ii", "name": "F7C Hornet Mk II",
            "manufacturer": {"uuid": "m1"}
        }
    ])
}

pub fn items() -> Value {
    json!([
        {"uuid": "i1", "name": "Panther Repeater", "type": "WeaponGun", "size": 3,
         "manufacturer": {"name": "Anvil Aerospace"}},
        {"uuid": "i2", "name": "P4-AR", "type": "WeaponPersonal", "grade": 1},
        {"uuid": "i3", "name": "Cockpit Bobblehead", "type": "Flair_Cockpit"}
    ])
}

/// Serve every wiki category from the fixtures above.
pub fn serve_wiki(transport: &MockTransport) {
    serve_page(transport, WIKI, "manufacturers", manufacturers());
    serve_page(transport, WIKI, "game-versions", game_versions());
    serve_page(transport, WIKI, "vehicles", vehicles());
    serve_page(transport, WIKI, "items", items());
}

/// Vehicles that paint, loaner and storefront records resolve against.
pub fn fleet() -> Value {
    json!([
        {"uuid": "v1", "slug": "carrack", "name": "Carrack", "manufacturer": {"uuid": "m1"}},
        {"uuid": "v2", "slug": "aurora-mr", "name": "Aurora MR"},
        {"uuid": "v3", "slug": "f7c-hornet-mk-ii", "name": "F7C Hornet Mk II"},
        {"uuid": "v4", "slug": "f7c-m-super-hornet", "name": "F7C-M Super Hornet"},
        {"uuid": "v5", "slug": "c8-pisces", "name": "C8 Pisces"}
    ])
}

/// Sync manufacturers and the [`fleet`] vehicles into `db`.
pub async fn seed_fleet(db: &DatabaseConnection) {
    let transport = MockTransport::new();
    serve_page(&transport, WIKI, "manufacturers", manufacturers());
    serve_page(&transport, WIKI, "vehicles", fleet());
    let engine = engine(db.clone(), &transport);
    let cancel = CancellationToken::new();
    for category in [Category::Manufacturers, Category::Vehicles] {
        let report = engine
            .run(SyncScope::Only(category), &cancel)
            .await
            .expect("seed run");
        assert!(report.is_success(), "seeding {category} failed");
    }
}
