//! Paginated REST adapter for the wiki API.
//!
//! Serves manufacturers, game versions, vehicles (with their port trees) and items.
//! A record that fails to decode is logged and skipped; it never aborts its page.

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::fetch::{DEFAULT_PAGE_SIZE, FetchClient};
use crate::resolve::normalize;
use crate::sync::Category;

use super::error::{Result, SourceError};
use super::ports::PortArena;
use super::types::{
    CategoryRecords, FetchedCategory, GameVersionRecord, GameVersionRef, ItemRecord,
    ManufacturerRecord, ManufacturerRef, VehicleRecord, lenient_string, warn_skipped,
};
use super::SourceAdapter;

/// Default wiki API root.
pub const DEFAULT_WIKI_BASE_URL: &str = "https://api.star-citizen.wiki/api/v2";

const CATEGORIES: &[Category] = &[
    Category::Manufacturers,
    Category::GameVersions,
    Category::Vehicles,
    Category::Items,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikiConfig {
    pub base_url: String,
    pub page_size: u32,
}

impl Default for WikiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_WIKI_BASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Adapter for the paginated wiki API.
pub struct WikiSource {
    client: FetchClient,
    config: WikiConfig,
}

impl WikiSource {
    pub fn new(client: FetchClient, config: WikiConfig) -> Self {
        Self { client, config }
    }

    /// Listing URL for a category.
    pub fn endpoint(&self, category: Category) -> Option<String> {
        let path = match category {
            Category::Manufacturers => "manufacturers",
            Category::GameVersions => "game-versions",
            Category::Vehicles => "vehicles",
            Category::Items => "items",
            _ => return None,
        };
        Some(format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path
        ))
    }
}

#[async_trait]
impl SourceAdapter for WikiSource {
    fn name(&self) -> &'static str {
        "wiki"
    }

    fn categories(&self) -> &'static [Category] {
        CATEGORIES
    }

    async fn fetch_category(
        &self,
        category: Category,
        cancel: &CancellationToken,
    ) -> Result<FetchedCategory> {
        let url = self
            .endpoint(category)
            .ok_or(SourceError::UnsupportedCategory {
                source_name: self.name(),
                category,
            })?;
        let raw = self
            .client
            .fetch_paginated(&url, self.config.page_size, cancel)
            .await?;

        let fetched = match category {
            Category::Manufacturers => {
                let (records, skipped) = decode_all(&raw, "manufacturer", manufacturer_record);
                FetchedCategory {
                    records: CategoryRecords::Manufacturers(records),
                    skipped,
                }
            }
            Category::GameVersions => {
                let (records, skipped) = decode_all(&raw, "game_version", game_version_record);
                FetchedCategory {
                    records: CategoryRecords::GameVersions(records),
                    skipped,
                }
            }
            Category::Vehicles => {
                let (records, skipped) = decode_all(&raw, "vehicle", vehicle_record);
                let dropped_ports: usize = records.iter().map(|v| v.ports.dropped).sum();
                FetchedCategory {
                    records: CategoryRecords::Vehicles(records),
                    skipped: skipped + dropped_ports,
                }
            }
            Category::Items => {
                let (records, skipped) = decode_all(&raw, "item", item_record);
                FetchedCategory {
                    records: CategoryRecords::Items(records),
                    skipped,
                }
            }
            _ => {
                return Err(SourceError::UnsupportedCategory {
                    source_name: self.name(),
                    category,
                });
            }
        };

        Ok(fetched)
    }
}

/// Decode every raw record, skipping (and counting) the malformed ones.
fn decode_all<W, T>(
    raw: &[serde_json::Value],
    kind: &str,
    convert: impl Fn(W, &serde_json::Value) -> std::result::Result<T, String>,
) -> (Vec<T>, usize)
where
    W: DeserializeOwned,
{
    let mut records = Vec::with_capacity(raw.len());
    let mut skipped = 0;
    for value in raw {
        let decoded = W::deserialize(value)
            .map_err(|e| e.to_string())
            .and_then(|wire| convert(wire, value));
        match decoded {
            Ok(record) => records.push(record),
            Err(error) => {
                warn_skipped(kind, value, &error);
                skipped += 1;
            }
        }
    }
    (records, skipped)
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

// ─── Wire formats ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct WikiManufacturer {
    #[serde(default)]
    uuid: Option<String>,
    #[serde(default)]
    slug: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

fn manufacturer_record(
    wire: WikiManufacturer,
    _raw: &serde_json::Value,
) -> std::result::Result<ManufacturerRecord, String> {
    let name = non_empty(wire.name);
    let slug = non_empty(wire.slug)
        .or_else(|| name.clone())
        .map(|s| normalize(&s))
        .filter(|s| !s.is_empty())
        .ok_or("manufacturer has neither slug nor name")?;
    Ok(ManufacturerRecord {
        uuid: non_empty(wire.uuid),
        name: name.unwrap_or_else(|| slug.clone()),
        slug,
        code: non_empty(wire.code),
    })
}

#[derive(Debug, Deserialize)]
struct WikiGameVersion {
    #[serde(default)]
    uuid: Option<String>,
    code: String,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    is_default: bool,
}

fn game_version_record(
    wire: WikiGameVersion,
    _raw: &serde_json::Value,
) -> std::result::Result<GameVersionRecord, String> {
    let code = wire.code.trim().to_string();
    if code.is_empty() {
        return Err("game version code is empty".to_string());
    }
    Ok(GameVersionRecord {
        uuid: non_empty(wire.uuid),
        code,
        channel: non_empty(wire.channel),
        is_default: wire.is_default,
    })
}

#[derive(Debug, Default, Deserialize)]
struct WikiSizes {
    #[serde(default)]
    length: Option<f64>,
    #[serde(default)]
    beam: Option<f64>,
    #[serde(default)]
    height: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct WikiCrew {
    #[serde(default)]
    min: Option<i32>,
    #[serde(default)]
    max: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
struct WikiSpeed {
    #[serde(default)]
    scm: Option<f64>,
    #[serde(default)]
    max: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WikiVehicle {
    #[serde(default)]
    uuid: Option<String>,
    #[serde(default)]
    slug: Option<String>,
    name: String,
    #[serde(default)]
    class_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    size: Option<String>,
    #[serde(default, alias = "focus")]
    role: Option<String>,
    #[serde(default)]
    sizes: WikiSizes,
    #[serde(default)]
    mass: Option<f64>,
    #[serde(default, alias = "cargo")]
    cargo_capacity: Option<f64>,
    #[serde(default)]
    crew: WikiCrew,
    #[serde(default)]
    speed: WikiSpeed,
    #[serde(default)]
    manufacturer: Option<ManufacturerRef>,
    #[serde(default)]
    game_version: Option<GameVersionRef>,
}

fn vehicle_record(
    wire: WikiVehicle,
    raw: &serde_json::Value,
) -> std::result::Result<VehicleRecord, String> {
    let name = wire.name.trim().to_string();
    let slug = non_empty(wire.slug)
        .map(|s| normalize(&s))
        .unwrap_or_else(|| normalize(&name));
    if slug.is_empty() {
        return Err("vehicle has neither slug nor name".to_string());
    }
    let ports = raw
        .get("ports")
        .map(PortArena::flatten)
        .unwrap_or_default();

    Ok(VehicleRecord {
        uuid: non_empty(wire.uuid),
        slug,
        name,
        class_name: non_empty(wire.class_name),
        size: wire.size,
        role: non_empty(wire.role),
        length: wire.sizes.length,
        beam: wire.sizes.beam,
        height: wire.sizes.height,
        mass: wire.mass,
        cargo_capacity: wire.cargo_capacity,
        crew_min: wire.crew.min,
        crew_max: wire.crew.max,
        scm_speed: wire.speed.scm,
        max_speed: wire.speed.max,
        manufacturer: wire.manufacturer,
        game_version: wire.game_version,
        ports,
    })
}

#[derive(Debug, Deserialize)]
struct WikiItem {
    uuid: String,
    name: String,
    #[serde(default)]
    class_name: Option<String>,
    #[serde(rename = "type")]
    item_type: String,
    #[serde(default)]
    sub_type: Option<String>,
    #[serde(default)]
    size: Option<i32>,
    #[serde(default, deserialize_with = "lenient_string")]
    grade: Option<String>,
    #[serde(default)]
    manufacturer: Option<ManufacturerRef>,
}

fn item_record(wire: WikiItem, raw: &serde_json::Value) -> std::result::Result<ItemRecord, String> {
    if wire.uuid.trim().is_empty() {
        return Err("item uuid is empty".to_string());
    }
    Ok(ItemRecord {
        uuid: wire.uuid.trim().to_string(),
        name: wire.name,
        class_name: non_empty(wire.class_name),
        item_type: wire.item_type,
        sub_type: non_empty(wire.sub_type),
        size: wire.size,
        grade: wire.grade,
        manufacturer: wire.manufacturer,
        data: raw.clone(),
    })
}
