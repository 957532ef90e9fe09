//! Intermediate records emitted by source adapters.
//!
//! Every adapter turns its upstream payload into these shapes; the writer only ever sees
//! these, never upstream JSON.

use serde::{Deserialize, Deserializer};

use super::ports::PortArena;

/// Reference to a manufacturer as carried on a vehicle or item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ManufacturerRef {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

/// Reference to a game version, upstream sends either a bare code or an object.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum GameVersionRef {
    Code(String),
    Object {
        #[serde(default)]
        uuid: Option<String>,
        #[serde(default)]
        code: Option<String>,
    },
}

impl GameVersionRef {
    pub fn uuid(&self) -> Option<&str> {
        match self {
            GameVersionRef::Code(_) => None,
            GameVersionRef::Object { uuid, .. } => uuid.as_deref(),
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            GameVersionRef::Code(code) => Some(code),
            GameVersionRef::Object { code, .. } => code.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManufacturerRecord {
    pub uuid: Option<String>,
    /// Normalized slug (identity when `uuid` is absent).
    pub slug: String,
    pub name: String,
    pub code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameVersionRecord {
    pub uuid: Option<String>,
    pub code: String,
    pub channel: Option<String>,
    pub is_default: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VehicleRecord {
    pub uuid: Option<String>,
    pub slug: String,
    pub name: String,
    pub class_name: Option<String>,
    pub size: Option<String>,
    pub role: Option<String>,
    pub length: Option<f64>,
    pub beam: Option<f64>,
    pub height: Option<f64>,
    pub mass: Option<f64>,
    pub cargo_capacity: Option<f64>,
    pub crew_min: Option<i32>,
    pub crew_max: Option<i32>,
    pub scm_speed: Option<f64>,
    pub max_speed: Option<f64>,
    pub manufacturer: Option<ManufacturerRef>,
    pub game_version: Option<GameVersionRef>,
    pub ports: PortArena,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemRecord {
    pub uuid: String,
    pub name: String,
    pub class_name: Option<String>,
    /// Upstream discriminator, routed to a subtype table.
    pub item_type: String,
    pub sub_type: Option<String>,
    pub size: Option<i32>,
    pub grade: Option<String>,
    pub manufacturer: Option<ManufacturerRef>,
    /// The full upstream record.
    pub data: serde_json::Value,
}

/// Size variants of one image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ImageSet {
    #[serde(default)]
    pub small: Option<String>,
    #[serde(default)]
    pub medium: Option<String>,
    #[serde(default)]
    pub large: Option<String>,
}

/// A storefront listing for one vehicle.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreListingRecord {
    /// Display name, resolved to a vehicle.
    pub name: String,
    pub store_url: Option<String>,
    pub pledge_price: Option<f64>,
    pub image_url: Option<String>,
    pub images: ImageSet,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaintRecord {
    pub class_name: String,
    pub name: String,
    /// Vehicle tags, resolved to zero or more vehicles.
    pub tags: Vec<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoanerRecord {
    /// Tag of the pledged vehicle.
    pub vehicle: String,
    /// Tags of the vehicles lent while it is unavailable.
    pub loaners: Vec<String>,
}

/// Image-only update for one vehicle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    pub slug: String,
    pub image_url: Option<String>,
    pub images: ImageSet,
}

/// Records of one category.
#[derive(Debug, Clone, PartialEq)]
pub enum CategoryRecords {
    Manufacturers(Vec<ManufacturerRecord>),
    GameVersions(Vec<GameVersionRecord>),
    Vehicles(Vec<VehicleRecord>),
    Items(Vec<ItemRecord>),
    Store(Vec<StoreListingRecord>),
    Paints(Vec<PaintRecord>),
    Loaners(Vec<LoanerRecord>),
    Images(Vec<ImageRecord>),
}

impl CategoryRecords {
    pub fn len(&self) -> usize {
        match self {
            CategoryRecords::Manufacturers(r) => r.len(),
            CategoryRecords::GameVersions(r) => r.len(),
            CategoryRecords::Vehicles(r) => r.len(),
            CategoryRecords::Items(r) => r.len(),
            CategoryRecords::Store(r) => r.len(),
            CategoryRecords::Paints(r) => r.len(),
            CategoryRecords::Loaners(r) => r.len(),
            CategoryRecords::Images(r) => r.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Everything an adapter produced for one category.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedCategory {
    pub records: CategoryRecords,
    /// Malformed records dropped during decoding.
    pub skipped: usize,
}

/// Deserialize a string that upstream sometimes sends as a number.
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Log a skipped record with a truncated copy of its payload.
pub(crate) fn warn_skipped(kind: &str, raw: &serde_json::Value, error: &dyn std::fmt::Display) {
    const MAX_PAYLOAD_CHARS: usize = 300;
    let payload: String = raw.to_string().chars().take(MAX_PAYLOAD_CHARS).collect();
    tracing::warn!(kind, error = %error, payload = %payload, "Skipping malformed record");
}
