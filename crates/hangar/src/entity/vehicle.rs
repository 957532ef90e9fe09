//! Vehicle entity - the canonical union of "ship" across all sources.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Vehicle model.
///
/// `slug` is the primary matching key across sources. Image and store columns are written
/// only by the storefront and image adapters and are never cleared by the others.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "vehicles")]
pub struct Model {
    /// Internal UUID primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Upstream stable id.
    pub uuid: Option<String>,
    #[sea_orm(unique)]
    pub slug: String,
    pub name: String,
    pub class_name: Option<String>,

    // ─── Classification ─────────────────────────────────────────────────────
    pub size: Option<String>,
    pub role: Option<String>,

    // ─── Dimensions & Performance ───────────────────────────────────────────
    pub length: Option<f64>,
    pub beam: Option<f64>,
    pub height: Option<f64>,
    pub mass: Option<f64>,
    pub cargo_capacity: Option<f64>,
    pub crew_min: Option<i32>,
    pub crew_max: Option<i32>,
    pub scm_speed: Option<f64>,
    pub max_speed: Option<f64>,

    // ─── Foreign Keys ───────────────────────────────────────────────────────
    pub manufacturer_id: Option<Uuid>,
    pub game_version_id: Option<Uuid>,

    // ─── Images & Store ─────────────────────────────────────────────────────
    #[sea_orm(column_type = "Text", nullable)]
    pub image_url: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub image_small: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub image_medium: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub image_large: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub store_url: Option<String>,
    pub pledge_price: Option<f64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::manufacturer::Entity",
        from = "Column::ManufacturerId",
        to = "super::manufacturer::Column::Id"
    )]
    Manufacturer,
    #[sea_orm(has_many = "super::port::Entity")]
    Ports,
}

impl Related<super::manufacturer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Manufacturer.def()
    }
}

impl Related<super::port::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Ports.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
