//! Port (hardpoint) entity.
//!
//! Ports form a tree under their vehicle, stored as an adjacency list through
//! `parent_port_id`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ports")]
pub struct Model {
    /// Deterministic id derived from the owning vehicle and `path`.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub vehicle_id: Uuid,
    pub parent_port_id: Option<Uuid>,
    /// Slash-separated position of this port in the tree (e.g. `hardpoint_nose/0`).
    pub path: String,
    pub name: String,
    pub category: Option<String>,
    pub size_min: Option<i32>,
    pub size_max: Option<i32>,
    pub equipped_item_uuid: Option<String>,
    pub depth: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::vehicle::Entity",
        from = "Column::VehicleId",
        to = "super::vehicle::Column::Id",
        on_delete = "Cascade"
    )]
    Vehicle,
}

impl Related<super::vehicle::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vehicle.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
