//! Manufacturer entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A vehicle or item manufacturer.
///
/// Identity: external `uuid` when the upstream provides one, else the normalized `slug`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "manufacturers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Upstream stable id.
    #[sea_orm(unique)]
    pub uuid: Option<String>,
    #[sea_orm(unique)]
    pub slug: String,
    pub name: String,
    /// Short manufacturer code (e.g. "ANVL").
    pub code: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::vehicle::Entity")]
    Vehicles,
}

impl Related<super::vehicle::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vehicles.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
