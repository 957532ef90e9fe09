//! Paint (livery) entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "paints")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Upstream-stable identity.
    #[sea_orm(unique)]
    pub class_name: String,
    pub name: String,
    pub slug: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::paint_vehicle::Entity")]
    PaintVehicles,
}

impl Related<super::paint_vehicle::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PaintVehicles.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
