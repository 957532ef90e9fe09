//! Paint → vehicle join table. One paint may fit several vehicle variants.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "paint_vehicles")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub paint_id: Uuid,
    #[sea_orm(primary_key, auto_increment = false)]
    pub vehicle_id: Uuid,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::paint::Entity",
        from = "Column::PaintId",
        to = "super::paint::Column::Id",
        on_delete = "Cascade"
    )]
    Paint,
}

impl Related<super::paint::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Paint.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
