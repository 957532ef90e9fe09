//! Game version entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "game_versions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub uuid: Option<String>,
    /// Version code (e.g. "3.24.2-LIVE.9381373"). Identity key when `uuid` is absent.
    #[sea_orm(unique)]
    pub code: String,
    pub channel: Option<String>,
    #[sea_orm(default_value = false)]
    pub is_default: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
