//! Inventory item entity - stock held at one organizational level.

use super::enums::{Level, RecordStatus};
use crate::core::scope::ScopedEntity;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    pub unit: String,
    /// Units on hand, never negative
    pub quantity: i64,
    pub level: Level,
    pub site_id: Option<i64>,
    pub small_group_id: Option<i64>,
    pub record_status: RecordStatus,
    pub created_by: i64,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::inventory_movement::Entity")]
    Movements,
}

impl Related<super::inventory_movement::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Movements.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl ScopedEntity for Entity {
    fn site_column() -> Column {
        Column::SiteId
    }
    fn small_group_column() -> Column {
        Column::SmallGroupId
    }
    fn owner_column() -> Column {
        Column::CreatedBy
    }
}
