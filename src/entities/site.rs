//! Site entity - a geographic/organizational unit owning small groups and members.

use super::enums::RecordStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Site database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sites")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub name: String,
    pub description: Option<String>,
    /// Profile coordinating this site, unassigned when `None`
    pub coordinator_id: Option<i64>,
    pub record_status: RecordStatus,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One site has many small groups
    #[sea_orm(has_many = "super::small_group::Entity")]
    SmallGroups,
}

impl Related<super::small_group::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SmallGroups.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
