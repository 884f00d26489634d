//! Member entity - a participant record, not a login identity.
//!
//! `level` decides which of `site_id` / `small_group_id` are populated.

use super::enums::{Level, RecordStatus};
use crate::core::scope::ScopedEntity;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Member database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "members")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub level: Level,
    pub site_id: Option<i64>,
    pub small_group_id: Option<i64>,
    pub joined_on: Option<Date>,
    pub record_status: RecordStatus,
    /// Profile that registered this member
    pub created_by: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

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
