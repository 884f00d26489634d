//! Activity entity - a planned or executed organizational event.

use super::enums::{ActivityStatus, Level, RecordStatus};
use crate::core::scope::ScopedEntity;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Activity database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "activities")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub execution_date: Date,
    pub level: Level,
    pub site_id: Option<i64>,
    pub small_group_id: Option<i64>,
    pub activity_type_id: i64,
    /// Position in the activity state machine
    pub status: ActivityStatus,
    /// `Deleted` activities are hidden everywhere
    pub record_status: RecordStatus,
    pub created_by: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::activity_type::Entity",
        from = "Column::ActivityTypeId",
        to = "super::activity_type::Column::Id"
    )]
    ActivityType,
    /// One activity has many reports
    #[sea_orm(has_many = "super::report::Entity")]
    Reports,
}

impl Related<super::activity_type::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ActivityType.def()
    }
}

impl Related<super::report::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reports.def()
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
