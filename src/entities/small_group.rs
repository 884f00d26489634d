//! Small group entity - always belongs to exactly one site.

use super::enums::RecordStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Small group database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "small_groups")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub site_id: i64,
    pub name: String,
    pub leader_id: Option<i64>,
    pub logistics_assistant_id: Option<i64>,
    pub finance_assistant_id: Option<i64>,
    pub record_status: RecordStatus,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each small group belongs to one site
    #[sea_orm(
        belongs_to = "super::site::Entity",
        from = "Column::SiteId",
        to = "super::site::Column::Id"
    )]
    Site,
}

impl Related<super::site::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Site.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
