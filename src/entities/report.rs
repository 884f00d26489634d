//! Report entity - narrative and financial account of an executed activity.
//!
//! Reports move from `submitted` (or legacy `pending`) to `approved` or
//! `rejected`; both outcomes are terminal. Approval with declared expenses
//! produces a matching expense transaction.

use super::enums::{Level, ReportStatus};
use crate::core::scope::ScopedEntity;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Report database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reports")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub activity_id: i64,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub content: String,
    pub level: Level,
    pub site_id: Option<i64>,
    pub small_group_id: Option<i64>,
    pub participants_count: i32,
    pub total_income: f64,
    pub total_expenses: f64,
    pub status: ReportStatus,
    pub submitted_by: i64,
    pub submitted_at: DateTimeUtc,
    pub reviewed_by: Option<i64>,
    pub reviewed_at: Option<DateTimeUtc>,
    /// Reviewer notes; holds the rejection reason shown to the submitter
    #[sea_orm(column_type = "Text", nullable)]
    pub review_notes: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each report documents one activity
    #[sea_orm(
        belongs_to = "super::activity::Entity",
        from = "Column::ActivityId",
        to = "super::activity::Column::Id"
    )]
    Activity,
}

impl Related<super::activity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Activity.def()
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
        Column::SubmittedBy
    }
}
