//! Period snapshot entity - frozen financial metrics of a closed period.
//!
//! Rows are written once when the period closes and never updated.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "period_snapshots")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub period_id: i64,
    pub total_income: f64,
    pub total_spent: f64,
    pub total_allocated: f64,
    pub net_balance: f64,
    pub budget_utilization: f64,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::accounting_period::Entity",
        from = "Column::PeriodId",
        to = "super::accounting_period::Column::Id"
    )]
    Period,
}

impl Related<super::accounting_period::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Period.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
