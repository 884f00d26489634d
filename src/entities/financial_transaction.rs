//! Financial transaction entity - income or expense on one entity's ledger.
//!
//! Only `approved` rows count towards balances and utilization.

use super::enums::{Level, TransactionKind, TransactionStatus};
use crate::core::scope::ScopedEntity;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Financial transaction database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "financial_transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub category: String,
    /// Always positive; `kind` carries the sign
    pub amount: f64,
    pub description: Option<String>,
    pub transaction_date: Date,
    pub level: Level,
    pub site_id: Option<i64>,
    pub small_group_id: Option<i64>,
    /// Report whose approval generated this row
    pub report_id: Option<i64>,
    pub recorded_by: i64,
    pub approved_by: Option<i64>,
    pub created_at: DateTimeUtc,
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
        Column::RecordedBy
    }
}
