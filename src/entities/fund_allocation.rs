//! Fund allocation entity - a directed transfer from the national reserve or a
//! site to a site or small group.

use super::enums::AllocationSource;
use crate::core::scope::ScopedEntity;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Fund allocation database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "fund_allocations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub source: AllocationSource,
    /// Set when `source` is a site
    pub source_site_id: Option<i64>,
    pub destination_site_id: i64,
    /// Set when the destination is a small group under `destination_site_id`
    pub destination_small_group_id: Option<i64>,
    pub amount: f64,
    pub goal: String,
    pub proof_reference: Option<String>,
    pub allocation_date: Date,
    pub allocated_by: i64,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

// Visibility follows the receiving side of the transfer.
impl ScopedEntity for Entity {
    fn site_column() -> Column {
        Column::DestinationSiteId
    }
    fn small_group_column() -> Column {
        Column::DestinationSmallGroupId
    }
    fn owner_column() -> Column {
        Column::AllocatedBy
    }
}
