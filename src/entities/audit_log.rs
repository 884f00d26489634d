//! Audit log entity - append-only record of every mutating action.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Audit log database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "audit_logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Profile id of the actor, `None` for synthesized or system actors
    pub actor_id: Option<i64>,
    /// External identity of the actor (or `system:<operation>`)
    pub actor: String,
    /// Dotted verb, e.g. `report.approved`
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    /// Free-form JSON object serialized to text
    #[sea_orm(column_type = "Text")]
    pub metadata: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
