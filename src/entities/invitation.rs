//! Invitation entity - binds an email to a role and optional assignment.
//!
//! The role/site/group stored here is a snapshot taken when the invitation was
//! issued; readers resolve the live values through the linked profile.

use super::enums::{InvitationStatus, Role};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Invitation database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "invitations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub email: String,
    pub role: Role,
    pub site_id: Option<i64>,
    pub small_group_id: Option<i64>,
    #[sea_orm(unique)]
    #[serde(skip_serializing)]
    pub token: String,
    pub status: InvitationStatus,
    pub invited_by: i64,
    /// Profile created or updated on acceptance
    pub profile_id: Option<i64>,
    pub accepted_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
