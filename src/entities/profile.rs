//! Profile entity - the internal user record behind an external identity.
//!
//! A profile is created on first authenticated login or by accepting an
//! invitation. Profiles are never deleted; archival goes through `status`.

use super::enums::{ProfileStatus, Role};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Profile database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "profiles")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Subject issued by the identity provider
    #[sea_orm(unique)]
    pub external_id: String,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub status: ProfileStatus,
    /// Assigned site, if any
    pub site_id: Option<i64>,
    /// Assigned small group, if any
    pub small_group_id: Option<i64>,
    /// Start of the current coordinator/leader mandate
    pub mandate_start: Option<Date>,
    /// End of the current coordinator/leader mandate
    pub mandate_end: Option<Date>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
