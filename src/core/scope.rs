//! Row-scoping policy.
//!
//! Every list and detail query derives its visibility filter from the acting
//! user at call time. Nothing about visibility is stored, so a role or
//! assignment change takes effect on the very next query.
//!
//! The acting user is always passed explicitly; there is no ambient
//! per-request context to forget to establish.

use crate::{
    entities::{enums::Role, profile, report},
    errors::{Error, Result},
};
use sea_orm::{ColumnTrait, Condition, EntityTrait};
use serde::Serialize;

/// The resolved identity on whose behalf an operation runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActingUser {
    /// Internal profile id, `None` for a first-seen identity without a profile
    pub profile_id: Option<i64>,
    /// Identity-provider subject (or `system:<operation>`)
    pub external_id: String,
    pub role: Role,
    pub site_id: Option<i64>,
    pub small_group_id: Option<i64>,
}

impl ActingUser {
    /// Builds the acting user from a stored profile.
    #[must_use]
    pub fn from_profile(profile: &profile::Model) -> Self {
        Self {
            profile_id: Some(profile.id),
            external_id: profile.external_id.clone(),
            role: profile.role,
            site_id: profile.site_id,
            small_group_id: profile.small_group_id,
        }
    }

    /// Default identity for an authenticated subject that has no profile yet.
    #[must_use]
    pub fn synthesized(external_id: &str) -> Self {
        Self {
            profile_id: None,
            external_id: external_id.to_string(),
            role: Role::Member,
            site_id: None,
            small_group_id: None,
        }
    }

    /// National-level actor for start-up seeding and other internal jobs.
    #[must_use]
    pub fn for_system(operation: &str) -> Self {
        Self {
            profile_id: None,
            external_id: format!("system:{operation}"),
            role: Role::NationalCoordinator,
            site_id: None,
            small_group_id: None,
        }
    }

    #[must_use]
    pub fn is_national(&self) -> bool {
        self.role == Role::NationalCoordinator
    }

    /// Fails with [`Error::Forbidden`] unless the user is a national coordinator.
    pub fn require_national(&self, action: &str) -> Result<()> {
        if self.is_national() {
            Ok(())
        } else {
            Err(Error::forbidden(format!(
                "only a national coordinator may {action}"
            )))
        }
    }

    /// Profile id of the user, required for anything that records an author.
    pub fn require_profile(&self) -> Result<i64> {
        self.profile_id.ok_or_else(|| {
            Error::forbidden("a registered profile is required for this operation")
        })
    }
}

/// Kinds of rows subject to scoping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Members,
    Activities,
    Reports,
    FinancialTransactions,
    FundAllocations,
    InventoryItems,
    /// Administrative: user accounts and invitations
    Profiles,
    /// Administrative: the audit trail
    AuditLogs,
}

/// Visibility granted to a user over one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Scope {
    /// Every row
    All,
    /// Rows of one site, including all small groups under it
    Site(i64),
    /// Rows of one small group
    SmallGroup(i64),
    /// Rows authored by one profile
    Own(i64),
    /// No rows at all
    Nothing,
}

/// Entities that carry the columns needed to apply a [`Scope`].
pub trait ScopedEntity: EntityTrait {
    /// Column holding the site the row belongs to
    fn site_column() -> Self::Column;
    /// Column holding the small group the row belongs to
    fn small_group_column() -> Self::Column;
    /// Column holding the authoring profile
    fn owner_column() -> Self::Column;
}

/// Computes the visibility of `resource` for `user`.
///
/// Missing assignments fail closed: a leader without a small group or a
/// coordinator without a site sees nothing rather than getting an error.
#[must_use]
pub fn scope(user: &ActingUser, resource: Resource) -> Scope {
    if matches!(resource, Resource::Profiles | Resource::AuditLogs) {
        return if user.is_national() {
            Scope::All
        } else {
            Scope::Nothing
        };
    }

    match user.role {
        Role::NationalCoordinator => Scope::All,
        Role::SiteCoordinator => user.site_id.map_or(Scope::Nothing, Scope::Site),
        Role::SmallGroupLeader => user.small_group_id.map_or(Scope::Nothing, Scope::SmallGroup),
        Role::Member => user.profile_id.map_or(Scope::Nothing, Scope::Own),
    }
}

impl Scope {
    /// Translates the scope into a query filter for `E`.
    ///
    /// `None` means the result set is empty and no query should be issued.
    #[must_use]
    pub fn condition<E: ScopedEntity>(self) -> Option<Condition> {
        match self {
            Self::All => Some(Condition::all()),
            Self::Site(site_id) => Some(Condition::all().add(E::site_column().eq(site_id))),
            Self::SmallGroup(group_id) => {
                Some(Condition::all().add(E::small_group_column().eq(group_id)))
            }
            Self::Own(profile_id) => Some(Condition::all().add(E::owner_column().eq(profile_id))),
            Self::Nothing => None,
        }
    }

    /// In-memory equivalent of [`Scope::condition`] for an already loaded row.
    #[must_use]
    pub fn permits(
        self,
        site_id: Option<i64>,
        small_group_id: Option<i64>,
        owner_id: Option<i64>,
    ) -> bool {
        match self {
            Self::All => true,
            Self::Site(id) => site_id == Some(id),
            Self::SmallGroup(id) => small_group_id == Some(id),
            Self::Own(id) => owner_id == Some(id),
            Self::Nothing => false,
        }
    }

    /// Whether a user holding this scope may create or modify rows placed at
    /// `site_id` / `small_group_id`. Authorship alone never grants write access.
    #[must_use]
    pub fn covers_target(self, site_id: Option<i64>, small_group_id: Option<i64>) -> bool {
        match self {
            Self::All => true,
            Self::Site(id) => site_id == Some(id),
            Self::SmallGroup(id) => small_group_id == Some(id),
            Self::Own(_) | Self::Nothing => false,
        }
    }
}

/// Detail-level capability check for a single report.
///
/// Distinct from list scoping: a user may view a report when national, when
/// they submitted it, when they coordinate its site or lead its small group.
#[must_use]
pub fn can_view_report(user: &ActingUser, report: &report::Model) -> bool {
    if user.is_national() {
        return true;
    }
    if user.profile_id.is_some() && user.profile_id == Some(report.submitted_by) {
        return true;
    }
    match user.role {
        Role::SiteCoordinator => user.site_id.is_some() && user.site_id == report.site_id,
        Role::SmallGroupLeader => {
            user.small_group_id.is_some() && user.small_group_id == report.small_group_id
        }
        Role::NationalCoordinator | Role::Member => false,
    }
}
