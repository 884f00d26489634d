//! Profile/identity resolution and profile administration.
//!
//! Maps an authenticated identity-provider subject to an internal profile.
//! Unknown subjects resolve to a synthesized member so the UI can degrade
//! gracefully instead of failing.

use crate::{
    core::{audit, scope::ActingUser},
    entities::{
        Profile, Site, SmallGroup,
        enums::{ProfileStatus, RecordStatus, Role},
        profile, site, small_group,
    },
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, instrument};

/// Resolves the acting user for an identity-provider subject.
///
/// * profile found and usable → profile-backed user
/// * profile found but inactive → [`Error::Unauthorized`]
/// * no profile → synthesized member with no assignment
pub async fn resolve_acting_user(db: &DatabaseConnection, external_id: &str) -> Result<ActingUser> {
    let external_id = external_id.trim();
    if external_id.is_empty() {
        return Err(Error::Unauthorized {
            message: "missing identity".to_string(),
        });
    }

    match find_by_external_id(db, external_id).await? {
        Some(p) if p.status == ProfileStatus::Inactive => Err(Error::Unauthorized {
            message: "profile is inactive".to_string(),
        }),
        Some(p) => Ok(ActingUser::from_profile(&p)),
        None => {
            debug!(external_id, "no profile yet, using synthesized member");
            Ok(ActingUser::synthesized(external_id))
        }
    }
}

/// Finds a profile by its identity-provider subject.
pub async fn find_by_external_id<C>(conn: &C, external_id: &str) -> Result<Option<profile::Model>>
where
    C: ConnectionTrait,
{
    Profile::find()
        .filter(profile::Column::ExternalId.eq(external_id))
        .one(conn)
        .await
        .map_err(Into::into)
}

/// Retrieves a profile by id.
pub async fn get_profile(db: &DatabaseConnection, profile_id: i64) -> Result<profile::Model> {
    Profile::find_by_id(profile_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("profile", profile_id))
}

/// Creates the profile on first authenticated login, or refreshes the
/// provider-supplied email and name on later logins.
#[instrument(skip(db))]
pub async fn ensure_profile(
    db: &DatabaseConnection,
    external_id: &str,
    email: &str,
    full_name: &str,
) -> Result<profile::Model> {
    let external_id = external_id.trim();
    if external_id.is_empty() {
        return Err(Error::Unauthorized {
            message: "missing identity".to_string(),
        });
    }
    let email = email.trim();
    let full_name = full_name.trim();
    let now = Utc::now();

    if let Some(existing) = find_by_external_id(db, external_id).await? {
        if existing.email == email && existing.full_name == full_name {
            return Ok(existing);
        }
        let mut active: profile::ActiveModel = existing.into();
        active.email = Set(email.to_string());
        active.full_name = Set(full_name.to_string());
        active.updated_at = Set(now);
        return active.update(db).await.map_err(Into::into);
    }

    info!(external_id, "creating profile on first login");
    let model = profile::ActiveModel {
        external_id: Set(external_id.to_string()),
        email: Set(email.to_string()),
        full_name: Set(full_name.to_string()),
        role: Set(Role::Member),
        status: Set(ProfileStatus::Active),
        site_id: Set(None),
        small_group_id: Set(None),
        mandate_start: Set(None),
        mandate_end: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    model.insert(db).await.map_err(Into::into)
}

/// Self-service profile fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileChanges {
    pub full_name: Option<String>,
    pub email: Option<String>,
}

/// Updates the acting user's own name and email.
pub async fn update_own_profile(
    db: &DatabaseConnection,
    user: &ActingUser,
    changes: ProfileChanges,
) -> Result<profile::Model> {
    let profile_id = user.require_profile()?;
    let existing = get_profile(db, profile_id).await?;
    let mut active: profile::ActiveModel = existing.into();

    if let Some(name) = changes.full_name {
        if name.trim().is_empty() {
            return Err(Error::validation("name cannot be empty"));
        }
        active.full_name = Set(name.trim().to_string());
    }
    if let Some(email) = changes.email {
        if !email.contains('@') {
            return Err(Error::validation("email is not valid"));
        }
        active.email = Set(email.trim().to_string());
    }
    active.updated_at = Set(Utc::now());
    active.update(db).await.map_err(Into::into)
}

/// Role and assignment requested by an administrator or an invitation.
#[derive(Debug, Clone, Deserialize)]
pub struct RoleAssignment {
    pub role: Role,
    #[serde(default)]
    pub site_id: Option<i64>,
    #[serde(default)]
    pub small_group_id: Option<i64>,
    #[serde(default)]
    pub mandate_start: Option<NaiveDate>,
    #[serde(default)]
    pub mandate_end: Option<NaiveDate>,
}

/// Checks that `assignment` is consistent for its role and returns the
/// normalized `(site_id, small_group_id)` pair.
///
/// Leaders take the site of their small group; a site supplied alongside must
/// match it.
pub async fn validate_assignment<C>(
    conn: &C,
    assignment: &RoleAssignment,
) -> Result<(Option<i64>, Option<i64>)>
where
    C: ConnectionTrait,
{
    if let (Some(start), Some(end)) = (assignment.mandate_start, assignment.mandate_end) {
        if end < start {
            return Err(Error::validation("mandate end precedes mandate start"));
        }
    }

    match assignment.role {
        Role::NationalCoordinator => {
            if assignment.site_id.is_some() || assignment.small_group_id.is_some() {
                return Err(Error::validation(
                    "a national coordinator cannot be assigned to a site or small group",
                ));
            }
            Ok((None, None))
        }
        Role::SiteCoordinator => {
            let site_id = assignment
                .site_id
                .ok_or_else(|| Error::validation("a site coordinator requires a site"))?;
            if assignment.small_group_id.is_some() {
                return Err(Error::validation(
                    "a site coordinator cannot be assigned to a small group",
                ));
            }
            active_site(conn, site_id).await?;
            Ok((Some(site_id), None))
        }
        Role::SmallGroupLeader | Role::Member => {
            if let Some(group_id) = assignment.small_group_id {
                let group = active_small_group(conn, group_id).await?;
                if assignment.site_id.is_some_and(|s| s != group.site_id) {
                    return Err(Error::validation(format!(
                        "small group {group_id} does not belong to site {}",
                        assignment.site_id.unwrap_or_default()
                    )));
                }
                Ok((Some(group.site_id), Some(group.id)))
            } else if assignment.role == Role::SmallGroupLeader {
                Err(Error::validation("a small group leader requires a small group"))
            } else if let Some(site_id) = assignment.site_id {
                active_site(conn, site_id).await?;
                Ok((Some(site_id), None))
            } else {
                Ok((None, None))
            }
        }
    }
}

async fn active_site<C: ConnectionTrait>(conn: &C, site_id: i64) -> Result<site::Model> {
    Site::find_by_id(site_id)
        .one(conn)
        .await?
        .filter(|s| s.record_status == RecordStatus::Active)
        .ok_or_else(|| Error::not_found("site", site_id))
}

async fn active_small_group<C: ConnectionTrait>(
    conn: &C,
    group_id: i64,
) -> Result<small_group::Model> {
    SmallGroup::find_by_id(group_id)
        .one(conn)
        .await?
        .filter(|g| g.record_status == RecordStatus::Active)
        .ok_or_else(|| Error::not_found("small group", group_id))
}

/// Applies a validated assignment to a profile and keeps the site coordinator
/// and group leader pointers in sync with it. Runs on the caller's connection.
///
/// Pointers still naming the profile from its previous assignment are
/// cleared. A different profile displaced from the new site or group is
/// demoted to member, keeping its placement.
pub(crate) async fn apply_assignment<C>(
    conn: &C,
    existing: profile::Model,
    assignment: &RoleAssignment,
    site_id: Option<i64>,
    small_group_id: Option<i64>,
) -> Result<profile::Model>
where
    C: ConnectionTrait,
{
    let profile_id = existing.id;
    Site::update_many()
        .set(site::ActiveModel {
            coordinator_id: Set(None),
            ..Default::default()
        })
        .filter(site::Column::CoordinatorId.eq(profile_id))
        .exec(conn)
        .await?;
    SmallGroup::update_many()
        .set(small_group::ActiveModel {
            leader_id: Set(None),
            ..Default::default()
        })
        .filter(small_group::Column::LeaderId.eq(profile_id))
        .exec(conn)
        .await?;

    let mut active: profile::ActiveModel = existing.into();
    active.role = Set(assignment.role);
    active.site_id = Set(site_id);
    active.small_group_id = Set(small_group_id);
    active.mandate_start = Set(assignment.mandate_start);
    active.mandate_end = Set(assignment.mandate_end);
    active.updated_at = Set(Utc::now());
    let updated = active.update(conn).await?;

    match (assignment.role, site_id, small_group_id) {
        (Role::SiteCoordinator, Some(site_id), _) => {
            let site = active_site(conn, site_id).await?;
            demote_displaced(conn, site.coordinator_id, Role::SiteCoordinator).await?;
            Site::update_many()
                .set(site::ActiveModel {
                    coordinator_id: Set(Some(profile_id)),
                    ..Default::default()
                })
                .filter(site::Column::Id.eq(site_id))
                .exec(conn)
                .await?;
        }
        (Role::SmallGroupLeader, _, Some(group_id)) => {
            let group = active_small_group(conn, group_id).await?;
            demote_displaced(conn, group.leader_id, Role::SmallGroupLeader).await?;
            SmallGroup::update_many()
                .set(small_group::ActiveModel {
                    leader_id: Set(Some(profile_id)),
                    ..Default::default()
                })
                .filter(small_group::Column::Id.eq(group_id))
                .exec(conn)
                .await?;
        }
        _ => {}
    }

    Ok(updated)
}

/// Demotes the previous holder of a coordinator/leader seat to member.
pub(crate) async fn demote_displaced<C>(conn: &C, holder: Option<i64>, seat: Role) -> Result<()>
where
    C: ConnectionTrait,
{
    let Some(holder) = holder else {
        return Ok(());
    };
    Profile::update_many()
        .set(profile::ActiveModel {
            role: Set(Role::Member),
            updated_at: Set(Utc::now()),
            ..Default::default()
        })
        .filter(profile::Column::Id.eq(holder))
        .filter(profile::Column::Role.eq(seat))
        .exec(conn)
        .await?;
    Ok(())
}

/// Changes the role/assignment of a profile. National coordinators only.
#[instrument(skip(db, user), fields(actor = %user.external_id))]
pub async fn assign_role(
    db: &DatabaseConnection,
    user: &ActingUser,
    profile_id: i64,
    assignment: RoleAssignment,
) -> Result<profile::Model> {
    user.require_national("change roles")?;

    let txn = db.begin().await?;
    let existing = Profile::find_by_id(profile_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("profile", profile_id))?;
    let previous_role = existing.role;

    let (site_id, small_group_id) = validate_assignment(&txn, &assignment).await?;
    let updated = apply_assignment(&txn, existing, &assignment, site_id, small_group_id).await?;

    audit::record(
        &txn,
        user,
        "profile.role_assigned",
        "profile",
        profile_id,
        json!({
            "from": previous_role,
            "to": assignment.role,
            "site_id": site_id,
            "small_group_id": small_group_id,
        }),
    )
    .await?;
    txn.commit().await?;

    info!(profile_id, role = %assignment.role, "role assigned");
    Ok(updated)
}

/// Activates or archives a profile. National coordinators only; profiles are
/// never hard-deleted.
pub async fn set_profile_status(
    db: &DatabaseConnection,
    user: &ActingUser,
    profile_id: i64,
    status: ProfileStatus,
) -> Result<profile::Model> {
    user.require_national("change account status")?;
    if user.profile_id == Some(profile_id) && status != ProfileStatus::Active {
        return Err(Error::validation("you cannot deactivate your own account"));
    }

    let txn = db.begin().await?;
    let existing = Profile::find_by_id(profile_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("profile", profile_id))?;
    let previous = existing.status;

    let mut active: profile::ActiveModel = existing.into();
    active.status = Set(status);
    active.updated_at = Set(Utc::now());
    let updated = active.update(&txn).await?;

    audit::record(
        &txn,
        user,
        "profile.status_changed",
        "profile",
        profile_id,
        json!({ "from": previous, "to": status }),
    )
    .await?;
    txn.commit().await?;
    Ok(updated)
}

/// All profiles, ordered by name. National coordinators only.
pub async fn list_profiles(db: &DatabaseConnection, user: &ActingUser) -> Result<Vec<profile::Model>> {
    user.require_national("list users")?;
    Profile::find()
        .order_by_asc(profile::Column::FullName)
        .all(db)
        .await
        .map_err(Into::into)
}
