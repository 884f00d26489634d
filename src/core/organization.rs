//! Sites and small groups.
//!
//! Sites own small groups by foreign key. Neither is ever hard-deleted; both
//! are archived through `record_status`.

use crate::{
    core::{
        audit,
        identity::{RoleAssignment, apply_assignment, demote_displaced},
        scope::ActingUser,
    },
    entities::{
        Profile, Site, SmallGroup,
        enums::{RecordStatus, Role},
        profile, site, small_group,
    },
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde_json::json;
use tracing::info;

/// Creates a site. National coordinators only; names are unique.
pub async fn create_site(
    db: &DatabaseConnection,
    user: &ActingUser,
    name: &str,
    description: Option<String>,
) -> Result<site::Model> {
    user.require_national("create sites")?;
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation("site name cannot be empty"));
    }

    let txn = db.begin().await?;
    let duplicate = Site::find()
        .filter(site::Column::Name.eq(name))
        .one(&txn)
        .await?;
    if duplicate.is_some() {
        return Err(Error::validation(format!("a site named '{name}' already exists")));
    }

    let created = site::ActiveModel {
        name: Set(name.to_string()),
        description: Set(description),
        coordinator_id: Set(None),
        record_status: Set(RecordStatus::Active),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    audit::record(&txn, user, "site.created", "site", created.id, json!({ "name": name })).await?;
    txn.commit().await?;

    info!(site_id = created.id, name, "site created");
    Ok(created)
}

/// Retrieves an active site.
pub async fn get_site(db: &DatabaseConnection, site_id: i64) -> Result<site::Model> {
    Site::find_by_id(site_id)
        .one(db)
        .await?
        .filter(|s| s.record_status == RecordStatus::Active)
        .ok_or_else(|| Error::not_found("site", site_id))
}

/// Retrieves an active small group.
pub async fn get_small_group(
    db: &DatabaseConnection,
    group_id: i64,
) -> Result<small_group::Model> {
    SmallGroup::find_by_id(group_id)
        .one(db)
        .await?
        .filter(|g| g.record_status == RecordStatus::Active)
        .ok_or_else(|| Error::not_found("small group", group_id))
}

/// Sets or clears the coordinator of a site. National coordinators only.
///
/// The named profile becomes the site's coordinator through the same path as
/// a role assignment; clearing the seat demotes the current holder to member.
pub async fn assign_site_coordinator(
    db: &DatabaseConnection,
    user: &ActingUser,
    site_id: i64,
    coordinator_id: Option<i64>,
) -> Result<site::Model> {
    user.require_national("assign site coordinators")?;
    let existing = get_site(db, site_id).await?;

    let txn = db.begin().await?;
    match coordinator_id {
        Some(profile_id) => {
            let profile = seat_candidate(&txn, profile_id).await?;
            let assignment = RoleAssignment {
                role: Role::SiteCoordinator,
                site_id: Some(site_id),
                small_group_id: None,
                mandate_start: profile.mandate_start,
                mandate_end: profile.mandate_end,
            };
            apply_assignment(&txn, profile, &assignment, Some(site_id), None).await?;
        }
        None => {
            demote_displaced(&txn, existing.coordinator_id, Role::SiteCoordinator).await?;
            Site::update_many()
                .set(site::ActiveModel {
                    coordinator_id: Set(None),
                    ..Default::default()
                })
                .filter(site::Column::Id.eq(site_id))
                .exec(&txn)
                .await?;
        }
    }
    audit::record(
        &txn,
        user,
        "site.coordinator_assigned",
        "site",
        site_id,
        json!({ "from": existing.coordinator_id, "to": coordinator_id }),
    )
    .await?;
    let updated = Site::find_by_id(site_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("site", site_id))?;
    txn.commit().await?;
    Ok(updated)
}

/// Loads a profile about to take a coordinator or leader seat. National
/// coordinators keep their role and cannot be seated.
async fn seat_candidate<C>(conn: &C, profile_id: i64) -> Result<profile::Model>
where
    C: ConnectionTrait,
{
    let profile = Profile::find_by_id(profile_id)
        .one(conn)
        .await?
        .ok_or_else(|| Error::not_found("profile", profile_id))?;
    if profile.role == Role::NationalCoordinator {
        return Err(Error::validation(
            "a national coordinator cannot hold a site or small group seat",
        ));
    }
    Ok(profile)
}

/// Sites visible to the user, ordered by name.
///
/// National coordinators see every active site; anyone else sees the site they
/// are assigned to, if any.
pub async fn list_sites(db: &DatabaseConnection, user: &ActingUser) -> Result<Vec<site::Model>> {
    let mut query = Site::find().filter(site::Column::RecordStatus.eq(RecordStatus::Active));
    if !user.is_national() {
        let Some(site_id) = user.site_id else {
            return Ok(Vec::new());
        };
        query = query.filter(site::Column::Id.eq(site_id));
    }
    query
        .order_by_asc(site::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Whether the user may manage small groups of `site_id`.
fn can_manage_site(user: &ActingUser, site_id: i64) -> bool {
    user.is_national() || (user.role == Role::SiteCoordinator && user.site_id == Some(site_id))
}

/// Creates a small group under a site. National coordinators or the site's
/// coordinator.
pub async fn create_small_group(
    db: &DatabaseConnection,
    user: &ActingUser,
    site_id: i64,
    name: &str,
) -> Result<small_group::Model> {
    if !can_manage_site(user, site_id) {
        return Err(Error::forbidden("you cannot create small groups for this site"));
    }
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation("small group name cannot be empty"));
    }
    get_site(db, site_id).await?;

    let txn = db.begin().await?;
    let created = small_group::ActiveModel {
        site_id: Set(site_id),
        name: Set(name.to_string()),
        leader_id: Set(None),
        logistics_assistant_id: Set(None),
        finance_assistant_id: Set(None),
        record_status: Set(RecordStatus::Active),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    audit::record(
        &txn,
        user,
        "small_group.created",
        "small_group",
        created.id,
        json!({ "site_id": site_id, "name": name }),
    )
    .await?;
    txn.commit().await?;
    Ok(created)
}

/// Leader and assistant roles of a small group. `None` leaves a role as is.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct GroupRoles {
    pub leader_id: Option<i64>,
    pub logistics_assistant_id: Option<i64>,
    pub finance_assistant_id: Option<i64>,
}

/// Updates the leader/assistant pointers of a small group.
///
/// A new leader is given the `SmallGroupLeader` role for this group, so the
/// pointer and the profile's assignment never disagree. Site coordinators may
/// only seat profiles that are unassigned or already placed in their site.
pub async fn assign_small_group_roles(
    db: &DatabaseConnection,
    user: &ActingUser,
    group_id: i64,
    roles: GroupRoles,
) -> Result<small_group::Model> {
    let existing = get_small_group(db, group_id).await?;
    if !can_manage_site(user, existing.site_id) {
        return Err(Error::forbidden("you cannot manage this small group"));
    }

    for profile_id in [roles.logistics_assistant_id, roles.finance_assistant_id]
        .into_iter()
        .flatten()
    {
        Profile::find_by_id(profile_id)
            .one(db)
            .await?
            .ok_or_else(|| Error::not_found("profile", profile_id))?;
    }

    let txn = db.begin().await?;
    if let Some(leader_id) = roles.leader_id {
        let profile = seat_candidate(&txn, leader_id).await?;
        if profile.role == Role::SiteCoordinator {
            return Err(Error::validation(
                "a site coordinator must be reassigned before leading a small group",
            ));
        }
        if !user.is_national() && profile.site_id.is_some_and(|s| s != existing.site_id) {
            return Err(Error::forbidden("this profile belongs to another site"));
        }
        let assignment = RoleAssignment {
            role: Role::SmallGroupLeader,
            site_id: Some(existing.site_id),
            small_group_id: Some(group_id),
            mandate_start: profile.mandate_start,
            mandate_end: profile.mandate_end,
        };
        apply_assignment(&txn, profile, &assignment, Some(existing.site_id), Some(group_id)).await?;
    }

    if roles.logistics_assistant_id.is_some() || roles.finance_assistant_id.is_some() {
        let mut assistants = <small_group::ActiveModel as Default>::default();
        if let Some(id) = roles.logistics_assistant_id {
            assistants.logistics_assistant_id = Set(Some(id));
        }
        if let Some(id) = roles.finance_assistant_id {
            assistants.finance_assistant_id = Set(Some(id));
        }
        SmallGroup::update_many()
            .set(assistants)
            .filter(small_group::Column::Id.eq(group_id))
            .exec(&txn)
            .await?;
    }

    let updated = SmallGroup::find_by_id(group_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("small group", group_id))?;
    audit::record(
        &txn,
        user,
        "small_group.roles_assigned",
        "small_group",
        group_id,
        json!({
            "leader_id": updated.leader_id,
            "logistics_assistant_id": updated.logistics_assistant_id,
            "finance_assistant_id": updated.finance_assistant_id,
        }),
    )
    .await?;
    txn.commit().await?;
    Ok(updated)
}

/// Small groups visible to the user, optionally restricted to one site.
pub async fn list_small_groups(
    db: &DatabaseConnection,
    user: &ActingUser,
    site_id: Option<i64>,
) -> Result<Vec<small_group::Model>> {
    let mut query = SmallGroup::find()
        .filter(small_group::Column::RecordStatus.eq(RecordStatus::Active));

    match user.role {
        Role::NationalCoordinator => {}
        Role::SiteCoordinator => {
            let Some(own_site) = user.site_id else {
                return Ok(Vec::new());
            };
            query = query.filter(small_group::Column::SiteId.eq(own_site));
        }
        Role::SmallGroupLeader | Role::Member => {
            let Some(own_group) = user.small_group_id else {
                return Ok(Vec::new());
            };
            query = query.filter(small_group::Column::Id.eq(own_group));
        }
    }
    if let Some(site_id) = site_id {
        query = query.filter(small_group::Column::SiteId.eq(site_id));
    }

    query
        .order_by_asc(small_group::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Archives a site. National coordinators only.
pub async fn archive_site(
    db: &DatabaseConnection,
    user: &ActingUser,
    site_id: i64,
) -> Result<site::Model> {
    user.require_national("archive sites")?;
    let existing = get_site(db, site_id).await?;

    let txn = db.begin().await?;
    let mut active: site::ActiveModel = existing.into();
    active.record_status = Set(RecordStatus::Archived);
    let updated = active.update(&txn).await?;
    audit::record(&txn, user, "site.archived", "site", site_id, json!({})).await?;
    txn.commit().await?;
    Ok(updated)
}

/// Archives a small group. National coordinators or the site's coordinator.
pub async fn archive_small_group(
    db: &DatabaseConnection,
    user: &ActingUser,
    group_id: i64,
) -> Result<small_group::Model> {
    let existing = get_small_group(db, group_id).await?;
    if !can_manage_site(user, existing.site_id) {
        return Err(Error::forbidden("you cannot archive this small group"));
    }

    let txn = db.begin().await?;
    let mut active: small_group::ActiveModel = existing.into();
    active.record_status = Set(RecordStatus::Archived);
    let updated = active.update(&txn).await?;
    audit::record(&txn, user, "small_group.archived", "small_group", group_id, json!({}))
        .await?;
    txn.commit().await?;
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        identity::get_profile,
        scope::{Resource, Scope, scope},
    };
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_create_site_requires_national_and_unique_name() -> Result<()> {
        let db = setup_test_db().await?;
        let (national, _) = create_national(&db).await?;

        let site = create_site(&db, &national, "  North ", None).await?;
        assert_eq!(site.name, "North");
        assert_eq!(site.record_status, RecordStatus::Active);

        let duplicate = create_site(&db, &national, "North", None).await;
        assert!(matches!(duplicate, Err(Error::Validation { .. })));

        let coordinator = acting_as(Role::SiteCoordinator, 50, Some(site.id), None);
        let forbidden = create_site(&db, &coordinator, "South", None).await;
        assert!(matches!(forbidden, Err(Error::Forbidden { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_site_coordinator_manages_only_own_site() -> Result<()> {
        let db = setup_test_db().await?;
        let north = create_test_site(&db, "North").await?;
        let south = create_test_site(&db, "South").await?;
        let coordinator = acting_as(Role::SiteCoordinator, 50, Some(north.id), None);

        let group = create_small_group(&db, &coordinator, north.id, "Harbor").await?;
        assert_eq!(group.site_id, north.id);

        let result = create_small_group(&db, &coordinator, south.id, "Hill").await;
        assert!(matches!(result, Err(Error::Forbidden { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_group_leader_seat_assigns_role() -> Result<()> {
        let db = setup_test_db().await?;
        let (national, _) = create_national(&db).await?;
        let site = create_test_site(&db, "North").await?;
        let group = create_test_small_group(&db, site.id, "Harbor").await?;
        let (member, _) = create_test_profile(&db, "idp|mia", Role::Member, None, None).await?;

        let roles = GroupRoles {
            leader_id: Some(member.id),
            ..Default::default()
        };
        let updated = assign_small_group_roles(&db, &national, group.id, roles).await?;
        assert_eq!(updated.leader_id, Some(member.id));

        let leader = get_profile(&db, member.id).await?;
        assert_eq!(leader.role, Role::SmallGroupLeader);
        assert_eq!(leader.site_id, Some(site.id));
        assert_eq!(leader.small_group_id, Some(group.id));

        let user = ActingUser::from_profile(&leader);
        assert_eq!(
            scope(&user, Resource::Activities),
            Scope::SmallGroup(group.id)
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_coordinator_seat_rejects_other_site_and_national() -> Result<()> {
        let db = setup_test_db().await?;
        let (national, national_profile) = create_national(&db).await?;
        let north = create_test_site(&db, "North").await?;
        let south = create_test_site(&db, "South").await?;
        let group = create_test_small_group(&db, north.id, "Harbor").await?;
        let (outsider, _) =
            create_test_profile(&db, "idp|sam", Role::Member, Some(south.id), None).await?;
        let coordinator = acting_as(Role::SiteCoordinator, 50, Some(north.id), None);

        let roles = GroupRoles {
            leader_id: Some(outsider.id),
            ..Default::default()
        };
        let result = assign_small_group_roles(&db, &coordinator, group.id, roles).await;
        assert!(matches!(result, Err(Error::Forbidden { .. })));

        let result = assign_site_coordinator(&db, &national, north.id, Some(national_profile.id)).await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_clearing_coordinator_demotes_holder() -> Result<()> {
        let db = setup_test_db().await?;
        let (national, _) = create_national(&db).await?;
        let site = create_test_site(&db, "North").await?;
        let (profile, _) = create_test_profile(&db, "idp|cleo", Role::Member, None, None).await?;

        let seated = assign_site_coordinator(&db, &national, site.id, Some(profile.id)).await?;
        assert_eq!(seated.coordinator_id, Some(profile.id));
        assert_eq!(get_profile(&db, profile.id).await?.role, Role::SiteCoordinator);

        let cleared = assign_site_coordinator(&db, &national, site.id, None).await?;
        assert_eq!(cleared.coordinator_id, None);
        let former = get_profile(&db, profile.id).await?;
        assert_eq!(former.role, Role::Member);
        assert_eq!(former.site_id, Some(site.id));
        Ok(())
    }

    #[tokio::test]
    async fn test_list_small_groups_is_scoped() -> Result<()> {
        let db = setup_test_db().await?;
        let (national, _) = create_national(&db).await?;
        let north = create_test_site(&db, "North").await?;
        let south = create_test_site(&db, "South").await?;
        let harbor = create_test_small_group(&db, north.id, "Harbor").await?;
        create_test_small_group(&db, north.id, "Market").await?;
        create_test_small_group(&db, south.id, "Hill").await?;

        assert_eq!(list_small_groups(&db, &national, None).await?.len(), 3);
        assert_eq!(list_small_groups(&db, &national, Some(south.id)).await?.len(), 1);

        let coordinator = acting_as(Role::SiteCoordinator, 50, Some(north.id), None);
        assert_eq!(list_small_groups(&db, &coordinator, None).await?.len(), 2);

        let leader = acting_as(Role::SmallGroupLeader, 60, Some(north.id), Some(harbor.id));
        let visible = list_small_groups(&db, &leader, None).await?;
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, harbor.id);

        let unassigned = acting_as(Role::SmallGroupLeader, 61, None, None);
        assert!(list_small_groups(&db, &unassigned, None).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_archived_site_disappears_from_listing() -> Result<()> {
        let db = setup_test_db().await?;
        let (national, _) = create_national(&db).await?;
        let north = create_test_site(&db, "North").await?;
        create_test_site(&db, "South").await?;

        archive_site(&db, &national, north.id).await?;
        let sites = list_sites(&db, &national).await?;
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].name, "South");

        // The row still exists
        let stored = Site::find_by_id(north.id).one(&db).await?;
        assert!(stored.is_some_and(|s| s.record_status == RecordStatus::Archived));
        Ok(())
    }
}
