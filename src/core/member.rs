//! Member registry business logic.
//!
//! Members are participant records attributed to the national level, a site
//! or a small group. They are archived, never deleted.

use crate::{
    core::{
        audit,
        level::resolve_placement,
        scope::{ActingUser, Resource, scope},
    },
    entities::{
        Member,
        enums::{Level, RecordStatus},
        member,
    },
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

/// Input for [`create_member`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewMember {
    pub full_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub level: Level,
    #[serde(default)]
    pub site_id: Option<i64>,
    #[serde(default)]
    pub small_group_id: Option<i64>,
    #[serde(default)]
    pub joined_on: Option<NaiveDate>,
}

/// Editable member fields. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemberChanges {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Registers a member after checking the level placement and that the
/// placement lies within the caller's scope.
pub async fn create_member(
    db: &DatabaseConnection,
    user: &ActingUser,
    input: NewMember,
) -> Result<member::Model> {
    let created_by = user.require_profile()?;
    if input.full_name.trim().is_empty() {
        return Err(Error::validation("member name cannot be empty"));
    }

    let txn = db.begin().await?;
    let placement =
        resolve_placement(&txn, input.level, input.site_id, input.small_group_id).await?;
    if !scope(user, Resource::Members).covers_target(placement.site_id, placement.small_group_id) {
        return Err(Error::forbidden("you cannot register members at this level"));
    }

    let now = Utc::now();
    let created = member::ActiveModel {
        full_name: Set(input.full_name.trim().to_string()),
        email: Set(input.email),
        phone: Set(input.phone),
        level: Set(placement.level),
        site_id: Set(placement.site_id),
        small_group_id: Set(placement.small_group_id),
        joined_on: Set(input.joined_on),
        record_status: Set(RecordStatus::Active),
        created_by: Set(created_by),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    audit::record(
        &txn,
        user,
        "member.created",
        "member",
        created.id,
        json!({ "level": created.level, "site_id": created.site_id, "small_group_id": created.small_group_id }),
    )
    .await?;
    txn.commit().await?;

    info!(member_id = created.id, "member registered");
    Ok(created)
}

/// Active members visible to the user, ordered by name.
pub async fn list_members(db: &DatabaseConnection, user: &ActingUser) -> Result<Vec<member::Model>> {
    let Some(condition) = scope(user, Resource::Members).condition::<Member>() else {
        return Ok(Vec::new());
    };

    Member::find()
        .filter(condition)
        .filter(member::Column::RecordStatus.eq(RecordStatus::Active))
        .order_by_asc(member::Column::FullName)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves an active member the user is allowed to see.
pub async fn get_member(
    db: &DatabaseConnection,
    user: &ActingUser,
    member_id: i64,
) -> Result<member::Model> {
    let found = Member::find_by_id(member_id)
        .one(db)
        .await?
        .filter(|m| m.record_status == RecordStatus::Active)
        .ok_or_else(|| Error::not_found("member", member_id))?;

    if scope(user, Resource::Members).permits(found.site_id, found.small_group_id, Some(found.created_by)) {
        Ok(found)
    } else {
        // Hidden rows look missing
        Err(Error::not_found("member", member_id))
    }
}

fn ensure_writable(user: &ActingUser, found: &member::Model) -> Result<()> {
    if scope(user, Resource::Members).covers_target(found.site_id, found.small_group_id) {
        Ok(())
    } else {
        Err(Error::forbidden("you cannot modify this member"))
    }
}

/// Updates contact details of a member.
pub async fn update_member(
    db: &DatabaseConnection,
    user: &ActingUser,
    member_id: i64,
    changes: MemberChanges,
) -> Result<member::Model> {
    let found = get_member(db, user, member_id).await?;
    ensure_writable(user, &found)?;

    let mut active: member::ActiveModel = found.into();
    if let Some(name) = changes.full_name {
        if name.trim().is_empty() {
            return Err(Error::validation("member name cannot be empty"));
        }
        active.full_name = Set(name.trim().to_string());
    }
    if let Some(email) = changes.email {
        active.email = Set(Some(email));
    }
    if let Some(phone) = changes.phone {
        active.phone = Set(Some(phone));
    }
    active.updated_at = Set(Utc::now());

    let txn = db.begin().await?;
    let updated = active.update(&txn).await?;
    audit::record(&txn, user, "member.updated", "member", member_id, json!({})).await?;
    txn.commit().await?;
    Ok(updated)
}

/// Archives a member; the row is kept.
pub async fn archive_member(
    db: &DatabaseConnection,
    user: &ActingUser,
    member_id: i64,
) -> Result<member::Model> {
    let found = get_member(db, user, member_id).await?;
    ensure_writable(user, &found)?;

    let mut active: member::ActiveModel = found.into();
    active.record_status = Set(RecordStatus::Archived);
    active.updated_at = Set(Utc::now());

    let txn = db.begin().await?;
    let updated = active.update(&txn).await?;
    audit::record(&txn, user, "member.archived", "member", member_id, json!({})).await?;
    txn.commit().await?;
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::enums::Role;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn new_member(name: &str, level: Level, site: Option<i64>, group: Option<i64>) -> NewMember {
        NewMember {
            full_name: name.to_string(),
            email: None,
            phone: None,
            level,
            site_id: site,
            small_group_id: group,
            joined_on: None,
        }
    }

    #[tokio::test]
    async fn test_create_member_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let national = acting_as(Role::NationalCoordinator, 1, None, None);

        let result = create_member(&db, &national, new_member("  ", Level::National, None, None)).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let result = create_member(
            &db,
            &ActingUser::synthesized("idp|x"),
            new_member("Ana", Level::National, None, None),
        )
        .await;
        assert!(matches!(result, Err(Error::Forbidden { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_site_level_member_without_site_fails() -> Result<()> {
        let db = setup_test_db().await?;
        let national = acting_as(Role::NationalCoordinator, 1, None, None);

        let result = create_member(&db, &national, new_member("Ana", Level::Site, None, None)).await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        assert!(list_members(&db, &national).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_members_are_scoped_by_role() -> Result<()> {
        let db = setup_test_db().await?;
        let national = acting_as(Role::NationalCoordinator, 1, None, None);
        let north = create_test_site(&db, "North").await?;
        let south = create_test_site(&db, "South").await?;
        let harbor = create_test_small_group(&db, north.id, "Harbor").await?;
        let market = create_test_small_group(&db, north.id, "Market").await?;

        create_member(&db, &national, new_member("Ana", Level::SmallGroup, Some(north.id), Some(harbor.id))).await?;
        create_member(&db, &national, new_member("Bo", Level::SmallGroup, Some(north.id), Some(market.id))).await?;
        create_member(&db, &national, new_member("Cy", Level::Site, Some(north.id), None)).await?;
        create_member(&db, &national, new_member("Di", Level::Site, Some(south.id), None)).await?;

        assert_eq!(list_members(&db, &national).await?.len(), 4);

        let coordinator = acting_as(Role::SiteCoordinator, 2, Some(north.id), None);
        assert_eq!(list_members(&db, &coordinator).await?.len(), 3);

        let leader = acting_as(Role::SmallGroupLeader, 3, Some(north.id), Some(harbor.id));
        let visible = list_members(&db, &leader).await?;
        assert_eq!(visible.len(), 1);
        assert!(visible.iter().all(|m| m.small_group_id == Some(harbor.id)));

        let unassigned = acting_as(Role::SmallGroupLeader, 4, None, None);
        assert!(list_members(&db, &unassigned).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_leader_cannot_register_into_other_group() -> Result<()> {
        let db = setup_test_db().await?;
        let north = create_test_site(&db, "North").await?;
        let harbor = create_test_small_group(&db, north.id, "Harbor").await?;
        let market = create_test_small_group(&db, north.id, "Market").await?;
        let leader = acting_as(Role::SmallGroupLeader, 3, Some(north.id), Some(harbor.id));

        let result = create_member(
            &db,
            &leader,
            new_member("Eve", Level::SmallGroup, Some(north.id), Some(market.id)),
        )
        .await;
        assert!(matches!(result, Err(Error::Forbidden { .. })));

        let ok = create_member(
            &db,
            &leader,
            new_member("Eve", Level::SmallGroup, Some(north.id), Some(harbor.id)),
        )
        .await?;
        assert_eq!(ok.created_by, 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_archive_member_keeps_row() -> Result<()> {
        let db = setup_test_db().await?;
        let national = acting_as(Role::NationalCoordinator, 1, None, None);
        let created = create_member(&db, &national, new_member("Ana", Level::National, None, None)).await?;

        let archived = archive_member(&db, &national, created.id).await?;
        assert_eq!(archived.record_status, RecordStatus::Archived);
        assert!(list_members(&db, &national).await?.is_empty());
        assert!(Member::find_by_id(created.id).one(&db).await?.is_some());

        let again = archive_member(&db, &national, created.id).await;
        assert!(matches!(again, Err(Error::NotFound { .. })));
        Ok(())
    }
}
