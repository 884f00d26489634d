//! Activity lifecycle business logic.
//!
//! Activities move through the state machine defined by
//! [`ActivityStatus::allowed_transitions`]. Deleting an activity only marks it
//! `Deleted`; such activities disappear from every listing.

use crate::{
    core::{
        audit,
        level::resolve_placement,
        scope::{ActingUser, Resource, scope},
    },
    entities::{
        Activity, ActivityType, activity, activity_type,
        enums::{ActivityStatus, Level, RecordStatus, Role},
    },
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

/// Input for [`create_activity`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewActivity {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub execution_date: NaiveDate,
    pub level: Level,
    #[serde(default)]
    pub site_id: Option<i64>,
    #[serde(default)]
    pub small_group_id: Option<i64>,
    pub activity_type_id: i64,
}

/// Editable activity fields. Placement and status are not editable here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivityChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub execution_date: Option<NaiveDate>,
    pub activity_type_id: Option<i64>,
}

/// Optional filters for [`list_activities`].
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ActivityFilter {
    pub status: Option<ActivityStatus>,
    pub activity_type_id: Option<i64>,
}

/// All activity types, ordered by name.
pub async fn list_activity_types(db: &DatabaseConnection) -> Result<Vec<activity_type::Model>> {
    ActivityType::find()
        .order_by_asc(activity_type::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Adds an activity type to the catalogue. National coordinators only.
pub async fn create_activity_type(
    db: &DatabaseConnection,
    user: &ActingUser,
    name: &str,
    description: Option<String>,
) -> Result<activity_type::Model> {
    user.require_national("create activity types")?;
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation("activity type name cannot be empty"));
    }

    let txn = db.begin().await?;
    let exists = ActivityType::find()
        .filter(activity_type::Column::Name.eq(name))
        .one(&txn)
        .await?;
    if exists.is_some() {
        return Err(Error::validation(format!("activity type '{name}' already exists")));
    }

    let created = activity_type::ActiveModel {
        name: Set(name.to_string()),
        description: Set(description),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    audit::record(&txn, user, "activity_type.created", "activity_type", created.id, json!({ "name": name }))
        .await?;
    txn.commit().await?;
    Ok(created)
}

/// Plans a new activity.
///
/// The creator is always the acting user and the activity starts `Planned`.
///
/// # Errors
/// * `Validation` - empty title or a malformed placement
/// * `NotFound` - unknown activity type, site or small group
/// * `Forbidden` - the placement lies outside the caller's scope
#[instrument(skip(db, input), fields(actor = %user.external_id))]
pub async fn create_activity(
    db: &DatabaseConnection,
    user: &ActingUser,
    input: NewActivity,
) -> Result<activity::Model> {
    let created_by = user.require_profile()?;
    if input.title.trim().is_empty() {
        return Err(Error::validation("activity title cannot be empty"));
    }

    let txn = db.begin().await?;
    let placement =
        resolve_placement(&txn, input.level, input.site_id, input.small_group_id).await?;
    if !scope(user, Resource::Activities).covers_target(placement.site_id, placement.small_group_id) {
        return Err(Error::forbidden("you cannot plan activities at this level"));
    }
    ActivityType::find_by_id(input.activity_type_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("activity type", input.activity_type_id))?;

    let now = Utc::now();
    let created = activity::ActiveModel {
        title: Set(input.title.trim().to_string()),
        description: Set(input.description),
        execution_date: Set(input.execution_date),
        level: Set(placement.level),
        site_id: Set(placement.site_id),
        small_group_id: Set(placement.small_group_id),
        activity_type_id: Set(input.activity_type_id),
        status: Set(ActivityStatus::Planned),
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
        "activity.created",
        "activity",
        created.id,
        json!({ "title": created.title, "level": created.level }),
    )
    .await?;
    txn.commit().await?;

    info!(activity_id = created.id, "activity planned");
    Ok(created)
}

/// Retrieves a non-deleted activity visible to the user.
pub async fn get_activity(
    db: &DatabaseConnection,
    user: &ActingUser,
    activity_id: i64,
) -> Result<activity::Model> {
    let found = Activity::find_by_id(activity_id)
        .one(db)
        .await?
        .filter(|a| a.record_status != RecordStatus::Deleted)
        .ok_or_else(|| Error::not_found("activity", activity_id))?;

    if scope(user, Resource::Activities).permits(found.site_id, found.small_group_id, Some(found.created_by)) {
        Ok(found)
    } else {
        Err(Error::not_found("activity", activity_id))
    }
}

/// Activities visible to the user, most recent execution date first.
pub async fn list_activities(
    db: &DatabaseConnection,
    user: &ActingUser,
    filter: ActivityFilter,
) -> Result<Vec<activity::Model>> {
    let Some(condition) = scope(user, Resource::Activities).condition::<Activity>() else {
        return Ok(Vec::new());
    };

    let mut query = Activity::find()
        .filter(condition)
        .filter(activity::Column::RecordStatus.ne(RecordStatus::Deleted));
    if let Some(status) = filter.status {
        query = query.filter(activity::Column::Status.eq(status));
    }
    if let Some(type_id) = filter.activity_type_id {
        query = query.filter(activity::Column::ActivityTypeId.eq(type_id));
    }

    query
        .order_by_desc(activity::Column::ExecutionDate)
        .order_by_desc(activity::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// National, the coordinator of the activity's site, the leader of its small
/// group, or its creator.
fn can_manage(user: &ActingUser, found: &activity::Model) -> bool {
    if user.profile_id.is_some() && user.profile_id == Some(found.created_by) {
        return true;
    }
    match user.role {
        Role::NationalCoordinator => true,
        Role::SiteCoordinator => user.site_id.is_some() && user.site_id == found.site_id,
        Role::SmallGroupLeader => {
            user.small_group_id.is_some() && user.small_group_id == found.small_group_id
        }
        Role::Member => false,
    }
}

/// Moves an activity to `to` if the state machine allows it.
#[instrument(skip(db), fields(actor = %user.external_id))]
pub async fn transition_activity(
    db: &DatabaseConnection,
    user: &ActingUser,
    activity_id: i64,
    to: ActivityStatus,
) -> Result<activity::Model> {
    let found = get_activity(db, user, activity_id).await?;
    if !can_manage(user, &found) {
        return Err(Error::forbidden("you cannot change the status of this activity"));
    }
    let from = found.status;
    if !from.can_transition_to(to) {
        return Err(Error::InvalidTransition {
            entity: "activity",
            from: from.to_string(),
            to: to.to_string(),
        });
    }

    let txn = db.begin().await?;
    flip_status(&txn, activity_id, from, to).await?;
    audit::record(
        &txn,
        user,
        "activity.status_changed",
        "activity",
        activity_id,
        json!({ "from": from, "to": to }),
    )
    .await?;
    let updated = Activity::find_by_id(activity_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("activity", activity_id))?;
    txn.commit().await?;

    info!(activity_id, %from, %to, "activity status changed");
    Ok(updated)
}

/// Writes `to` only while the stored status is still `from`.
///
/// A concurrent change makes the update match no row, which surfaces as
/// [`Error::InvalidTransition`] instead of overwriting the newer state.
async fn flip_status<C>(conn: &C, activity_id: i64, from: ActivityStatus, to: ActivityStatus) -> Result<()>
where
    C: ConnectionTrait,
{
    let result = Activity::update_many()
        .set(activity::ActiveModel {
            status: Set(to),
            updated_at: Set(Utc::now()),
            ..Default::default()
        })
        .filter(activity::Column::Id.eq(activity_id))
        .filter(activity::Column::Status.eq(from))
        .filter(activity::Column::RecordStatus.ne(RecordStatus::Deleted))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(Error::InvalidTransition {
            entity: "activity",
            from: from.to_string(),
            to: to.to_string(),
        });
    }
    Ok(())
}

/// Starts a planned activity.
pub async fn start_activity(
    db: &DatabaseConnection,
    user: &ActingUser,
    activity_id: i64,
) -> Result<activity::Model> {
    let found = get_activity(db, user, activity_id).await?;
    if found.status != ActivityStatus::Planned {
        return Err(Error::InvalidTransition {
            entity: "activity",
            from: found.status.to_string(),
            to: ActivityStatus::InProgress.to_string(),
        });
    }
    transition_activity(db, user, activity_id, ActivityStatus::InProgress).await
}

/// Edits descriptive fields of an activity.
pub async fn update_activity(
    db: &DatabaseConnection,
    user: &ActingUser,
    activity_id: i64,
    changes: ActivityChanges,
) -> Result<activity::Model> {
    let found = get_activity(db, user, activity_id).await?;
    if !can_manage(user, &found) {
        return Err(Error::forbidden("you cannot edit this activity"));
    }

    let txn = db.begin().await?;
    let mut active: activity::ActiveModel = found.into();
    if let Some(title) = changes.title {
        if title.trim().is_empty() {
            return Err(Error::validation("activity title cannot be empty"));
        }
        active.title = Set(title.trim().to_string());
    }
    if let Some(description) = changes.description {
        active.description = Set(Some(description));
    }
    if let Some(date) = changes.execution_date {
        active.execution_date = Set(date);
    }
    if let Some(type_id) = changes.activity_type_id {
        ActivityType::find_by_id(type_id)
            .one(&txn)
            .await?
            .ok_or_else(|| Error::not_found("activity type", type_id))?;
        active.activity_type_id = Set(type_id);
    }
    active.updated_at = Set(Utc::now());

    let updated = active.update(&txn).await?;
    audit::record(&txn, user, "activity.updated", "activity", activity_id, json!({})).await?;
    txn.commit().await?;
    Ok(updated)
}

/// Marks an activity `Deleted`. The row and its reports are kept.
#[instrument(skip(db), fields(actor = %user.external_id))]
pub async fn delete_activity(
    db: &DatabaseConnection,
    user: &ActingUser,
    activity_id: i64,
) -> Result<activity::Model> {
    let found = get_activity(db, user, activity_id).await?;
    if !can_manage(user, &found) {
        return Err(Error::forbidden("you cannot delete this activity"));
    }

    let txn = db.begin().await?;
    let result = Activity::update_many()
        .set(activity::ActiveModel {
            record_status: Set(RecordStatus::Deleted),
            updated_at: Set(Utc::now()),
            ..Default::default()
        })
        .filter(activity::Column::Id.eq(activity_id))
        .filter(activity::Column::RecordStatus.ne(RecordStatus::Deleted))
        .exec(&txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::not_found("activity", activity_id));
    }
    audit::record(&txn, user, "activity.deleted", "activity", activity_id, json!({})).await?;
    let updated = Activity::find_by_id(activity_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("activity", activity_id))?;
    txn.commit().await?;

    info!(activity_id, "activity deleted");
    Ok(updated)
}
