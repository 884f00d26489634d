//! Shared test utilities.
//!
//! Fixtures insert rows directly, bypassing permission checks, so each test
//! only exercises the operation it is about.

use crate::{
    core::scope::ActingUser,
    entities::{
        ActivityType, activity, activity_type,
        enums::{ActivityStatus, Level, ProfileStatus, RecordStatus, Role},
        profile, site, small_group,
    },
    errors::Result,
};
use chrono::{NaiveDate, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Acting user for `profile_id` without a stored profile row.
pub fn acting_as(role: Role, profile_id: i64, site_id: Option<i64>, small_group_id: Option<i64>) -> ActingUser {
    ActingUser {
        profile_id: Some(profile_id),
        external_id: format!("idp|test-{profile_id}"),
        role,
        site_id,
        small_group_id,
    }
}

/// Inserts an active profile and returns it with its acting user.
pub async fn create_test_profile(
    db: &DatabaseConnection,
    external_id: &str,
    role: Role,
    site_id: Option<i64>,
    small_group_id: Option<i64>,
) -> Result<(profile::Model, ActingUser)> {
    let now = Utc::now();
    let profile = profile::ActiveModel {
        external_id: Set(external_id.to_string()),
        email: Set(format!("{}@example.org", external_id.replace('|', "."))),
        full_name: Set(external_id.to_string()),
        role: Set(role),
        status: Set(ProfileStatus::Active),
        site_id: Set(site_id),
        small_group_id: Set(small_group_id),
        mandate_start: Set(None),
        mandate_end: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;
    let user = ActingUser::from_profile(&profile);
    Ok((profile, user))
}

/// Inserts the national coordinator used as the default administrator.
pub async fn create_national(db: &DatabaseConnection) -> Result<(ActingUser, profile::Model)> {
    let (profile, user) =
        create_test_profile(db, "idp|national", Role::NationalCoordinator, None, None).await?;
    Ok((user, profile))
}

/// Creates an active site.
pub async fn create_test_site(db: &DatabaseConnection, name: &str) -> Result<site::Model> {
    site::ActiveModel {
        name: Set(name.to_string()),
        description: Set(None),
        coordinator_id: Set(None),
        record_status: Set(RecordStatus::Active),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Creates an active small group under `site_id`.
pub async fn create_test_small_group(
    db: &DatabaseConnection,
    site_id: i64,
    name: &str,
) -> Result<small_group::Model> {
    small_group::ActiveModel {
        site_id: Set(site_id),
        name: Set(name.to_string()),
        leader_id: Set(None),
        logistics_assistant_id: Set(None),
        finance_assistant_id: Set(None),
        record_status: Set(RecordStatus::Active),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Creates an activity type.
pub async fn create_test_activity_type(
    db: &DatabaseConnection,
    name: &str,
) -> Result<activity_type::Model> {
    activity_type::ActiveModel {
        name: Set(name.to_string()),
        description: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

async fn general_activity_type(db: &DatabaseConnection) -> Result<activity_type::Model> {
    let existing = ActivityType::find()
        .filter(activity_type::Column::Name.eq("General"))
        .one(db)
        .await?;
    match existing {
        Some(found) => Ok(found),
        None => create_test_activity_type(db, "General").await,
    }
}

async fn insert_activity(
    db: &DatabaseConnection,
    user: &ActingUser,
    status: ActivityStatus,
    placement: Option<(i64, i64)>,
) -> Result<activity::Model> {
    let kind = general_activity_type(db).await?;
    let (level, site_id, small_group_id) = match placement {
        Some((site, group)) => (Level::SmallGroup, Some(site), Some(group)),
        None => (Level::National, None, None),
    };
    let now = Utc::now();

    activity::ActiveModel {
        title: Set("Test activity".to_string()),
        description: Set(None),
        execution_date: Set(NaiveDate::from_ymd_opt(2026, 2, 1).unwrap_or_default()),
        level: Set(level),
        site_id: Set(site_id),
        small_group_id: Set(small_group_id),
        activity_type_id: Set(kind.id),
        status: Set(status),
        record_status: Set(RecordStatus::Active),
        created_by: Set(user.profile_id.unwrap_or_default()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Creates a national-level activity in `Planned` created by `user`.
pub async fn create_planned_activity(
    db: &DatabaseConnection,
    user: &ActingUser,
) -> Result<activity::Model> {
    insert_activity(db, user, ActivityStatus::Planned, None).await
}

/// Creates an `Executed` activity created by `user`, national-level or placed
/// in `(site_id, small_group_id)`.
pub async fn create_executed_activity(
    db: &DatabaseConnection,
    user: &ActingUser,
    placement: Option<(i64, i64)>,
) -> Result<activity::Model> {
    insert_activity(db, user, ActivityStatus::Executed, placement).await
}
