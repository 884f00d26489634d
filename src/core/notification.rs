//! User-facing notifications created as side effects of workflow decisions.

use crate::{
    core::scope::ActingUser,
    entities::{Notification, notification},
    errors::Result,
};
use sea_orm::{QueryOrder, Set, prelude::*};

/// Queues a notification for `profile_id`.
pub async fn notify<C>(
    conn: &C,
    profile_id: i64,
    title: &str,
    message: &str,
    entity: Option<(&str, i64)>,
) -> Result<notification::Model>
where
    C: ConnectionTrait,
{
    let model = notification::ActiveModel {
        profile_id: Set(profile_id),
        title: Set(title.to_string()),
        message: Set(message.to_string()),
        entity_type: Set(entity.map(|(kind, _)| kind.to_string())),
        entity_id: Set(entity.map(|(_, id)| id.to_string())),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };
    model.insert(conn).await.map_err(Into::into)
}

/// Notifications addressed to the acting user, newest first.
pub async fn list_notifications(
    db: &DatabaseConnection,
    user: &ActingUser,
) -> Result<Vec<notification::Model>> {
    let Some(profile_id) = user.profile_id else {
        return Ok(Vec::new());
    };

    Notification::find()
        .filter(notification::Column::ProfileId.eq(profile_id))
        .order_by_desc(notification::Column::CreatedAt)
        .order_by_desc(notification::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}
