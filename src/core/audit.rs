//! Audit trail.
//!
//! Mutating operations call [`record`] with the same connection (usually the
//! open database transaction) that performs the mutation, so the audit row and
//! the change commit or roll back together. Rows are never updated or deleted.

use crate::{
    core::scope::{ActingUser, Resource, Scope, scope},
    entities::{AuditLog, audit_log},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, QuerySelect, Set, prelude::*};
use serde::Deserialize;
use tracing::debug;

const DEFAULT_LIMIT: u64 = 100;
const MAX_LIMIT: u64 = 500;

/// Appends one audit row.
pub async fn record<C>(
    conn: &C,
    actor: &ActingUser,
    action: &str,
    entity_type: &str,
    entity_id: impl ToString,
    metadata: serde_json::Value,
) -> Result<audit_log::Model>
where
    C: ConnectionTrait,
{
    let entity_id = entity_id.to_string();
    debug!(action, entity_type, entity_id = %entity_id, actor = %actor.external_id, "audit");

    let entry = audit_log::ActiveModel {
        actor_id: Set(actor.profile_id),
        actor: Set(actor.external_id.clone()),
        action: Set(action.to_string()),
        entity_type: Set(entity_type.to_string()),
        entity_id: Set(entity_id),
        metadata: Set(metadata.to_string()),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };

    entry.insert(conn).await.map_err(Into::into)
}

/// Filters accepted by the audit-log viewer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditFilter {
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub actor_id: Option<i64>,
    pub action: Option<String>,
    /// Defaults to 100, capped at 500
    pub limit: Option<u64>,
}

/// Lists audit rows newest first. National coordinators only.
pub async fn list_audit_logs(
    db: &DatabaseConnection,
    user: &ActingUser,
    filter: &AuditFilter,
) -> Result<Vec<audit_log::Model>> {
    if scope(user, Resource::AuditLogs) != Scope::All {
        return Err(Error::forbidden("only a national coordinator may read the audit log"));
    }

    let mut query = AuditLog::find();
    if let Some(entity_type) = &filter.entity_type {
        query = query.filter(audit_log::Column::EntityType.eq(entity_type.as_str()));
    }
    if let Some(entity_id) = &filter.entity_id {
        query = query.filter(audit_log::Column::EntityId.eq(entity_id.as_str()));
    }
    if let Some(actor_id) = filter.actor_id {
        query = query.filter(audit_log::Column::ActorId.eq(actor_id));
    }
    if let Some(action) = &filter.action {
        query = query.filter(audit_log::Column::Action.eq(action.as_str()));
    }

    let limit = filter.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    query
        .order_by_desc(audit_log::Column::CreatedAt)
        .order_by_desc(audit_log::Column::Id)
        .limit(limit)
        .all(db)
        .await
        .map_err(Into::into)
}
