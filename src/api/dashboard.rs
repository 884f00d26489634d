//! `/api/notifications`, `/api/analytics` and `/api/audit-logs`.

use super::{
    AppState,
    auth::CurrentUser,
    response::{ApiResult, ok},
};
use crate::{
    core::{
        analytics::{self, Overview},
        audit::{self, AuditFilter},
        notification,
    },
    entities::{audit_log, notification as notification_entity},
};
use axum::extract::{Query, State};

pub async fn list_notifications(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Vec<notification_entity::Model>> {
    ok(notification::list_notifications(&state.db, &user).await?)
}

pub async fn overview(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Overview> {
    ok(analytics::overview(&state.db, &user).await?)
}

pub async fn list_audit_logs(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(filter): Query<AuditFilter>,
) -> ApiResult<Vec<audit_log::Model>> {
    ok(audit::list_audit_logs(&state.db, &user, &filter).await?)
}
