//! HTTP surface.
//!
//! Handlers are thin: they extract the acting user and the request body, call
//! into [`crate::core`] and wrap the result in the JSON envelope.

use crate::config::{AppConfig, settings::ServerConfig};
use axum::{
    Json, Router,
    http::{HeaderName, HeaderValue, Method, header},
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

/// Sites, small groups, members, activities and reports
pub mod activities;
/// Identity header extraction
pub mod auth;
/// Notifications, analytics and the audit trail
pub mod dashboard;
/// Ledger, allocations, budgets and periods
pub mod finance;
/// Inventory items and movements
pub mod inventory;
/// Sites and small groups
pub mod organization;
/// Profiles, user administration and invitations
pub mod profiles;
/// Response envelopes and error mapping
pub mod response;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Connection pool, shared by every handler
    pub db: Arc<DatabaseConnection>,
    /// Settings loaded at start-up
    pub config: Arc<AppConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(db: Arc<DatabaseConnection>, config: AppConfig) -> Self {
        Self {
            db,
            config: Arc::new(config),
        }
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "success": true, "data": { "status": "ok" } }))
}

/// CORS policy from `[server] allowed_origins`. Invalid entries are skipped.
fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = server
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.trim().parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid allowed origin: {}", origin);
                None
            }
        })
        .collect();

    let identity = HeaderName::try_from(server.identity_header.as_str()).ok();
    let mut headers = vec![header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION];
    headers.extend(identity);

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(headers)
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server);

    Router::new()
        .route("/health", get(health))
        .route("/api/auth/me", get(profiles::me).post(profiles::login))
        .route("/api/profile", get(profiles::own_profile).put(profiles::update_profile))
        .route("/api/sites", get(organization::list_sites).post(organization::create_site))
        .route("/api/sites/{id}/coordinator", post(organization::set_coordinator))
        .route("/api/sites/{id}/archive", post(organization::archive_site))
        .route(
            "/api/small-groups",
            get(organization::list_small_groups).post(organization::create_small_group),
        )
        .route("/api/small-groups/{id}/roles", post(organization::set_group_roles))
        .route("/api/small-groups/{id}/archive", post(organization::archive_small_group))
        .route("/api/members", get(activities::list_members).post(activities::create_member))
        .route(
            "/api/members/{id}",
            get(activities::get_member)
                .put(activities::update_member)
                .delete(activities::archive_member),
        )
        .route(
            "/api/activity-types",
            get(activities::list_activity_types).post(activities::create_activity_type),
        )
        .route(
            "/api/activities",
            get(activities::list_activities).post(activities::create_activity),
        )
        .route(
            "/api/activities/{id}",
            get(activities::get_activity)
                .put(activities::update_activity)
                .delete(activities::delete_activity),
        )
        .route("/api/activities/{id}/start", post(activities::start_activity))
        .route("/api/activities/{id}/status", post(activities::change_activity_status))
        .route("/api/reports", get(activities::list_reports).post(activities::submit_report))
        .route("/api/reports/{id}", get(activities::get_report))
        .route("/api/reports/{id}/approve", post(activities::approve_report))
        .route("/api/reports/{id}/reject", post(activities::reject_report))
        .route(
            "/api/finance/transactions",
            get(finance::list_transactions).post(finance::record_transaction),
        )
        .route("/api/finance/transactions/{id}/approve", post(finance::approve_transaction))
        .route(
            "/api/finance/allocations",
            get(finance::list_allocations).post(finance::allocate_funds),
        )
        .route("/api/finance/summary", get(finance::summary))
        .route("/api/budgets", get(finance::list_budgets).post(finance::create_budget))
        .route("/api/budgets/{year}", get(finance::budget_overview))
        .route("/api/budgets/{year}/close", post(finance::close_budget))
        .route("/api/periods", get(finance::list_periods).post(finance::create_period))
        .route("/api/periods/{id}", get(finance::period_summary))
        .route("/api/periods/{id}/close", post(finance::close_period))
        .route("/api/inventory/items", get(inventory::list_items).post(inventory::create_item))
        .route("/api/inventory/items/{id}/archive", post(inventory::archive_item))
        .route(
            "/api/inventory/items/{id}/movements",
            get(inventory::list_movements).post(inventory::record_movement),
        )
        .route("/api/notifications", get(dashboard::list_notifications))
        .route("/api/analytics", get(dashboard::overview))
        .route("/api/audit-logs", get(dashboard::list_audit_logs))
        .route("/api/admin/users", get(profiles::list_users))
        .route("/api/admin/users/{id}/role", post(profiles::assign_role))
        .route("/api/admin/users/{id}/status", post(profiles::set_status))
        .route(
            "/api/admin/invitations",
            get(profiles::list_invitations).post(profiles::create_invitation),
        )
        .route("/api/admin/invitations/{id}/revoke", post(profiles::revoke_invitation))
        .route("/api/invitations/accept", post(profiles::accept_invitation))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::entities::enums::Role;
    use crate::errors::Result;
    use crate::test_utils::*;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
        response::Response,
    };
    use tower::ServiceExt;

    async fn build_app() -> Result<(Router, Arc<DatabaseConnection>)> {
        let db = Arc::new(setup_test_db().await?);
        Ok((router(AppState::new(Arc::clone(&db), AppConfig::default())), db))
    }

    fn request(method: &str, uri: &str, identity: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(identity) = identity {
            builder = builder.header("x-identity-id", identity);
        }
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() -> Result<()> {
        let (app, _) = build_app().await?;
        let response = app.oneshot(request("GET", "/health", None, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_identity_is_401() -> Result<()> {
        let (app, _) = build_app().await?;
        let response = app
            .oneshot(request("GET", "/api/members", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
        Ok(())
    }

    #[tokio::test]
    async fn test_national_creates_site() -> Result<()> {
        let (app, db) = build_app().await?;
        create_national(&db).await?;

        let response = app
            .oneshot(request(
                "POST",
                "/api/sites",
                Some("idp|national"),
                Some(json!({ "name": "North" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["name"], "North");
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_identity_sees_empty_lists() -> Result<()> {
        let (app, db) = build_app().await?;
        let (national, _) = create_national(&db).await?;
        create_executed_activity(&db, &national, None).await?;

        let response = app
            .oneshot(request("GET", "/api/activities", Some("idp|stranger"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["data"].as_array().map(Vec::len), Some(0));
        Ok(())
    }

    #[tokio::test]
    async fn test_national_summary_over_shared_connection() -> Result<()> {
        let (app, db) = build_app().await?;
        create_national(&db).await?;

        let response = app
            .oneshot(request("GET", "/api/finance/summary", Some("idp|national"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["data"]["scope"]["level"], "national");
        assert_eq!(body["data"]["net_balance"], 0.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_leader_cannot_approve_reports() -> Result<()> {
        let (app, db) = build_app().await?;
        let site = create_test_site(&db, "North").await?;
        let group = create_test_small_group(&db, site.id, "Harbor").await?;
        create_test_profile(&db, "idp|leader", Role::SmallGroupLeader, Some(site.id), Some(group.id)).await?;

        let response = app
            .oneshot(request("POST", "/api/reports/1/approve", Some("idp|leader"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(json_body(response).await["error"]["code"], "FORBIDDEN");
        Ok(())
    }

    #[tokio::test]
    async fn test_site_level_member_without_site_is_422() -> Result<()> {
        let (app, db) = build_app().await?;
        create_national(&db).await?;

        let response = app
            .oneshot(request(
                "POST",
                "/api/members",
                Some("idp|national"),
                Some(json!({ "full_name": "Ana", "level": "site" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json_body(response).await["error"]["code"], "VALIDATION");
        Ok(())
    }
}
