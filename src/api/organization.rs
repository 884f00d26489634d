//! `/api/sites` and `/api/small-groups`.

use super::{
    AppState,
    auth::CurrentUser,
    response::{ApiResult, ok},
};
use crate::{
    core::organization::{self, GroupRoles},
    entities::{site, small_group},
};
use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct NewSite {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CoordinatorChange {
    pub coordinator_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct NewSmallGroup {
    pub site_id: i64,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct SmallGroupQuery {
    pub site_id: Option<i64>,
}

pub async fn list_sites(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Vec<site::Model>> {
    ok(organization::list_sites(&state.db, &user).await?)
}

pub async fn create_site(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<NewSite>,
) -> ApiResult<site::Model> {
    ok(organization::create_site(&state.db, &user, &body.name, body.description).await?)
}

pub async fn set_coordinator(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(site_id): Path<i64>,
    Json(body): Json<CoordinatorChange>,
) -> ApiResult<site::Model> {
    ok(organization::assign_site_coordinator(&state.db, &user, site_id, body.coordinator_id).await?)
}

pub async fn archive_site(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(site_id): Path<i64>,
) -> ApiResult<site::Model> {
    ok(organization::archive_site(&state.db, &user, site_id).await?)
}

pub async fn list_small_groups(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<SmallGroupQuery>,
) -> ApiResult<Vec<small_group::Model>> {
    ok(organization::list_small_groups(&state.db, &user, query.site_id).await?)
}

pub async fn create_small_group(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<NewSmallGroup>,
) -> ApiResult<small_group::Model> {
    ok(organization::create_small_group(&state.db, &user, body.site_id, &body.name).await?)
}

pub async fn set_group_roles(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(group_id): Path<i64>,
    Json(roles): Json<GroupRoles>,
) -> ApiResult<small_group::Model> {
    ok(organization::assign_small_group_roles(&state.db, &user, group_id, roles).await?)
}

pub async fn archive_small_group(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(group_id): Path<i64>,
) -> ApiResult<small_group::Model> {
    ok(organization::archive_small_group(&state.db, &user, group_id).await?)
}
