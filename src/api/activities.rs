//! `/api/members`, `/api/activities`, `/api/activity-types` and `/api/reports`.

use super::{
    AppState,
    auth::CurrentUser,
    response::{ApiResult, ok},
};
use crate::{
    core::{
        activity::{self, ActivityChanges, ActivityFilter, NewActivity},
        member::{self, MemberChanges, NewMember},
        report::{self, NewReport},
    },
    entities::{
        activity as activity_entity, activity_type,
        enums::{ActivityStatus, ReportStatus},
        member as member_entity, report as report_entity,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct NewActivityType {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: ActivityStatus,
}

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub status: Option<ReportStatus>,
}

#[derive(Debug, Deserialize)]
pub struct Rejection {
    #[serde(default)]
    pub reason: String,
}

pub async fn list_members(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Vec<member_entity::Model>> {
    ok(member::list_members(&state.db, &user).await?)
}

pub async fn create_member(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<NewMember>,
) -> ApiResult<member_entity::Model> {
    ok(member::create_member(&state.db, &user, input).await?)
}

pub async fn get_member(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<member_entity::Model> {
    ok(member::get_member(&state.db, &user, id).await?)
}

pub async fn update_member(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Json(changes): Json<MemberChanges>,
) -> ApiResult<member_entity::Model> {
    ok(member::update_member(&state.db, &user, id, changes).await?)
}

pub async fn archive_member(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<member_entity::Model> {
    ok(member::archive_member(&state.db, &user, id).await?)
}

pub async fn list_activity_types(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
) -> ApiResult<Vec<activity_type::Model>> {
    ok(activity::list_activity_types(&state.db).await?)
}

pub async fn create_activity_type(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<NewActivityType>,
) -> ApiResult<activity_type::Model> {
    ok(activity::create_activity_type(&state.db, &user, &body.name, body.description).await?)
}

pub async fn list_activities(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(filter): Query<ActivityFilter>,
) -> ApiResult<Vec<activity_entity::Model>> {
    ok(activity::list_activities(&state.db, &user, filter).await?)
}

pub async fn create_activity(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<NewActivity>,
) -> ApiResult<activity_entity::Model> {
    ok(activity::create_activity(&state.db, &user, input).await?)
}

pub async fn get_activity(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<activity_entity::Model> {
    ok(activity::get_activity(&state.db, &user, id).await?)
}

pub async fn update_activity(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Json(changes): Json<ActivityChanges>,
) -> ApiResult<activity_entity::Model> {
    ok(activity::update_activity(&state.db, &user, id, changes).await?)
}

pub async fn delete_activity(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<activity_entity::Model> {
    ok(activity::delete_activity(&state.db, &user, id).await?)
}

pub async fn start_activity(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<activity_entity::Model> {
    ok(activity::start_activity(&state.db, &user, id).await?)
}

pub async fn change_activity_status(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Json(body): Json<StatusChange>,
) -> ApiResult<activity_entity::Model> {
    ok(activity::transition_activity(&state.db, &user, id, body.status).await?)
}

pub async fn list_reports(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Vec<report_entity::Model>> {
    ok(report::list_reports(&state.db, &user, query.status).await?)
}

pub async fn submit_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<NewReport>,
) -> ApiResult<report_entity::Model> {
    ok(report::submit_report(&state.db, &user, input).await?)
}

pub async fn get_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<report_entity::Model> {
    ok(report::get_report(&state.db, &user, id).await?)
}

pub async fn approve_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<report_entity::Model> {
    ok(report::approve_report(&state.db, &user, id).await?)
}

pub async fn reject_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Json(body): Json<Rejection>,
) -> ApiResult<report_entity::Model> {
    ok(report::reject_report(&state.db, &user, id, &body.reason).await?)
}
