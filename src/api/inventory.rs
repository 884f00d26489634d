//! `/api/inventory/*`.

use super::{
    AppState,
    auth::CurrentUser,
    response::{ApiResult, ok},
};
use crate::{
    core::inventory::{self, NewItem},
    entities::{enums::MovementDirection, inventory_item, inventory_movement},
};
use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct NewMovement {
    pub direction: MovementDirection,
    pub quantity: i64,
    pub reason: String,
}

pub async fn list_items(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Vec<inventory_item::Model>> {
    ok(inventory::list_items(&state.db, &user).await?)
}

pub async fn create_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<NewItem>,
) -> ApiResult<inventory_item::Model> {
    ok(inventory::create_item(&state.db, &user, input).await?)
}

pub async fn archive_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<inventory_item::Model> {
    ok(inventory::archive_item(&state.db, &user, id).await?)
}

pub async fn list_movements(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Vec<inventory_movement::Model>> {
    ok(inventory::list_movements(&state.db, &user, id).await?)
}

pub async fn record_movement(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Json(body): Json<NewMovement>,
) -> ApiResult<inventory_movement::Model> {
    ok(inventory::record_movement(&state.db, &user, id, body.direction, body.quantity, &body.reason).await?)
}
