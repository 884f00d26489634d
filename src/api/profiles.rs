//! `/api/auth/me`, `/api/profile`, `/api/admin/users` and invitations.

use super::{
    AppState,
    auth::{CurrentUser, Identity},
    response::{ApiResult, ok},
};
use crate::{
    core::{
        identity::{self, ProfileChanges, RoleAssignment},
        invitation::{self, InvitationView},
        scope::ActingUser,
    },
    entities::{
        enums::{ProfileStatus, Role},
        invitation as invitation_entity, profile,
    },
    errors::Error,
};
use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};

/// Who the caller is, with their profile when one exists.
#[derive(Debug, Serialize)]
pub struct Me {
    pub user: ActingUser,
    pub profile: Option<profile::Model>,
}

#[derive(Debug, Deserialize)]
pub struct LoginDetails {
    pub email: String,
    pub full_name: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: ProfileStatus,
}

#[derive(Debug, Deserialize)]
pub struct NewInvitation {
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub site_id: Option<i64>,
    #[serde(default)]
    pub small_group_id: Option<i64>,
}

/// Invitation with its secret token, returned once on creation.
#[derive(Debug, Serialize)]
pub struct CreatedInvitation {
    #[serde(flatten)]
    pub invitation: invitation_entity::Model,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct Acceptance {
    pub token: String,
    #[serde(default)]
    pub full_name: String,
}

pub async fn me(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> ApiResult<Me> {
    let profile = match user.profile_id {
        Some(id) => Some(identity::get_profile(&state.db, id).await?),
        None => None,
    };
    ok(Me { user, profile })
}

/// First-login hook: creates the profile or refreshes provider details.
pub async fn login(
    State(state): State<AppState>,
    Identity(subject): Identity,
    Json(body): Json<LoginDetails>,
) -> ApiResult<profile::Model> {
    ok(identity::ensure_profile(&state.db, &subject, &body.email, &body.full_name).await?)
}

pub async fn own_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<profile::Model> {
    let id = user
        .profile_id
        .ok_or_else(|| Error::not_found("profile", &user.external_id))?;
    ok(identity::get_profile(&state.db, id).await?)
}

pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(changes): Json<ProfileChanges>,
) -> ApiResult<profile::Model> {
    ok(identity::update_own_profile(&state.db, &user, changes).await?)
}

pub async fn list_users(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Vec<profile::Model>> {
    ok(identity::list_profiles(&state.db, &user).await?)
}

pub async fn assign_role(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(profile_id): Path<i64>,
    Json(assignment): Json<RoleAssignment>,
) -> ApiResult<profile::Model> {
    ok(identity::assign_role(&state.db, &user, profile_id, assignment).await?)
}

pub async fn set_status(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(profile_id): Path<i64>,
    Json(body): Json<StatusChange>,
) -> ApiResult<profile::Model> {
    ok(identity::set_profile_status(&state.db, &user, profile_id, body.status).await?)
}

pub async fn list_invitations(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Vec<InvitationView>> {
    ok(invitation::list_invitations(&state.db, &user).await?)
}

pub async fn create_invitation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<NewInvitation>,
) -> ApiResult<CreatedInvitation> {
    let created = invitation::create_invitation(
        &state.db,
        &user,
        &body.email,
        body.role,
        body.site_id,
        body.small_group_id,
    )
    .await?;
    let token = created.token.clone();
    ok(CreatedInvitation {
        invitation: created,
        token,
    })
}

pub async fn revoke_invitation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(invitation_id): Path<i64>,
) -> ApiResult<invitation_entity::Model> {
    ok(invitation::revoke_invitation(&state.db, &user, invitation_id).await?)
}

pub async fn accept_invitation(
    State(state): State<AppState>,
    Identity(subject): Identity,
    Json(body): Json<Acceptance>,
) -> ApiResult<profile::Model> {
    ok(invitation::accept_invitation(&state.db, &body.token, &subject, &body.full_name).await?)
}
