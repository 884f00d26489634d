//! Request identity.
//!
//! Authentication happens upstream: the proxy in front of the service forwards
//! the identity-provider subject in a header (`x-identity-id` by default). A
//! request without it is rejected with 401 so the UI can send the user to the
//! login page.

use super::AppState;
use crate::{
    core::{identity::resolve_acting_user, scope::ActingUser},
    errors::Error,
};
use axum::{extract::FromRequestParts, http::request::Parts};

/// Identity-provider subject of the caller, whether or not a profile exists.
#[derive(Debug, Clone)]
pub struct Identity(pub String);

impl FromRequestParts<AppState> for Identity {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = state.config.server.identity_header.as_str();
        let subject = parts
            .headers
            .get(header)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::Unauthorized {
                message: format!("missing {header} header"),
            })?;
        Ok(Self(subject.to_string()))
    }
}

/// The resolved acting user for the request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub ActingUser);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Identity(subject) = Identity::from_request_parts(parts, state).await?;
        let user = resolve_acting_user(&state.db, &subject).await?;
        Ok(Self(user))
    }
}
