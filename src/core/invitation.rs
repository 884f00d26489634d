//! Invitations carrying a pre-assigned role.
//!
//! An invitation records the role the invitee will receive. Once accepted,
//! listings show the invitee's live profile assignment rather than what the
//! invitation originally said, since roles may be changed afterwards.

use crate::{
    core::{
        audit,
        identity::{RoleAssignment, apply_assignment, find_by_external_id, validate_assignment},
        scope::ActingUser,
    },
    entities::{
        Invitation, Profile,
        enums::{InvitationStatus, ProfileStatus, Role},
        invitation, profile,
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

/// Invitation as shown to administrators.
#[derive(Debug, Clone, Serialize)]
pub struct InvitationView {
    pub id: i64,
    pub email: String,
    pub status: InvitationStatus,
    /// Live role of the accepted profile, or the invited role
    pub role: Role,
    pub site_id: Option<i64>,
    pub small_group_id: Option<i64>,
    pub profile_id: Option<i64>,
    pub invited_by: i64,
    pub accepted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl InvitationView {
    fn new(invite: invitation::Model, live: Option<&profile::Model>) -> Self {
        let (role, site_id, small_group_id) = match live {
            Some(p) => (p.role, p.site_id, p.small_group_id),
            None => (invite.role, invite.site_id, invite.small_group_id),
        };
        Self {
            id: invite.id,
            email: invite.email,
            status: invite.status,
            role,
            site_id,
            small_group_id,
            profile_id: invite.profile_id,
            invited_by: invite.invited_by,
            accepted_at: invite.accepted_at,
            created_at: invite.created_at,
        }
    }
}

fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(Error::validation("email is not valid"));
    }
    Ok(email)
}

/// Invites `email` with a pre-validated role assignment.
///
/// Returns the stored invitation, whose `token` is the secret to deliver to
/// the invitee.
pub async fn create_invitation(
    db: &DatabaseConnection,
    user: &ActingUser,
    email: &str,
    role: Role,
    site_id: Option<i64>,
    small_group_id: Option<i64>,
) -> Result<invitation::Model> {
    user.require_national("invite users")?;
    let invited_by = user.require_profile()?;
    let email = normalize_email(email)?;

    let txn = db.begin().await?;
    let assignment = RoleAssignment {
        role,
        site_id,
        small_group_id,
        mandate_start: None,
        mandate_end: None,
    };
    let (site_id, small_group_id) = validate_assignment(&txn, &assignment).await?;

    let pending = Invitation::find()
        .filter(invitation::Column::Email.eq(email.as_str()))
        .filter(invitation::Column::Status.eq(InvitationStatus::Pending))
        .one(&txn)
        .await?;
    if pending.is_some() {
        return Err(Error::validation(format!("{email} already has a pending invitation")));
    }

    let created = invitation::ActiveModel {
        email: Set(email.clone()),
        role: Set(role),
        site_id: Set(site_id),
        small_group_id: Set(small_group_id),
        token: Set(Uuid::new_v4().to_string()),
        status: Set(InvitationStatus::Pending),
        invited_by: Set(invited_by),
        profile_id: Set(None),
        accepted_at: Set(None),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    audit::record(
        &txn,
        user,
        "invitation.created",
        "invitation",
        created.id,
        json!({ "email": email, "role": role }),
    )
    .await?;
    txn.commit().await?;

    info!(invitation_id = created.id, %role, "invitation created");
    Ok(created)
}

/// Redeems an invitation for the authenticated subject `external_id`.
///
/// An existing profile for the subject receives the invited assignment;
/// otherwise a new active profile is created with it.
pub async fn accept_invitation(
    db: &DatabaseConnection,
    token: &str,
    external_id: &str,
    full_name: &str,
) -> Result<profile::Model> {
    let external_id = external_id.trim();
    if external_id.is_empty() {
        return Err(Error::Unauthorized {
            message: "missing identity".to_string(),
        });
    }

    let txn = db.begin().await?;
    let invite = Invitation::find()
        .filter(invitation::Column::Token.eq(token.trim()))
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("invitation", "token"))?;
    if invite.status != InvitationStatus::Pending {
        return Err(Error::InvalidTransition {
            entity: "invitation",
            from: invite.status.to_string(),
            to: InvitationStatus::Accepted.to_string(),
        });
    }

    let assignment = RoleAssignment {
        role: invite.role,
        site_id: invite.site_id,
        small_group_id: invite.small_group_id,
        mandate_start: None,
        mandate_end: None,
    };
    let (site_id, small_group_id) = validate_assignment(&txn, &assignment).await?;

    let now = Utc::now();
    let existing = match find_by_external_id(&txn, external_id).await? {
        Some(found) => found,
        None => {
            let name = if full_name.trim().is_empty() { invite.email.as_str() } else { full_name.trim() };
            profile::ActiveModel {
                external_id: Set(external_id.to_string()),
                email: Set(invite.email.clone()),
                full_name: Set(name.to_string()),
                role: Set(Role::Member),
                status: Set(ProfileStatus::Active),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await?
        }
    };
    let accepted = apply_assignment(&txn, existing, &assignment, site_id, small_group_id).await?;

    let invitation_id = invite.id;
    let mut active: invitation::ActiveModel = invite.into();
    active.status = Set(InvitationStatus::Accepted);
    active.profile_id = Set(Some(accepted.id));
    active.accepted_at = Set(Some(now));
    active.update(&txn).await?;

    audit::record(
        &txn,
        &ActingUser::from_profile(&accepted),
        "invitation.accepted",
        "invitation",
        invitation_id,
        json!({ "profile_id": accepted.id }),
    )
    .await?;
    txn.commit().await?;

    info!(invitation_id, profile_id = accepted.id, "invitation accepted");
    Ok(accepted)
}

/// Revokes a pending invitation.
pub async fn revoke_invitation(
    db: &DatabaseConnection,
    user: &ActingUser,
    invitation_id: i64,
) -> Result<invitation::Model> {
    user.require_national("revoke invitations")?;

    let txn = db.begin().await?;
    let found = Invitation::find_by_id(invitation_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("invitation", invitation_id))?;
    if found.status != InvitationStatus::Pending {
        return Err(Error::InvalidTransition {
            entity: "invitation",
            from: found.status.to_string(),
            to: InvitationStatus::Revoked.to_string(),
        });
    }

    let mut active: invitation::ActiveModel = found.into();
    active.status = Set(InvitationStatus::Revoked);
    let revoked = active.update(&txn).await?;
    audit::record(&txn, user, "invitation.revoked", "invitation", invitation_id, json!({})).await?;
    txn.commit().await?;
    Ok(revoked)
}

/// All invitations, newest first, enriched with live profile assignments.
pub async fn list_invitations(
    db: &DatabaseConnection,
    user: &ActingUser,
) -> Result<Vec<InvitationView>> {
    user.require_national("list invitations")?;

    let invitations = Invitation::find()
        .order_by_desc(invitation::Column::CreatedAt)
        .order_by_desc(invitation::Column::Id)
        .all(db)
        .await?;

    let profile_ids: Vec<i64> = invitations.iter().filter_map(|i| i.profile_id).collect();
    let profiles: HashMap<i64, profile::Model> = if profile_ids.is_empty() {
        HashMap::new()
    } else {
        Profile::find()
            .filter(profile::Column::Id.is_in(profile_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect()
    };

    Ok(invitations
        .into_iter()
        .map(|invite| {
            let live = invite.profile_id.and_then(|id| profiles.get(&id));
            InvitationView::new(invite, live)
        })
        .collect())
}
