//! Enumerated column types shared across entities.
//!
//! Every enum is stored as a short lowercase string so the database stays
//! readable and the values match the JSON representation served by the API.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Organizational role of a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Sees and manages everything
    #[sea_orm(string_value = "national_coordinator")]
    NationalCoordinator,
    /// Manages one site and the small groups under it
    #[sea_orm(string_value = "site_coordinator")]
    SiteCoordinator,
    /// Leads one small group
    #[sea_orm(string_value = "small_group_leader")]
    SmallGroupLeader,
    /// Regular participant with a login
    #[sea_orm(string_value = "member")]
    Member,
}

/// Account status of a profile. Profiles are archived, never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum ProfileStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "inactive")]
    Inactive,
    #[sea_orm(string_value = "invited")]
    Invited,
}

/// Organizational scope of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum Level {
    #[sea_orm(string_value = "national")]
    National,
    #[sea_orm(string_value = "site")]
    Site,
    #[sea_orm(string_value = "small_group")]
    SmallGroup,
}

/// Lifecycle tag replacing hard deletes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "archived")]
    Archived,
    #[sea_orm(string_value = "deleted")]
    Deleted,
}

/// Activity state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    #[sea_orm(string_value = "planned")]
    Planned,
    #[sea_orm(string_value = "in_progress")]
    InProgress,
    #[sea_orm(string_value = "executed")]
    Executed,
    #[sea_orm(string_value = "delayed")]
    Delayed,
    #[sea_orm(string_value = "canceled")]
    Canceled,
}

impl ActivityStatus {
    /// States reachable in one step from `self`.
    #[must_use]
    pub const fn allowed_transitions(self) -> &'static [Self] {
        match self {
            Self::Planned => &[Self::InProgress, Self::Delayed, Self::Canceled],
            Self::InProgress => &[Self::Executed, Self::Delayed, Self::Canceled],
            Self::Delayed => &[Self::Planned, Self::InProgress, Self::Canceled],
            Self::Executed | Self::Canceled => &[],
        }
    }

    /// Whether `self -> next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_transitions().contains(&next)
    }

    /// Terminal states accept no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        self.allowed_transitions().is_empty()
    }
}

/// Report review state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "submitted")]
    Submitted,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

impl ReportStatus {
    /// Statuses treated as "awaiting review".
    pub const AWAITING_REVIEW: [Self; 2] = [Self::Pending, Self::Submitted];

    #[must_use]
    pub fn is_awaiting_review(self) -> bool {
        Self::AWAITING_REVIEW.contains(&self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    #[sea_orm(string_value = "income")]
    Income,
    #[sea_orm(string_value = "expense")]
    Expense,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
}

/// Where allocated funds are drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum AllocationSource {
    /// The national reserve
    #[sea_orm(string_value = "national")]
    National,
    /// A site's own funds
    #[sea_orm(string_value = "site")]
    Site,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum BudgetStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "closed")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum PeriodStatus {
    #[sea_orm(string_value = "open")]
    Open,
    #[sea_orm(string_value = "closed")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "accepted")]
    Accepted,
    #[sea_orm(string_value = "revoked")]
    Revoked,
}

/// Direction of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(8))")]
#[serde(rename_all = "snake_case")]
pub enum MovementDirection {
    #[sea_orm(string_value = "in")]
    In,
    #[sea_orm(string_value = "out")]
    Out,
}

macro_rules! display_as_db_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(&self.to_value())
                }
            }
        )*
    };
}

display_as_db_value!(
    Role,
    ProfileStatus,
    Level,
    RecordStatus,
    ActivityStatus,
    ReportStatus,
    TransactionKind,
    TransactionStatus,
    AllocationSource,
    BudgetStatus,
    PeriodStatus,
    InvitationStatus,
    MovementDirection,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_transition_table() {
        use ActivityStatus::{Canceled, Delayed, Executed, InProgress, Planned};

        assert!(Planned.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Executed));
        assert!(InProgress.can_transition_to(Delayed));
        assert!(Delayed.can_transition_to(Planned));

        // Executed is terminal; planning it again is illegal
        assert!(!Executed.can_transition_to(Planned));
        assert!(!Planned.can_transition_to(Executed));
        assert!(Executed.is_terminal());
        assert!(Canceled.is_terminal());
        assert!(!Planned.can_transition_to(Planned));
    }

    #[test]
    fn test_display_uses_database_value() {
        assert_eq!(Role::SmallGroupLeader.to_string(), "small_group_leader");
        assert_eq!(ActivityStatus::InProgress.to_string(), "in_progress");
        assert_eq!(Level::SmallGroup.to_string(), "small_group");
    }

    #[test]
    fn test_serde_matches_database_value() {
        let json = serde_json::to_string(&Role::NationalCoordinator).unwrap_or_default();
        assert_eq!(json, "\"national_coordinator\"");
        let parsed: ReportStatus = serde_json::from_str("\"submitted\"").unwrap_or(ReportStatus::Pending);
        assert_eq!(parsed, ReportStatus::Submitted);
    }
}
