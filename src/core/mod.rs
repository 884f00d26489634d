/// Activity lifecycle
pub mod activity;
/// Fund allocation between sites and small groups
pub mod allocation;
/// Dashboard counters
pub mod analytics;
/// Append-only audit trail
pub mod audit;
/// Annual budget ceilings
pub mod budget;
/// Ledger transactions and financial summaries
pub mod finance;
/// Profile resolution and user administration
pub mod identity;
/// Role invitations
pub mod invitation;
/// Inventory items and stock movements
pub mod inventory;
/// Level placement rules
pub mod level;
/// Member registry
pub mod member;
/// User notifications
pub mod notification;
/// Sites and small groups
pub mod organization;
/// Accounting periods and snapshots
pub mod period;
/// Activity report workflow
pub mod report;
/// Row-scoping policy
pub mod scope;
/// Start-up reference data
pub mod seed;

pub use scope::ActingUser;
