//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod accounting_period;
pub mod activity;
pub mod activity_type;
pub mod annual_budget;
pub mod audit_log;
pub mod enums;
pub mod financial_transaction;
pub mod fund_allocation;
pub mod inventory_item;
pub mod inventory_movement;
pub mod invitation;
pub mod member;
pub mod notification;
pub mod period_snapshot;
pub mod profile;
pub mod report;
pub mod site;
pub mod small_group;

// Re-export specific types to avoid conflicts
pub use accounting_period::{Entity as AccountingPeriod, Model as AccountingPeriodModel};
pub use activity::{Entity as Activity, Model as ActivityModel};
pub use activity_type::{Entity as ActivityType, Model as ActivityTypeModel};
pub use annual_budget::{Entity as AnnualBudget, Model as AnnualBudgetModel};
pub use audit_log::{Entity as AuditLog, Model as AuditLogModel};
pub use financial_transaction::{
    Entity as FinancialTransaction, Model as FinancialTransactionModel,
};
pub use fund_allocation::{Entity as FundAllocation, Model as FundAllocationModel};
pub use inventory_item::{Entity as InventoryItem, Model as InventoryItemModel};
pub use inventory_movement::{Entity as InventoryMovement, Model as InventoryMovementModel};
pub use invitation::{Entity as Invitation, Model as InvitationModel};
pub use member::{Entity as Member, Model as MemberModel};
pub use notification::{Entity as Notification, Model as NotificationModel};
pub use period_snapshot::{Entity as PeriodSnapshot, Model as PeriodSnapshotModel};
pub use profile::{Entity as Profile, Model as ProfileModel};
pub use report::{Entity as Report, Model as ReportModel};
pub use site::{Entity as Site, Model as SiteModel};
pub use small_group::{Entity as SmallGroup, Model as SmallGroupModel};
