//! Database configuration module.
//!
//! This module handles the `SQLite` connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the database schema always matches the
//! Rust structs without hand-written SQL.

use crate::entities::{
    AccountingPeriod, Activity, ActivityType, AnnualBudget, AuditLog, FinancialTransaction,
    FundAllocation, InventoryItem, InventoryMovement, Invitation, Member, Notification,
    PeriodSnapshot, Profile, Report, Site, SmallGroup,
};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};
use tracing::{debug, info};

const DEFAULT_DATABASE_URL: &str = "sqlite://fellowship_ledger.sqlite?mode=rwc";

/// Gets the database URL from the `DATABASE_URL` environment variable, falling
/// back to a local `SQLite` file.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the database named by [`get_database_url`].
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();
    debug!("Connecting to database at {}", database_url);
    Database::connect(&database_url).await.map_err(Into::into)
}

async fn create_table<E>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<()>
where
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}

/// Creates every table that does not exist yet.
///
/// Referenced tables are created before the tables pointing at them.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let schema = Schema::new(db.get_database_backend());

    create_table(db, &schema, Profile).await?;
    create_table(db, &schema, Site).await?;
    create_table(db, &schema, SmallGroup).await?;
    create_table(db, &schema, Member).await?;
    create_table(db, &schema, ActivityType).await?;
    create_table(db, &schema, Activity).await?;
    create_table(db, &schema, Report).await?;
    create_table(db, &schema, FinancialTransaction).await?;
    create_table(db, &schema, FundAllocation).await?;
    create_table(db, &schema, AnnualBudget).await?;
    create_table(db, &schema, AccountingPeriod).await?;
    create_table(db, &schema, PeriodSnapshot).await?;
    create_table(db, &schema, AuditLog).await?;
    create_table(db, &schema, Notification).await?;
    create_table(db, &schema, Invitation).await?;
    create_table(db, &schema, InventoryItem).await?;
    create_table(db, &schema, InventoryMovement).await?;

    info!("Database tables ensured");
    Ok(())
}
