//! Annual budget ceilings.

use crate::{
    core::{audit, finance::validate_amount, scope::ActingUser},
    entities::{
        AnnualBudget, FinancialTransaction, annual_budget,
        enums::{BudgetStatus, TransactionKind, TransactionStatus},
        financial_transaction,
    },
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::Serialize;
use serde_json::json;
use tracing::info;

/// A budget with its consumption so far.
#[derive(Debug, Clone, Serialize)]
pub struct BudgetOverview {
    pub year: i32,
    pub ceiling: f64,
    pub status: BudgetStatus,
    /// Approved expenses dated within the year, across all levels
    pub spent: f64,
    /// `spent / ceiling`
    pub utilization: f64,
    pub remaining: f64,
}

fn year_bounds(year: i32) -> Result<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, 1, 1);
    let end = NaiveDate::from_ymd_opt(year, 12, 31);
    start
        .zip(end)
        .ok_or_else(|| Error::validation(format!("{year} is not a valid budget year")))
}

/// Opens the budget for `year`. There is at most one budget per year.
pub async fn create_annual_budget(
    db: &DatabaseConnection,
    user: &ActingUser,
    year: i32,
    ceiling: f64,
) -> Result<annual_budget::Model> {
    user.require_national("create budgets")?;
    let created_by = user.require_profile()?;
    validate_amount(ceiling)?;
    year_bounds(year)?;

    let txn = db.begin().await?;
    let existing = AnnualBudget::find()
        .filter(annual_budget::Column::Year.eq(year))
        .one(&txn)
        .await?;
    if existing.is_some() {
        return Err(Error::validation(format!("a budget for {year} already exists")));
    }

    let created = annual_budget::ActiveModel {
        year: Set(year),
        ceiling: Set(ceiling),
        status: Set(BudgetStatus::Active),
        created_by: Set(created_by),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    audit::record(&txn, user, "budget.created", "annual_budget", created.id, json!({ "year": year, "ceiling": ceiling }))
        .await?;
    txn.commit().await?;

    info!(year, ceiling, "annual budget created");
    Ok(created)
}

async fn find_budget(db: &DatabaseConnection, year: i32) -> Result<annual_budget::Model> {
    AnnualBudget::find()
        .filter(annual_budget::Column::Year.eq(year))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("budget", year))
}

/// Closes the budget for `year`.
pub async fn close_annual_budget(
    db: &DatabaseConnection,
    user: &ActingUser,
    year: i32,
) -> Result<annual_budget::Model> {
    user.require_national("close budgets")?;
    let found = find_budget(db, year).await?;
    if found.status == BudgetStatus::Closed {
        return Err(Error::InvalidTransition {
            entity: "budget",
            from: found.status.to_string(),
            to: BudgetStatus::Closed.to_string(),
        });
    }

    let txn = db.begin().await?;
    let mut active: annual_budget::ActiveModel = found.into();
    active.status = Set(BudgetStatus::Closed);
    let closed = active.update(&txn).await?;
    audit::record(&txn, user, "budget.closed", "annual_budget", closed.id, json!({ "year": year })).await?;
    txn.commit().await?;
    Ok(closed)
}

/// Ceiling, spending and remaining amount for `year`.
pub async fn budget_overview(db: &DatabaseConnection, year: i32) -> Result<BudgetOverview> {
    let budget = find_budget(db, year).await?;
    let (start, end) = year_bounds(year)?;

    let spent: f64 = FinancialTransaction::find()
        .filter(financial_transaction::Column::Kind.eq(TransactionKind::Expense))
        .filter(financial_transaction::Column::Status.eq(TransactionStatus::Approved))
        .filter(financial_transaction::Column::TransactionDate.gte(start))
        .filter(financial_transaction::Column::TransactionDate.lte(end))
        .all(db)
        .await?
        .iter()
        .map(|t| t.amount)
        .sum();

    Ok(BudgetOverview {
        year,
        ceiling: budget.ceiling,
        status: budget.status,
        spent,
        utilization: spent / budget.ceiling,
        remaining: budget.ceiling - spent,
    })
}

/// All budgets, most recent year first.
pub async fn list_budgets(db: &DatabaseConnection) -> Result<Vec<annual_budget::Model>> {
    AnnualBudget::find()
        .order_by_desc(annual_budget::Column::Year)
        .all(db)
        .await
        .map_err(Into::into)
}
