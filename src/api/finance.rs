//! `/api/finance/*`, `/api/budgets` and `/api/periods`.

use super::{
    AppState,
    auth::CurrentUser,
    response::{ApiResult, ok},
};
use crate::{
    core::{
        allocation::{self, AllocationOutcome, NewAllocation},
        budget::{self, BudgetOverview},
        finance::{self, DateRange, FinanceScope, FinancialSummary, NewTransaction, TransactionFilter},
        period::{self, PeriodSummary},
    },
    entities::{accounting_period, annual_budget, enums::Level, financial_transaction, fund_allocation},
    errors::{Error, Result},
};
use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub level: Option<Level>,
    pub id: Option<i64>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl SummaryQuery {
    fn ledger(&self) -> Result<Option<FinanceScope>> {
        match (self.level, self.id) {
            (None, _) => Ok(None),
            (Some(Level::National), _) => Ok(Some(FinanceScope::National)),
            (Some(Level::Site), Some(id)) => Ok(Some(FinanceScope::Site(id))),
            (Some(Level::SmallGroup), Some(id)) => Ok(Some(FinanceScope::SmallGroup(id))),
            (Some(level), None) => Err(Error::validation(format!("{level} summaries need an id"))),
        }
    }

    fn range(&self) -> Result<Option<DateRange>> {
        match (self.from, self.to) {
            (Some(from), Some(to)) => DateRange::new(from, to).map(Some),
            (None, None) => Ok(None),
            _ => Err(Error::validation("both from and to are required for a date range")),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SummaryView {
    pub scope: FinanceScope,
    pub range: Option<DateRange>,
    #[serde(flatten)]
    pub summary: FinancialSummary,
}

#[derive(Debug, Deserialize)]
pub struct NewBudget {
    pub year: i32,
    pub ceiling: f64,
}

#[derive(Debug, Deserialize)]
pub struct NewPeriod {
    pub label: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

pub async fn list_transactions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(filter): Query<TransactionFilter>,
) -> ApiResult<Vec<financial_transaction::Model>> {
    ok(finance::list_transactions(&state.db, &user, filter).await?)
}

pub async fn record_transaction(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<NewTransaction>,
) -> ApiResult<financial_transaction::Model> {
    ok(finance::record_transaction(&state.db, &user, input).await?)
}

pub async fn approve_transaction(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<financial_transaction::Model> {
    ok(finance::approve_transaction(&state.db, &user, id).await?)
}

pub async fn list_allocations(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Vec<fund_allocation::Model>> {
    ok(allocation::list_allocations(&state.db, &user).await?)
}

pub async fn allocate_funds(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<NewAllocation>,
) -> ApiResult<AllocationOutcome> {
    ok(allocation::allocate_funds(&state.db, &user, input, &state.config.finance).await?)
}

pub async fn summary(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<SummaryQuery>,
) -> ApiResult<SummaryView> {
    let range = query.range()?;
    let scope = finance::authorize_ledger(&state.db, &user, query.ledger()?).await?;
    let summary = finance::compute_summary(&*state.db, scope, range).await?;
    ok(SummaryView { scope, range, summary })
}

pub async fn list_budgets(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Vec<annual_budget::Model>> {
    user.require_national("view budgets")?;
    ok(budget::list_budgets(&state.db).await?)
}

pub async fn create_budget(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<NewBudget>,
) -> ApiResult<annual_budget::Model> {
    ok(budget::create_annual_budget(&state.db, &user, body.year, body.ceiling).await?)
}

pub async fn budget_overview(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(year): Path<i32>,
) -> ApiResult<BudgetOverview> {
    user.require_national("view budgets")?;
    ok(budget::budget_overview(&state.db, year).await?)
}

pub async fn close_budget(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(year): Path<i32>,
) -> ApiResult<annual_budget::Model> {
    ok(budget::close_annual_budget(&state.db, &user, year).await?)
}

pub async fn list_periods(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Vec<accounting_period::Model>> {
    user.require_national("view accounting periods")?;
    ok(period::list_periods(&state.db).await?)
}

pub async fn create_period(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<NewPeriod>,
) -> ApiResult<accounting_period::Model> {
    ok(period::create_period(&state.db, &user, &body.label, body.start_date, body.end_date).await?)
}

pub async fn period_summary(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<PeriodSummary> {
    user.require_national("view accounting periods")?;
    ok(period::period_summary(&state.db, id).await?)
}

pub async fn close_period(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<PeriodSummary> {
    ok(period::close_period(&state.db, &user, id).await?)
}
