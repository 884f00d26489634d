//! Financial ledger and summaries.
//!
//! Each organizational unit (the national office, a site, a small group) keeps
//! its own ledger: transactions recorded at its level plus fund allocations it
//! sends or receives. Summaries only count approved transactions.

use crate::{
    core::{
        audit,
        level::resolve_placement,
        scope::{ActingUser, Resource, scope},
    },
    entities::{
        FinancialTransaction, FundAllocation, SmallGroup,
        enums::{AllocationSource, Level, Role, TransactionKind, TransactionStatus},
        financial_transaction, fund_allocation,
    },
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{Condition, QueryOrder, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};

/// Whose ledger a summary covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "level", content = "id", rename_all = "snake_case")]
pub enum FinanceScope {
    National,
    Site(i64),
    SmallGroup(i64),
}

impl FinanceScope {
    /// The ledger a user sees by default, `None` when they have none.
    #[must_use]
    pub fn for_user(user: &ActingUser) -> Option<Self> {
        match user.role {
            Role::NationalCoordinator => Some(Self::National),
            Role::SiteCoordinator => user.site_id.map(Self::Site),
            Role::SmallGroupLeader => user.small_group_id.map(Self::SmallGroup),
            Role::Member => None,
        }
    }
}

/// Inclusive calendar range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    /// Builds a range, rejecting `to < from`.
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self> {
        if to < from {
            return Err(Error::validation("date range ends before it starts"));
        }
        Ok(Self { from, to })
    }
}

/// Aggregated figures of one ledger.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FinancialSummary {
    /// Approved income plus allocations received
    pub total_income: f64,
    /// Approved expenses
    pub total_spent: f64,
    /// Allocations sent to other units
    pub total_allocated: f64,
    pub net_balance: f64,
    /// Net balance of the national ledger over the same range
    pub central_reserve: f64,
    /// `total_spent / total_income`, 0 when there is no income
    pub budget_utilization: f64,
}

/// Input for [`record_transaction`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewTransaction {
    pub kind: TransactionKind,
    pub category: String,
    pub amount: f64,
    #[serde(default)]
    pub description: Option<String>,
    pub transaction_date: NaiveDate,
    pub level: Level,
    #[serde(default)]
    pub site_id: Option<i64>,
    #[serde(default)]
    pub small_group_id: Option<i64>,
}

/// Optional filters for [`list_transactions`].
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct TransactionFilter {
    pub kind: Option<TransactionKind>,
    pub status: Option<TransactionStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// Rejects zero, negative and non-finite amounts.
pub fn validate_amount(amount: f64) -> Result<()> {
    if amount.is_finite() && amount > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidAmount { amount })
    }
}

/// Records an income or expense.
///
/// Transactions recorded by a national coordinator are approved immediately;
/// everyone else's wait for national approval.
#[instrument(skip(db, input), fields(actor = %user.external_id))]
pub async fn record_transaction(
    db: &DatabaseConnection,
    user: &ActingUser,
    input: NewTransaction,
) -> Result<financial_transaction::Model> {
    let recorded_by = user.require_profile()?;
    if user.role == Role::Member {
        return Err(Error::forbidden("members cannot record transactions"));
    }
    validate_amount(input.amount)?;
    let category = input.category.trim();
    if category.is_empty() {
        return Err(Error::validation("transaction category cannot be empty"));
    }

    let txn = db.begin().await?;
    let placement =
        resolve_placement(&txn, input.level, input.site_id, input.small_group_id).await?;
    if !scope(user, Resource::FinancialTransactions)
        .covers_target(placement.site_id, placement.small_group_id)
    {
        return Err(Error::forbidden("you cannot record transactions at this level"));
    }

    let (status, approved_by) = if user.is_national() {
        (TransactionStatus::Approved, Some(recorded_by))
    } else {
        (TransactionStatus::Pending, None)
    };

    let created = financial_transaction::ActiveModel {
        kind: Set(input.kind),
        status: Set(status),
        category: Set(category.to_string()),
        amount: Set(input.amount),
        description: Set(input.description),
        transaction_date: Set(input.transaction_date),
        level: Set(placement.level),
        site_id: Set(placement.site_id),
        small_group_id: Set(placement.small_group_id),
        report_id: Set(None),
        recorded_by: Set(recorded_by),
        approved_by: Set(approved_by),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    audit::record(
        &txn,
        user,
        "transaction.recorded",
        "financial_transaction",
        created.id,
        json!({ "kind": created.kind, "amount": created.amount, "status": created.status }),
    )
    .await?;
    txn.commit().await?;

    info!(transaction_id = created.id, kind = %created.kind, amount = created.amount, "transaction recorded");
    Ok(created)
}

/// Approves a pending transaction. National coordinators only.
pub async fn approve_transaction(
    db: &DatabaseConnection,
    user: &ActingUser,
    transaction_id: i64,
) -> Result<financial_transaction::Model> {
    user.require_national("approve transactions")?;
    let approver = user.require_profile()?;

    let txn = db.begin().await?;
    let found = FinancialTransaction::find_by_id(transaction_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("transaction", transaction_id))?;

    let result = FinancialTransaction::update_many()
        .set(financial_transaction::ActiveModel {
            status: Set(TransactionStatus::Approved),
            approved_by: Set(Some(approver)),
            ..Default::default()
        })
        .filter(financial_transaction::Column::Id.eq(transaction_id))
        .filter(financial_transaction::Column::Status.eq(TransactionStatus::Pending))
        .exec(&txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::InvalidTransition {
            entity: "transaction",
            from: found.status.to_string(),
            to: TransactionStatus::Approved.to_string(),
        });
    }

    audit::record(&txn, user, "transaction.approved", "financial_transaction", transaction_id, json!({}))
        .await?;
    let approved = FinancialTransaction::find_by_id(transaction_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("transaction", transaction_id))?;
    txn.commit().await?;
    Ok(approved)
}

/// Transactions visible to the user, most recent first.
pub async fn list_transactions(
    db: &DatabaseConnection,
    user: &ActingUser,
    filter: TransactionFilter,
) -> Result<Vec<financial_transaction::Model>> {
    let Some(condition) =
        scope(user, Resource::FinancialTransactions).condition::<FinancialTransaction>()
    else {
        return Ok(Vec::new());
    };

    let mut query = FinancialTransaction::find().filter(condition);
    if let Some(kind) = filter.kind {
        query = query.filter(financial_transaction::Column::Kind.eq(kind));
    }
    if let Some(status) = filter.status {
        query = query.filter(financial_transaction::Column::Status.eq(status));
    }
    if let Some(from) = filter.from {
        query = query.filter(financial_transaction::Column::TransactionDate.gte(from));
    }
    if let Some(to) = filter.to {
        query = query.filter(financial_transaction::Column::TransactionDate.lte(to));
    }

    query
        .order_by_desc(financial_transaction::Column::TransactionDate)
        .order_by_desc(financial_transaction::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

fn ledger_condition(ledger: FinanceScope) -> Condition {
    match ledger {
        FinanceScope::National => {
            Condition::all().add(financial_transaction::Column::Level.eq(Level::National))
        }
        FinanceScope::Site(site_id) => Condition::all()
            .add(financial_transaction::Column::Level.eq(Level::Site))
            .add(financial_transaction::Column::SiteId.eq(site_id)),
        FinanceScope::SmallGroup(group_id) => Condition::all()
            .add(financial_transaction::Column::Level.eq(Level::SmallGroup))
            .add(financial_transaction::Column::SmallGroupId.eq(group_id)),
    }
}

fn received_condition(ledger: FinanceScope) -> Option<Condition> {
    match ledger {
        FinanceScope::National => None,
        FinanceScope::Site(site_id) => Some(
            Condition::all()
                .add(fund_allocation::Column::DestinationSiteId.eq(site_id))
                .add(fund_allocation::Column::DestinationSmallGroupId.is_null()),
        ),
        FinanceScope::SmallGroup(group_id) => Some(
            Condition::all().add(fund_allocation::Column::DestinationSmallGroupId.eq(group_id)),
        ),
    }
}

fn sent_condition(ledger: FinanceScope) -> Option<Condition> {
    match ledger {
        FinanceScope::National => Some(
            Condition::all().add(fund_allocation::Column::Source.eq(AllocationSource::National)),
        ),
        FinanceScope::Site(site_id) => Some(
            Condition::all()
                .add(fund_allocation::Column::Source.eq(AllocationSource::Site))
                .add(fund_allocation::Column::SourceSiteId.eq(site_id)),
        ),
        FinanceScope::SmallGroup(_) => None,
    }
}

async fn sum_allocations<C>(conn: &C, condition: Option<Condition>, range: Option<DateRange>) -> Result<f64>
where
    C: ConnectionTrait,
{
    let Some(condition) = condition else {
        return Ok(0.0);
    };
    let mut query = FundAllocation::find().filter(condition);
    if let Some(range) = range {
        query = query
            .filter(fund_allocation::Column::AllocationDate.gte(range.from))
            .filter(fund_allocation::Column::AllocationDate.lte(range.to));
    }
    let rows = query.all(conn).await?;
    Ok(rows.iter().map(|a| a.amount).sum())
}

/// Income, spending and allocations of one ledger, without the central reserve.
async fn ledger_totals<C>(conn: &C, ledger: FinanceScope, range: Option<DateRange>) -> Result<FinancialSummary>
where
    C: ConnectionTrait,
{
    let mut query = FinancialTransaction::find()
        .filter(ledger_condition(ledger))
        .filter(financial_transaction::Column::Status.eq(TransactionStatus::Approved));
    if let Some(range) = range {
        query = query
            .filter(financial_transaction::Column::TransactionDate.gte(range.from))
            .filter(financial_transaction::Column::TransactionDate.lte(range.to));
    }
    let rows = query.all(conn).await?;

    let (income, spent) = rows.iter().fold((0.0, 0.0), |(income, spent), t| match t.kind {
        TransactionKind::Income => (income + t.amount, spent),
        TransactionKind::Expense => (income, spent + t.amount),
    });
    let received = sum_allocations(conn, received_condition(ledger), range).await?;
    let allocated = sum_allocations(conn, sent_condition(ledger), range).await?;

    let total_income = income + received;
    let net_balance = total_income - spent - allocated;
    let budget_utilization = if total_income > 0.0 { spent / total_income } else { 0.0 };

    Ok(FinancialSummary {
        total_income,
        total_spent: spent,
        total_allocated: allocated,
        net_balance,
        central_reserve: 0.0,
        budget_utilization,
    })
}

/// Computes the summary of one ledger, optionally restricted to a date range.
pub async fn compute_summary<C>(
    conn: &C,
    ledger: FinanceScope,
    range: Option<DateRange>,
) -> Result<FinancialSummary>
where
    C: ConnectionTrait,
{
    let mut summary = ledger_totals(conn, ledger, range).await?;
    summary.central_reserve = if ledger == FinanceScope::National {
        summary.net_balance
    } else {
        ledger_totals(conn, FinanceScope::National, range).await?.net_balance
    };
    Ok(summary)
}

/// Checks that `user` may read the ledger `requested`, defaulting to their own.
pub async fn authorize_ledger(
    db: &DatabaseConnection,
    user: &ActingUser,
    requested: Option<FinanceScope>,
) -> Result<FinanceScope> {
    let own = FinanceScope::for_user(user)
        .ok_or_else(|| Error::forbidden("you have no ledger to view"))?;
    let Some(requested) = requested else {
        return Ok(own);
    };

    let allowed = match (own, requested) {
        (FinanceScope::National, _) => true,
        (FinanceScope::Site(own_site), FinanceScope::Site(site)) => own_site == site,
        (FinanceScope::Site(own_site), FinanceScope::SmallGroup(group_id)) => SmallGroup::find_by_id(group_id)
            .one(db)
            .await?
            .is_some_and(|g| g.site_id == own_site),
        (FinanceScope::SmallGroup(own_group), FinanceScope::SmallGroup(group_id)) => own_group == group_id,
        _ => false,
    };

    if allowed {
        Ok(requested)
    } else {
        Err(Error::forbidden("you cannot view this ledger"))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    fn entry(kind: TransactionKind, amount: f64, level: Level, site: Option<i64>, group: Option<i64>) -> NewTransaction {
        NewTransaction {
            kind,
            category: "general".to_string(),
            amount,
            description: None,
            transaction_date: day(10),
            level,
            site_id: site,
            small_group_id: group,
        }
    }

    #[tokio::test]
    async fn test_invalid_amounts_rejected() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let national = acting_as(Role::NationalCoordinator, 1, None, None);

        for amount in [0.0, -10.0, f64::INFINITY, f64::NAN] {
            let result = record_transaction(
                &db,
                &national,
                entry(TransactionKind::Income, amount, Level::National, None, None),
            )
            .await;
            assert!(matches!(result, Err(Error::InvalidAmount { .. })));
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_members_cannot_record() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let member = acting_as(Role::Member, 7, None, None);
        let result = record_transaction(
            &db,
            &member,
            entry(TransactionKind::Income, 10.0, Level::National, None, None),
        )
        .await;
        assert!(matches!(result, Err(Error::Forbidden { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_national_net_balance() -> Result<()> {
        let db = setup_test_db().await?;
        let national = acting_as(Role::NationalCoordinator, 1, None, None);

        let income = record_transaction(
            &db,
            &national,
            entry(TransactionKind::Income, 1000.0, Level::National, None, None),
        )
        .await?;
        assert_eq!(income.status, TransactionStatus::Approved);
        record_transaction(
            &db,
            &national,
            entry(TransactionKind::Expense, 200.0, Level::National, None, None),
        )
        .await?;

        let summary = compute_summary(&db, FinanceScope::National, None).await?;
        assert!((summary.total_income - 1000.0).abs() < f64::EPSILON);
        assert!((summary.total_spent - 200.0).abs() < f64::EPSILON);
        assert!((summary.net_balance - 800.0).abs() < f64::EPSILON);
        assert!((summary.central_reserve - 800.0).abs() < f64::EPSILON);
        assert!((summary.budget_utilization - 0.2).abs() < 1e-9);
        Ok(())
    }

    #[tokio::test]
    async fn test_pending_transactions_excluded_until_approved() -> Result<()> {
        let db = setup_test_db().await?;
        let national = acting_as(Role::NationalCoordinator, 1, None, None);
        let site = create_test_site(&db, "North").await?;
        let coordinator = acting_as(Role::SiteCoordinator, 2, Some(site.id), None);

        let pending = record_transaction(
            &db,
            &coordinator,
            entry(TransactionKind::Income, 300.0, Level::Site, Some(site.id), None),
        )
        .await?;
        assert_eq!(pending.status, TransactionStatus::Pending);
        assert_eq!(pending.approved_by, None);

        let before = compute_summary(&db, FinanceScope::Site(site.id), None).await?;
        assert!(before.total_income.abs() < f64::EPSILON);

        let denied = approve_transaction(&db, &coordinator, pending.id).await;
        assert!(matches!(denied, Err(Error::Forbidden { .. })));

        approve_transaction(&db, &national, pending.id).await?;
        let after = compute_summary(&db, FinanceScope::Site(site.id), None).await?;
        assert!((after.net_balance - 300.0).abs() < f64::EPSILON);

        let twice = approve_transaction(&db, &national, pending.id).await;
        assert!(matches!(twice, Err(Error::InvalidTransition { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_date_range_limits_summary() -> Result<()> {
        let db = setup_test_db().await?;
        let national = acting_as(Role::NationalCoordinator, 1, None, None);
        let mut early = entry(TransactionKind::Income, 100.0, Level::National, None, None);
        early.transaction_date = day(2);
        let mut late = entry(TransactionKind::Income, 50.0, Level::National, None, None);
        late.transaction_date = day(20);
        record_transaction(&db, &national, early).await?;
        record_transaction(&db, &national, late).await?;

        let range = DateRange::new(day(1), day(15))?;
        let summary = compute_summary(&db, FinanceScope::National, Some(range)).await?;
        assert!((summary.total_income - 100.0).abs() < f64::EPSILON);
        assert!(DateRange::new(day(15), day(1)).is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_transactions_are_scoped() -> Result<()> {
        let db = setup_test_db().await?;
        let national = acting_as(Role::NationalCoordinator, 1, None, None);
        let site = create_test_site(&db, "North").await?;
        let harbor = create_test_small_group(&db, site.id, "Harbor").await?;
        let market = create_test_small_group(&db, site.id, "Market").await?;

        record_transaction(
            &db,
            &national,
            entry(TransactionKind::Income, 10.0, Level::SmallGroup, Some(site.id), Some(harbor.id)),
        )
        .await?;
        record_transaction(
            &db,
            &national,
            entry(TransactionKind::Income, 20.0, Level::SmallGroup, Some(site.id), Some(market.id)),
        )
        .await?;

        let leader = acting_as(Role::SmallGroupLeader, 3, Some(site.id), Some(harbor.id));
        let visible = list_transactions(&db, &leader, TransactionFilter::default()).await?;
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].small_group_id, Some(harbor.id));

        let foreign = record_transaction(
            &db,
            &leader,
            entry(TransactionKind::Expense, 5.0, Level::SmallGroup, Some(site.id), Some(market.id)),
        )
        .await;
        assert!(matches!(foreign, Err(Error::Forbidden { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_authorize_ledger() -> Result<()> {
        let db = setup_test_db().await?;
        let north = create_test_site(&db, "North").await?;
        let south = create_test_site(&db, "South").await?;
        let harbor = create_test_small_group(&db, north.id, "Harbor").await?;
        let coordinator = acting_as(Role::SiteCoordinator, 2, Some(north.id), None);

        assert_eq!(authorize_ledger(&db, &coordinator, None).await?, FinanceScope::Site(north.id));
        assert_eq!(
            authorize_ledger(&db, &coordinator, Some(FinanceScope::SmallGroup(harbor.id))).await?,
            FinanceScope::SmallGroup(harbor.id)
        );
        let denied = authorize_ledger(&db, &coordinator, Some(FinanceScope::Site(south.id))).await;
        assert!(matches!(denied, Err(Error::Forbidden { .. })));
        let denied = authorize_ledger(&db, &coordinator, Some(FinanceScope::National)).await;
        assert!(matches!(denied, Err(Error::Forbidden { .. })));

        let member = acting_as(Role::Member, 9, None, None);
        assert!(authorize_ledger(&db, &member, None).await.is_err());
        Ok(())
    }
}
