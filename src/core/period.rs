//! Accounting periods and their frozen snapshots.
//!
//! Closing a period computes the national summary for its date range and
//! stores it in a `period_snapshot` row written in the same transaction as the
//! status change. A closed period always reports its snapshot, so later
//! corrections to the ledger never alter figures that were already published.

use crate::{
    core::{
        audit,
        finance::{DateRange, FinanceScope, FinancialSummary, compute_summary},
        scope::ActingUser,
    },
    entities::{
        AccountingPeriod, PeriodSnapshot, accounting_period, enums::PeriodStatus, period_snapshot,
    },
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::Serialize;
use serde_json::json;
use tracing::{info, instrument};

/// Summary of a period together with where the figures came from.
#[derive(Debug, Clone, Serialize)]
pub struct PeriodSummary {
    pub period: accounting_period::Model,
    pub summary: FinancialSummary,
    /// `true` when served from the snapshot taken at closing
    pub frozen: bool,
}

/// Opens a new accounting period. Periods may not overlap.
pub async fn create_period(
    db: &DatabaseConnection,
    user: &ActingUser,
    label: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<accounting_period::Model> {
    user.require_national("create accounting periods")?;
    let label = label.trim();
    if label.is_empty() {
        return Err(Error::validation("period label cannot be empty"));
    }
    DateRange::new(start_date, end_date)?;

    let txn = db.begin().await?;
    let overlapping = AccountingPeriod::find()
        .filter(accounting_period::Column::StartDate.lte(end_date))
        .filter(accounting_period::Column::EndDate.gte(start_date))
        .one(&txn)
        .await?;
    if let Some(other) = overlapping {
        return Err(Error::validation(format!(
            "period overlaps with '{}' ({} to {})",
            other.label, other.start_date, other.end_date
        )));
    }

    let created = accounting_period::ActiveModel {
        label: Set(label.to_string()),
        start_date: Set(start_date),
        end_date: Set(end_date),
        status: Set(PeriodStatus::Open),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    audit::record(&txn, user, "period.created", "accounting_period", created.id, json!({ "label": label }))
        .await?;
    txn.commit().await?;
    Ok(created)
}

async fn find_period<C>(conn: &C, period_id: i64) -> Result<accounting_period::Model>
where
    C: ConnectionTrait,
{
    AccountingPeriod::find_by_id(period_id)
        .one(conn)
        .await?
        .ok_or_else(|| Error::not_found("period", period_id))
}

fn range_of(period: &accounting_period::Model) -> DateRange {
    DateRange {
        from: period.start_date,
        to: period.end_date,
    }
}

/// Closes an open period and freezes its national summary.
#[instrument(skip(db), fields(actor = %user.external_id))]
pub async fn close_period(
    db: &DatabaseConnection,
    user: &ActingUser,
    period_id: i64,
) -> Result<PeriodSummary> {
    user.require_national("close accounting periods")?;
    let closed_by = user.require_profile()?;

    let txn = db.begin().await?;
    let found = find_period(&txn, period_id).await?;

    let result = AccountingPeriod::update_many()
        .set(accounting_period::ActiveModel {
            status: Set(PeriodStatus::Closed),
            closed_by: Set(Some(closed_by)),
            closed_at: Set(Some(Utc::now())),
            ..Default::default()
        })
        .filter(accounting_period::Column::Id.eq(period_id))
        .filter(accounting_period::Column::Status.eq(PeriodStatus::Open))
        .exec(&txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::InvalidTransition {
            entity: "period",
            from: found.status.to_string(),
            to: PeriodStatus::Closed.to_string(),
        });
    }

    let summary = compute_summary(&txn, FinanceScope::National, Some(range_of(&found))).await?;
    period_snapshot::ActiveModel {
        period_id: Set(period_id),
        total_income: Set(summary.total_income),
        total_spent: Set(summary.total_spent),
        total_allocated: Set(summary.total_allocated),
        net_balance: Set(summary.net_balance),
        budget_utilization: Set(summary.budget_utilization),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    audit::record(
        &txn,
        user,
        "period.closed",
        "accounting_period",
        period_id,
        json!({ "net_balance": summary.net_balance }),
    )
    .await?;
    let period = find_period(&txn, period_id).await?;
    txn.commit().await?;

    info!(period_id, net_balance = summary.net_balance, "period closed");
    Ok(PeriodSummary {
        period,
        summary,
        frozen: true,
    })
}

/// Figures for a period: the snapshot when closed, a live computation when open.
pub async fn period_summary(db: &DatabaseConnection, period_id: i64) -> Result<PeriodSummary> {
    let period = find_period(db, period_id).await?;

    if period.status == PeriodStatus::Closed {
        let snapshot = PeriodSnapshot::find()
            .filter(period_snapshot::Column::PeriodId.eq(period_id))
            .one(db)
            .await?
            .ok_or_else(|| Error::not_found("period snapshot", period_id))?;
        let summary = FinancialSummary {
            total_income: snapshot.total_income,
            total_spent: snapshot.total_spent,
            total_allocated: snapshot.total_allocated,
            net_balance: snapshot.net_balance,
            central_reserve: snapshot.net_balance,
            budget_utilization: snapshot.budget_utilization,
        };
        return Ok(PeriodSummary {
            period,
            summary,
            frozen: true,
        });
    }

    let summary = compute_summary(db, FinanceScope::National, Some(range_of(&period))).await?;
    Ok(PeriodSummary {
        period,
        summary,
        frozen: false,
    })
}

/// All periods, most recent first.
pub async fn list_periods(db: &DatabaseConnection) -> Result<Vec<accounting_period::Model>> {
    AccountingPeriod::find()
        .order_by_desc(accounting_period::Column::StartDate)
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::core::finance::{NewTransaction, record_transaction};
    use crate::entities::enums::{Level, Role, TransactionKind};
    use crate::test_utils::*;

    fn date(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, month, day).unwrap()
    }

    fn income_on(when: NaiveDate, amount: f64) -> NewTransaction {
        NewTransaction {
            kind: TransactionKind::Income,
            category: "donation".to_string(),
            amount,
            description: None,
            transaction_date: when,
            level: Level::National,
            site_id: None,
            small_group_id: None,
        }
    }

    #[tokio::test]
    async fn test_closed_period_is_frozen() -> Result<()> {
        let db = setup_test_db().await?;
        let national = acting_as(Role::NationalCoordinator, 1, None, None);
        let q1 = create_period(&db, &national, "Q1 2026", date(1, 1), date(3, 31)).await?;
        record_transaction(&db, &national, income_on(date(2, 1), 400.0)).await?;

        let open = period_summary(&db, q1.id).await?;
        assert!(!open.frozen);
        assert!((open.summary.total_income - 400.0).abs() < f64::EPSILON);

        let closed = close_period(&db, &national, q1.id).await?;
        assert!(closed.frozen);
        assert_eq!(closed.period.status, PeriodStatus::Closed);

        // A late correction dated inside the period does not move published figures
        record_transaction(&db, &national, income_on(date(3, 15), 100.0)).await?;
        let later = period_summary(&db, q1.id).await?;
        assert!(later.frozen);
        assert!((later.summary.total_income - 400.0).abs() < f64::EPSILON);
        Ok(())
    }

    #[tokio::test]
    async fn test_period_closes_once() -> Result<()> {
        let db = setup_test_db().await?;
        let national = acting_as(Role::NationalCoordinator, 1, None, None);
        let q1 = create_period(&db, &national, "Q1 2026", date(1, 1), date(3, 31)).await?;

        close_period(&db, &national, q1.id).await?;
        let again = close_period(&db, &national, q1.id).await;
        assert!(matches!(again, Err(Error::InvalidTransition { .. })));

        let snapshots = PeriodSnapshot::find().all(&db).await?;
        assert_eq!(snapshots.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_periods_cannot_overlap() -> Result<()> {
        let db = setup_test_db().await?;
        let national = acting_as(Role::NationalCoordinator, 1, None, None);
        create_period(&db, &national, "Q1 2026", date(1, 1), date(3, 31)).await?;

        let overlap = create_period(&db, &national, "Feb-Apr", date(2, 1), date(4, 30)).await;
        assert!(matches!(overlap, Err(Error::Validation { .. })));
        let backwards = create_period(&db, &national, "Bad", date(6, 1), date(5, 1)).await;
        assert!(matches!(backwards, Err(Error::Validation { .. })));

        create_period(&db, &national, "Q2 2026", date(4, 1), date(6, 30)).await?;
        assert_eq!(list_periods(&db).await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_only_national_closes() -> Result<()> {
        let db = setup_test_db().await?;
        let national = acting_as(Role::NationalCoordinator, 1, None, None);
        let q1 = create_period(&db, &national, "Q1 2026", date(1, 1), date(3, 31)).await?;
        let coordinator = acting_as(Role::SiteCoordinator, 2, Some(1), None);

        let result = close_period(&db, &coordinator, q1.id).await;
        assert!(matches!(result, Err(Error::Forbidden { .. })));
        Ok(())
    }
}
