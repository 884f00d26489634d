//! Dashboard counters, scoped like every other read.

use crate::{
    core::scope::{ActingUser, Resource, scope},
    entities::{
        Activity, FinancialTransaction, Member, Report, activity,
        enums::{RecordStatus, ReportStatus, TransactionStatus},
        financial_transaction, member, report,
    },
    errors::Result,
};
use sea_orm::{PaginatorTrait, prelude::*};
use serde::Serialize;
use std::collections::BTreeMap;

/// Counts shown on the dashboard.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Overview {
    pub active_members: u64,
    /// Non-deleted activities keyed by status
    pub activities_by_status: BTreeMap<String, u64>,
    pub reports_awaiting_review: u64,
    pub reports_approved: u64,
    pub reports_rejected: u64,
    pub pending_transactions: u64,
}

/// Computes the dashboard for `user`. Rows outside the user's scope are not counted.
pub async fn overview(db: &DatabaseConnection, user: &ActingUser) -> Result<Overview> {
    let mut out = Overview::default();

    if let Some(condition) = scope(user, Resource::Members).condition::<Member>() {
        out.active_members = Member::find()
            .filter(condition)
            .filter(member::Column::RecordStatus.eq(RecordStatus::Active))
            .count(db)
            .await?;
    }

    if let Some(condition) = scope(user, Resource::Activities).condition::<Activity>() {
        let activities = Activity::find()
            .filter(condition)
            .filter(activity::Column::RecordStatus.ne(RecordStatus::Deleted))
            .all(db)
            .await?;
        for a in activities {
            *out.activities_by_status.entry(a.status.to_string()).or_default() += 1;
        }
    }

    if let Some(condition) = scope(user, Resource::Reports).condition::<Report>() {
        let reports = Report::find().filter(condition).all(db).await?;
        for r in &reports {
            match r.status {
                ReportStatus::Pending | ReportStatus::Submitted => out.reports_awaiting_review += 1,
                ReportStatus::Approved => out.reports_approved += 1,
                ReportStatus::Rejected => out.reports_rejected += 1,
            }
        }
    }

    if let Some(condition) =
        scope(user, Resource::FinancialTransactions).condition::<FinancialTransaction>()
    {
        out.pending_transactions = FinancialTransaction::find()
            .filter(condition)
            .filter(financial_transaction::Column::Status.eq(TransactionStatus::Pending))
            .count(db)
            .await?;
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::report::{NewReport, submit_report};
    use crate::entities::enums::Role;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_overview_counts_scoped_rows() -> Result<()> {
        let db = setup_test_db().await?;
        let (national, _) = create_national(&db).await?;
        let activity = create_executed_activity(&db, &national, None).await?;
        create_planned_activity(&db, &national).await?;
        submit_report(
            &db,
            &national,
            NewReport {
                activity_id: activity.id,
                title: "Summary".to_string(),
                content: String::new(),
                participants_count: 3,
                total_income: 0.0,
                total_expenses: 0.0,
            },
        )
        .await?;

        let dashboard = overview(&db, &national).await?;
        assert_eq!(dashboard.activities_by_status.get("executed"), Some(&1));
        assert_eq!(dashboard.activities_by_status.get("planned"), Some(&1));
        assert_eq!(dashboard.reports_awaiting_review, 1);

        let site = create_test_site(&db, "North").await?;
        let coordinator = acting_as(Role::SiteCoordinator, 5, Some(site.id), None);
        let empty = overview(&db, &coordinator).await?;
        assert!(empty.activities_by_status.is_empty());
        assert_eq!(empty.reports_awaiting_review, 0);
        Ok(())
    }
}
