//! Activity report workflow.
//!
//! A report is filed against an executed activity and then approved or
//! rejected by a national coordinator. Approval is single-shot: the status
//! flip is conditioned on the report still awaiting review, so a second
//! approval changes nothing and books no second expense.

use crate::{
    core::{
        audit, notification,
        scope::{ActingUser, Resource, can_view_report, scope},
    },
    entities::{
        Activity, FinancialTransaction, Report,
        enums::{ActivityStatus, RecordStatus, ReportStatus, TransactionKind, TransactionStatus},
        financial_transaction, report,
    },
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

/// Ledger category of expenses generated by report approval.
pub const REPORT_EXPENSE_CATEGORY: &str = "activity_report";

/// Input for [`submit_report`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewReport {
    pub activity_id: i64,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub participants_count: i32,
    #[serde(default)]
    pub total_income: f64,
    #[serde(default)]
    pub total_expenses: f64,
}

fn check_money(amount: f64) -> Result<()> {
    if amount.is_finite() && amount >= 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidAmount { amount })
    }
}

/// Files a report for an executed activity.
///
/// Level, site and small group are copied from the activity so the report is
/// scoped exactly like the work it describes.
#[instrument(skip(db, input), fields(actor = %user.external_id, activity_id = input.activity_id))]
pub async fn submit_report(
    db: &DatabaseConnection,
    user: &ActingUser,
    input: NewReport,
) -> Result<report::Model> {
    let submitted_by = user.require_profile()?;
    if input.title.trim().is_empty() {
        return Err(Error::validation("report title cannot be empty"));
    }
    if input.participants_count < 0 {
        return Err(Error::validation("participants count cannot be negative"));
    }
    check_money(input.total_income)?;
    check_money(input.total_expenses)?;

    let txn = db.begin().await?;
    let activity = Activity::find_by_id(input.activity_id)
        .one(&txn)
        .await?
        .filter(|a| a.record_status != RecordStatus::Deleted)
        .ok_or_else(|| Error::not_found("activity", input.activity_id))?;

    if !scope(user, Resource::Activities).permits(
        activity.site_id,
        activity.small_group_id,
        Some(activity.created_by),
    ) {
        return Err(Error::not_found("activity", input.activity_id));
    }
    if activity.status != ActivityStatus::Executed {
        return Err(Error::validation(format!(
            "reports can only be filed for executed activities (activity is {})",
            activity.status
        )));
    }

    let created = report::ActiveModel {
        activity_id: Set(activity.id),
        title: Set(input.title.trim().to_string()),
        content: Set(input.content),
        level: Set(activity.level),
        site_id: Set(activity.site_id),
        small_group_id: Set(activity.small_group_id),
        participants_count: Set(input.participants_count),
        total_income: Set(input.total_income),
        total_expenses: Set(input.total_expenses),
        status: Set(ReportStatus::Submitted),
        submitted_by: Set(submitted_by),
        submitted_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    audit::record(
        &txn,
        user,
        "report.submitted",
        "report",
        created.id,
        json!({ "activity_id": activity.id, "total_expenses": created.total_expenses }),
    )
    .await?;
    txn.commit().await?;

    info!(report_id = created.id, "report submitted");
    Ok(created)
}

/// Retrieves a report, enforcing the detail-level capability check.
pub async fn get_report(
    db: &DatabaseConnection,
    user: &ActingUser,
    report_id: i64,
) -> Result<report::Model> {
    let found = Report::find_by_id(report_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("report", report_id))?;

    if can_view_report(user, &found) {
        Ok(found)
    } else {
        Err(Error::forbidden("you are not allowed to view this report"))
    }
}

/// Reports visible to the user, newest first, optionally filtered by status.
pub async fn list_reports(
    db: &DatabaseConnection,
    user: &ActingUser,
    status: Option<ReportStatus>,
) -> Result<Vec<report::Model>> {
    let Some(condition) = scope(user, Resource::Reports).condition::<Report>() else {
        return Ok(Vec::new());
    };

    let mut query = Report::find().filter(condition);
    if let Some(status) = status {
        query = query.filter(report::Column::Status.eq(status));
    }
    query
        .order_by_desc(report::Column::SubmittedAt)
        .order_by_desc(report::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Flips a report out of the awaiting-review states.
///
/// Returns `InvalidTransition` when no row was affected, which is what a
/// concurrent or repeated review observes.
async fn flip_reviewed<C>(
    conn: &C,
    found: &report::Model,
    to: ReportStatus,
    reviewer: i64,
    notes: Option<String>,
) -> Result<()>
where
    C: ConnectionTrait,
{
    let result = Report::update_many()
        .set(report::ActiveModel {
            status: Set(to),
            reviewed_by: Set(Some(reviewer)),
            reviewed_at: Set(Some(Utc::now())),
            review_notes: Set(notes),
            ..Default::default()
        })
        .filter(report::Column::Id.eq(found.id))
        .filter(report::Column::Status.is_in(ReportStatus::AWAITING_REVIEW))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(Error::InvalidTransition {
            entity: "report",
            from: found.status.to_string(),
            to: to.to_string(),
        });
    }
    Ok(())
}

async fn load_for_review<C>(conn: &C, report_id: i64, to: ReportStatus) -> Result<report::Model>
where
    C: ConnectionTrait,
{
    let found = Report::find_by_id(report_id)
        .one(conn)
        .await?
        .ok_or_else(|| Error::not_found("report", report_id))?;
    if !found.status.is_awaiting_review() {
        return Err(Error::InvalidTransition {
            entity: "report",
            from: found.status.to_string(),
            to: to.to_string(),
        });
    }
    Ok(found)
}

/// Approves a report awaiting review.
///
/// In one database transaction: flips the status, books the reported expenses
/// as an approved ledger expense (when there are any), writes one audit row
/// and notifies the submitter.
#[instrument(skip(db), fields(actor = %user.external_id))]
pub async fn approve_report(
    db: &DatabaseConnection,
    user: &ActingUser,
    report_id: i64,
) -> Result<report::Model> {
    user.require_national("approve reports")?;
    let reviewer = user.require_profile()?;

    let txn = db.begin().await?;
    let found = load_for_review(&txn, report_id, ReportStatus::Approved).await?;
    flip_reviewed(&txn, &found, ReportStatus::Approved, reviewer, None).await?;

    let expense_id = if found.total_expenses > 0.0 {
        let expense = financial_transaction::ActiveModel {
            kind: Set(TransactionKind::Expense),
            status: Set(TransactionStatus::Approved),
            category: Set(REPORT_EXPENSE_CATEGORY.to_string()),
            amount: Set(found.total_expenses),
            description: Set(Some(format!("Report #{}: {}", found.id, found.title))),
            transaction_date: Set(Utc::now().date_naive()),
            level: Set(found.level),
            site_id: Set(found.site_id),
            small_group_id: Set(found.small_group_id),
            report_id: Set(Some(found.id)),
            recorded_by: Set(reviewer),
            approved_by: Set(Some(reviewer)),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        Some(expense.id)
    } else {
        None
    };

    audit::record(
        &txn,
        user,
        "report.approved",
        "report",
        found.id,
        json!({ "total_expenses": found.total_expenses, "transaction_id": expense_id }),
    )
    .await?;
    notification::notify(
        &txn,
        found.submitted_by,
        "Report approved",
        &format!("Your report \"{}\" has been approved.", found.title),
        Some(("report", found.id)),
    )
    .await?;

    let approved = Report::find_by_id(report_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("report", report_id))?;
    txn.commit().await?;

    info!(report_id, ?expense_id, "report approved");
    Ok(approved)
}

/// Rejects a report awaiting review. The reason is required and is shown to
/// the submitter.
#[instrument(skip(db, reason), fields(actor = %user.external_id))]
pub async fn reject_report(
    db: &DatabaseConnection,
    user: &ActingUser,
    report_id: i64,
    reason: &str,
) -> Result<report::Model> {
    user.require_national("reject reports")?;
    let reviewer = user.require_profile()?;
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(Error::validation("a rejection reason is required"));
    }

    let txn = db.begin().await?;
    let found = load_for_review(&txn, report_id, ReportStatus::Rejected).await?;
    flip_reviewed(&txn, &found, ReportStatus::Rejected, reviewer, Some(reason.to_string())).await?;

    audit::record(&txn, user, "report.rejected", "report", found.id, json!({ "reason": reason })).await?;
    notification::notify(
        &txn,
        found.submitted_by,
        "Report rejected",
        &format!("Your report \"{}\" was rejected: {reason}", found.title),
        Some(("report", found.id)),
    )
    .await?;

    let rejected = Report::find_by_id(report_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("report", report_id))?;
    txn.commit().await?;

    info!(report_id, "report rejected");
    Ok(rejected)
}

/// Ledger rows generated by approving `report_id`.
pub async fn report_transactions(
    db: &DatabaseConnection,
    report_id: i64,
) -> Result<Vec<financial_transaction::Model>> {
    FinancialTransaction::find()
        .filter(financial_transaction::Column::ReportId.eq(report_id))
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::core::audit::{AuditFilter, list_audit_logs};
    use crate::core::notification::list_notifications;
    use crate::entities::enums::Role;
    use crate::test_utils::*;

    fn report_for(activity_id: i64, expenses: f64) -> NewReport {
        NewReport {
            activity_id,
            title: "Harbor outreach".to_string(),
            content: "Twelve people joined.".to_string(),
            participants_count: 12,
            total_income: 0.0,
            total_expenses: expenses,
        }
    }

    #[tokio::test]
    async fn test_report_requires_executed_activity() -> Result<()> {
        let db = setup_test_db().await?;
        let (national, _) = create_national(&db).await?;
        let activity = create_planned_activity(&db, &national).await?;

        let result = submit_report(&db, &national, report_for(activity.id, 10.0)).await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_negative_expenses_rejected() -> Result<()> {
        let db = setup_test_db().await?;
        let (national, _) = create_national(&db).await?;
        let activity = create_executed_activity(&db, &national, None).await?;

        let result = submit_report(&db, &national, report_for(activity.id, -5.0)).await;
        assert!(matches!(result, Err(Error::InvalidAmount { .. })));
        let result = submit_report(&db, &national, report_for(activity.id, f64::NAN)).await;
        assert!(matches!(result, Err(Error::InvalidAmount { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_leader_report_approval_books_one_expense() -> Result<()> {
        let db = setup_test_db().await?;
        let (national, _) = create_national(&db).await?;
        let site = create_test_site(&db, "North").await?;
        let group = create_test_small_group(&db, site.id, "Harbor").await?;
        let (leader_profile, leader) = create_test_profile(
            &db,
            "idp|leader",
            Role::SmallGroupLeader,
            Some(site.id),
            Some(group.id),
        )
        .await?;
        let activity = create_executed_activity(&db, &leader, Some((site.id, group.id))).await?;

        let submitted = submit_report(&db, &leader, report_for(activity.id, 50.0)).await?;
        assert_eq!(submitted.status, ReportStatus::Submitted);
        assert_eq!(submitted.small_group_id, Some(group.id));

        let approved = approve_report(&db, &national, submitted.id).await?;
        assert_eq!(approved.status, ReportStatus::Approved);
        assert_eq!(approved.reviewed_by, national.profile_id);

        let booked = report_transactions(&db, submitted.id).await?;
        assert_eq!(booked.len(), 1);
        assert_eq!(booked[0].kind, TransactionKind::Expense);
        assert_eq!(booked[0].status, TransactionStatus::Approved);
        assert!((booked[0].amount - 50.0).abs() < f64::EPSILON);
        assert_eq!(booked[0].category, REPORT_EXPENSE_CATEGORY);

        let filter = AuditFilter {
            entity_type: Some("report".to_string()),
            entity_id: Some(submitted.id.to_string()),
            action: Some("report.approved".to_string()),
            ..Default::default()
        };
        assert_eq!(list_audit_logs(&db, &national, &filter).await?.len(), 1);

        let inbox = list_notifications(&db, &leader).await?;
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].profile_id, leader_profile.id);
        Ok(())
    }

    #[tokio::test]
    async fn test_double_approval_books_single_expense() -> Result<()> {
        let db = setup_test_db().await?;
        let (national, _) = create_national(&db).await?;
        let activity = create_executed_activity(&db, &national, None).await?;
        let submitted = submit_report(&db, &national, report_for(activity.id, 80.0)).await?;

        approve_report(&db, &national, submitted.id).await?;
        let second = approve_report(&db, &national, submitted.id).await;
        assert!(matches!(second, Err(Error::InvalidTransition { .. })));

        assert_eq!(report_transactions(&db, submitted.id).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_zero_expense_approval_books_nothing() -> Result<()> {
        let db = setup_test_db().await?;
        let (national, _) = create_national(&db).await?;
        let activity = create_executed_activity(&db, &national, None).await?;
        let submitted = submit_report(&db, &national, report_for(activity.id, 0.0)).await?;

        approve_report(&db, &national, submitted.id).await?;
        assert!(report_transactions(&db, submitted.id).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_reject_requires_reason() -> Result<()> {
        let db = setup_test_db().await?;
        let (national, _) = create_national(&db).await?;
        let activity = create_executed_activity(&db, &national, None).await?;
        let submitted = submit_report(&db, &national, report_for(activity.id, 20.0)).await?;

        let result = reject_report(&db, &national, submitted.id, "   ").await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        let unchanged = get_report(&db, &national, submitted.id).await?;
        assert_eq!(unchanged.status, ReportStatus::Submitted);

        let rejected = reject_report(&db, &national, submitted.id, "Missing receipts").await?;
        assert_eq!(rejected.status, ReportStatus::Rejected);
        assert_eq!(rejected.review_notes.as_deref(), Some("Missing receipts"));

        let approve_after = approve_report(&db, &national, submitted.id).await;
        assert!(matches!(approve_after, Err(Error::InvalidTransition { .. })));
        assert!(report_transactions(&db, submitted.id).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_only_national_reviews() -> Result<()> {
        let db = setup_test_db().await?;
        let (national, _) = create_national(&db).await?;
        let site = create_test_site(&db, "North").await?;
        let activity = create_executed_activity(&db, &national, None).await?;
        let submitted = submit_report(&db, &national, report_for(activity.id, 20.0)).await?;
        let (_, coordinator) =
            create_test_profile(&db, "idp|coord", Role::SiteCoordinator, Some(site.id), None).await?;

        let result = approve_report(&db, &coordinator, submitted.id).await;
        assert!(matches!(result, Err(Error::Forbidden { .. })));
        let result = reject_report(&db, &coordinator, submitted.id, "no").await;
        assert!(matches!(result, Err(Error::Forbidden { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_report_visibility() -> Result<()> {
        let db = setup_test_db().await?;
        let (national, _) = create_national(&db).await?;
        let site = create_test_site(&db, "North").await?;
        let harbor = create_test_small_group(&db, site.id, "Harbor").await?;
        let market = create_test_small_group(&db, site.id, "Market").await?;
        let (_, leader) = create_test_profile(
            &db,
            "idp|leader",
            Role::SmallGroupLeader,
            Some(site.id),
            Some(harbor.id),
        )
        .await?;
        let (_, other_leader) = create_test_profile(
            &db,
            "idp|other",
            Role::SmallGroupLeader,
            Some(site.id),
            Some(market.id),
        )
        .await?;
        let (_, coordinator) =
            create_test_profile(&db, "idp|coord", Role::SiteCoordinator, Some(site.id), None).await?;

        let activity = create_executed_activity(&db, &leader, Some((site.id, harbor.id))).await?;
        let submitted = submit_report(&db, &leader, report_for(activity.id, 5.0)).await?;

        assert!(get_report(&db, &coordinator, submitted.id).await.is_ok());
        let denied = get_report(&db, &other_leader, submitted.id).await;
        assert!(matches!(denied, Err(Error::Forbidden { .. })));

        assert_eq!(list_reports(&db, &leader, None).await?.len(), 1);
        assert!(list_reports(&db, &other_leader, None).await?.is_empty());
        assert_eq!(list_reports(&db, &national, Some(ReportStatus::Submitted)).await?.len(), 1);
        assert!(list_reports(&db, &national, Some(ReportStatus::Approved)).await?.is_empty());
        Ok(())
    }
}
