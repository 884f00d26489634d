//! Fund allocation between organizational units.
//!
//! Funds flow downwards: the national reserve funds sites or small groups,
//! and a site funds the small groups under it.

use crate::{
    config::settings::FinanceConfig,
    core::{
        audit,
        finance::{FinanceScope, compute_summary, validate_amount},
        notification,
        scope::{ActingUser, Resource, scope},
    },
    entities::{
        FundAllocation, Site, SmallGroup,
        enums::{AllocationSource, RecordStatus, Role},
        fund_allocation,
    },
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument, warn};

/// Input for [`allocate_funds`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewAllocation {
    pub source: AllocationSource,
    /// Required when `source` is a site
    #[serde(default)]
    pub source_site_id: Option<i64>,
    pub destination_site_id: i64,
    /// Set to fund a small group under the destination site
    #[serde(default)]
    pub destination_small_group_id: Option<i64>,
    pub amount: f64,
    pub goal: String,
    #[serde(default)]
    pub proof_reference: Option<String>,
    /// Defaults to today
    #[serde(default)]
    pub allocation_date: Option<NaiveDate>,
}

/// Result of [`allocate_funds`].
#[derive(Debug, Clone, Serialize)]
pub struct AllocationOutcome {
    pub allocation: fund_allocation::Model,
    /// The amount was larger than the source balance (lenient mode only)
    pub budget_exceeded: bool,
}

/// Checks the source/destination pair and returns the source ledger.
fn source_ledger(input: &NewAllocation) -> Result<FinanceScope> {
    match (input.source, input.source_site_id) {
        (AllocationSource::National, None) => Ok(FinanceScope::National),
        (AllocationSource::National, Some(_)) => {
            Err(Error::validation("a national allocation has no source site"))
        }
        (AllocationSource::Site, None) => Err(Error::validation("a site allocation needs a source site")),
        (AllocationSource::Site, Some(source_site)) => {
            if input.destination_small_group_id.is_none() {
                return Err(Error::validation("sites can only allocate to small groups"));
            }
            if input.destination_site_id != source_site {
                return Err(Error::validation(
                    "sites can only allocate to small groups under themselves",
                ));
            }
            Ok(FinanceScope::Site(source_site))
        }
    }
}

fn may_allocate(user: &ActingUser, input: &NewAllocation) -> bool {
    match user.role {
        Role::NationalCoordinator => true,
        Role::SiteCoordinator => {
            input.source == AllocationSource::Site
                && user.site_id.is_some()
                && input.source_site_id == user.site_id
        }
        Role::SmallGroupLeader | Role::Member => false,
    }
}

/// Moves funds from a source ledger to a site or small group.
///
/// When the amount exceeds the source's net balance the allocation is refused
/// under strict enforcement, otherwise it is recorded and flagged.
#[instrument(skip(db, input, finance), fields(actor = %user.external_id, amount = input.amount))]
pub async fn allocate_funds(
    db: &DatabaseConnection,
    user: &ActingUser,
    input: NewAllocation,
    finance: &FinanceConfig,
) -> Result<AllocationOutcome> {
    let allocated_by = user.require_profile()?;
    validate_amount(input.amount)?;
    if input.goal.trim().is_empty() {
        return Err(Error::validation("allocation goal cannot be empty"));
    }
    let ledger = source_ledger(&input)?;
    if !may_allocate(user, &input) {
        return Err(Error::forbidden("you cannot allocate funds from this source"));
    }

    let txn = db.begin().await?;
    let site = Site::find_by_id(input.destination_site_id)
        .one(&txn)
        .await?
        .filter(|s| s.record_status == RecordStatus::Active)
        .ok_or_else(|| Error::not_found("site", input.destination_site_id))?;
    let group = match input.destination_small_group_id {
        Some(group_id) => {
            let group = SmallGroup::find_by_id(group_id)
                .one(&txn)
                .await?
                .filter(|g| g.record_status == RecordStatus::Active)
                .ok_or_else(|| Error::not_found("small group", group_id))?;
            if group.site_id != site.id {
                return Err(Error::validation(format!(
                    "small group {group_id} does not belong to site {}",
                    site.id
                )));
            }
            Some(group)
        }
        None => None,
    };

    let available = compute_summary(&txn, ledger, None).await?.net_balance;
    let budget_exceeded = input.amount > available;
    if budget_exceeded {
        if finance.strict_budget_enforcement {
            return Err(Error::BudgetExceeded {
                available,
                requested: input.amount,
            });
        }
        warn!(?ledger, available, requested = input.amount, "allocation exceeds source balance");
    }

    let created = fund_allocation::ActiveModel {
        source: Set(input.source),
        source_site_id: Set(input.source_site_id),
        destination_site_id: Set(site.id),
        destination_small_group_id: Set(group.as_ref().map(|g| g.id)),
        amount: Set(input.amount),
        goal: Set(input.goal.trim().to_string()),
        proof_reference: Set(input.proof_reference),
        allocation_date: Set(input.allocation_date.unwrap_or_else(|| Utc::now().date_naive())),
        allocated_by: Set(allocated_by),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    audit::record(
        &txn,
        user,
        "allocation.created",
        "fund_allocation",
        created.id,
        json!({ "amount": created.amount, "source": created.source, "budget_exceeded": budget_exceeded }),
    )
    .await?;

    let recipient = match &group {
        Some(group) => group.leader_id,
        None => site.coordinator_id,
    };
    if let Some(recipient) = recipient {
        notification::notify(
            &txn,
            recipient,
            "Funds allocated",
            &format!("{:.2} allocated for: {}", created.amount, created.goal),
            Some(("fund_allocation", created.id)),
        )
        .await?;
    }
    txn.commit().await?;

    info!(allocation_id = created.id, budget_exceeded, "funds allocated");
    Ok(AllocationOutcome {
        allocation: created,
        budget_exceeded,
    })
}

/// Allocations received by units within the user's scope, newest first.
pub async fn list_allocations(
    db: &DatabaseConnection,
    user: &ActingUser,
) -> Result<Vec<fund_allocation::Model>> {
    let Some(condition) = scope(user, Resource::FundAllocations).condition::<FundAllocation>() else {
        return Ok(Vec::new());
    };

    FundAllocation::find()
        .filter(condition)
        .order_by_desc(fund_allocation::Column::AllocationDate)
        .order_by_desc(fund_allocation::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}
