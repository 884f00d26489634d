//! Start-up seeding of reference data from `config.toml`.

use crate::{
    config::AppConfig,
    core::{audit, scope::ActingUser},
    entities::{ActivityType, Site, activity_type, enums::RecordStatus, site},
    errors::Result,
};
use chrono::Utc;
use sea_orm::{Set, TransactionTrait, prelude::*};
use serde_json::json;
use tracing::info;

/// How many rows a seeding run inserted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub sites_created: usize,
    pub activity_types_created: usize,
}

/// Inserts configured sites and activity types that do not exist yet.
///
/// Matching is by name, so running this on every start is harmless.
pub async fn seed_reference_data(db: &DatabaseConnection, config: &AppConfig) -> Result<SeedSummary> {
    let actor = ActingUser::for_system("seed");
    let mut summary = SeedSummary::default();
    let txn = db.begin().await?;

    for seed in &config.sites {
        let name = seed.name.trim();
        if name.is_empty() {
            continue;
        }
        let exists = Site::find().filter(site::Column::Name.eq(name)).one(&txn).await?;
        if exists.is_some() {
            continue;
        }
        let created = site::ActiveModel {
            name: Set(name.to_string()),
            description: Set(seed.description.clone()),
            coordinator_id: Set(None),
            record_status: Set(RecordStatus::Active),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        audit::record(&txn, &actor, "site.created", "site", created.id, json!({ "name": name })).await?;
        summary.sites_created += 1;
    }

    for seed in &config.activity_types {
        let name = seed.name.trim();
        if name.is_empty() {
            continue;
        }
        let exists = ActivityType::find()
            .filter(activity_type::Column::Name.eq(name))
            .one(&txn)
            .await?;
        if exists.is_some() {
            continue;
        }
        activity_type::ActiveModel {
            name: Set(name.to_string()),
            description: Set(seed.description.clone()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        summary.activity_types_created += 1;
    }

    txn.commit().await?;
    info!(
        sites = summary.sites_created,
        activity_types = summary.activity_types_created,
        "reference data seeded"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::parse_config;
    use crate::test_utils::setup_test_db;

    #[tokio::test]
    async fn test_seeding_is_idempotent() -> Result<()> {
        let db = setup_test_db().await?;
        let config = parse_config(
            r#"
            [[sites]]
            name = "North"

            [[sites]]
            name = "South"
            description = "Coastal towns"

            [[activity_types]]
            name = "Outreach"
            "#,
        )?;

        let first = seed_reference_data(&db, &config).await?;
        assert_eq!(first.sites_created, 2);
        assert_eq!(first.activity_types_created, 1);

        let second = seed_reference_data(&db, &config).await?;
        assert_eq!(second, SeedSummary::default());
        assert_eq!(Site::find().all(&db).await?.len(), 2);
        Ok(())
    }
}
