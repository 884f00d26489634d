//! Level placement rules shared by members, activities, transactions and
//! inventory items.
//!
//! `national` rows carry no site or group, `site` rows carry a site only and
//! `small_group` rows carry both, with the group belonging to the site.

use crate::{
    entities::{SmallGroup, enums::Level, enums::RecordStatus, Site},
    errors::{Error, Result},
};
use sea_orm::{ConnectionTrait, EntityTrait};
use serde::{Deserialize, Serialize};

/// A validated level placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub level: Level,
    pub site_id: Option<i64>,
    pub small_group_id: Option<i64>,
}

/// Checks the shape of a placement without touching the database.
pub fn validate_placement(
    level: Level,
    site_id: Option<i64>,
    small_group_id: Option<i64>,
) -> Result<Placement> {
    match (level, site_id, small_group_id) {
        (Level::National, None, None) => Ok(Placement {
            level,
            site_id: None,
            small_group_id: None,
        }),
        (Level::National, _, _) => Err(Error::validation(
            "national level records cannot reference a site or small group",
        )),
        (Level::Site, Some(site), None) => Ok(Placement {
            level,
            site_id: Some(site),
            small_group_id: None,
        }),
        (Level::Site, None, _) => Err(Error::validation("site level requires a site")),
        (Level::Site, Some(_), Some(_)) => Err(Error::validation(
            "site level records cannot reference a small group",
        )),
        (Level::SmallGroup, Some(site), Some(group)) => Ok(Placement {
            level,
            site_id: Some(site),
            small_group_id: Some(group),
        }),
        (Level::SmallGroup, _, _) => Err(Error::validation(
            "small group level requires both a site and a small group",
        )),
    }
}

/// Validates a placement and checks that the referenced site and group exist,
/// are active and belong together.
pub async fn resolve_placement<C>(
    conn: &C,
    level: Level,
    site_id: Option<i64>,
    small_group_id: Option<i64>,
) -> Result<Placement>
where
    C: ConnectionTrait,
{
    let placement = validate_placement(level, site_id, small_group_id)?;

    if let Some(site_id) = placement.site_id {
        let site = Site::find_by_id(site_id)
            .one(conn)
            .await?
            .filter(|s| s.record_status == RecordStatus::Active)
            .ok_or_else(|| Error::not_found("site", site_id))?;

        if let Some(group_id) = placement.small_group_id {
            let group = SmallGroup::find_by_id(group_id)
                .one(conn)
                .await?
                .filter(|g| g.record_status == RecordStatus::Active)
                .ok_or_else(|| Error::not_found("small group", group_id))?;
            if group.site_id != site.id {
                return Err(Error::validation(format!(
                    "small group {group_id} does not belong to site {site_id}"
                )));
            }
        }
    }

    Ok(placement)
}
