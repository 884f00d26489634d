//! Inventory items and stock movements.

use crate::{
    core::{
        audit,
        level::resolve_placement,
        scope::{ActingUser, Resource, scope},
    },
    entities::{
        InventoryItem, InventoryMovement,
        enums::{Level, MovementDirection, RecordStatus},
        inventory_item, inventory_movement,
    },
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

/// Input for [`create_item`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewItem {
    pub name: String,
    pub unit: String,
    /// Opening stock
    #[serde(default)]
    pub quantity: i64,
    pub level: Level,
    #[serde(default)]
    pub site_id: Option<i64>,
    #[serde(default)]
    pub small_group_id: Option<i64>,
}

/// Registers an item with its opening stock.
pub async fn create_item(
    db: &DatabaseConnection,
    user: &ActingUser,
    input: NewItem,
) -> Result<inventory_item::Model> {
    let created_by = user.require_profile()?;
    if input.name.trim().is_empty() || input.unit.trim().is_empty() {
        return Err(Error::validation("item name and unit are required"));
    }
    if input.quantity < 0 {
        return Err(Error::validation("opening stock cannot be negative"));
    }

    let txn = db.begin().await?;
    let placement =
        resolve_placement(&txn, input.level, input.site_id, input.small_group_id).await?;
    if !scope(user, Resource::InventoryItems).covers_target(placement.site_id, placement.small_group_id) {
        return Err(Error::forbidden("you cannot manage inventory at this level"));
    }

    let created = inventory_item::ActiveModel {
        name: Set(input.name.trim().to_string()),
        unit: Set(input.unit.trim().to_string()),
        quantity: Set(input.quantity),
        level: Set(placement.level),
        site_id: Set(placement.site_id),
        small_group_id: Set(placement.small_group_id),
        record_status: Set(RecordStatus::Active),
        created_by: Set(created_by),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    audit::record(&txn, user, "inventory.item_created", "inventory_item", created.id, json!({ "quantity": created.quantity }))
        .await?;
    txn.commit().await?;
    Ok(created)
}

async fn visible_item<C>(conn: &C, user: &ActingUser, item_id: i64) -> Result<inventory_item::Model>
where
    C: ConnectionTrait,
{
    InventoryItem::find_by_id(item_id)
        .one(conn)
        .await?
        .filter(|i| i.record_status == RecordStatus::Active)
        .filter(|i| scope(user, Resource::InventoryItems).permits(i.site_id, i.small_group_id, Some(i.created_by)))
        .ok_or_else(|| Error::not_found("inventory item", item_id))
}

/// Moves stock in or out of an item.
///
/// The stock update, the movement row and the audit row commit together.
/// Taking out more than is on hand fails with `InsufficientStock`.
pub async fn record_movement(
    db: &DatabaseConnection,
    user: &ActingUser,
    item_id: i64,
    direction: MovementDirection,
    quantity: i64,
    reason: &str,
) -> Result<inventory_movement::Model> {
    let recorded_by = user.require_profile()?;
    if quantity <= 0 {
        return Err(Error::validation("movement quantity must be positive"));
    }
    if reason.trim().is_empty() {
        return Err(Error::validation("a movement reason is required"));
    }

    let txn = db.begin().await?;
    let item = visible_item(&txn, user, item_id).await?;
    if !scope(user, Resource::InventoryItems).covers_target(item.site_id, item.small_group_id) {
        return Err(Error::forbidden("you cannot move stock of this item"));
    }

    let new_quantity = match direction {
        MovementDirection::In => item.quantity + quantity,
        MovementDirection::Out => {
            if quantity > item.quantity {
                return Err(Error::InsufficientStock {
                    available: item.quantity,
                    requested: quantity,
                });
            }
            item.quantity - quantity
        }
    };

    let mut active: inventory_item::ActiveModel = item.into();
    active.quantity = Set(new_quantity);
    active.update(&txn).await?;

    let movement = inventory_movement::ActiveModel {
        item_id: Set(item_id),
        direction: Set(direction),
        quantity: Set(quantity),
        reason: Set(reason.trim().to_string()),
        recorded_by: Set(recorded_by),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    audit::record(
        &txn,
        user,
        "inventory.movement",
        "inventory_item",
        item_id,
        json!({ "direction": direction, "quantity": quantity, "stock": new_quantity }),
    )
    .await?;
    txn.commit().await?;

    info!(item_id, %direction, quantity, stock = new_quantity, "stock moved");
    Ok(movement)
}

/// Active items visible to the user, ordered by name.
pub async fn list_items(db: &DatabaseConnection, user: &ActingUser) -> Result<Vec<inventory_item::Model>> {
    let Some(condition) = scope(user, Resource::InventoryItems).condition::<InventoryItem>() else {
        return Ok(Vec::new());
    };
    InventoryItem::find()
        .filter(condition)
        .filter(inventory_item::Column::RecordStatus.eq(RecordStatus::Active))
        .order_by_asc(inventory_item::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Movement history of an item, newest first.
pub async fn list_movements(
    db: &DatabaseConnection,
    user: &ActingUser,
    item_id: i64,
) -> Result<Vec<inventory_movement::Model>> {
    visible_item(db, user, item_id).await?;
    InventoryMovement::find()
        .filter(inventory_movement::Column::ItemId.eq(item_id))
        .order_by_desc(inventory_movement::Column::CreatedAt)
        .order_by_desc(inventory_movement::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Archives an item; its movement history is kept.
pub async fn archive_item(
    db: &DatabaseConnection,
    user: &ActingUser,
    item_id: i64,
) -> Result<inventory_item::Model> {
    let txn = db.begin().await?;
    let item = visible_item(&txn, user, item_id).await?;
    if !scope(user, Resource::InventoryItems).covers_target(item.site_id, item.small_group_id) {
        return Err(Error::forbidden("you cannot archive this item"));
    }
    let mut active: inventory_item::ActiveModel = item.into();
    active.record_status = Set(RecordStatus::Archived);
    let archived = active.update(&txn).await?;
    audit::record(&txn, user, "inventory.item_archived", "inventory_item", item_id, json!({})).await?;
    txn.commit().await?;
    Ok(archived)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::enums::Role;
    use crate::test_utils::*;

    fn chairs(level: Level, site: Option<i64>, group: Option<i64>) -> NewItem {
        NewItem {
            name: "Folding chairs".to_string(),
            unit: "pcs".to_string(),
            quantity: 10,
            level,
            site_id: site,
            small_group_id: group,
        }
    }

    #[tokio::test]
    async fn test_stock_moves_atomically() -> Result<()> {
        let db = setup_test_db().await?;
        let national = acting_as(Role::NationalCoordinator, 1, None, None);
        let item = create_item(&db, &national, chairs(Level::National, None, None)).await?;

        record_movement(&db, &national, item.id, MovementDirection::Out, 4, "Retreat").await?;
        record_movement(&db, &national, item.id, MovementDirection::In, 2, "Returned").await?;

        let short = record_movement(&db, &national, item.id, MovementDirection::Out, 9, "Camp").await;
        assert!(matches!(
            short,
            Err(Error::InsufficientStock {
                available: 8,
                requested: 9
            })
        ));

        let stored = InventoryItem::find_by_id(item.id).one(&db).await?;
        assert_eq!(stored.map(|i| i.quantity), Some(8));
        assert_eq!(list_movements(&db, &national, item.id).await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_movement_validation() -> Result<()> {
        let db = setup_test_db().await?;
        let national = acting_as(Role::NationalCoordinator, 1, None, None);
        let item = create_item(&db, &national, chairs(Level::National, None, None)).await?;

        let zero = record_movement(&db, &national, item.id, MovementDirection::In, 0, "x").await;
        assert!(matches!(zero, Err(Error::Validation { .. })));
        let no_reason = record_movement(&db, &national, item.id, MovementDirection::In, 1, " ").await;
        assert!(matches!(no_reason, Err(Error::Validation { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_items_are_scoped() -> Result<()> {
        let db = setup_test_db().await?;
        let national = acting_as(Role::NationalCoordinator, 1, None, None);
        let site = create_test_site(&db, "North").await?;
        let harbor = create_test_small_group(&db, site.id, "Harbor").await?;
        let market = create_test_small_group(&db, site.id, "Market").await?;
        create_item(&db, &national, chairs(Level::SmallGroup, Some(site.id), Some(harbor.id))).await?;
        let theirs = create_item(&db, &national, chairs(Level::SmallGroup, Some(site.id), Some(market.id))).await?;

        let leader = acting_as(Role::SmallGroupLeader, 3, Some(site.id), Some(harbor.id));
        assert_eq!(list_items(&db, &leader).await?.len(), 1);

        let foreign = record_movement(&db, &leader, theirs.id, MovementDirection::Out, 1, "Borrow").await;
        assert!(matches!(foreign, Err(Error::NotFound { .. })));

        archive_item(&db, &national, theirs.id).await?;
        assert_eq!(list_items(&db, &national).await?.len(), 1);
        Ok(())
    }
}
