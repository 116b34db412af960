//! Stock ledger primitives
//!
//! Quantity on hand per (product, warehouse). These functions are the only
//! place where [`InventoryRecord`] quantities change; they run inside the
//! caller's transaction, so the ledger write commits together with the
//! movement record and the order state that caused it.

use chrono::Utc;
use shared::{DomainError, InventoryRecord};
use uuid::Uuid;

use crate::error::AppResult;
use crate::store::Transaction;

/// Quantity on hand, zero when no record exists yet
pub async fn get_quantity(
    tx: &mut dyn Transaction,
    product_id: Uuid,
    warehouse_id: Uuid,
) -> AppResult<i32> {
    Ok(tx
        .inventory_record(product_id, warehouse_id)
        .await?
        .map_or(0, |record| record.quantity))
}

/// Increase stock, creating the ledger row on first use
pub async fn add_stock(
    tx: &mut dyn Transaction,
    product_id: Uuid,
    warehouse_id: Uuid,
    qty: i32,
) -> AppResult<InventoryRecord> {
    match tx.inventory_record(product_id, warehouse_id).await? {
        Some(mut record) => {
            record.add(qty)?;
            tx.update_inventory_record(&mut record).await?;
            Ok(record)
        }
        None => {
            let mut record = InventoryRecord::new(product_id, warehouse_id, Utc::now());
            record.add(qty)?;
            tracing::debug!(
                %product_id,
                %warehouse_id,
                "Creating inventory record on first stock movement"
            );
            tx.insert_inventory_record(&record).await?;
            Ok(record)
        }
    }
}

/// Decrease stock. Fails with `InsufficientStock` instead of going negative;
/// a missing record counts as zero on hand.
pub async fn remove_stock(
    tx: &mut dyn Transaction,
    product_id: Uuid,
    warehouse_id: Uuid,
    qty: i32,
) -> AppResult<InventoryRecord> {
    let mut record = tx
        .inventory_record(product_id, warehouse_id)
        .await?
        .ok_or(DomainError::InsufficientStock {
            product_id,
            warehouse_id,
            available: 0,
            requested: qty,
        })?;
    record.remove(qty)?;
    tx.update_inventory_record(&mut record).await?;
    Ok(record)
}
