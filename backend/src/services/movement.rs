//! Movement recorder: the append-only audit trail of the stock ledger

use chrono::Utc;
use shared::{MovementRecord, NewMovement};

use crate::error::AppResult;
use crate::store::Transaction;

/// Validate and append one movement inside the caller's transaction
pub async fn record(tx: &mut dyn Transaction, movement: NewMovement) -> AppResult<MovementRecord> {
    let record = movement.into_record(Utc::now())?;
    tx.insert_movement(&record).await?;
    tracing::debug!(
        movement_id = %record.id,
        movement_type = %record.movement_type,
        product_id = %record.product_id,
        quantity = record.quantity,
        "Movement recorded"
    );
    Ok(record)
}
