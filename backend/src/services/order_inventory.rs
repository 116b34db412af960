//! Stock effects of order workflows
//!
//! Each function runs inside the calling workflow's transaction and pairs
//! every ledger write with exactly one movement record.

use shared::{
    DomainError, MovementType, NewMovement, PurchaseOrder, ReceivedStock, SalesOrder,
};
use uuid::Uuid;

use super::{ledger, movement};
use crate::error::AppResult;
use crate::store::Transaction;

const FULFILLMENT_REASON: &str = "Sales order fulfillment";
const CANCELLATION_REASON: &str = "Cancellation of fulfilled sales order";
const RECEIPT_REASON: &str = "Purchase order receipt";

/// Fail with `InsufficientStock` for the first product the warehouse cannot
/// cover. Reads only.
pub async fn check_availability(tx: &mut dyn Transaction, order: &SalesOrder) -> AppResult<()> {
    for (product_id, required) in order.required_quantities()? {
        let available = ledger::get_quantity(tx, product_id, order.warehouse_id).await?;
        if available < required {
            return Err(DomainError::InsufficientStock {
                product_id,
                warehouse_id: order.warehouse_id,
                available,
                requested: required,
            }
            .into());
        }
    }
    Ok(())
}

/// Deduct every line of a sales order from its warehouse
pub async fn deduct_for_sales_order(
    tx: &mut dyn Transaction,
    order: &SalesOrder,
    performed_by: Uuid,
) -> AppResult<()> {
    for item in &order.items {
        let record = ledger::remove_stock(tx, item.product_id, order.warehouse_id, item.quantity).await?;
        movement::record(
            tx,
            NewMovement {
                movement_type: MovementType::Shipment,
                product_id: item.product_id,
                from_warehouse_id: Some(order.warehouse_id),
                to_warehouse_id: None,
                quantity: item.quantity,
                reason: FULFILLMENT_REASON.to_string(),
                reference_number: Some(order.so_number.clone()),
                performed_by,
                movement_date: None,
            },
        )
        .await?;
        tracing::debug!(
            so_number = %order.so_number,
            product_id = %item.product_id,
            quantity = item.quantity,
            remaining = record.quantity,
            "Deducted stock for sales order line"
        );
    }
    Ok(())
}

/// Put back the stock of a fulfilled sales order that is being cancelled
pub async fn release_for_sales_order(
    tx: &mut dyn Transaction,
    order: &SalesOrder,
    performed_by: Uuid,
) -> AppResult<()> {
    for item in &order.items {
        let record = ledger::add_stock(tx, item.product_id, order.warehouse_id, item.quantity).await?;
        movement::record(
            tx,
            NewMovement {
                movement_type: MovementType::Adjustment,
                product_id: item.product_id,
                from_warehouse_id: None,
                to_warehouse_id: Some(order.warehouse_id),
                quantity: item.quantity,
                reason: CANCELLATION_REASON.to_string(),
                reference_number: Some(order.so_number.clone()),
                performed_by,
                movement_date: None,
            },
        )
        .await?;
        tracing::debug!(
            so_number = %order.so_number,
            product_id = %item.product_id,
            quantity = item.quantity,
            on_hand = record.quantity,
            "Restored stock for cancelled sales order line"
        );
    }
    Ok(())
}

/// Book received purchase order lines into the order's warehouse
pub async fn receive_for_purchase_order(
    tx: &mut dyn Transaction,
    order: &PurchaseOrder,
    received: &[ReceivedStock],
    performed_by: Uuid,
) -> AppResult<()> {
    for line in received {
        let record = ledger::add_stock(tx, line.product_id, order.warehouse_id, line.quantity).await?;
        movement::record(
            tx,
            NewMovement {
                movement_type: MovementType::Receipt,
                product_id: line.product_id,
                from_warehouse_id: None,
                to_warehouse_id: Some(order.warehouse_id),
                quantity: line.quantity,
                reason: RECEIPT_REASON.to_string(),
                reference_number: Some(order.po_number.clone()),
                performed_by,
                movement_date: None,
            },
        )
        .await?;
        tracing::debug!(
            po_number = %order.po_number,
            product_id = %line.product_id,
            quantity = line.quantity,
            on_hand = record.quantity,
            "Received stock for purchase order line"
        );
    }
    Ok(())
}
