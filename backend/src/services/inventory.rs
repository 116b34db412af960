//! Inventory service: ledger reads, movement history and transfers

use serde::{Deserialize, Serialize};
use shared::{validate_reason, InventoryRecord, MovementFilter, MovementRecord, MovementType, NewMovement};
use uuid::Uuid;

use super::{ledger, lookup, movement};
use crate::config::WorkflowConfig;
use crate::error::{AppError, AppResult};
use crate::store::{with_retry, RetryConfig, Storage};

const TRANSFER_REASON: &str = "Stock transfer";

/// Inventory service for stock levels and warehouse transfers
#[derive(Clone)]
pub struct InventoryService {
    store: Storage,
    retry: RetryConfig,
}

/// Input for moving stock between two warehouses
#[derive(Debug, Clone, Deserialize)]
pub struct TransferInput {
    pub product_id: Uuid,
    pub from_warehouse_id: Uuid,
    pub to_warehouse_id: Uuid,
    pub quantity: i32,
    pub reason: Option<String>,
    pub reference_number: Option<String>,
}

/// Ledger state after a transfer
#[derive(Debug, Clone, Serialize)]
pub struct TransferResult {
    pub from_quantity: i32,
    pub to_quantity: i32,
    pub movement: MovementRecord,
}

/// Quantity on hand for one product in one warehouse
#[derive(Debug, Clone, Serialize)]
pub struct StockQuantity {
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub quantity: i32,
}

impl InventoryService {
    pub fn new(store: Storage, workflow: &WorkflowConfig) -> Self {
        Self {
            store,
            retry: RetryConfig::from(workflow),
        }
    }

    /// Quantity on hand; zero for pairs that never held stock
    pub async fn quantity(&self, product_id: Uuid, warehouse_id: Uuid) -> AppResult<StockQuantity> {
        let mut tx = self.store.begin().await?;
        let quantity = ledger::get_quantity(tx.as_mut(), product_id, warehouse_id).await?;
        Ok(StockQuantity {
            product_id,
            warehouse_id,
            quantity,
        })
    }

    /// Ledger rows of a product across all warehouses
    pub async fn stock_levels(&self, product_id: Uuid) -> AppResult<Vec<InventoryRecord>> {
        let mut tx = self.store.begin().await?;
        tx.inventory_for_product(product_id).await
    }

    /// Movement history, oldest first
    pub async fn movements(&self, filter: &MovementFilter) -> AppResult<Vec<MovementRecord>> {
        let mut tx = self.store.begin().await?;
        tx.movements(filter).await
    }

    /// Move stock from one warehouse to another as a single TRANSFER movement
    pub async fn transfer(&self, performed_by: Uuid, input: TransferInput) -> AppResult<TransferResult> {
        if input.from_warehouse_id == input.to_warehouse_id {
            return Err(AppError::validation(
                "to_warehouse_id",
                "Source and destination warehouse must differ",
            ));
        }
        if let Some(reason) = &input.reason {
            validate_reason(reason).map_err(|msg| AppError::validation("reason", msg))?;
        }

        with_retry(&self.retry, "inventory.transfer", || {
            self.try_transfer(performed_by, &input)
        })
        .await
    }

    async fn try_transfer(&self, performed_by: Uuid, input: &TransferInput) -> AppResult<TransferResult> {
        let mut tx = self.store.begin().await?;
        lookup::require_user(tx.as_mut(), performed_by).await?;
        lookup::require_product(tx.as_mut(), input.product_id).await?;
        lookup::require_warehouse(tx.as_mut(), input.from_warehouse_id).await?;
        lookup::require_warehouse(tx.as_mut(), input.to_warehouse_id).await?;

        let source = ledger::remove_stock(
            tx.as_mut(),
            input.product_id,
            input.from_warehouse_id,
            input.quantity,
        )
        .await?;
        let destination = ledger::add_stock(
            tx.as_mut(),
            input.product_id,
            input.to_warehouse_id,
            input.quantity,
        )
        .await?;

        let movement = movement::record(
            tx.as_mut(),
            NewMovement {
                movement_type: MovementType::Transfer,
                product_id: input.product_id,
                from_warehouse_id: Some(input.from_warehouse_id),
                to_warehouse_id: Some(input.to_warehouse_id),
                quantity: input.quantity,
                reason: input
                    .reason
                    .clone()
                    .unwrap_or_else(|| TRANSFER_REASON.to_string()),
                reference_number: input.reference_number.clone(),
                performed_by,
                movement_date: None,
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            product_id = %input.product_id,
            from = %input.from_warehouse_id,
            to = %input.to_warehouse_id,
            quantity = input.quantity,
            "Stock transferred"
        );

        Ok(TransferResult {
            from_quantity: source.quantity,
            to_quantity: destination.quantity,
            movement,
        })
    }
}
