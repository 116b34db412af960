//! Stock adjustment approval workflow

use chrono::Utc;
use serde::Deserialize;
use shared::{AdjustmentReason, AdjustmentType, MovementType, NewMovement, StockAdjustment};
use uuid::Uuid;

use super::{ledger, lookup, movement};
use crate::config::WorkflowConfig;
use crate::error::{AppError, AppResult};
use crate::store::{with_retry, RetryConfig, Storage};

#[derive(Clone)]
pub struct AdjustmentService {
    store: Storage,
    retry: RetryConfig,
}

/// Input for requesting a stock adjustment.
///
/// For ADD and REMOVE `quantity` is the delta; for CORRECTION it is the
/// counted quantity on hand.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAdjustmentInput {
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub adjustment_type: AdjustmentType,
    pub quantity: i32,
    pub reason: AdjustmentReason,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RejectAdjustmentInput {
    pub reason: Option<String>,
}

impl AdjustmentService {
    pub fn new(store: Storage, workflow: &WorkflowConfig) -> Self {
        Self {
            store,
            retry: RetryConfig::from(workflow),
        }
    }

    pub async fn get(&self, id: Uuid) -> AppResult<StockAdjustment> {
        let mut tx = self.store.begin().await?;
        tx.stock_adjustment(id)
            .await?
            .ok_or_else(|| AppError::not_found("StockAdjustment", id))
    }

    /// Open a PENDING adjustment against the current ledger quantity
    pub async fn create(
        &self,
        performed_by: Uuid,
        input: CreateAdjustmentInput,
    ) -> AppResult<StockAdjustment> {
        with_retry(&self.retry, "adjustment.create", || {
            self.try_create(performed_by, &input)
        })
        .await
    }

    async fn try_create(
        &self,
        performed_by: Uuid,
        input: &CreateAdjustmentInput,
    ) -> AppResult<StockAdjustment> {
        let mut tx = self.store.begin().await?;
        lookup::require_user(tx.as_mut(), performed_by).await?;
        lookup::require_product(tx.as_mut(), input.product_id).await?;
        lookup::require_warehouse(tx.as_mut(), input.warehouse_id).await?;

        let before = ledger::get_quantity(tx.as_mut(), input.product_id, input.warehouse_id).await?;
        let adjustment = StockAdjustment::new(
            input.product_id,
            input.warehouse_id,
            before,
            input.adjustment_type,
            input.quantity,
            input.reason,
            performed_by,
            input.notes.clone(),
            Utc::now(),
        )?;
        tx.insert_stock_adjustment(&adjustment).await?;
        tx.commit().await?;

        tracing::info!(
            adjustment_id = %adjustment.id,
            change = adjustment.quantity_change,
            "Stock adjustment requested"
        );
        Ok(adjustment)
    }

    /// Approve a PENDING adjustment and apply its change to the ledger
    pub async fn approve(&self, id: Uuid, approver: Uuid) -> AppResult<StockAdjustment> {
        with_retry(&self.retry, "adjustment.approve", || self.try_approve(id, approver)).await
    }

    async fn try_approve(&self, id: Uuid, approver: Uuid) -> AppResult<StockAdjustment> {
        let mut tx = self.store.begin().await?;
        lookup::require_user(tx.as_mut(), approver).await?;
        let mut adjustment = tx
            .stock_adjustment(id)
            .await?
            .ok_or_else(|| AppError::not_found("StockAdjustment", id))?;

        adjustment.approve(approver)?;

        let change = adjustment.quantity_change;
        let (from_warehouse_id, to_warehouse_id) = if change > 0 {
            ledger::add_stock(tx.as_mut(), adjustment.product_id, adjustment.warehouse_id, change)
                .await?;
            (None, Some(adjustment.warehouse_id))
        } else {
            ledger::remove_stock(
                tx.as_mut(),
                adjustment.product_id,
                adjustment.warehouse_id,
                -change,
            )
            .await?;
            (Some(adjustment.warehouse_id), None)
        };

        movement::record(
            tx.as_mut(),
            NewMovement {
                movement_type: MovementType::Adjustment,
                product_id: adjustment.product_id,
                from_warehouse_id,
                to_warehouse_id,
                quantity: change.abs(),
                reason: adjustment.reason.as_str().to_string(),
                reference_number: Some(adjustment.id.to_string()),
                performed_by: approver,
                movement_date: None,
            },
        )
        .await?;

        tx.update_stock_adjustment(&mut adjustment).await?;
        tx.commit().await?;

        tracing::info!(adjustment_id = %adjustment.id, change, "Stock adjustment approved");
        Ok(adjustment)
    }

    /// Reject a PENDING adjustment; the ledger is not touched
    pub async fn reject(&self, id: Uuid, input: RejectAdjustmentInput) -> AppResult<StockAdjustment> {
        with_retry(&self.retry, "adjustment.reject", || self.try_reject(id, &input)).await
    }

    async fn try_reject(&self, id: Uuid, input: &RejectAdjustmentInput) -> AppResult<StockAdjustment> {
        let mut tx = self.store.begin().await?;
        let mut adjustment = tx
            .stock_adjustment(id)
            .await?
            .ok_or_else(|| AppError::not_found("StockAdjustment", id))?;

        adjustment.reject(input.reason.as_deref())?;
        tx.update_stock_adjustment(&mut adjustment).await?;
        tx.commit().await?;

        tracing::info!(adjustment_id = %adjustment.id, "Stock adjustment rejected");
        Ok(adjustment)
    }
}
