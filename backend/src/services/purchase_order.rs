//! Purchase order workflow
//!
//! DRAFT -> SUBMITTED -> APPROVED -> RECEIVED, with SUBMITTED -> DRAFT on
//! rejection and CANCELLED reachable until the order is received. Receiving
//! books stock into the order's warehouse.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{
    validate_not_before, DocumentKind, NewPurchaseOrder, PurchaseOrder, PurchaseOrderItem,
    ReceiptLine,
};
use uuid::Uuid;

use super::{lookup, numbering, order_inventory};
use crate::config::WorkflowConfig;
use crate::error::{AppError, AppResult};
use crate::store::{with_retry, RetryConfig, Storage, Transaction};

#[derive(Clone)]
pub struct PurchaseOrderService {
    store: Storage,
    retry: RetryConfig,
}

/// One line of a purchase order request
#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseOrderItemInput {
    pub product_id: Uuid,
    pub quantity: i32,
    /// Defaults to the product's cost price
    pub unit_price: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePurchaseOrderInput {
    pub supplier_id: Uuid,
    pub warehouse_id: Uuid,
    pub order_date: Option<NaiveDate>,
    pub expected_delivery_date: Option<NaiveDate>,
    pub tax_amount: Option<Decimal>,
    pub discount_amount: Option<Decimal>,
    pub notes: Option<String>,
    #[serde(default)]
    pub items: Vec<PurchaseOrderItemInput>,
}

/// Changes to a DRAFT order; `items` replaces all lines when given
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePurchaseOrderInput {
    pub supplier_id: Option<Uuid>,
    pub warehouse_id: Option<Uuid>,
    pub expected_delivery_date: Option<NaiveDate>,
    pub tax_amount: Option<Decimal>,
    pub discount_amount: Option<Decimal>,
    pub notes: Option<String>,
    pub items: Option<Vec<PurchaseOrderItemInput>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReasonInput {
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReceivePurchaseOrderInput {
    pub items: Vec<ReceiptLine>,
    /// Mark the order RECEIVED even if some lines are still short
    #[serde(default)]
    pub close: bool,
    pub received_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

fn non_negative(amount: Option<Decimal>, field: &str) -> AppResult<Decimal> {
    let amount = amount.unwrap_or(Decimal::ZERO);
    if amount < Decimal::ZERO {
        return Err(AppError::validation(field, "Amount cannot be negative"));
    }
    Ok(amount)
}

async fn build_items(
    tx: &mut dyn Transaction,
    inputs: &[PurchaseOrderItemInput],
) -> AppResult<Vec<PurchaseOrderItem>> {
    let mut items = Vec::with_capacity(inputs.len());
    for input in inputs {
        let product = lookup::require_product(tx, input.product_id).await?;
        let unit_price = input.unit_price.unwrap_or(product.cost_price);
        items.push(PurchaseOrderItem::new(product.id, input.quantity, unit_price)?);
    }
    Ok(items)
}

impl PurchaseOrderService {
    pub fn new(store: Storage, workflow: &WorkflowConfig) -> Self {
        Self {
            store,
            retry: RetryConfig::from(workflow),
        }
    }

    pub async fn get(&self, id: Uuid) -> AppResult<PurchaseOrder> {
        let mut tx = self.store.begin().await?;
        tx.purchase_order(id)
            .await?
            .ok_or_else(|| AppError::not_found("PurchaseOrder", id))
    }

    /// Create a DRAFT purchase order with a fresh PO number
    pub async fn create(
        &self,
        created_by: Uuid,
        input: CreatePurchaseOrderInput,
    ) -> AppResult<PurchaseOrder> {
        with_retry(&self.retry, "purchase_order.create", || {
            self.try_create(created_by, &input)
        })
        .await
    }

    async fn try_create(
        &self,
        created_by: Uuid,
        input: &CreatePurchaseOrderInput,
    ) -> AppResult<PurchaseOrder> {
        let order_date = input.order_date.unwrap_or_else(|| Utc::now().date_naive());
        if let Some(expected) = input.expected_delivery_date {
            validate_not_before(order_date, expected)
                .map_err(|msg| AppError::validation("expected_delivery_date", msg))?;
        }
        let tax_amount = non_negative(input.tax_amount, "tax_amount")?;
        let discount_amount = non_negative(input.discount_amount, "discount_amount")?;

        let mut tx = self.store.begin().await?;
        lookup::require_user(tx.as_mut(), created_by).await?;
        lookup::require_supplier(tx.as_mut(), input.supplier_id).await?;
        lookup::require_warehouse(tx.as_mut(), input.warehouse_id).await?;
        let items = build_items(tx.as_mut(), &input.items).await?;

        let po_number =
            numbering::next_document_number(tx.as_mut(), DocumentKind::PurchaseOrder, order_date)
                .await?;
        let order = PurchaseOrder::create(
            NewPurchaseOrder {
                po_number,
                supplier_id: input.supplier_id,
                warehouse_id: input.warehouse_id,
                created_by,
                order_date,
                expected_delivery_date: input.expected_delivery_date,
                tax_amount,
                discount_amount,
                notes: input.notes.clone(),
                items,
            },
            Utc::now(),
        )?;
        tx.insert_purchase_order(&order).await?;
        tx.commit().await?;

        tracing::info!(po_number = %order.po_number, total = %order.total_amount, "Purchase order created");
        Ok(order)
    }

    /// Edit a DRAFT purchase order
    pub async fn update(&self, id: Uuid, input: UpdatePurchaseOrderInput) -> AppResult<PurchaseOrder> {
        with_retry(&self.retry, "purchase_order.update", || self.try_update(id, &input)).await
    }

    async fn try_update(&self, id: Uuid, input: &UpdatePurchaseOrderInput) -> AppResult<PurchaseOrder> {
        let mut tx = self.store.begin().await?;
        let mut order = self.load(tx.as_mut(), id).await?;
        order.ensure_editable()?;

        if let Some(supplier_id) = input.supplier_id {
            lookup::require_supplier(tx.as_mut(), supplier_id).await?;
            order.supplier_id = supplier_id;
        }
        if let Some(warehouse_id) = input.warehouse_id {
            lookup::require_warehouse(tx.as_mut(), warehouse_id).await?;
            order.warehouse_id = warehouse_id;
        }
        if let Some(expected) = input.expected_delivery_date {
            validate_not_before(order.order_date, expected)
                .map_err(|msg| AppError::validation("expected_delivery_date", msg))?;
            order.expected_delivery_date = Some(expected);
        }
        if input.tax_amount.is_some() {
            order.tax_amount = non_negative(input.tax_amount, "tax_amount")?;
        }
        if input.discount_amount.is_some() {
            order.discount_amount = non_negative(input.discount_amount, "discount_amount")?;
        }
        if let Some(notes) = &input.notes {
            order.notes = Some(notes.clone());
        }
        if let Some(items) = &input.items {
            order.items = build_items(tx.as_mut(), items).await?;
        }
        order.recalculate_totals()?;

        tx.update_purchase_order(&mut order).await?;
        tx.commit().await?;

        tracing::info!(po_number = %order.po_number, "Purchase order updated");
        Ok(order)
    }

    /// Delete a DRAFT purchase order
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        with_retry(&self.retry, "purchase_order.delete", || self.try_delete(id)).await
    }

    async fn try_delete(&self, id: Uuid) -> AppResult<()> {
        let mut tx = self.store.begin().await?;
        let order = self.load(tx.as_mut(), id).await?;
        order.ensure_editable()?;
        tx.delete_purchase_order(&order).await?;
        tx.commit().await?;

        tracing::info!(po_number = %order.po_number, "Purchase order deleted");
        Ok(())
    }

    pub async fn submit(&self, id: Uuid) -> AppResult<PurchaseOrder> {
        self.transition(id, "purchase_order.submit", |order| Ok(order.submit()?))
            .await
    }

    pub async fn approve(&self, id: Uuid) -> AppResult<PurchaseOrder> {
        self.transition(id, "purchase_order.approve", |order| Ok(order.approve()?))
            .await
    }

    /// Send a SUBMITTED order back to DRAFT
    pub async fn reject(&self, id: Uuid, input: ReasonInput) -> AppResult<PurchaseOrder> {
        self.transition(id, "purchase_order.reject", |order| {
            Ok(order.reject(&input.reason)?)
        })
        .await
    }

    pub async fn cancel(&self, id: Uuid, input: ReasonInput) -> AppResult<PurchaseOrder> {
        self.transition(id, "purchase_order.cancel", |order| {
            Ok(order.cancel(&input.reason)?)
        })
        .await
    }

    /// Record delivered quantities and book them into stock
    pub async fn receive(
        &self,
        id: Uuid,
        performed_by: Uuid,
        input: ReceivePurchaseOrderInput,
    ) -> AppResult<PurchaseOrder> {
        with_retry(&self.retry, "purchase_order.receive", || {
            self.try_receive(id, performed_by, &input)
        })
        .await
    }

    async fn try_receive(
        &self,
        id: Uuid,
        performed_by: Uuid,
        input: &ReceivePurchaseOrderInput,
    ) -> AppResult<PurchaseOrder> {
        let mut tx = self.store.begin().await?;
        lookup::require_user(tx.as_mut(), performed_by).await?;
        let mut order = self.load(tx.as_mut(), id).await?;

        let received_on = input.received_date.unwrap_or_else(|| Utc::now().date_naive());
        let received =
            order.apply_receipt(&input.items, input.close, received_on, input.notes.as_deref())?;
        order_inventory::receive_for_purchase_order(tx.as_mut(), &order, &received, performed_by)
            .await?;

        tx.update_purchase_order(&mut order).await?;
        tx.commit().await?;

        tracing::info!(
            po_number = %order.po_number,
            lines = received.len(),
            status = %order.status,
            "Purchase order receipt recorded"
        );
        Ok(order)
    }

    async fn load(&self, tx: &mut dyn Transaction, id: Uuid) -> AppResult<PurchaseOrder> {
        tx.purchase_order(id)
            .await?
            .ok_or_else(|| AppError::not_found("PurchaseOrder", id))
    }

    /// Load, apply a pure status change, persist
    async fn transition<F>(&self, id: Uuid, operation: &str, apply: F) -> AppResult<PurchaseOrder>
    where
        F: Fn(&mut PurchaseOrder) -> AppResult<()>,
    {
        let apply = &apply;
        with_retry(&self.retry, operation, move || async move {
            let mut tx = self.store.begin().await?;
            let mut order = self.load(tx.as_mut(), id).await?;
            let from = order.status;
            apply(&mut order)?;
            tx.update_purchase_order(&mut order).await?;
            tx.commit().await?;

            tracing::info!(
                po_number = %order.po_number,
                from = %from,
                to = %order.status,
                "Purchase order status changed"
            );
            Ok(order)
        })
        .await
    }
}
