//! Shipment workflow
//!
//! A shipment is opened against a FULFILLED sales order and moves that order
//! to SHIPPED; delivering the shipment delivers the order. Both aggregates
//! are written in the same transaction.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{
    validate_not_before, DocumentKind, NewShipment, SalesOrderStatus, Shipment, ShipmentStatus,
    ShippingMethod,
};
use uuid::Uuid;

use super::{lookup, numbering, sales_order};
use crate::config::WorkflowConfig;
use crate::error::{AppError, AppResult};
use crate::store::{with_retry, RetryConfig, Storage, Transaction};

#[derive(Clone)]
pub struct ShipmentService {
    store: Storage,
    retry: RetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateShipmentInput {
    pub sales_order_id: Uuid,
    pub carrier: String,
    pub tracking_number: Option<String>,
    pub shipping_method: Option<ShippingMethod>,
    pub estimated_delivery_date: Option<NaiveDate>,
    pub shipping_cost: Option<Decimal>,
    pub weight: Option<Decimal>,
    pub dimensions: Option<String>,
    /// Defaults to the sales order's warehouse
    pub shipped_from_warehouse_id: Option<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateShipmentStatusInput {
    pub status: ShipmentStatus,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeliverShipmentInput {
    pub actual_delivery_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

async fn load(tx: &mut dyn Transaction, id: Uuid) -> AppResult<Shipment> {
    tx.shipment(id)
        .await?
        .ok_or_else(|| AppError::not_found("Shipment", id))
}

impl ShipmentService {
    pub fn new(store: Storage, workflow: &WorkflowConfig) -> Self {
        Self {
            store,
            retry: RetryConfig::from(workflow),
        }
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Shipment> {
        let mut tx = self.store.begin().await?;
        load(tx.as_mut(), id).await
    }

    pub async fn for_sales_order(&self, sales_order_id: Uuid) -> AppResult<Vec<Shipment>> {
        let mut tx = self.store.begin().await?;
        sales_order::load(tx.as_mut(), sales_order_id).await?;
        tx.shipments_for_sales_order(sales_order_id).await
    }

    /// Open a PENDING shipment and mark its sales order SHIPPED
    pub async fn create(&self, shipped_by: Uuid, input: CreateShipmentInput) -> AppResult<Shipment> {
        with_retry(&self.retry, "shipment.create", || {
            self.try_create(shipped_by, &input)
        })
        .await
    }

    async fn try_create(&self, shipped_by: Uuid, input: &CreateShipmentInput) -> AppResult<Shipment> {
        let mut tx = self.store.begin().await?;
        lookup::require_user(tx.as_mut(), shipped_by).await?;
        let mut order = sales_order::load(tx.as_mut(), input.sales_order_id).await?;
        if order.status != SalesOrderStatus::Fulfilled {
            return Err(AppError::IllegalState(format!(
                "Sales order {} must be FULFILLED to ship, current status is {}",
                order.so_number, order.status
            )));
        }
        let warehouse_id = input.shipped_from_warehouse_id.unwrap_or(order.warehouse_id);
        lookup::require_warehouse(tx.as_mut(), warehouse_id).await?;

        let today = Utc::now().date_naive();
        if let Some(estimated) = input.estimated_delivery_date {
            validate_not_before(today, estimated)
                .map_err(|msg| AppError::validation("estimated_delivery_date", msg))?;
        }
        let shipment_number =
            numbering::next_document_number(tx.as_mut(), DocumentKind::Shipment, today).await?;
        let shipment = Shipment::create(
            NewShipment {
                shipment_number,
                sales_order_id: order.id,
                carrier: input.carrier.clone(),
                tracking_number: input.tracking_number.clone(),
                shipping_method: input.shipping_method.unwrap_or(ShippingMethod::Standard),
                estimated_delivery_date: input.estimated_delivery_date,
                shipping_cost: input.shipping_cost.unwrap_or(Decimal::ZERO),
                weight: input.weight,
                dimensions: input.dimensions.clone(),
                shipped_from_warehouse_id: warehouse_id,
                shipped_by,
                notes: input.notes.clone(),
            },
            Utc::now(),
        )?;
        order.ship(today)?;

        tx.insert_shipment(&shipment).await?;
        tx.update_sales_order(&mut order).await?;
        tx.commit().await?;

        tracing::info!(
            shipment_number = %shipment.shipment_number,
            so_number = %order.so_number,
            "Shipment created"
        );
        Ok(shipment)
    }

    /// Change status without delivering
    pub async fn update_status(&self, id: Uuid, input: UpdateShipmentStatusInput) -> AppResult<Shipment> {
        with_retry(&self.retry, "shipment.update_status", || {
            self.try_update_status(id, &input)
        })
        .await
    }

    async fn try_update_status(
        &self,
        id: Uuid,
        input: &UpdateShipmentStatusInput,
    ) -> AppResult<Shipment> {
        let mut tx = self.store.begin().await?;
        let mut shipment = load(tx.as_mut(), id).await?;
        let from = shipment.status;
        shipment.update_status(input.status, input.notes.as_deref())?;
        if let Some(tracking) = &input.tracking_number {
            shipment.tracking_number = Some(tracking.clone());
        }
        tx.update_shipment(&mut shipment).await?;
        tx.commit().await?;

        tracing::info!(
            shipment_number = %shipment.shipment_number,
            from = %from,
            to = %shipment.status,
            "Shipment status changed"
        );
        Ok(shipment)
    }

    /// Deliver the shipment and its sales order
    pub async fn deliver(&self, id: Uuid, input: DeliverShipmentInput) -> AppResult<Shipment> {
        with_retry(&self.retry, "shipment.deliver", || self.try_deliver(id, &input)).await
    }

    async fn try_deliver(&self, id: Uuid, input: &DeliverShipmentInput) -> AppResult<Shipment> {
        let delivered_on = input
            .actual_delivery_date
            .unwrap_or_else(|| Utc::now().date_naive());

        let mut tx = self.store.begin().await?;
        let mut shipment = load(tx.as_mut(), id).await?;
        shipment.deliver(delivered_on, input.notes.as_deref())?;

        let mut order = sales_order::load(tx.as_mut(), shipment.sales_order_id).await?;
        if order.status != SalesOrderStatus::Delivered {
            order.deliver(delivered_on)?;
            tx.update_sales_order(&mut order).await?;
        }

        tx.update_shipment(&mut shipment).await?;
        tx.commit().await?;

        tracing::info!(
            shipment_number = %shipment.shipment_number,
            so_number = %order.so_number,
            "Shipment delivered"
        );
        Ok(shipment)
    }
}
