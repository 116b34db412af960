//! Sales order workflow
//!
//! PENDING -> CONFIRMED -> FULFILLED -> SHIPPED -> DELIVERED, cancellable
//! until shipped. Confirmation only checks availability; fulfilment deducts
//! stock and cancelling a fulfilled order puts it back.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{
    validate_email, CustomerRef, CustomerSnapshot, DocumentKind, NewSalesOrder, SalesOrder,
    SalesOrderItem,
};
use uuid::Uuid;

use super::{lookup, numbering, order_inventory};
use crate::config::WorkflowConfig;
use crate::error::{AppError, AppResult};
use crate::store::{with_retry, RetryConfig, Storage, Transaction};

#[derive(Clone)]
pub struct SalesOrderService {
    store: Storage,
    retry: RetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SalesOrderItemInput {
    pub product_id: Uuid,
    pub quantity: i32,
    /// Defaults to the product's current unit price
    pub unit_price: Option<Decimal>,
}

/// Customer contact overrides; missing fields come from the customer record
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerDetailsInput {
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub shipping_address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSalesOrderInput {
    pub customer_id: Uuid,
    pub warehouse_id: Uuid,
    pub order_date: Option<NaiveDate>,
    #[serde(flatten)]
    pub customer: CustomerDetailsInput,
    pub tax_amount: Option<Decimal>,
    pub shipping_cost: Option<Decimal>,
    pub notes: Option<String>,
    #[serde(default)]
    pub items: Vec<SalesOrderItemInput>,
}

/// Changes to a PENDING order; `items` replaces all lines when given
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSalesOrderInput {
    pub warehouse_id: Option<Uuid>,
    #[serde(flatten)]
    pub customer: CustomerDetailsInput,
    pub tax_amount: Option<Decimal>,
    pub shipping_cost: Option<Decimal>,
    pub notes: Option<String>,
    pub items: Option<Vec<SalesOrderItemInput>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelSalesOrderInput {
    pub reason: String,
}

fn non_negative(amount: Option<Decimal>, field: &str) -> AppResult<Decimal> {
    let amount = amount.unwrap_or(Decimal::ZERO);
    if amount < Decimal::ZERO {
        return Err(AppError::validation(field, "Amount cannot be negative"));
    }
    Ok(amount)
}

fn snapshot(details: &CustomerDetailsInput, customer: &CustomerRef) -> AppResult<CustomerSnapshot> {
    if let Some(email) = &details.customer_email {
        validate_email(email).map_err(|msg| AppError::validation("customer_email", msg))?;
    }
    Ok(CustomerSnapshot {
        customer_name: details
            .customer_name
            .clone()
            .or_else(|| Some(customer.name.clone())),
        customer_email: details.customer_email.clone().or_else(|| customer.email.clone()),
        customer_phone: details.customer_phone.clone().or_else(|| customer.phone.clone()),
        shipping_address: details
            .shipping_address
            .clone()
            .or_else(|| customer.address.clone()),
        city: details.city.clone().or_else(|| customer.city.clone()),
        postal_code: details.postal_code.clone().or_else(|| customer.postal_code.clone()),
    })
}

async fn build_items(
    tx: &mut dyn Transaction,
    inputs: &[SalesOrderItemInput],
) -> AppResult<Vec<SalesOrderItem>> {
    let mut items = Vec::with_capacity(inputs.len());
    for input in inputs {
        let product = lookup::require_product(tx, input.product_id).await?;
        let unit_price = input.unit_price.unwrap_or(product.unit_price);
        items.push(SalesOrderItem::new(product.id, input.quantity, unit_price)?);
    }
    Ok(items)
}

impl SalesOrderService {
    pub fn new(store: Storage, workflow: &WorkflowConfig) -> Self {
        Self {
            store,
            retry: RetryConfig::from(workflow),
        }
    }

    pub async fn get(&self, id: Uuid) -> AppResult<SalesOrder> {
        let mut tx = self.store.begin().await?;
        load(tx.as_mut(), id).await
    }

    /// Create a PENDING sales order with a fresh SO number
    pub async fn create(&self, created_by: Uuid, input: CreateSalesOrderInput) -> AppResult<SalesOrder> {
        with_retry(&self.retry, "sales_order.create", || {
            self.try_create(created_by, &input)
        })
        .await
    }

    async fn try_create(&self, created_by: Uuid, input: &CreateSalesOrderInput) -> AppResult<SalesOrder> {
        let order_date = input.order_date.unwrap_or_else(|| Utc::now().date_naive());
        let tax_amount = non_negative(input.tax_amount, "tax_amount")?;
        let shipping_cost = non_negative(input.shipping_cost, "shipping_cost")?;

        let mut tx = self.store.begin().await?;
        lookup::require_user(tx.as_mut(), created_by).await?;
        let customer = lookup::require_customer(tx.as_mut(), input.customer_id).await?;
        lookup::require_warehouse(tx.as_mut(), input.warehouse_id).await?;
        let items = build_items(tx.as_mut(), &input.items).await?;

        let so_number =
            numbering::next_document_number(tx.as_mut(), DocumentKind::SalesOrder, order_date).await?;
        let order = SalesOrder::create(
            NewSalesOrder {
                so_number,
                customer_id: customer.id,
                customer: snapshot(&input.customer, &customer)?,
                warehouse_id: input.warehouse_id,
                created_by,
                order_date,
                tax_amount,
                shipping_cost,
                notes: input.notes.clone(),
                items,
            },
            Utc::now(),
        )?;
        tx.insert_sales_order(&order).await?;
        tx.commit().await?;

        tracing::info!(so_number = %order.so_number, total = %order.total_amount, "Sales order created");
        Ok(order)
    }

    /// Edit a PENDING sales order
    pub async fn update(&self, id: Uuid, input: UpdateSalesOrderInput) -> AppResult<SalesOrder> {
        with_retry(&self.retry, "sales_order.update", || self.try_update(id, &input)).await
    }

    async fn try_update(&self, id: Uuid, input: &UpdateSalesOrderInput) -> AppResult<SalesOrder> {
        let mut tx = self.store.begin().await?;
        let mut order = load(tx.as_mut(), id).await?;
        order.ensure_editable()?;

        if let Some(warehouse_id) = input.warehouse_id {
            lookup::require_warehouse(tx.as_mut(), warehouse_id).await?;
            order.warehouse_id = warehouse_id;
        }
        let details = &input.customer;
        if let Some(email) = &details.customer_email {
            validate_email(email).map_err(|msg| AppError::validation("customer_email", msg))?;
        }
        let current = &mut order.customer;
        for (target, value) in [
            (&mut current.customer_name, &details.customer_name),
            (&mut current.customer_email, &details.customer_email),
            (&mut current.customer_phone, &details.customer_phone),
            (&mut current.shipping_address, &details.shipping_address),
            (&mut current.city, &details.city),
            (&mut current.postal_code, &details.postal_code),
        ] {
            if value.is_some() {
                *target = value.clone();
            }
        }
        if input.tax_amount.is_some() {
            order.tax_amount = non_negative(input.tax_amount, "tax_amount")?;
        }
        if input.shipping_cost.is_some() {
            order.shipping_cost = non_negative(input.shipping_cost, "shipping_cost")?;
        }
        if let Some(notes) = &input.notes {
            order.notes = Some(notes.clone());
        }
        if let Some(items) = &input.items {
            order.items = build_items(tx.as_mut(), items).await?;
        }
        order.recalculate_totals()?;

        tx.update_sales_order(&mut order).await?;
        tx.commit().await?;

        tracing::info!(so_number = %order.so_number, "Sales order updated");
        Ok(order)
    }

    /// Confirm a PENDING order once every line is covered by stock on hand.
    /// Nothing is reserved or deducted.
    pub async fn confirm(&self, id: Uuid) -> AppResult<SalesOrder> {
        with_retry(&self.retry, "sales_order.confirm", || self.try_confirm(id)).await
    }

    async fn try_confirm(&self, id: Uuid) -> AppResult<SalesOrder> {
        let mut tx = self.store.begin().await?;
        let mut order = load(tx.as_mut(), id).await?;
        order.confirm()?;
        order_inventory::check_availability(tx.as_mut(), &order).await?;

        tx.update_sales_order(&mut order).await?;
        tx.commit().await?;

        tracing::info!(so_number = %order.so_number, "Sales order confirmed");
        Ok(order)
    }

    /// Deduct stock for every line; any short line fails the whole call
    pub async fn fulfill(&self, id: Uuid, performed_by: Uuid) -> AppResult<SalesOrder> {
        with_retry(&self.retry, "sales_order.fulfill", || {
            self.try_fulfill(id, performed_by)
        })
        .await
    }

    async fn try_fulfill(&self, id: Uuid, performed_by: Uuid) -> AppResult<SalesOrder> {
        let mut tx = self.store.begin().await?;
        lookup::require_user(tx.as_mut(), performed_by).await?;
        let mut order = load(tx.as_mut(), id).await?;
        order.fulfill(Utc::now().date_naive())?;
        order_inventory::deduct_for_sales_order(tx.as_mut(), &order, performed_by).await?;

        tx.update_sales_order(&mut order).await?;
        tx.commit().await?;

        tracing::info!(
            so_number = %order.so_number,
            lines = order.items.len(),
            "Sales order fulfilled"
        );
        Ok(order)
    }

    pub async fn ship(&self, id: Uuid) -> AppResult<SalesOrder> {
        with_retry(&self.retry, "sales_order.ship", || self.try_ship(id)).await
    }

    async fn try_ship(&self, id: Uuid) -> AppResult<SalesOrder> {
        let mut tx = self.store.begin().await?;
        let mut order = load(tx.as_mut(), id).await?;
        order.ship(Utc::now().date_naive())?;
        tx.update_sales_order(&mut order).await?;
        tx.commit().await?;

        tracing::info!(so_number = %order.so_number, "Sales order shipped");
        Ok(order)
    }

    pub async fn deliver(&self, id: Uuid) -> AppResult<SalesOrder> {
        with_retry(&self.retry, "sales_order.deliver", || self.try_deliver(id)).await
    }

    async fn try_deliver(&self, id: Uuid) -> AppResult<SalesOrder> {
        let mut tx = self.store.begin().await?;
        let mut order = load(tx.as_mut(), id).await?;
        order.deliver(Utc::now().date_naive())?;
        tx.update_sales_order(&mut order).await?;
        tx.commit().await?;

        tracing::info!(so_number = %order.so_number, "Sales order delivered");
        Ok(order)
    }

    /// Cancel the order, restoring stock if it had been fulfilled
    pub async fn cancel(
        &self,
        id: Uuid,
        performed_by: Uuid,
        input: CancelSalesOrderInput,
    ) -> AppResult<SalesOrder> {
        with_retry(&self.retry, "sales_order.cancel", || {
            self.try_cancel(id, performed_by, &input)
        })
        .await
    }

    async fn try_cancel(
        &self,
        id: Uuid,
        performed_by: Uuid,
        input: &CancelSalesOrderInput,
    ) -> AppResult<SalesOrder> {
        let mut tx = self.store.begin().await?;
        lookup::require_user(tx.as_mut(), performed_by).await?;
        let mut order = load(tx.as_mut(), id).await?;
        let restore_stock = order.cancel(&input.reason)?;
        if restore_stock {
            order_inventory::release_for_sales_order(tx.as_mut(), &order, performed_by).await?;
        }

        tx.update_sales_order(&mut order).await?;
        tx.commit().await?;

        tracing::info!(so_number = %order.so_number, restore_stock, "Sales order cancelled");
        Ok(order)
    }
}

pub(crate) async fn load(tx: &mut dyn Transaction, id: Uuid) -> AppResult<SalesOrder> {
    tx.sales_order(id)
        .await?
        .ok_or_else(|| AppError::not_found("SalesOrder", id))
}
