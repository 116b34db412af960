//! Sales orders: availability check, fulfillment and delivery tracking

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::types::{append_note, checked_sum, line_total, round_money, Auditable, NOTE_LINE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SalesOrderStatus {
    Pending,
    Confirmed,
    Fulfilled,
    Shipped,
    Delivered,
    Cancelled,
}

impl SalesOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SalesOrderStatus::Pending => "PENDING",
            SalesOrderStatus::Confirmed => "CONFIRMED",
            SalesOrderStatus::Fulfilled => "FULFILLED",
            SalesOrderStatus::Shipped => "SHIPPED",
            SalesOrderStatus::Delivered => "DELIVERED",
            SalesOrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(SalesOrderStatus::Pending),
            "CONFIRMED" => Some(SalesOrderStatus::Confirmed),
            "FULFILLED" => Some(SalesOrderStatus::Fulfilled),
            "SHIPPED" => Some(SalesOrderStatus::Shipped),
            "DELIVERED" => Some(SalesOrderStatus::Delivered),
            "CANCELLED" => Some(SalesOrderStatus::Cancelled),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: SalesOrderStatus) -> bool {
        use SalesOrderStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Confirmed, Fulfilled)
                | (Fulfilled, Shipped)
                | (Shipped, Delivered)
                | (Pending, Cancelled)
                | (Confirmed, Cancelled)
                | (Fulfilled, Cancelled)
        )
    }
}

impl std::fmt::Display for SalesOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SalesOrderItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    /// Price at order time, may differ from the current catalog price
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

impl SalesOrderItem {
    pub fn new(product_id: Uuid, quantity: i32, unit_price: Decimal) -> DomainResult<Self> {
        if quantity < 1 {
            return Err(DomainError::validation(
                "quantity",
                "Quantity must be at least 1",
            ));
        }
        if unit_price < Decimal::ZERO {
            return Err(DomainError::validation(
                "unit_price",
                "Unit price cannot be negative",
            ));
        }
        let line_total = line_total(unit_price, quantity)
            .ok_or_else(|| DomainError::validation("unit_price", "Line total is out of range"))?;
        Ok(Self {
            id: Uuid::new_v4(),
            product_id,
            quantity,
            unit_price,
            line_total,
        })
    }
}

/// Customer contact details copied onto the order when it is placed
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CustomerSnapshot {
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub shipping_address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SalesOrder {
    pub id: Uuid,
    pub so_number: String,
    pub customer_id: Uuid,
    #[serde(flatten)]
    pub customer: CustomerSnapshot,
    pub warehouse_id: Uuid,
    pub created_by: Uuid,
    pub status: SalesOrderStatus,
    pub order_date: NaiveDate,
    pub fulfillment_date: Option<NaiveDate>,
    pub shipping_date: Option<NaiveDate>,
    pub delivery_date: Option<NaiveDate>,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub shipping_cost: Decimal,
    pub total_amount: Decimal,
    pub notes: Option<String>,
    pub items: Vec<SalesOrderItem>,
    #[serde(flatten)]
    pub audit: Auditable,
}

#[derive(Debug, Clone)]
pub struct NewSalesOrder {
    pub so_number: String,
    pub customer_id: Uuid,
    pub customer: CustomerSnapshot,
    pub warehouse_id: Uuid,
    pub created_by: Uuid,
    pub order_date: NaiveDate,
    pub tax_amount: Decimal,
    pub shipping_cost: Decimal,
    pub notes: Option<String>,
    pub items: Vec<SalesOrderItem>,
}

impl SalesOrder {
    pub fn create(new: NewSalesOrder, now: DateTime<Utc>) -> DomainResult<Self> {
        if new.tax_amount < Decimal::ZERO || new.shipping_cost < Decimal::ZERO {
            return Err(DomainError::validation(
                "amount",
                "Tax and shipping cost cannot be negative",
            ));
        }
        let mut so = Self {
            id: Uuid::new_v4(),
            so_number: new.so_number,
            customer_id: new.customer_id,
            customer: new.customer,
            warehouse_id: new.warehouse_id,
            created_by: new.created_by,
            status: SalesOrderStatus::Pending,
            order_date: new.order_date,
            fulfillment_date: None,
            shipping_date: None,
            delivery_date: None,
            subtotal: Decimal::ZERO,
            tax_amount: new.tax_amount,
            shipping_cost: new.shipping_cost,
            total_amount: Decimal::ZERO,
            notes: new.notes,
            items: new.items,
            audit: Auditable::new(now),
        };
        so.recalculate_totals()?;
        Ok(so)
    }

    /// Total is subtotal plus tax plus shipping
    pub fn recalculate_totals(&mut self) -> DomainResult<()> {
        let subtotal = checked_sum(self.items.iter().map(|i| i.line_total))
            .ok_or_else(|| DomainError::validation("items", "Order subtotal is out of range"))?;
        let total = checked_sum([subtotal, self.tax_amount, self.shipping_cost])
            .ok_or_else(|| DomainError::validation("total_amount", "Order total is out of range"))?;
        self.subtotal = subtotal;
        self.total_amount = round_money(total);
        Ok(())
    }

    pub fn ensure_editable(&self) -> DomainResult<()> {
        if self.status != SalesOrderStatus::Pending {
            return Err(DomainError::NotEditable {
                entity: "SalesOrder",
                status: self.status.to_string(),
                editable_status: "PENDING",
            });
        }
        Ok(())
    }

    pub fn ensure_can_transition(&self, next: SalesOrderStatus) -> DomainResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::transition("SalesOrder", self.status, next));
        }
        Ok(())
    }

    fn transition(&mut self, next: SalesOrderStatus) -> DomainResult<()> {
        self.ensure_can_transition(next)?;
        self.status = next;
        Ok(())
    }

    /// Quantity required per product, in first-appearance order
    pub fn required_quantities(&self) -> DomainResult<Vec<(Uuid, i32)>> {
        let mut totals: Vec<(Uuid, i32)> = Vec::new();
        for item in &self.items {
            match totals.iter_mut().find(|(p, _)| *p == item.product_id) {
                Some((_, qty)) => {
                    *qty = qty.checked_add(item.quantity).ok_or_else(|| {
                        DomainError::validation("quantity", "Required quantity is out of range")
                    })?;
                }
                None => totals.push((item.product_id, item.quantity)),
            }
        }
        Ok(totals)
    }

    pub fn confirm(&mut self) -> DomainResult<()> {
        if self.status == SalesOrderStatus::Pending && self.items.is_empty() {
            return Err(DomainError::IllegalState(
                "Cannot confirm a sales order with no items".to_string(),
            ));
        }
        self.transition(SalesOrderStatus::Confirmed)
    }

    pub fn fulfill(&mut self, on: NaiveDate) -> DomainResult<()> {
        self.transition(SalesOrderStatus::Fulfilled)?;
        self.fulfillment_date = Some(on);
        Ok(())
    }

    pub fn ship(&mut self, on: NaiveDate) -> DomainResult<()> {
        self.transition(SalesOrderStatus::Shipped)?;
        self.shipping_date = Some(on);
        Ok(())
    }

    pub fn deliver(&mut self, on: NaiveDate) -> DomainResult<()> {
        self.transition(SalesOrderStatus::Delivered)?;
        self.delivery_date = Some(on);
        Ok(())
    }

    /// Cancel the order. Returns true when stock had already been deducted
    /// and must be put back.
    pub fn cancel(&mut self, reason: &str) -> DomainResult<bool> {
        let was_fulfilled = self.status == SalesOrderStatus::Fulfilled;
        self.transition(SalesOrderStatus::Cancelled)?;
        append_note(&mut self.notes, NOTE_LINE, &format!("[CANCELLED] {}", reason));
        Ok(was_fulfilled)
    }
}
