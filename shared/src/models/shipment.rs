//! Shipments created from fulfilled sales orders

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::types::{append_note, Auditable, NOTE_INLINE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShipmentStatus {
    Pending,
    InTransit,
    Delivered,
    Returned,
    Failed,
}

impl ShipmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentStatus::Pending => "PENDING",
            ShipmentStatus::InTransit => "IN_TRANSIT",
            ShipmentStatus::Delivered => "DELIVERED",
            ShipmentStatus::Returned => "RETURNED",
            ShipmentStatus::Failed => "FAILED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(ShipmentStatus::Pending),
            "IN_TRANSIT" => Some(ShipmentStatus::InTransit),
            "DELIVERED" => Some(ShipmentStatus::Delivered),
            "RETURNED" => Some(ShipmentStatus::Returned),
            "FAILED" => Some(ShipmentStatus::Failed),
            _ => None,
        }
    }

    /// DELIVERED and RETURNED shipments no longer change
    pub fn is_final(&self) -> bool {
        matches!(self, ShipmentStatus::Delivered | ShipmentStatus::Returned)
    }
}

impl std::fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShippingMethod {
    Standard,
    Express,
    Overnight,
    Ground,
}

impl ShippingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShippingMethod::Standard => "STANDARD",
            ShippingMethod::Express => "EXPRESS",
            ShippingMethod::Overnight => "OVERNIGHT",
            ShippingMethod::Ground => "GROUND",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "STANDARD" => Some(ShippingMethod::Standard),
            "EXPRESS" => Some(ShippingMethod::Express),
            "OVERNIGHT" => Some(ShippingMethod::Overnight),
            "GROUND" => Some(ShippingMethod::Ground),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Shipment {
    pub id: Uuid,
    pub shipment_number: String,
    pub sales_order_id: Uuid,
    pub carrier: String,
    pub tracking_number: Option<String>,
    pub shipping_method: ShippingMethod,
    pub estimated_delivery_date: Option<NaiveDate>,
    pub actual_delivery_date: Option<NaiveDate>,
    pub shipping_cost: Decimal,
    pub weight: Option<Decimal>,
    pub dimensions: Option<String>,
    pub status: ShipmentStatus,
    pub shipped_from_warehouse_id: Uuid,
    pub shipped_by: Uuid,
    pub notes: Option<String>,
    #[serde(flatten)]
    pub audit: Auditable,
}

#[derive(Debug, Clone)]
pub struct NewShipment {
    pub shipment_number: String,
    pub sales_order_id: Uuid,
    pub carrier: String,
    pub tracking_number: Option<String>,
    pub shipping_method: ShippingMethod,
    pub estimated_delivery_date: Option<NaiveDate>,
    pub shipping_cost: Decimal,
    pub weight: Option<Decimal>,
    pub dimensions: Option<String>,
    pub shipped_from_warehouse_id: Uuid,
    pub shipped_by: Uuid,
    pub notes: Option<String>,
}

impl Shipment {
    pub fn create(new: NewShipment, now: DateTime<Utc>) -> DomainResult<Self> {
        if new.carrier.trim().is_empty() {
            return Err(DomainError::validation("carrier", "Carrier is required"));
        }
        if new.shipping_cost < Decimal::ZERO {
            return Err(DomainError::validation(
                "shipping_cost",
                "Shipping cost cannot be negative",
            ));
        }
        if new.weight.is_some_and(|w| w <= Decimal::ZERO) {
            return Err(DomainError::validation("weight", "Weight must be positive"));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            shipment_number: new.shipment_number,
            sales_order_id: new.sales_order_id,
            carrier: new.carrier,
            tracking_number: new.tracking_number,
            shipping_method: new.shipping_method,
            estimated_delivery_date: new.estimated_delivery_date,
            actual_delivery_date: None,
            shipping_cost: new.shipping_cost,
            weight: new.weight,
            dimensions: new.dimensions,
            status: ShipmentStatus::Pending,
            shipped_from_warehouse_id: new.shipped_from_warehouse_id,
            shipped_by: new.shipped_by,
            notes: new.notes,
            audit: Auditable::new(now),
        })
    }

    /// Move to any status except DELIVERED, which only `deliver` may set
    pub fn update_status(&mut self, next: ShipmentStatus, notes: Option<&str>) -> DomainResult<()> {
        if next == ShipmentStatus::Delivered {
            return Err(DomainError::IllegalState(
                "Use the deliver operation to mark a shipment as DELIVERED".to_string(),
            ));
        }
        if self.status.is_final() {
            return Err(DomainError::transition("Shipment", self.status, next));
        }
        self.status = next;
        if let Some(notes) = notes.filter(|n| !n.trim().is_empty()) {
            append_note(&mut self.notes, NOTE_INLINE, notes);
        }
        Ok(())
    }

    pub fn deliver(&mut self, on: NaiveDate, notes: Option<&str>) -> DomainResult<()> {
        match self.status {
            ShipmentStatus::Delivered => {
                return Err(DomainError::IllegalState(format!(
                    "Shipment {} is already delivered",
                    self.shipment_number
                )));
            }
            ShipmentStatus::Returned | ShipmentStatus::Failed => {
                return Err(DomainError::transition(
                    "Shipment",
                    self.status,
                    ShipmentStatus::Delivered,
                ));
            }
            ShipmentStatus::Pending | ShipmentStatus::InTransit => {}
        }
        self.status = ShipmentStatus::Delivered;
        self.actual_delivery_date = Some(on);
        if let Some(notes) = notes.filter(|n| !n.trim().is_empty()) {
            append_note(&mut self.notes, NOTE_INLINE, notes);
        }
        Ok(())
    }
}
