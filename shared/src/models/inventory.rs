//! Stock ledger rows and movement audit records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::types::Auditable;

/// Quantity on hand for one product in one warehouse
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InventoryRecord {
    pub id: Uuid,
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub quantity: i32,
    pub location_code: Option<String>,
    pub last_stock_check: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub audit: Auditable,
}

impl InventoryRecord {
    /// An empty record, created lazily on the first stock-affecting event
    pub fn new(product_id: Uuid, warehouse_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            product_id,
            warehouse_id,
            quantity: 0,
            location_code: None,
            last_stock_check: None,
            audit: Auditable::new(now),
        }
    }

    /// Increase the quantity on hand, returning the new quantity
    pub fn add(&mut self, qty: i32) -> DomainResult<i32> {
        ensure_positive_quantity(qty)?;
        self.quantity = self
            .quantity
            .checked_add(qty)
            .ok_or_else(|| DomainError::validation("quantity", "Stock quantity overflow"))?;
        Ok(self.quantity)
    }

    /// Decrease the quantity on hand. Leaves the record untouched when short.
    pub fn remove(&mut self, qty: i32) -> DomainResult<i32> {
        ensure_positive_quantity(qty)?;
        if self.quantity < qty {
            return Err(DomainError::InsufficientStock {
                product_id: self.product_id,
                warehouse_id: self.warehouse_id,
                available: self.quantity,
                requested: qty,
            });
        }
        self.quantity -= qty;
        Ok(self.quantity)
    }
}

fn ensure_positive_quantity(qty: i32) -> DomainResult<()> {
    if qty <= 0 {
        return Err(DomainError::validation(
            "quantity",
            "Quantity must be greater than zero",
        ));
    }
    Ok(())
}

/// Why stock moved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    Transfer,
    Receipt,
    Shipment,
    Adjustment,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Transfer => "TRANSFER",
            MovementType::Receipt => "RECEIPT",
            MovementType::Shipment => "SHIPMENT",
            MovementType::Adjustment => "ADJUSTMENT",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "TRANSFER" => Some(MovementType::Transfer),
            "RECEIPT" => Some(MovementType::Receipt),
            "SHIPMENT" => Some(MovementType::Shipment),
            "ADJUSTMENT" => Some(MovementType::Adjustment),
            _ => None,
        }
    }
}

impl std::fmt::Display for MovementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable audit entry explaining a quantity change
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MovementRecord {
    pub id: Uuid,
    pub product_id: Uuid,
    pub from_warehouse_id: Option<Uuid>,
    pub to_warehouse_id: Option<Uuid>,
    pub quantity: i32,
    pub movement_type: MovementType,
    pub reason: String,
    pub reference_number: Option<String>,
    pub performed_by: Uuid,
    pub movement_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A movement about to be recorded
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewMovement {
    pub movement_type: MovementType,
    pub product_id: Uuid,
    pub from_warehouse_id: Option<Uuid>,
    pub to_warehouse_id: Option<Uuid>,
    pub quantity: i32,
    pub reason: String,
    pub reference_number: Option<String>,
    pub performed_by: Uuid,
    /// Defaults to the recording time
    pub movement_date: Option<DateTime<Utc>>,
}

impl NewMovement {
    pub fn validate(&self) -> DomainResult<()> {
        if self.from_warehouse_id.is_none() && self.to_warehouse_id.is_none() {
            return Err(DomainError::validation(
                "warehouse",
                "A movement needs a source or a destination warehouse",
            ));
        }
        if self.from_warehouse_id.is_some() && self.from_warehouse_id == self.to_warehouse_id {
            return Err(DomainError::validation(
                "to_warehouse_id",
                "Source and destination warehouse must differ",
            ));
        }
        ensure_positive_quantity(self.quantity)?;
        if self.reason.trim().is_empty() {
            return Err(DomainError::validation("reason", "Reason is required"));
        }
        Ok(())
    }

    pub fn into_record(self, now: DateTime<Utc>) -> DomainResult<MovementRecord> {
        self.validate()?;
        Ok(MovementRecord {
            id: Uuid::new_v4(),
            product_id: self.product_id,
            from_warehouse_id: self.from_warehouse_id,
            to_warehouse_id: self.to_warehouse_id,
            quantity: self.quantity,
            movement_type: self.movement_type,
            reason: self.reason,
            reference_number: self.reference_number,
            performed_by: self.performed_by,
            movement_date: self.movement_date.unwrap_or(now),
            created_at: now,
        })
    }
}

/// Filter for movement history queries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MovementFilter {
    pub product_id: Option<Uuid>,
    pub warehouse_id: Option<Uuid>,
    pub movement_type: Option<MovementType>,
    pub reference_number: Option<String>,
}

impl MovementFilter {
    pub fn matches(&self, movement: &MovementRecord) -> bool {
        self.product_id.map_or(true, |p| movement.product_id == p)
            && self.warehouse_id.map_or(true, |w| {
                movement.from_warehouse_id == Some(w) || movement.to_warehouse_id == Some(w)
            })
            && self.movement_type.map_or(true, |t| movement.movement_type == t)
            && self
                .reference_number
                .as_deref()
                .map_or(true, |r| movement.reference_number.as_deref() == Some(r))
    }
}
