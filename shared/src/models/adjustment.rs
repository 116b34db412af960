//! Manual stock adjustments subject to approval

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::types::{append_note, Auditable, NOTE_LINE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdjustmentType {
    /// Quantity is a positive delta added to stock
    Add,
    /// Quantity is a positive delta removed from stock
    Remove,
    /// Quantity is the counted absolute quantity
    Correction,
}

impl AdjustmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustmentType::Add => "ADD",
            AdjustmentType::Remove => "REMOVE",
            AdjustmentType::Correction => "CORRECTION",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ADD" => Some(AdjustmentType::Add),
            "REMOVE" => Some(AdjustmentType::Remove),
            "CORRECTION" => Some(AdjustmentType::Correction),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdjustmentReason {
    Damaged,
    Expired,
    Theft,
    CountError,
    Return,
    Other,
}

impl AdjustmentReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustmentReason::Damaged => "DAMAGED",
            AdjustmentReason::Expired => "EXPIRED",
            AdjustmentReason::Theft => "THEFT",
            AdjustmentReason::CountError => "COUNT_ERROR",
            AdjustmentReason::Return => "RETURN",
            AdjustmentReason::Other => "OTHER",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "DAMAGED" => Some(AdjustmentReason::Damaged),
            "EXPIRED" => Some(AdjustmentReason::Expired),
            "THEFT" => Some(AdjustmentReason::Theft),
            "COUNT_ERROR" => Some(AdjustmentReason::CountError),
            "RETURN" => Some(AdjustmentReason::Return),
            "OTHER" => Some(AdjustmentReason::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdjustmentStatus {
    Pending,
    Approved,
    Rejected,
}

impl AdjustmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustmentStatus::Pending => "PENDING",
            AdjustmentStatus::Approved => "APPROVED",
            AdjustmentStatus::Rejected => "REJECTED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(AdjustmentStatus::Pending),
            "APPROVED" => Some(AdjustmentStatus::Approved),
            "REJECTED" => Some(AdjustmentStatus::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for AdjustmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A requested correction to the stock ledger
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockAdjustment {
    pub id: Uuid,
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub quantity_before: i32,
    pub quantity_after: i32,
    /// Always `quantity_after - quantity_before`
    pub quantity_change: i32,
    pub adjustment_type: AdjustmentType,
    pub reason: AdjustmentReason,
    pub performed_by: Uuid,
    pub approved_by: Option<Uuid>,
    pub status: AdjustmentStatus,
    pub notes: Option<String>,
    pub adjustment_date: DateTime<Utc>,
    #[serde(flatten)]
    pub audit: Auditable,
}

/// Compute the target quantity of an adjustment from the current quantity
pub fn adjusted_quantity(
    adjustment_type: AdjustmentType,
    before: i32,
    quantity: i32,
) -> DomainResult<i32> {
    let after = match adjustment_type {
        AdjustmentType::Add | AdjustmentType::Remove if quantity <= 0 => {
            return Err(DomainError::validation(
                "quantity",
                "Quantity must be greater than zero",
            ));
        }
        AdjustmentType::Add => before.checked_add(quantity),
        AdjustmentType::Remove => before.checked_sub(quantity),
        AdjustmentType::Correction => Some(quantity),
    };
    after.ok_or_else(|| DomainError::validation("quantity", "Quantity out of range"))
}

impl StockAdjustment {
    /// Build a PENDING adjustment from a ledger snapshot
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        product_id: Uuid,
        warehouse_id: Uuid,
        quantity_before: i32,
        adjustment_type: AdjustmentType,
        quantity: i32,
        reason: AdjustmentReason,
        performed_by: Uuid,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let quantity_after = adjusted_quantity(adjustment_type, quantity_before, quantity)?;
        if quantity_after < 0 {
            return Err(DomainError::InsufficientStock {
                product_id,
                warehouse_id,
                available: quantity_before,
                requested: quantity_before - quantity_after,
            });
        }
        let quantity_change = quantity_after - quantity_before;
        if quantity_change == 0 {
            return Err(DomainError::validation(
                "quantity",
                "Adjustment does not change the quantity on hand",
            ));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            product_id,
            warehouse_id,
            quantity_before,
            quantity_after,
            quantity_change,
            adjustment_type,
            reason,
            performed_by,
            approved_by: None,
            status: AdjustmentStatus::Pending,
            notes,
            adjustment_date: now,
            audit: Auditable::new(now),
        })
    }

    fn ensure_pending(&self, to: AdjustmentStatus) -> DomainResult<()> {
        if self.status != AdjustmentStatus::Pending {
            return Err(DomainError::transition("StockAdjustment", self.status, to));
        }
        Ok(())
    }

    pub fn approve(&mut self, approver: Uuid) -> DomainResult<()> {
        self.ensure_pending(AdjustmentStatus::Approved)?;
        self.status = AdjustmentStatus::Approved;
        self.approved_by = Some(approver);
        Ok(())
    }

    pub fn reject(&mut self, reason: Option<&str>) -> DomainResult<()> {
        self.ensure_pending(AdjustmentStatus::Rejected)?;
        self.status = AdjustmentStatus::Rejected;
        if let Some(reason) = reason.filter(|r| !r.trim().is_empty()) {
            append_note(&mut self.notes, NOTE_LINE, &format!("[REJECTED] {}", reason));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adjustment(kind: AdjustmentType, before: i32, qty: i32) -> DomainResult<StockAdjustment> {
        StockAdjustment::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            before,
            kind,
            qty,
            AdjustmentReason::CountError,
            Uuid::new_v4(),
            None,
            Utc::now(),
        )
    }

    #[test]
    fn test_change_is_derived() {
        let add = adjustment(AdjustmentType::Add, 10, 5).unwrap();
        assert_eq!((add.quantity_after, add.quantity_change), (15, 5));

        let remove = adjustment(AdjustmentType::Remove, 10, 4).unwrap();
        assert_eq!((remove.quantity_after, remove.quantity_change), (6, -4));

        let correction = adjustment(AdjustmentType::Correction, 10, 7).unwrap();
        assert_eq!((correction.quantity_after, correction.quantity_change), (7, -3));
    }

    #[test]
    fn test_negative_result_rejected() {
        let err = adjustment(AdjustmentType::Remove, 3, 5).unwrap_err();
        assert!(matches!(
            err,
            DomainError::InsufficientStock {
                available: 3,
                requested: 5,
                ..
            }
        ));
        assert!(adjustment(AdjustmentType::Correction, 3, -1).is_err());
    }

    #[test]
    fn test_no_op_rejected() {
        assert!(matches!(
            adjustment(AdjustmentType::Correction, 4, 4),
            Err(DomainError::Validation { .. })
        ));
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut adj = adjustment(AdjustmentType::Add, 0, 5).unwrap();
        let approver = Uuid::new_v4();
        adj.approve(approver).unwrap();
        assert_eq!(adj.approved_by, Some(approver));
        assert!(adj.approve(approver).is_err());
        assert!(adj.reject(Some("late")).is_err());

        let mut adj = adjustment(AdjustmentType::Add, 0, 5).unwrap();
        adj.reject(Some("count was wrong")).unwrap();
        assert_eq!(adj.notes.as_deref(), Some("[REJECTED] count was wrong"));
        assert!(matches!(
            adj.approve(approver),
            Err(DomainError::InvalidStatusTransition { .. })
        ));
    }
}
