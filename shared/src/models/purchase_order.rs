//! Purchase orders and their receipt lifecycle

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::types::{
    append_note, checked_sum, line_total, round_money, Auditable, NOTE_INLINE, NOTE_LINE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PurchaseOrderStatus {
    Draft,
    Submitted,
    Approved,
    Received,
    Cancelled,
}

impl PurchaseOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseOrderStatus::Draft => "DRAFT",
            PurchaseOrderStatus::Submitted => "SUBMITTED",
            PurchaseOrderStatus::Approved => "APPROVED",
            PurchaseOrderStatus::Received => "RECEIVED",
            PurchaseOrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "DRAFT" => Some(PurchaseOrderStatus::Draft),
            "SUBMITTED" => Some(PurchaseOrderStatus::Submitted),
            "APPROVED" => Some(PurchaseOrderStatus::Approved),
            "RECEIVED" => Some(PurchaseOrderStatus::Received),
            "CANCELLED" => Some(PurchaseOrderStatus::Cancelled),
            _ => None,
        }
    }

    /// Legal edges of the purchase order state machine
    pub fn can_transition_to(&self, next: PurchaseOrderStatus) -> bool {
        use PurchaseOrderStatus::*;
        matches!(
            (self, next),
            (Draft, Submitted)
                | (Submitted, Approved)
                | (Submitted, Draft)
                | (Approved, Received)
                | (Draft, Cancelled)
                | (Submitted, Cancelled)
                | (Approved, Cancelled)
        )
    }
}

impl std::fmt::Display for PurchaseOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PurchaseOrderItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity_ordered: i32,
    /// Accumulates across partial receipts, never above `quantity_ordered`
    pub quantity_received: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

impl PurchaseOrderItem {
    pub fn new(product_id: Uuid, quantity_ordered: i32, unit_price: Decimal) -> DomainResult<Self> {
        if quantity_ordered < 1 {
            return Err(DomainError::validation(
                "quantity_ordered",
                "Quantity ordered must be at least 1",
            ));
        }
        if unit_price < Decimal::ZERO {
            return Err(DomainError::validation(
                "unit_price",
                "Unit price cannot be negative",
            ));
        }
        let line_total = line_total(unit_price, quantity_ordered)
            .ok_or_else(|| DomainError::validation("unit_price", "Line total is out of range"))?;
        Ok(Self {
            id: Uuid::new_v4(),
            product_id,
            quantity_ordered,
            quantity_received: 0,
            unit_price,
            line_total,
        })
    }

    pub fn remaining(&self) -> i32 {
        self.quantity_ordered - self.quantity_received
    }

    pub fn is_fully_received(&self) -> bool {
        self.quantity_received >= self.quantity_ordered
    }
}

/// One line of a receipt request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptLine {
    pub item_id: Uuid,
    pub quantity_received: i32,
}

/// Stock that a receipt brings in for a single order line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedStock {
    pub item_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PurchaseOrder {
    pub id: Uuid,
    pub po_number: String,
    pub supplier_id: Uuid,
    pub warehouse_id: Uuid,
    pub created_by: Uuid,
    pub status: PurchaseOrderStatus,
    pub order_date: NaiveDate,
    pub expected_delivery_date: Option<NaiveDate>,
    pub actual_delivery_date: Option<NaiveDate>,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
    pub notes: Option<String>,
    pub items: Vec<PurchaseOrderItem>,
    #[serde(flatten)]
    pub audit: Auditable,
}

impl PurchaseOrder {
    /// Subtotal is the sum of line totals; total adds tax and subtracts discount
    pub fn recalculate_totals(&mut self) -> DomainResult<()> {
        let subtotal = checked_sum(self.items.iter().map(|i| i.line_total))
            .ok_or_else(|| DomainError::validation("items", "Order subtotal is out of range"))?;
        let total = subtotal
            .checked_add(self.tax_amount)
            .and_then(|t| t.checked_sub(self.discount_amount))
            .ok_or_else(|| DomainError::validation("total_amount", "Order total is out of range"))?;
        self.subtotal = subtotal;
        self.total_amount = round_money(total);
        Ok(())
    }

    pub fn ensure_editable(&self) -> DomainResult<()> {
        if self.status != PurchaseOrderStatus::Draft {
            return Err(DomainError::NotEditable {
                entity: "PurchaseOrder",
                status: self.status.to_string(),
                editable_status: "DRAFT",
            });
        }
        Ok(())
    }

    fn transition(&mut self, next: PurchaseOrderStatus) -> DomainResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::transition("PurchaseOrder", self.status, next));
        }
        self.status = next;
        Ok(())
    }

    pub fn submit(&mut self) -> DomainResult<()> {
        if self.status == PurchaseOrderStatus::Draft && self.items.is_empty() {
            return Err(DomainError::IllegalState(
                "Cannot submit a purchase order with no items".to_string(),
            ));
        }
        self.transition(PurchaseOrderStatus::Submitted)
    }

    pub fn approve(&mut self) -> DomainResult<()> {
        self.transition(PurchaseOrderStatus::Approved)
    }

    /// Send a submitted order back to DRAFT
    pub fn reject(&mut self, reason: &str) -> DomainResult<()> {
        self.transition(PurchaseOrderStatus::Draft)?;
        append_note(&mut self.notes, NOTE_LINE, &format!("[REJECTED] {}", reason));
        Ok(())
    }

    pub fn cancel(&mut self, reason: &str) -> DomainResult<()> {
        self.transition(PurchaseOrderStatus::Cancelled)?;
        append_note(&mut self.notes, NOTE_LINE, &format!("[CANCELLED] {}", reason));
        Ok(())
    }

    pub fn is_fully_received(&self) -> bool {
        self.items.iter().all(PurchaseOrderItem::is_fully_received)
    }

    /// Apply receipt lines to the order items.
    ///
    /// Every line is checked against the ordered ceiling before anything is
    /// changed, so a failing line leaves the order untouched. Lines naming the
    /// same item are applied in order. Returns the stock to book per line.
    /// The order becomes RECEIVED once every item is complete, or immediately
    /// when `close` is set.
    pub fn apply_receipt(
        &mut self,
        lines: &[ReceiptLine],
        close: bool,
        received_on: NaiveDate,
        notes: Option<&str>,
    ) -> DomainResult<Vec<ReceivedStock>> {
        if self.status != PurchaseOrderStatus::Approved {
            return Err(DomainError::transition(
                "PurchaseOrder",
                self.status,
                PurchaseOrderStatus::Received,
            ));
        }

        let mut items = self.items.clone();
        let mut received = Vec::new();
        for line in lines {
            if line.quantity_received < 0 {
                return Err(DomainError::validation(
                    "quantity_received",
                    "Received quantity cannot be negative",
                ));
            }
            let item = items
                .iter_mut()
                .find(|i| i.id == line.item_id)
                .ok_or_else(|| DomainError::NotFound {
                    entity: "PurchaseOrderItem",
                    id: line.item_id.to_string(),
                })?;

            if line.quantity_received > item.quantity_ordered - item.quantity_received {
                return Err(DomainError::OverReceipt {
                    item_id: item.id,
                    ordered: item.quantity_ordered,
                    already_received: item.quantity_received,
                    requested: line.quantity_received,
                });
            }
            item.quantity_received += line.quantity_received;

            if line.quantity_received > 0 {
                received.push(ReceivedStock {
                    item_id: item.id,
                    product_id: item.product_id,
                    quantity: line.quantity_received,
                });
            }
        }

        if received.is_empty() && !close {
            return Err(DomainError::validation(
                "items",
                "A receipt must receive at least one unit",
            ));
        }

        self.items = items;
        if close || self.is_fully_received() {
            self.transition(PurchaseOrderStatus::Received)?;
            self.actual_delivery_date = Some(received_on);
        }
        if let Some(notes) = notes.filter(|n| !n.trim().is_empty()) {
            append_note(&mut self.notes, NOTE_INLINE, notes);
        }
        Ok(received)
    }
}

/// Header fields needed to open a new purchase order
#[derive(Debug, Clone)]
pub struct NewPurchaseOrder {
    pub po_number: String,
    pub supplier_id: Uuid,
    pub warehouse_id: Uuid,
    pub created_by: Uuid,
    pub order_date: NaiveDate,
    pub expected_delivery_date: Option<NaiveDate>,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub notes: Option<String>,
    pub items: Vec<PurchaseOrderItem>,
}

impl PurchaseOrder {
    pub fn create(new: NewPurchaseOrder, now: DateTime<Utc>) -> DomainResult<Self> {
        if new.tax_amount < Decimal::ZERO || new.discount_amount < Decimal::ZERO {
            return Err(DomainError::validation(
                "amount",
                "Tax and discount cannot be negative",
            ));
        }
        let mut po = Self {
            id: Uuid::new_v4(),
            po_number: new.po_number,
            supplier_id: new.supplier_id,
            warehouse_id: new.warehouse_id,
            created_by: new.created_by,
            status: PurchaseOrderStatus::Draft,
            order_date: new.order_date,
            expected_delivery_date: new.expected_delivery_date,
            actual_delivery_date: None,
            subtotal: Decimal::ZERO,
            tax_amount: new.tax_amount,
            discount_amount: new.discount_amount,
            total_amount: Decimal::ZERO,
            notes: new.notes,
            items: new.items,
            audit: Auditable::new(now),
        };
        po.recalculate_totals()?;
        Ok(po)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn order(items: Vec<PurchaseOrderItem>) -> PurchaseOrder {
        PurchaseOrder::create(
            NewPurchaseOrder {
                po_number: "PO-20240115-0001".to_string(),
                supplier_id: Uuid::new_v4(),
                warehouse_id: Uuid::new_v4(),
                created_by: Uuid::new_v4(),
                order_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
                expected_delivery_date: None,
                tax_amount: dec("10.00"),
                discount_amount: dec("5.00"),
                notes: None,
                items,
            },
            Utc::now(),
        )
        .unwrap()
    }

    fn approved(items: Vec<PurchaseOrderItem>) -> PurchaseOrder {
        let mut po = order(items);
        po.submit().unwrap();
        po.approve().unwrap();
        po
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 20).unwrap()
    }

    #[test]
    fn test_totals() {
        let po = order(vec![
            PurchaseOrderItem::new(Uuid::new_v4(), 3, dec("12.50")).unwrap(),
            PurchaseOrderItem::new(Uuid::new_v4(), 2, dec("7.25")).unwrap(),
        ]);
        assert_eq!(po.subtotal, dec("52.00"));
        assert_eq!(po.total_amount, dec("57.00"));
    }

    #[test]
    fn test_item_requires_positive_quantity() {
        assert!(PurchaseOrderItem::new(Uuid::new_v4(), 0, dec("1")).is_err());
    }

    #[test]
    fn test_transitions() {
        use PurchaseOrderStatus::*;
        assert!(Draft.can_transition_to(Submitted));
        assert!(Submitted.can_transition_to(Draft));
        assert!(Approved.can_transition_to(Cancelled));
        assert!(!Received.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Draft));
        assert!(!Draft.can_transition_to(Approved));
    }

    #[test]
    fn test_submit_empty_fails() {
        let mut po = order(vec![]);
        assert!(matches!(po.submit(), Err(DomainError::IllegalState(_))));
        assert_eq!(po.status, PurchaseOrderStatus::Draft);
    }

    #[test]
    fn test_reject_appends_reason() {
        let mut po = order(vec![PurchaseOrderItem::new(Uuid::new_v4(), 1, dec("1")).unwrap()]);
        po.notes = Some("urgent".to_string());
        po.submit().unwrap();
        po.reject("price too high").unwrap();
        assert_eq!(po.status, PurchaseOrderStatus::Draft);
        assert_eq!(po.notes.as_deref(), Some("urgent\n[REJECTED] price too high"));
    }

    #[test]
    fn test_receive_ceiling() {
        let item = PurchaseOrderItem::new(Uuid::new_v4(), 10, dec("1")).unwrap();
        let item_id = item.id;
        let mut po = approved(vec![item]);

        po.apply_receipt(
            &[ReceiptLine { item_id, quantity_received: 7 }],
            false,
            today(),
            None,
        )
        .unwrap();
        assert_eq!(po.status, PurchaseOrderStatus::Approved);

        let err = po
            .apply_receipt(&[ReceiptLine { item_id, quantity_received: 5 }], false, today(), None)
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::OverReceipt {
                ordered: 10,
                already_received: 7,
                requested: 5,
                ..
            }
        ));
        assert_eq!(po.items[0].quantity_received, 7);

        let stock = po
            .apply_receipt(&[ReceiptLine { item_id, quantity_received: 3 }], false, today(), None)
            .unwrap();
        assert_eq!(stock[0].quantity, 3);
        assert_eq!(po.items[0].quantity_received, 10);
        assert_eq!(po.status, PurchaseOrderStatus::Received);
        assert_eq!(po.actual_delivery_date, Some(today()));
    }

    #[test]
    fn test_receipt_near_integer_limit_is_over_receipt() {
        let item = PurchaseOrderItem::new(Uuid::new_v4(), 10, dec("1")).unwrap();
        let item_id = item.id;
        let mut po = approved(vec![item]);
        po.apply_receipt(&[ReceiptLine { item_id, quantity_received: 1 }], false, today(), None)
            .unwrap();

        let err = po
            .apply_receipt(
                &[ReceiptLine { item_id, quantity_received: i32::MAX }],
                false,
                today(),
                None,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::OverReceipt {
                already_received: 1,
                requested: i32::MAX,
                ..
            }
        ));
        assert_eq!(po.items[0].quantity_received, 1);
    }

    #[test]
    fn test_line_total_out_of_range() {
        assert!(matches!(
            PurchaseOrderItem::new(Uuid::new_v4(), 2, Decimal::MAX),
            Err(DomainError::Validation { .. })
        ));
    }

    #[test]
    fn test_failed_line_leaves_other_lines_untouched() {
        let a = PurchaseOrderItem::new(Uuid::new_v4(), 5, dec("1")).unwrap();
        let b = PurchaseOrderItem::new(Uuid::new_v4(), 5, dec("1")).unwrap();
        let (a_id, b_id) = (a.id, b.id);
        let mut po = approved(vec![a, b]);

        let result = po.apply_receipt(
            &[
                ReceiptLine { item_id: a_id, quantity_received: 5 },
                ReceiptLine { item_id: b_id, quantity_received: 6 },
            ],
            false,
            today(),
            None,
        );
        assert!(result.is_err());
        assert!(po.items.iter().all(|i| i.quantity_received == 0));
    }

    #[test]
    fn test_duplicate_lines_accumulate() {
        let item = PurchaseOrderItem::new(Uuid::new_v4(), 4, dec("1")).unwrap();
        let item_id = item.id;
        let mut po = approved(vec![item]);

        let err = po.apply_receipt(
            &[
                ReceiptLine { item_id, quantity_received: 3 },
                ReceiptLine { item_id, quantity_received: 2 },
            ],
            false,
            today(),
            None,
        );
        assert!(matches!(err, Err(DomainError::OverReceipt { already_received: 3, .. })));
    }

    #[test]
    fn test_close_marks_partial_receipt_received() {
        let item = PurchaseOrderItem::new(Uuid::new_v4(), 10, dec("1")).unwrap();
        let item_id = item.id;
        let mut po = approved(vec![item]);
        po.apply_receipt(
            &[ReceiptLine { item_id, quantity_received: 4 }],
            true,
            today(),
            Some("short shipment"),
        )
        .unwrap();
        assert_eq!(po.status, PurchaseOrderStatus::Received);
        assert_eq!(po.notes.as_deref(), Some("short shipment"));
    }

    #[test]
    fn test_receive_requires_approved() {
        let item = PurchaseOrderItem::new(Uuid::new_v4(), 1, dec("1")).unwrap();
        let item_id = item.id;
        let mut po = order(vec![item]);
        let err = po
            .apply_receipt(&[ReceiptLine { item_id, quantity_received: 1 }], false, today(), None)
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidStatusTransition { .. }));
    }
}
