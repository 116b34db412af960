//! Invoices and their balance arithmetic

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::models::SalesOrder;
use crate::types::{append_note, round_money, Auditable, NOTE_INLINE};
use crate::validation::{validate_non_negative_amount, validate_positive_amount};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Partial,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "DRAFT",
            InvoiceStatus::Sent => "SENT",
            InvoiceStatus::Paid => "PAID",
            InvoiceStatus::Partial => "PARTIAL",
            InvoiceStatus::Overdue => "OVERDUE",
            InvoiceStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "DRAFT" => Some(InvoiceStatus::Draft),
            "SENT" => Some(InvoiceStatus::Sent),
            "PAID" => Some(InvoiceStatus::Paid),
            "PARTIAL" => Some(InvoiceStatus::Partial),
            "OVERDUE" => Some(InvoiceStatus::Overdue),
            "CANCELLED" => Some(InvoiceStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Invoice {
    pub id: Uuid,
    pub invoice_number: String,
    pub sales_order_id: Uuid,
    pub customer_id: Uuid,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    /// Always `total_amount - paid_amount`
    pub balance_due: Decimal,
    pub status: InvoiceStatus,
    pub payment_terms: Option<String>,
    pub notes: Option<String>,
    pub file_url: Option<String>,
    pub generated_by: Uuid,
    #[serde(flatten)]
    pub audit: Auditable,
}

/// Caller-supplied fields of a new invoice; amounts come from the order
#[derive(Debug, Clone)]
pub struct InvoiceTerms {
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    pub payment_terms: Option<String>,
    pub notes: Option<String>,
    pub generated_by: Uuid,
}

impl Invoice {
    /// Build a DRAFT invoice with amounts copied from the sales order
    pub fn from_sales_order(
        order: &SalesOrder,
        terms: InvoiceTerms,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if terms.due_date < terms.invoice_date {
            return Err(DomainError::validation(
                "due_date",
                "Due date cannot be before the invoice date",
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            invoice_number: terms.invoice_number,
            sales_order_id: order.id,
            customer_id: order.customer_id,
            invoice_date: terms.invoice_date,
            due_date: terms.due_date,
            subtotal: order.subtotal,
            tax_amount: order.tax_amount,
            discount_amount: Decimal::ZERO,
            total_amount: order.total_amount,
            paid_amount: Decimal::ZERO,
            balance_due: order.total_amount,
            status: InvoiceStatus::Draft,
            payment_terms: terms.payment_terms,
            notes: terms.notes,
            file_url: None,
            generated_by: terms.generated_by,
            audit: Auditable::new(now),
        })
    }

    fn recompute_balance(&mut self) {
        self.balance_due = round_money(self.total_amount - self.paid_amount);
    }

    /// PAID once nothing is owed, PARTIAL while something has been paid
    fn settled_status(&self) -> Option<InvoiceStatus> {
        if self.balance_due.is_zero() {
            Some(InvoiceStatus::Paid)
        } else if self.paid_amount > Decimal::ZERO {
            Some(InvoiceStatus::Partial)
        } else {
            None
        }
    }

    /// Set the status directly, optionally replacing the paid amount.
    ///
    /// When a paid amount is given the balance is recomputed and the status
    /// resolves to PAID or PARTIAL if the payment warrants it.
    pub fn update_status(
        &mut self,
        next: InvoiceStatus,
        paid_amount: Option<Decimal>,
        notes: Option<&str>,
    ) -> DomainResult<()> {
        if self.status == InvoiceStatus::Cancelled {
            return Err(DomainError::transition("Invoice", self.status, next));
        }
        if let Some(paid) = paid_amount {
            validate_non_negative_amount(paid)
                .map_err(|msg| DomainError::validation("paid_amount", msg))?;
            if paid > self.total_amount {
                return Err(DomainError::validation(
                    "paid_amount",
                    "Paid amount must be between zero and the invoice total",
                ));
            }
        }
        self.status = next;
        if let Some(paid) = paid_amount {
            self.paid_amount = round_money(paid);
            self.recompute_balance();
            if let Some(settled) = self.settled_status() {
                self.status = settled;
            }
        }
        if let Some(notes) = notes.filter(|n| !n.trim().is_empty()) {
            append_note(&mut self.notes, NOTE_INLINE, notes);
        }
        Ok(())
    }

    /// Mark the invoice as sent. A partially paid invoice keeps PARTIAL.
    pub fn send(&mut self) -> DomainResult<()> {
        match self.status {
            InvoiceStatus::Cancelled | InvoiceStatus::Paid => {
                Err(DomainError::transition("Invoice", self.status, InvoiceStatus::Sent))
            }
            InvoiceStatus::Partial => Ok(()),
            _ => {
                self.status = InvoiceStatus::Sent;
                Ok(())
            }
        }
    }

    /// Apply a payment against the balance due
    pub fn apply_payment(&mut self, amount: Decimal) -> DomainResult<()> {
        if matches!(self.status, InvoiceStatus::Cancelled | InvoiceStatus::Paid) {
            return Err(DomainError::IllegalState(format!(
                "Cannot record a payment on a {} invoice",
                self.status
            )));
        }
        validate_positive_amount(amount).map_err(|msg| DomainError::validation("amount", msg))?;
        if amount > self.balance_due {
            return Err(DomainError::OverPayment {
                balance_due: self.balance_due,
                amount,
            });
        }
        self.paid_amount = round_money(self.paid_amount + amount);
        self.recompute_balance();
        self.status = if self.balance_due.is_zero() {
            InvoiceStatus::Paid
        } else {
            InvoiceStatus::Partial
        };
        Ok(())
    }
}
