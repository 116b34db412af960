//! Payments received from customers

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::types::{append_note, round_money, Auditable, NOTE_INLINE};
use crate::validation::{validate_currency_code, validate_positive_amount};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    CreditCard,
    DebitCard,
    BankTransfer,
    Check,
    Paypal,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "CASH",
            PaymentMethod::CreditCard => "CREDIT_CARD",
            PaymentMethod::DebitCard => "DEBIT_CARD",
            PaymentMethod::BankTransfer => "BANK_TRANSFER",
            PaymentMethod::Check => "CHECK",
            PaymentMethod::Paypal => "PAYPAL",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "CASH" => Some(PaymentMethod::Cash),
            "CREDIT_CARD" => Some(PaymentMethod::CreditCard),
            "DEBIT_CARD" => Some(PaymentMethod::DebitCard),
            "BANK_TRANSFER" => Some(PaymentMethod::BankTransfer),
            "CHECK" => Some(PaymentMethod::Check),
            "PAYPAL" => Some(PaymentMethod::Paypal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(PaymentStatus::Pending),
            "COMPLETED" => Some(PaymentStatus::Completed),
            "FAILED" => Some(PaymentStatus::Failed),
            "REFUNDED" => Some(PaymentStatus::Refunded),
            _ => None,
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub id: Uuid,
    pub payment_number: String,
    pub sales_order_id: Option<Uuid>,
    pub invoice_id: Option<Uuid>,
    pub customer_id: Uuid,
    pub payment_date: NaiveDate,
    pub payment_method: PaymentMethod,
    pub amount: Decimal,
    pub currency: String,
    pub reference_number: Option<String>,
    pub status: PaymentStatus,
    pub processed_by: Uuid,
    pub notes: Option<String>,
    #[serde(flatten)]
    pub audit: Auditable,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub payment_number: String,
    pub sales_order_id: Option<Uuid>,
    pub invoice_id: Option<Uuid>,
    pub customer_id: Uuid,
    pub payment_date: NaiveDate,
    pub payment_method: PaymentMethod,
    pub amount: Decimal,
    pub currency: String,
    pub reference_number: Option<String>,
    pub status: PaymentStatus,
    pub processed_by: Uuid,
    pub notes: Option<String>,
}

impl Payment {
    pub fn create(new: NewPayment, now: DateTime<Utc>) -> DomainResult<Self> {
        validate_positive_amount(new.amount).map_err(|msg| DomainError::validation("amount", msg))?;
        validate_currency_code(&new.currency)
            .map_err(|msg| DomainError::validation("currency", msg))?;
        Ok(Self {
            id: Uuid::new_v4(),
            payment_number: new.payment_number,
            sales_order_id: new.sales_order_id,
            invoice_id: new.invoice_id,
            customer_id: new.customer_id,
            payment_date: new.payment_date,
            payment_method: new.payment_method,
            amount: round_money(new.amount),
            currency: new.currency,
            reference_number: new.reference_number,
            status: new.status,
            processed_by: new.processed_by,
            notes: new.notes,
            audit: Auditable::new(now),
        })
    }

    /// Set a new status; REFUNDED is reserved for `refund`
    pub fn update_status(&mut self, next: PaymentStatus, notes: Option<&str>) -> DomainResult<()> {
        if self.status == PaymentStatus::Refunded {
            return Err(DomainError::transition("Payment", self.status, next));
        }
        if next == PaymentStatus::Refunded {
            return Err(DomainError::IllegalState(
                "Use the refund operation to refund a payment".to_string(),
            ));
        }
        self.status = next;
        if let Some(notes) = notes.filter(|n| !n.trim().is_empty()) {
            append_note(&mut self.notes, NOTE_INLINE, notes);
        }
        Ok(())
    }

    /// Flag a completed payment as refunded
    pub fn refund(&mut self, refund_amount: Decimal, reason: &str, notes: Option<&str>) -> DomainResult<()> {
        if self.status != PaymentStatus::Completed {
            return Err(DomainError::transition(
                "Payment",
                self.status,
                PaymentStatus::Refunded,
            ));
        }
        validate_positive_amount(refund_amount)
            .map_err(|msg| DomainError::validation("refund_amount", msg))?;
        if refund_amount > self.amount {
            return Err(DomainError::OverRefund {
                amount: self.amount,
                refund: refund_amount,
            });
        }
        self.status = PaymentStatus::Refunded;
        let mut entry = format!("REFUND: {}", reason);
        if let Some(notes) = notes.filter(|n| !n.trim().is_empty()) {
            entry.push_str(NOTE_INLINE);
            entry.push_str(notes);
        }
        append_note(&mut self.notes, NOTE_INLINE, &entry);
        Ok(())
    }
}
