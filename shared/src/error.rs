//! Domain errors raised by pure model logic

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Failures detected by the domain models before anything is persisted
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("{entity} cannot move from {from} to {to}")]
    InvalidStatusTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("{entity} can only be modified while {editable_status} (currently {status})")]
    NotEditable {
        entity: &'static str,
        status: String,
        editable_status: &'static str,
    },

    #[error("Insufficient stock for product {product_id} in warehouse {warehouse_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: Uuid,
        warehouse_id: Uuid,
        available: i32,
        requested: i32,
    },

    #[error("Cannot receive {requested} of item {item_id}: ordered {ordered}, already received {already_received}")]
    OverReceipt {
        item_id: Uuid,
        ordered: i32,
        already_received: i32,
        requested: i32,
    },

    #[error("Payment of {amount} exceeds balance due {balance_due}")]
    OverPayment { balance_due: Decimal, amount: Decimal },

    #[error("Refund of {refund} exceeds payment amount {amount}")]
    OverRefund { amount: Decimal, refund: Decimal },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation error on {field}: {message}")]
    Validation { field: String, message: String },

    #[error("{0}")]
    IllegalState(String),
}

impl DomainError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        DomainError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn transition(entity: &'static str, from: impl ToString, to: impl ToString) -> Self {
        DomainError::InvalidStatusTransition {
            entity,
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
