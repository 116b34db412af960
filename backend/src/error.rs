//! Error handling for the warehouse backend
//!
//! Every workflow failure maps to one variant here and renders as a JSON body
//! carrying a stable code plus the ids and quantities involved.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use shared::DomainError;
use thiserror::Error;
use uuid::Uuid;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid token")]
    InvalidToken,

    // Validation errors
    #[error("Validation error on {field}: {message}")]
    Validation { field: String, message: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    // Workflow errors
    #[error("{entity} cannot move from {from} to {to}")]
    InvalidOrderStatusTransition {
        entity: String,
        from: String,
        to: String,
    },

    #[error("{entity} is not editable in status {status}")]
    OrderNotEditable { entity: String, status: String },

    #[error("Insufficient stock for product {product_id} in warehouse {warehouse_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: Uuid,
        warehouse_id: Uuid,
        available: i32,
        requested: i32,
    },

    #[error("Over-receipt on item {item_id}: ordered {ordered}, already received {already_received}, requested {requested}")]
    OverReceipt {
        item_id: Uuid,
        ordered: i32,
        already_received: i32,
        requested: i32,
    },

    #[error("Payment {amount} exceeds balance due {balance_due}")]
    OverPayment { balance_due: Decimal, amount: Decimal },

    #[error("Refund {refund} exceeds payment amount {amount}")]
    OverRefund { amount: Decimal, refund: Decimal },

    #[error("An invoice already exists for sales order {sales_order_id}")]
    DuplicateInvoice { sales_order_id: Uuid },

    #[error("Duplicate {resource}: {value}")]
    DuplicateResource { resource: String, value: String },

    #[error("Concurrent modification of {entity} {id}")]
    ConcurrentModification { entity: String, id: String },

    #[error("Illegal state: {0}")]
    IllegalState(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        AppError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn conflict(entity: &str, id: impl ToString) -> Self {
        AppError::ConcurrentModification {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    /// Only optimistic version conflicts are safe to retry as a whole
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::ConcurrentModification { .. })
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InvalidStatusTransition { entity, from, to } => {
                AppError::InvalidOrderStatusTransition {
                    entity: entity.to_string(),
                    from,
                    to,
                }
            }
            DomainError::NotEditable { entity, status, .. } => AppError::OrderNotEditable {
                entity: entity.to_string(),
                status,
            },
            DomainError::InsufficientStock {
                product_id,
                warehouse_id,
                available,
                requested,
            } => AppError::InsufficientStock {
                product_id,
                warehouse_id,
                available,
                requested,
            },
            DomainError::OverReceipt {
                item_id,
                ordered,
                already_received,
                requested,
            } => AppError::OverReceipt {
                item_id,
                ordered,
                already_received,
                requested,
            },
            DomainError::OverPayment { balance_due, amount } => {
                AppError::OverPayment { balance_due, amount }
            }
            DomainError::OverRefund { amount, refund } => AppError::OverRefund { amount, refund },
            DomainError::NotFound { entity, id } => AppError::NotFound {
                entity: entity.to_string(),
                id,
            },
            DomainError::Validation { field, message } => AppError::Validation { field, message },
            DomainError::IllegalState(msg) => AppError::IllegalState(msg),
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorDetail {
    fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            field: None,
            details: None,
        }
    }

    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl AppError {
    fn status_and_detail(&self) -> (StatusCode, ErrorDetail) {
        let message = self.to_string();
        match self {
            AppError::Unauthorized(_) => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("UNAUTHORIZED", message),
            ),
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("INVALID_TOKEN", message),
            ),
            AppError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    field: Some(field.clone()),
                    ..ErrorDetail::new("VALIDATION_ERROR", message.clone())
                },
            ),
            AppError::NotFound { entity, id } => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new("NOT_FOUND", message)
                    .with_details(json!({ "entity": entity, "id": id })),
            ),
            AppError::InvalidOrderStatusTransition { entity, from, to } => (
                StatusCode::CONFLICT,
                ErrorDetail::new("INVALID_STATUS_TRANSITION", message)
                    .with_details(json!({ "entity": entity, "from": from, "to": to })),
            ),
            AppError::OrderNotEditable { entity, status } => (
                StatusCode::CONFLICT,
                ErrorDetail::new("ORDER_NOT_EDITABLE", message)
                    .with_details(json!({ "entity": entity, "status": status })),
            ),
            AppError::InsufficientStock {
                product_id,
                warehouse_id,
                available,
                requested,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::new("INSUFFICIENT_STOCK", message).with_details(json!({
                    "product_id": product_id,
                    "warehouse_id": warehouse_id,
                    "available": available,
                    "requested": requested,
                })),
            ),
            AppError::OverReceipt {
                item_id,
                ordered,
                already_received,
                requested,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::new("OVER_RECEIPT", message).with_details(json!({
                    "item_id": item_id,
                    "ordered": ordered,
                    "already_received": already_received,
                    "requested": requested,
                })),
            ),
            AppError::OverPayment { balance_due, amount } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::new("OVER_PAYMENT", message)
                    .with_details(json!({ "balance_due": balance_due, "amount": amount })),
            ),
            AppError::OverRefund { amount, refund } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::new("OVER_REFUND", message)
                    .with_details(json!({ "amount": amount, "refund": refund })),
            ),
            AppError::DuplicateInvoice { sales_order_id } => (
                StatusCode::CONFLICT,
                ErrorDetail::new("DUPLICATE_INVOICE", message)
                    .with_details(json!({ "sales_order_id": sales_order_id })),
            ),
            AppError::DuplicateResource { resource, .. } => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    field: Some(resource.clone()),
                    ..ErrorDetail::new("DUPLICATE_RESOURCE", message)
                },
            ),
            AppError::ConcurrentModification { entity, id } => (
                StatusCode::CONFLICT,
                ErrorDetail::new("CONCURRENT_MODIFICATION", message)
                    .with_details(json!({ "entity": entity, "id": id, "retryable": true })),
            ),
            AppError::IllegalState(_) => (
                StatusCode::CONFLICT,
                ErrorDetail::new("ILLEGAL_STATE", message),
            ),
            AppError::Configuration(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("CONFIGURATION_ERROR", message),
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("DATABASE_ERROR", "A database error occurred"),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INTERNAL_ERROR", msg.clone()),
            ),
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INTERNAL_ERROR", "An internal server error occurred"),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = self.status_and_detail();

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for services and handlers
pub type AppResult<T> = Result<T, AppError>;
