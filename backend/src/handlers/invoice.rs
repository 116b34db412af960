//! HTTP handlers for invoices

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use shared::Invoice;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::invoice::{
    GenerateInvoiceInput, InvoicePayment, InvoiceService, RecordInvoicePaymentInput,
    UpdateInvoiceStatusInput,
};
use crate::AppState;

fn service(state: &AppState) -> InvoiceService {
    InvoiceService::new(state.store.clone(), &state.config.workflow)
}

/// Generate the invoice of a sales order
pub async fn generate_invoice(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<GenerateInvoiceInput>,
) -> AppResult<(StatusCode, Json<Invoice>)> {
    let invoice = service(&state).generate(current_user.0.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Invoice>> {
    Ok(Json(service(&state).get(id).await?))
}

pub async fn get_sales_order_invoice(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(sales_order_id): Path<Uuid>,
) -> AppResult<Json<Invoice>> {
    Ok(Json(service(&state).for_sales_order(sales_order_id).await?))
}

pub async fn update_invoice_status(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateInvoiceStatusInput>,
) -> AppResult<Json<Invoice>> {
    Ok(Json(service(&state).update_status(id, input).await?))
}

pub async fn send_invoice(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Invoice>> {
    Ok(Json(service(&state).send(id).await?))
}

/// Record a payment against an invoice
pub async fn record_invoice_payment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<RecordInvoicePaymentInput>,
) -> AppResult<Json<InvoicePayment>> {
    let result = service(&state)
        .record_payment(id, current_user.0.user_id, input)
        .await?;
    Ok(Json(result))
}
