//! HTTP handlers for payments

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use shared::Payment;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::payment::{
    PaymentService, RecordPaymentInput, RefundPaymentInput, UpdatePaymentStatusInput,
};
use crate::AppState;

fn service(state: &AppState) -> PaymentService {
    PaymentService::new(state.store.clone(), &state.config.workflow)
}

pub async fn record_payment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<RecordPaymentInput>,
) -> AppResult<(StatusCode, Json<Payment>)> {
    let payment = service(&state).record(current_user.0.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

pub async fn get_payment(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Payment>> {
    Ok(Json(service(&state).get(id).await?))
}

pub async fn update_payment_status(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdatePaymentStatusInput>,
) -> AppResult<Json<Payment>> {
    Ok(Json(service(&state).update_status(id, input).await?))
}

pub async fn refund_payment(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<RefundPaymentInput>,
) -> AppResult<Json<Payment>> {
    Ok(Json(service(&state).refund(id, input).await?))
}
