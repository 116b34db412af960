//! HTTP handlers for purchase orders

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use shared::PurchaseOrder;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::purchase_order::{
    CreatePurchaseOrderInput, PurchaseOrderService, ReasonInput, ReceivePurchaseOrderInput,
    UpdatePurchaseOrderInput,
};
use crate::AppState;

fn service(state: &AppState) -> PurchaseOrderService {
    PurchaseOrderService::new(state.store.clone(), &state.config.workflow)
}

/// Create a draft purchase order
pub async fn create_purchase_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreatePurchaseOrderInput>,
) -> AppResult<(StatusCode, Json<PurchaseOrder>)> {
    let order = service(&state).create(current_user.0.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn get_purchase_order(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<PurchaseOrder>> {
    Ok(Json(service(&state).get(id).await?))
}

pub async fn update_purchase_order(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdatePurchaseOrderInput>,
) -> AppResult<Json<PurchaseOrder>> {
    Ok(Json(service(&state).update(id, input).await?))
}

pub async fn delete_purchase_order(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    service(&state).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn submit_purchase_order(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<PurchaseOrder>> {
    Ok(Json(service(&state).submit(id).await?))
}

pub async fn approve_purchase_order(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<PurchaseOrder>> {
    Ok(Json(service(&state).approve(id).await?))
}

pub async fn reject_purchase_order(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<ReasonInput>,
) -> AppResult<Json<PurchaseOrder>> {
    Ok(Json(service(&state).reject(id, input).await?))
}

pub async fn cancel_purchase_order(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<ReasonInput>,
) -> AppResult<Json<PurchaseOrder>> {
    Ok(Json(service(&state).cancel(id, input).await?))
}

/// Receive delivered goods into stock
pub async fn receive_purchase_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<ReceivePurchaseOrderInput>,
) -> AppResult<Json<PurchaseOrder>> {
    let order = service(&state)
        .receive(id, current_user.0.user_id, input)
        .await?;
    Ok(Json(order))
}
