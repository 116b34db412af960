//! HTTP handlers for sales orders

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use shared::SalesOrder;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::sales_order::{
    CancelSalesOrderInput, CreateSalesOrderInput, SalesOrderService, UpdateSalesOrderInput,
};
use crate::AppState;

fn service(state: &AppState) -> SalesOrderService {
    SalesOrderService::new(state.store.clone(), &state.config.workflow)
}

pub async fn create_sales_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateSalesOrderInput>,
) -> AppResult<(StatusCode, Json<SalesOrder>)> {
    let order = service(&state).create(current_user.0.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn get_sales_order(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SalesOrder>> {
    Ok(Json(service(&state).get(id).await?))
}

pub async fn update_sales_order(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateSalesOrderInput>,
) -> AppResult<Json<SalesOrder>> {
    Ok(Json(service(&state).update(id, input).await?))
}

/// Confirm after an availability check
pub async fn confirm_sales_order(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SalesOrder>> {
    Ok(Json(service(&state).confirm(id).await?))
}

/// Deduct stock for the order
pub async fn fulfill_sales_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SalesOrder>> {
    let order = service(&state).fulfill(id, current_user.0.user_id).await?;
    Ok(Json(order))
}

pub async fn ship_sales_order(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SalesOrder>> {
    Ok(Json(service(&state).ship(id).await?))
}

pub async fn deliver_sales_order(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SalesOrder>> {
    Ok(Json(service(&state).deliver(id).await?))
}

pub async fn cancel_sales_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<CancelSalesOrderInput>,
) -> AppResult<Json<SalesOrder>> {
    let order = service(&state)
        .cancel(id, current_user.0.user_id, input)
        .await?;
    Ok(Json(order))
}
