//! HTTP handlers for shipments

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use shared::Shipment;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::shipment::{
    CreateShipmentInput, DeliverShipmentInput, ShipmentService, UpdateShipmentStatusInput,
};
use crate::AppState;

fn service(state: &AppState) -> ShipmentService {
    ShipmentService::new(state.store.clone(), &state.config.workflow)
}

/// Ship a fulfilled sales order
pub async fn create_shipment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateShipmentInput>,
) -> AppResult<(StatusCode, Json<Shipment>)> {
    let shipment = service(&state).create(current_user.0.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(shipment)))
}

pub async fn get_shipment(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Shipment>> {
    Ok(Json(service(&state).get(id).await?))
}

pub async fn get_sales_order_shipments(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(sales_order_id): Path<Uuid>,
) -> AppResult<Json<Vec<Shipment>>> {
    Ok(Json(service(&state).for_sales_order(sales_order_id).await?))
}

pub async fn update_shipment_status(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateShipmentStatusInput>,
) -> AppResult<Json<Shipment>> {
    Ok(Json(service(&state).update_status(id, input).await?))
}

/// Deliver a shipment and its sales order
pub async fn deliver_shipment(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(id): Path<Uuid>,
    input: Option<Json<DeliverShipmentInput>>,
) -> AppResult<Json<Shipment>> {
    let input = input.map(|Json(i)| i).unwrap_or_default();
    Ok(Json(service(&state).deliver(id, input).await?))
}
