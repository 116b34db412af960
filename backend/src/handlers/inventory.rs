//! HTTP handlers for stock levels, movement history and transfers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use shared::{InventoryRecord, MovementFilter, MovementRecord};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::inventory::{InventoryService, StockQuantity, TransferInput, TransferResult};
use crate::AppState;

fn service(state: &AppState) -> InventoryService {
    InventoryService::new(state.store.clone(), &state.config.workflow)
}

/// Quantity on hand for a product in a warehouse
pub async fn get_stock_quantity(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path((product_id, warehouse_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<StockQuantity>> {
    let quantity = service(&state).quantity(product_id, warehouse_id).await?;
    Ok(Json(quantity))
}

/// Stock of a product across warehouses
pub async fn get_stock_levels(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<Vec<InventoryRecord>>> {
    let levels = service(&state).stock_levels(product_id).await?;
    Ok(Json(levels))
}

/// Movement history matching the query filter
pub async fn list_movements(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(filter): Query<MovementFilter>,
) -> AppResult<Json<Vec<MovementRecord>>> {
    let movements = service(&state).movements(&filter).await?;
    Ok(Json(movements))
}

/// Transfer stock between warehouses
pub async fn transfer_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<TransferInput>,
) -> AppResult<Json<TransferResult>> {
    let result = service(&state)
        .transfer(current_user.0.user_id, input)
        .await?;
    Ok(Json(result))
}
