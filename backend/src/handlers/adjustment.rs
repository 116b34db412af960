//! HTTP handlers for stock adjustments

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use shared::StockAdjustment;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::adjustment::{AdjustmentService, CreateAdjustmentInput, RejectAdjustmentInput};
use crate::AppState;

fn service(state: &AppState) -> AdjustmentService {
    AdjustmentService::new(state.store.clone(), &state.config.workflow)
}

/// Request a stock adjustment
pub async fn create_adjustment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateAdjustmentInput>,
) -> AppResult<(StatusCode, Json<StockAdjustment>)> {
    let adjustment = service(&state).create(current_user.0.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(adjustment)))
}

pub async fn get_adjustment(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<StockAdjustment>> {
    Ok(Json(service(&state).get(id).await?))
}

/// Approve and apply a pending adjustment
pub async fn approve_adjustment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<StockAdjustment>> {
    let adjustment = service(&state).approve(id, current_user.0.user_id).await?;
    Ok(Json(adjustment))
}

pub async fn reject_adjustment(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<RejectAdjustmentInput>,
) -> AppResult<Json<StockAdjustment>> {
    Ok(Json(service(&state).reject(id, input).await?))
}
