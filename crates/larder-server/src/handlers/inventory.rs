//! Inventory ledger handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{AppError, AppState, SuccessResponse};
use larder_core::models::{ConsumeOutcome, InventoryLot, InventoryStats};

/// Request body for adding stock by hand
#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub name: String,
    pub price: f64,
    #[serde(default = "default_quantity")]
    pub quantity: f64,
}

fn default_quantity() -> f64 {
    1.0
}

/// Request body for consume and restock
#[derive(Debug, Deserialize)]
pub struct QuantityRequest {
    pub quantity: f64,
}

/// Request body for renaming a lot
#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub display_name: String,
}

/// Response for a rebuild
#[derive(Debug, Serialize)]
pub struct RebuildResponse {
    pub lots: usize,
}

/// GET /api/inventory - List all lots
pub async fn list_inventory(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<InventoryLot>>, AppError> {
    Ok(Json(state.db.list_lots()?))
}

/// GET /api/inventory/:id - Get one lot
pub async fn get_inventory_lot(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<InventoryLot>, AppError> {
    let lot = state
        .db
        .get_lot(id)?
        .ok_or_else(|| AppError::not_found(&format!("Inventory lot {} not found", id)))?;
    Ok(Json(lot))
}

/// POST /api/inventory - Add stock outside any receipt
pub async fn add_inventory_item(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AddItemRequest>,
) -> Result<Json<InventoryLot>, AppError> {
    let lot = state
        .db
        .add_manual_item(&req.name, req.price, req.quantity)?;
    Ok(Json(lot))
}

/// POST /api/inventory/:id/consume - Use up units at average cost
pub async fn consume_inventory(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<QuantityRequest>,
) -> Result<Json<ConsumeOutcome>, AppError> {
    Ok(Json(state.db.consume_lot(id, req.quantity)?))
}

/// POST /api/inventory/:id/restock - Add units at the last price
pub async fn restock_inventory(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<QuantityRequest>,
) -> Result<Json<InventoryLot>, AppError> {
    Ok(Json(state.db.restock_lot(id, req.quantity)?))
}

/// PATCH /api/inventory/:id - Rename a lot
pub async fn rename_inventory_lot(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<RenameRequest>,
) -> Result<Json<InventoryLot>, AppError> {
    Ok(Json(state.db.rename_lot(id, &req.display_name)?))
}

/// DELETE /api/inventory/:id - Remove a lot
pub async fn delete_inventory_lot(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.db.delete_lot(id)?;
    info!(lot_id = id, "Inventory lot deleted");
    Ok(Json(SuccessResponse { success: true }))
}

/// POST /api/inventory/rebuild - Replay receipts into an empty ledger
pub async fn rebuild_inventory(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RebuildResponse>, AppError> {
    let lots = state.db.rebuild_inventory()?;
    Ok(Json(RebuildResponse { lots }))
}

/// GET /api/inventory/stats - Ledger totals
pub async fn get_inventory_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<InventoryStats>, AppError> {
    Ok(Json(state.db.inventory_stats()?))
}
