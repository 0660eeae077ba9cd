//! Receipt handlers

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap},
    Json,
};
use serde::Deserialize;

use crate::{AppError, AppState, MAX_PAGE_LIMIT};
use larder_core::ai::parsing::draft_from_value;
use larder_core::models::{IngestReport, ReceiptWithItems};
use larder_core::ReceiptIngestor;

/// Query parameters for listing receipts
#[derive(Debug, Deserialize)]
pub struct ListReceiptsQuery {
    pub limit: Option<i64>,
}

/// GET /api/receipts - List receipts with items, newest first
pub async fn list_receipts(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListReceiptsQuery>,
) -> Result<Json<Vec<ReceiptWithItems>>, AppError> {
    let limit = params.limit.unwrap_or(50).clamp(1, MAX_PAGE_LIMIT);
    let receipts = state.db.list_receipts(Some(limit))?;
    Ok(Json(receipts))
}

/// GET /api/receipts/:id - Get a single receipt with items
pub async fn get_receipt(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ReceiptWithItems>, AppError> {
    let receipt = state
        .db
        .get_receipt(id)?
        .ok_or_else(|| AppError::not_found(&format!("Receipt {} not found", id)))?;
    Ok(Json(receipt))
}

/// POST /api/receipts/scan - Extract and ingest a receipt image
///
/// The body is the raw image; `Content-Type` gives its MIME type.
pub async fn scan_receipt(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<IngestReport>, AppError> {
    let ai = state.ai.as_ref().ok_or_else(|| {
        AppError::unavailable("Vision backend not configured (set OLLAMA_HOST)")
    })?;

    let mime_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_lowercase())
        .unwrap_or_default();
    if !mime_type.starts_with("image/") {
        return Err(AppError::bad_request(
            "Content-Type must be an image type (e.g. image/jpeg)",
        ));
    }
    if body.is_empty() {
        return Err(AppError::bad_request("Empty image body"));
    }

    let report = ReceiptIngestor::with_config(&state.db, &state.settings)
        .scan(ai, &body, &mime_type)
        .await?;

    Ok(Json(report))
}

/// POST /api/receipts - Ingest an already-extracted receipt draft
///
/// Accepts the same loose shape the vision model produces.
pub async fn ingest_receipt(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<IngestReport>, AppError> {
    let draft = draft_from_value(&body).map_err(|e| AppError::bad_request(&e.to_string()))?;
    let report = ReceiptIngestor::with_config(&state.db, &state.settings).ingest(&draft)?;
    Ok(Json(report))
}
