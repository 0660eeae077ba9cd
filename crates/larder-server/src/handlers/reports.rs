//! Report, dashboard and health handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{AppError, AppState};
use larder_core::ai::AIBackend;
use larder_core::models::{DashboardStats, MonthlySummary, PriceHistory};
use larder_core::reports;

/// Query parameters for the monthly report
#[derive(Debug, Deserialize)]
pub struct MonthlyQuery {
    /// YYYY-MM; all months when absent
    pub month: Option<String>,
    /// Number of top products per month
    pub top: Option<usize>,
}

/// Query parameters for the price report
#[derive(Debug, Deserialize)]
pub struct PricesQuery {
    /// Product name (case-insensitive); all products when absent
    pub product: Option<String>,
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub vision_backend: Option<String>,
    pub vision_model: Option<String>,
}

/// GET /api/reports/monthly - Spending by month
pub async fn report_monthly(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MonthlyQuery>,
) -> Result<Json<Vec<MonthlySummary>>, AppError> {
    let top = params.top.unwrap_or(state.settings.ingest.top_products);
    let receipts = state.db.list_receipts(None)?;

    let summaries = match params.month {
        Some(month) => {
            // Validate by parsing the first day of the month
            NaiveDate::parse_from_str(&format!("{}-01", month), "%Y-%m-%d")
                .map_err(|_| AppError::bad_request("Invalid month format (use YYYY-MM)"))?;
            reports::monthly_summary(&receipts, &month, top)
                .into_iter()
                .collect()
        }
        None => reports::monthly_summaries(&receipts, top),
    };

    Ok(Json(summaries))
}

/// GET /api/reports/prices - Price history per product
pub async fn report_prices(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PricesQuery>,
) -> Result<Json<Vec<PriceHistory>>, AppError> {
    let receipts = state.db.list_receipts(None)?;

    let histories = match params.product {
        Some(name) => {
            let product = state
                .db
                .find_product(&name)?
                .ok_or_else(|| AppError::not_found(&format!("Product '{}' not found", name)))?;
            reports::price_history(&receipts, product.id)
                .into_iter()
                .collect()
        }
        None => reports::price_histories(&receipts),
    };

    Ok(Json(histories))
}

/// GET /api/dashboard - Headline statistics
pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DashboardStats>, AppError> {
    Ok(Json(state.db.dashboard_stats()?))
}

/// GET /api/health - Liveness and configured vision backend
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        vision_backend: state.ai.as_ref().map(|ai| ai.backend_name().to_string()),
        vision_model: state.ai.as_ref().map(|ai| ai.model().to_string()),
    })
}
