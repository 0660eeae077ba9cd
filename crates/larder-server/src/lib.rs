//! Larder Web Server
//!
//! Axum-based REST API for the Larder grocery receipt tracker.
//!
//! Security features:
//! - Restrictive CORS policy
//! - Input validation (upload size limits, quantity checks)
//! - Security headers (CSP, nosniff, frame denial)
//! - Sanitized error responses
//!
//! Authentication is expected to be handled in front of the server
//! (reverse proxy or access gateway).

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{
    cors::CorsLayer, services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};
use tracing::{error, info, warn};

use larder_core::ai::{AIBackend, AIClient};
use larder_core::db::Database;
use larder_core::{ErrorKind, LarderConfig};

mod handlers;

/// Maximum receipt image upload size (10 MB)
pub const MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Maximum number of receipts returned by one listing
pub const MAX_PAGE_LIMIT: i64 = 1000;

/// Server configuration
#[derive(Clone, Default)]
pub struct ServerConfig {
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    /// Ingest and report settings
    pub settings: LarderConfig,
    pub config: ServerConfig,
    /// Vision backend for receipt scanning (None when not configured)
    pub ai: Option<AIClient>,
}

/// Success response
#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Create the application router
pub fn create_router(
    db: Database,
    settings: LarderConfig,
    static_dir: Option<&str>,
    config: ServerConfig,
) -> Router {
    let ai = AIClient::from_config(&settings.extraction);
    match ai {
        Some(ref client) => info!(
            "Vision backend configured: {} at {} (model: {})",
            client.backend_name(),
            client.host(),
            client.model()
        ),
        None => info!("ℹ️  Vision backend not configured (set OLLAMA_HOST to enable scanning)"),
    }

    create_router_with_ai(db, settings, static_dir, config, ai)
}

/// Create the application router with an explicit vision backend (for testing)
pub fn create_router_with_ai(
    db: Database,
    settings: LarderConfig,
    static_dir: Option<&str>,
    config: ServerConfig,
    ai: Option<AIClient>,
) -> Router {
    let state = Arc::new(AppState {
        db,
        settings,
        config: config.clone(),
        ai,
    });

    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        // Dashboard
        .route("/dashboard", get(handlers::get_dashboard))
        // Receipts
        .route(
            "/receipts",
            get(handlers::list_receipts).post(handlers::ingest_receipt),
        )
        .route(
            "/receipts/scan",
            post(handlers::scan_receipt).layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE)),
        )
        .route("/receipts/:id", get(handlers::get_receipt))
        // Inventory
        .route(
            "/inventory",
            get(handlers::list_inventory).post(handlers::add_inventory_item),
        )
        .route("/inventory/stats", get(handlers::get_inventory_stats))
        .route("/inventory/rebuild", post(handlers::rebuild_inventory))
        .route(
            "/inventory/:id",
            get(handlers::get_inventory_lot)
                .patch(handlers::rename_inventory_lot)
                .delete(handlers::delete_inventory_lot),
        )
        .route("/inventory/:id/consume", post(handlers::consume_inventory))
        .route("/inventory/:id/restock", post(handlers::restock_inventory))
        // Reports
        .route("/reports/monthly", get(handlers::report_monthly))
        .route("/reports/prices", get(handlers::report_prices));

    // Build CORS layer
    let cors = if config.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    };

    // CSP: restrict scripts to same-origin, allow inline styles, allow blob: for receipt previews
    let csp_value = HeaderValue::from_static(
        "default-src 'self'; script-src 'self'; style-src 'self' 'unsafe-inline'; img-src 'self' blob: data:; font-src 'self'; connect-src 'self'; frame-ancestors 'none'"
    );

    let mut app = Router::new()
        .nest("/api", api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_XSS_PROTECTION,
            HeaderValue::from_static("1; mode=block"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            csp_value,
        ));

    // Serve static files if directory provided
    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app
}

/// Start the server
pub async fn serve(
    db: Database,
    settings: LarderConfig,
    host: &str,
    port: u16,
    static_dir: Option<&str>,
    config: ServerConfig,
) -> anyhow::Result<()> {
    check_ai_connection(&settings).await;

    let app = create_router(db, settings, static_dir, config);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Check and log vision backend connection status
async fn check_ai_connection(settings: &LarderConfig) {
    match AIClient::from_config(&settings.extraction) {
        Some(client) => {
            if client.health_check().await {
                info!(
                    "✅ Vision backend connected: {} (model: {})",
                    client.host(),
                    client.model()
                );
            } else {
                warn!(
                    "⚠️  Vision backend configured but not responding: {} (model: {})",
                    client.host(),
                    client.model()
                );
            }
        }
        None => {
            info!("ℹ️  Vision backend not configured (set OLLAMA_HOST to enable scanning)");
        }
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn internal(msg: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn conflict(msg: &str) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn unavailable(msg: &str) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();

        // Core errors the client can act on are reported verbatim
        let status = match err.downcast_ref::<larder_core::Error>().map(|e| e.kind()) {
            Some(ErrorKind::Extraction) => Some(StatusCode::BAD_GATEWAY),
            Some(ErrorKind::Validation) => Some(StatusCode::UNPROCESSABLE_ENTITY),
            Some(ErrorKind::NotFound) => Some(StatusCode::NOT_FOUND),
            Some(ErrorKind::Conflict) => Some(StatusCode::CONFLICT),
            Some(ErrorKind::Config) => Some(StatusCode::INTERNAL_SERVER_ERROR),
            Some(ErrorKind::Persistence) | None => None,
        };

        match status {
            Some(status) => Self {
                status,
                message: err.to_string(),
                internal: None,
            },
            None => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                // Return generic message to client
                message: "An internal error occurred".to_string(),
                // Keep full error for logging
                internal: Some(err),
            },
        }
    }
}
