//! Qimen Web Server
//!
//! Axum-based REST API for the Qimen divination service.
//!
//! Security posture:
//! - Identity comes from the trusted `x-user-id` header set by the
//!   fronting proxy; requests without it are rejected, with no silent
//!   fallback identity
//! - Restrictive CORS policy
//! - Sanitized error responses: infrastructure failures never leak
//!   details to the client

use std::sync::Arc;

use axum::{
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::{
    cors::CorsLayer, services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};
use tracing::{error, info, warn};

use qimen_core::llm::LlmBackend;
use qimen_core::{
    Database, Error as CoreError, InquiryPipeline, LlmClient, PointsLedger, QimenChartProvider,
};

mod handlers;
mod sweeper;

pub use sweeper::{start_reservation_sweeper, SweeperConfig};

/// Trusted header carrying the authenticated user's id
const USER_ID_HEADER: &str = "x-user-id";

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![],
        }
    }
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub pipeline: InquiryPipeline,
    pub config: ServerConfig,
}

impl AppState {
    pub fn ledger(&self) -> &PointsLedger {
        self.pipeline.ledger()
    }
}

/// Resolve the caller's identity from the trusted header.
///
/// The id is opaque here; existence checks happen in the store so that a
/// forged id still fails with the same error an expired one would.
pub(crate) fn require_user_id(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .ok_or_else(|| AppError::unauthorized("Authentication required"))
}

/// Create the application router with the LLM client from the environment
pub fn create_router(db: Database, static_dir: Option<&str>, config: ServerConfig) -> Router {
    create_router_with_llm(db, static_dir, config, LlmClient::from_env())
}

/// Create the application router with an explicit LLM client (for testing)
pub fn create_router_with_llm(
    db: Database,
    static_dir: Option<&str>,
    config: ServerConfig,
    llm: LlmClient,
) -> Router {
    info!(
        "LLM backend: {} (model: {})",
        llm.host(),
        llm.model()
    );

    let ledger = PointsLedger::from_env(db.clone());
    let pipeline = InquiryPipeline::new(ledger, Arc::new(QimenChartProvider), llm);

    let state = Arc::new(AppState {
        db,
        pipeline,
        config: config.clone(),
    });

    let mut app = Router::new()
        // Auth
        .route("/auth/signup", post(handlers::signup))
        .route("/auth/login", post(handlers::login))
        // Points
        .route("/points", get(handlers::get_points))
        .route("/points/earn", post(handlers::earn_points))
        // Inquiries
        .route("/inquiry", post(handlers::inquiry))
        .route("/analysis/quantification", post(handlers::quantification))
        .route("/analysis/finance", post(handlers::finance))
        .route("/analysis/destiny", post(handlers::destiny))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(build_cors(&config))
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ));

    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app
}

fn build_cors(config: &ServerConfig) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::OPTIONS];
    let headers = [
        header::CONTENT_TYPE,
        header::HeaderName::from_static(USER_ID_HEADER),
    ];

    if config.allowed_origins.is_empty() {
        CorsLayer::new().allow_methods(methods).allow_headers(headers)
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(headers)
    }
}

/// Start the server
pub async fn serve(
    db: Database,
    host: &str,
    port: u16,
    static_dir: Option<&str>,
) -> anyhow::Result<()> {
    serve_with_config(db, host, port, static_dir, ServerConfig::default()).await
}

/// Start the server with custom configuration
pub async fn serve_with_config(
    db: Database,
    host: &str,
    port: u16,
    static_dir: Option<&str>,
    config: ServerConfig,
) -> anyhow::Result<()> {
    let ledger = PointsLedger::from_env(db.clone());
    let sweeper_config = SweeperConfig::from_env();

    // Reservations stranded by a previous crash are released before the
    // server accepts traffic.
    match ledger.release_expired(sweeper_config.ttl()) {
        Ok(count) if count > 0 => {
            warn!("Released {} stale reservation(s) from a previous run", count);
        }
        Ok(_) => {}
        Err(e) => {
            warn!("Startup reservation sweep failed: {}", e);
        }
    }

    check_llm_connection().await;

    start_reservation_sweeper(ledger, sweeper_config);

    let app = create_router(db, static_dir, config);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Check and log LLM backend connection status
async fn check_llm_connection() {
    let client = LlmClient::from_env();
    if client.health_check().await {
        info!(
            "LLM backend reachable: {} (model: {})",
            client.host(),
            client.model()
        );
    } else {
        warn!(
            "LLM backend not responding: {} (model: {}) - inquiries will fail and refund",
            client.host(),
            client.model()
        );
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

    pub fn unauthorized(msg: &str) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: msg.to_string(),
            internal: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        let (status, message) = match &err {
            CoreError::EmailTaken(_)
            | CoreError::AlreadySignedInToday
            | CoreError::InsufficientPoints { .. }
            | CoreError::InvalidData(_) => (StatusCode::BAD_REQUEST, err.to_string()),
            CoreError::InvalidCredentials => (StatusCode::UNAUTHORIZED, err.to_string()),
            CoreError::UserNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
            CoreError::InvalidReservation(_) => (StatusCode::CONFLICT, err.to_string()),
            CoreError::ProviderUnavailable(_) => (
                StatusCode::BAD_GATEWAY,
                "The divination model is unavailable; your points were not charged".to_string(),
            ),
            CoreError::ProviderTimeout(_) => (
                StatusCode::GATEWAY_TIMEOUT,
                "The divination model timed out; your points were not charged".to_string(),
            ),
            // Infrastructure failures are sanitized
            _ => {
                return Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: "An internal error occurred".to_string(),
                    internal: Some(err.into()),
                }
            }
        };

        Self {
            status,
            message,
            internal: None,
        }
    }
}
