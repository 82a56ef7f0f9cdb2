//! HTTP surface: `GET /prediction` and `GET /health`

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use engine::{PredictionRequest, PredictionResponse, Predictor, SignalError};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::APP_VERSION;

#[derive(Clone)]
pub struct AppState {
    pub predictor: Arc<Predictor>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(api_health))
        .route("/prediction", get(api_prediction))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

// ============================================================================
// Error mapping
// ============================================================================

/// Engine error rendered as `{"detail": ...}` with the matching status
#[derive(Debug)]
pub struct ApiError(pub SignalError);

impl From<SignalError> for ApiError {
    fn from(err: SignalError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            SignalError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "detail": self.0.to_string() }));
        (self.status(), body).into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn api_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "signal-desk",
        "version": APP_VERSION,
    }))
}

/// Raw query; validation happens in the engine so every rejection has a detail body
#[derive(Debug, Deserialize)]
struct PredictionQuery {
    symbol: Option<String>,
    market: Option<String>,
    timeframe: Option<String>,
}

async fn api_prediction(
    State(state): State<AppState>,
    Query(params): Query<PredictionQuery>,
) -> Result<Json<PredictionResponse>, ApiError> {
    let request = PredictionRequest::parse(
        params.symbol.as_deref(),
        params.market.as_deref(),
        params.timeframe.as_deref(),
    )?;
    let response = state.predictor.predict(&request).await?;
    Ok(Json(response))
}
