//! HTTP front-end exposing the single-test and auto-discovery operations.

use crate::core::config::Config;
use crate::core::error::{AppError, Result};
use crate::service::api::{
    handle_auto_discovery, handle_single_test, AutoDiscoveryRequest, SingleTestRequest,
    SingleTestResponse, VersionInfo,
};
use crate::verification::discovery::Discovery;
use crate::verification::verifier::Verifier;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;

/// Shared state of the HTTP handlers.
#[derive(Debug)]
pub struct AppState<V> {
    pub config: Config,
    pub verifier: V,
    pub discovery: Discovery<V>,
    pub version: VersionInfo,
}

impl<V: Verifier + Clone + Sync> AppState<V> {
    pub fn new(config: Config, verifier: V) -> Self {
        Self {
            discovery: Discovery::new(verifier.clone()),
            verifier,
            config,
            version: VersionInfo::detect(),
        }
    }
}

fn rejected(err: AppError) -> Response {
    tracing::warn!(target: "api", "Rejected request: {}", err);
    (StatusCode::BAD_REQUEST, Json(SingleTestResponse::invalid(&err))).into_response()
}

fn body_error(rejection: JsonRejection) -> Response {
    rejected(AppError::Validation(rejection.body_text()))
}

async fn test_smtp<V>(
    State(state): State<Arc<AppState<V>>>,
    payload: std::result::Result<Json<SingleTestRequest>, JsonRejection>,
) -> Response
where
    V: Verifier + Send + Sync + 'static,
{
    let Json(request) = match payload {
        Ok(body) => body,
        Err(rejection) => return body_error(rejection),
    };
    match handle_single_test(&state.verifier, &state.config, request).await {
        Ok(response) if response.success => (StatusCode::OK, Json(response)).into_response(),
        Ok(response) => (StatusCode::INTERNAL_SERVER_ERROR, Json(response)).into_response(),
        Err(err) => rejected(err),
    }
}

async fn auto_test_smtp<V>(
    State(state): State<Arc<AppState<V>>>,
    payload: std::result::Result<Json<AutoDiscoveryRequest>, JsonRejection>,
) -> Response
where
    V: Verifier + Send + Sync + 'static,
{
    let Json(request) = match payload {
        Ok(body) => body,
        Err(rejection) => return body_error(rejection),
    };
    match handle_auto_discovery(&state.discovery, request, None, |_, _| {}).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => rejected(err),
    }
}

async fn version<V>(State(state): State<Arc<AppState<V>>>) -> Json<VersionInfo>
where
    V: Send + Sync + 'static,
{
    Json(state.version.clone())
}

/// Builds the router. Generic over the verifier so it can be exercised
/// without a real mail server.
pub fn router<V>(state: Arc<AppState<V>>) -> Router
where
    V: Verifier + Send + Sync + 'static,
{
    Router::new()
        .route("/api/version", get(version::<V>))
        .route("/api/test-smtp", post(test_smtp::<V>))
        .route("/api/auto-test-smtp", post(auto_test_smtp::<V>))
        .with_state(state)
}

/// Binds the configured address and serves until the process is stopped.
pub async fn serve<V>(state: Arc<AppState<V>>) -> Result<()>
where
    V: Verifier + Send + Sync + 'static,
{
    let addr = format!("{}:{}", state.config.bind_address, state.config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Initialization(format!("Failed to bind {}: {}", addr, e)))?;
    tracing::info!("Server running at http://{}", addr);

    axum::serve(listener, router(state))
        .await
        .map_err(|e| AppError::Server(e.to_string()))
}
