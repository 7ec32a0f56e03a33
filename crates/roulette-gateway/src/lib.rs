//! # roulette-gateway
//!
//! The transport boundary: accepts WebSocket connections, frames events as
//! UTF-8 JSON, and bridges them to the matching engine. Also serves the
//! orchestration health probe and a small diagnostics endpoint.
//!
//! Only the configured origin may complete the WebSocket handshake; every
//! HTTP response carries no-cache directives.

pub mod connection;

use std::sync::Arc;

use axum::{
    extract::{State, WebSocketUpgrade},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use roulette_common::{Error, Result};
use roulette_core::{Matchmaker, Stats};

/// Shared state for the HTTP and WebSocket handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub engine: Arc<Matchmaker>,
    /// The single origin allowed to open connections.
    allowed_origin: HeaderValue,
}

impl GatewayState {
    pub fn new(engine: Arc<Matchmaker>, allowed_origin: &str) -> Result<Self> {
        let allowed_origin =
            HeaderValue::from_str(allowed_origin).map_err(|_| Error::InvalidOrigin {
                origin: allowed_origin.to_string(),
            })?;
        Ok(Self {
            engine,
            allowed_origin,
        })
    }
}

/// Build the complete router: health probe, diagnostics, WebSocket upgrade.
pub fn build_router(state: GatewayState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(state.allowed_origin.clone())
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(health))
        .route("/stats", get(stats))
        .route("/ws", get(ws_handler))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store, no-cache, must-revalidate"),
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Liveness probe for orchestration. No auth, plain body.
async fn health() -> &'static str {
    "alive"
}

/// Point-in-time engine counters.
async fn stats(State(state): State<Arc<GatewayState>>) -> Json<Stats> {
    Json(state.engine.stats())
}

/// WebSocket upgrade. Handshakes from a foreign origin are rejected before
/// the upgrade; non-browser clients without an Origin header pass.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
) -> Response {
    if let Some(origin) = headers.get(header::ORIGIN) {
        if origin != &state.allowed_origin {
            tracing::warn!(origin = ?origin, "websocket handshake from foreign origin rejected");
            return StatusCode::FORBIDDEN.into_response();
        }
    }
    ws.on_upgrade(move |socket| connection::run(socket, state))
}
