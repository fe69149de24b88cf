//! `conduit serve`: HTTP query endpoint plus the static frontend.
//!
//! Routes:
//! - `POST /api/query` `{"query": "..."}` → `{"response": "..."}`
//! - anything else → files from the configured static directory, if present

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use conduit_agent::AgentLoop;
use conduit_core::config::Config;

use crate::build_agent_loop;

// ─────────────────────────────────────────────
// DTOs
// ─────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize)]
pub struct QueryRequest {
    pub query: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct QueryResponse {
    pub response: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

// ─────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    agent: Arc<AgentLoop>,
}

impl AppState {
    pub fn new(agent: AgentLoop) -> Self {
        Self {
            agent: Arc::new(agent),
        }
    }
}

/// Answer one query. Every request runs with fresh tool server connections.
///
/// Malformed bodies are answered with an `ErrorResponse` too, never axum's
/// plain-text rejection.
pub async fn query_handler(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "Rejecting malformed /api/query request");
        api_error(rejection.status(), rejection.body_text())
    })?;

    if request.query.trim().is_empty() {
        warn!("Rejecting /api/query request with empty query");
        return Err(api_error(StatusCode::BAD_REQUEST, "query cannot be empty"));
    }

    info!(chars = request.query.len(), "Received /api/query request");
    match state.agent.process_query(&request.query).await {
        Ok(outcome) => Ok(Json(QueryResponse {
            response: outcome.response_text(),
        })),
        Err(e) => {
            error!(error = %e, "Error processing query");
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to process query: {e}"),
            ))
        }
    }
}

/// Build the router. Static files are served only when `static_dir` exists.
pub fn router(state: AppState, static_dir: &Path) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut app = Router::new()
        .route("/api/query", post(query_handler))
        .with_state(state);

    if static_dir.is_dir() {
        info!(dir = %static_dir.display(), "Serving frontend");
        app = app.fallback_service(ServeDir::new(static_dir));
    } else {
        warn!(
            dir = %static_dir.display(),
            "Frontend directory not found, frontend will not be served"
        );
    }

    app.layer(cors).layer(TraceLayer::new_for_http())
}

/// Run the server until Ctrl+C.
pub async fn run(config: &Config) -> Result<()> {
    let agent = build_agent_loop(config)?;
    let addr: SocketAddr = format!("{}:{}", config.gateway.host, config.gateway.port)
        .parse()
        .with_context(|| {
            format!(
                "invalid bind address {}:{}",
                config.gateway.host, config.gateway.port
            )
        })?;

    let app = router(AppState::new(agent), Path::new(&config.gateway.static_dir));

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, servers = config.servers.len(), "Query server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("server error")
}
