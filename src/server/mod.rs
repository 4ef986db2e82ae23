#![allow(clippy::result_large_err)] // Server setup returns AppError for consistent diagnostics.

//! HTTP and WebSocket gateway in front of [`PatchPipeline`].

mod ws;

use crate::core::config::ConfigSummary;
use crate::core::error::AppError;
use crate::core::logger::LogSink;
use crate::core::pipeline::{fields_from_json, Outcome, PatchPipeline};
use crate::core::types::ErrorCategory;
use axum::{
    extract::State,
    http::{header, Method},
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Map, Value};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeFile;
use tracing::info;

/// Upper bound for submission bodies; patches travel inline.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Listener settings resolved by the CLI.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub bind: String,
    pub port: u16,
    /// Directory holding `index.html`, served at `/` when set.
    pub frontend_dir: Option<PathBuf>,
}

pub(crate) struct ServerState {
    pub(crate) pipeline: PatchPipeline,
}

/// Start the listener and block until the service terminates.
pub async fn serve(pipeline: PatchPipeline, options: ServerOptions) -> Result<(), AppError> {
    serve_internal(pipeline, options, None).await
}

/// Start the listener and notify once the bind address is known (test helper).
pub async fn serve_with_ready_notifier(
    pipeline: PatchPipeline,
    options: ServerOptions,
    ready_notifier: oneshot::Sender<SocketAddr>,
) -> Result<(), AppError> {
    serve_internal(pipeline, options, Some(ready_notifier)).await
}

/// Build the router without binding; used by `serve` and by tests.
pub fn router(pipeline: PatchPipeline, frontend_dir: Option<PathBuf>) -> Result<Router, AppError> {
    let state = Arc::new(ServerState { pipeline });
    let mut router = Router::new()
        .route("/api/health", get(handle_health))
        .route("/api/config", get(handle_config))
        .route("/api/submit", post(handle_submit))
        .route("/ws", get(ws::handle_upgrade));

    router = match frontend_dir {
        Some(dir) => {
            let index = dir.join("index.html");
            if !index.is_file() {
                return Err(AppError::new(
                    ErrorCategory::ConfigError,
                    format!("Frontend root not found at {}", dir.display()),
                )
                .with_code("SRV-002"));
            }
            router
                .route_service("/", ServeFile::new(&index))
                .route_service("/index.html", ServeFile::new(&index))
        }
        None => router.route("/", get(handle_health)),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    // The body limit sits innermost; CORS headers must also reach 413 responses.
    Ok(router
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(cors))
}

async fn serve_internal(
    pipeline: PatchPipeline,
    options: ServerOptions,
    ready_notifier: Option<oneshot::Sender<SocketAddr>>,
) -> Result<(), AppError> {
    let router = router(pipeline, options.frontend_dir.clone())?;
    let bind_addr = format!("{}:{}", options.bind, options.port);
    let listener = TcpListener::bind(&bind_addr).await.map_err(|err| {
        AppError::new(
            ErrorCategory::IoError,
            format!("failed to bind listener {}: {}", bind_addr, err),
        )
        .with_code("SRV-001")
    })?;
    let local_addr = listener.local_addr().map_err(|err| {
        AppError::new(
            ErrorCategory::IoError,
            format!("failed to determine listener address: {}", err),
        )
    })?;
    if let Some(tx) = ready_notifier {
        let _ = tx.send(local_addr);
    }
    info!("patchrelay listening on {}", local_addr);
    axum::serve(listener, router.into_make_service())
        .await
        .map_err(|err| {
            AppError::new(
                ErrorCategory::IoError,
                format!("server terminated: {}", err),
            )
        })
}

async fn handle_health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn handle_config(State(state): State<Arc<ServerState>>) -> Json<ConfigSummary> {
    Json(state.pipeline.config().summary())
}

async fn handle_submit(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<Map<String, Value>>,
) -> Json<Outcome> {
    let fields = fields_from_json(&payload);
    let pipeline = state.pipeline.clone();
    // Detached so a dropped connection does not cancel the run.
    let run = tokio::spawn(async move {
        pipeline
            .process_submission(&fields, &LogSink::new())
            .await
    });
    match run.await {
        Ok(outcome) => Json(outcome),
        Err(err) => {
            tracing::error!("submission task failed: {}", err);
            Json(Outcome {
                success: false,
                log: vec![format!("ERROR: {}", err)],
                form_values: Default::default(),
            })
        }
    }
}
