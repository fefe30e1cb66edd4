//! HTTP server: routing, authorization and the OCR request handler.

use crate::config::{load_components, ServerConfig};
use crate::coordinator::{RequestCoordinator, DEFAULT_REQUEST_TIMEOUT};
use crate::errors::ApiError;
use crate::files::{build_http_client, decode_image, fetch_input, save_visualization};
use crate::ocr::{OcrRequest, OcrResponse, OcrResultEntry, FILE_TYPE_PDF};
use crate::pdf::PdfRenderer;
use axon_ocr::pipeline::{AsyncScheduler, SchedulerConfig, TaskResult};
use axon_ocr::utils::draw_ocr_results;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::{self, Next};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared application state.
pub struct AppState {
    coordinator: Arc<RequestCoordinator>,
    pdf: PdfRenderer,
    http_client: reqwest::Client,
    vis_dir: PathBuf,
    vis_url_prefix: &'static str,
    request_timeout: Duration,
}

/// Initializes the pipeline and serves until interrupted.
pub async fn run_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("initializing OCR pipeline...");
    let components = Arc::new(load_components(&config.ocr)?);
    let scheduler = Arc::new(AsyncScheduler::start(components, SchedulerConfig::default()));
    let coordinator = RequestCoordinator::new(scheduler);
    info!("OCR pipeline initialized");

    std::fs::create_dir_all(&config.vis_dir)?;

    let state = Arc::new(AppState {
        coordinator: coordinator.clone(),
        pdf: PdfRenderer::new()?,
        http_client: build_http_client(config.no_verify_ssl)?,
        vis_dir: config.vis_dir.clone(),
        vis_url_prefix: "/static/vis",
        request_timeout: DEFAULT_REQUEST_TIMEOUT,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let protected = Router::new()
        .route("/ocr", post(ocr_handler))
        .layer(middleware::from_fn(require_token));

    let app = Router::new()
        .route("/health", get(health_handler))
        .merge(protected)
        .nest_service("/static/vis", ServeDir::new(&config.vis_dir))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| format!("invalid bind address: {e}"))?;

    info!("server listening on http://{addr}");
    info!("endpoints:");
    info!("  POST /ocr           - OCR recognition");
    info!("  GET  /health        - health check");
    info!("  GET  /static/vis/*  - visualization images");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    coordinator.shutdown();
    info!("server shutdown complete");
    Ok(())
}

/// Requires `Authorization: token <value>`; anything else is 401.
async fn require_token(request: Request<axum::body::Body>, next: Next) -> axum::response::Response {
    let authorized = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with("token ") && value.len() > "token ".len())
        .unwrap_or(false);

    if !authorized {
        return ApiError::Unauthorized("Missing or invalid Authorization token".to_string())
            .into_response();
    }
    next.run(request).await
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "axon-ocr-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn ocr_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<OcrRequest>,
) -> Result<Json<OcrResponse>, ApiError> {
    let started = Instant::now();
    let file = request.validate()?.to_string();
    let config = request.task_config();

    let bytes = fetch_input(&file, &state.http_client).await?;
    info!(
        bytes = bytes.len(),
        file_type = request.file_type,
        "input loaded"
    );

    let images: Vec<image::RgbImage> = if request.file_type == FILE_TYPE_PDF {
        state
            .pdf
            .render(bytes, request.pdf_options())
            .await?
            .into_iter()
            .map(|page| page.image)
            .collect()
    } else {
        vec![decode_image(&bytes)?]
    };

    // Submit every page before waiting so the scheduler pipelines them, then
    // gather results in page order under one shared deadline.
    let coordinator = state.coordinator.clone();
    let timeout = state.request_timeout;
    let results: Vec<TaskResult> = tokio::task::spawn_blocking(move || {
        let mut ids = Vec::with_capacity(images.len());
        for image in images {
            ids.push(coordinator.submit(image, config)?);
        }
        let deadline = Instant::now() + timeout;
        ids.into_iter()
            .map(|id| coordinator.wait_for(id, deadline))
            .collect::<Result<Vec<_>, ApiError>>()
    })
    .await
    .map_err(|e| ApiError::Internal(format!("request worker join error: {e}")))??;

    let mut ocr_results = Vec::with_capacity(results.len());
    for result in &results {
        if let Some(failure) = &result.failure {
            error!(task_id = result.id, stage = failure.stage, "task failed");
            return Err(ApiError::TaskFailed {
                stage: failure.stage.to_string(),
                message: failure.message.clone(),
            });
        }

        let visualization_url = if request.visualize {
            let rendered = draw_ocr_results(&result.processed_image, &result.entries);
            save_visualization(&rendered, &state.vis_dir)
                .map(|filename| format!("{}/{}", state.vis_url_prefix, filename))
        } else {
            None
        };
        ocr_results.push(OcrResultEntry::from_entries(&result.entries, visualization_url));
    }

    info!(
        pages = ocr_results.len(),
        total_ms = started.elapsed().as_secs_f64() * 1000.0,
        "OCR request complete"
    );
    Ok(Json(OcrResponse::success(ocr_results)))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            error!("failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, starting graceful shutdown"),
        _ = terminate => info!("received SIGTERM, starting graceful shutdown"),
    }
}
