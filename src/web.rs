use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio::signal;

use crate::semantic::{SearchError, SearchReport, SearchService};

#[derive(Clone)]
struct SharedState {
    service: Arc<SearchService>,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub min_results: Option<usize>,
    #[serde(default)]
    pub threshold: Option<f32>,
}

pub fn router(service: Arc<SearchService>) -> Router {
    let shared_state = Arc::new(SharedState { service });

    Router::new()
        .route("/api/search", post(search))
        .route("/api/health", get(health))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(shared_state)
}

async fn start_app(service: Arc<SearchService>, addr: &str) -> anyhow::Result<()> {
    async fn shutdown_signal() {
        if let Err(err) = signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
        log::warn!("shutting down");
    }

    let app = router(service);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("listening on {addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Serve the search API until Ctrl+C.
pub fn start_daemon(service: SearchService, addr: &str) -> anyhow::Result<()> {
    // Keep a handle outside the runtime: the blocking HTTP client inside the
    // vectorizer must not be dropped from async context.
    let service = Arc::new(service);

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(start_app(service.clone(), addr))
}

async fn search(
    State(state): State<Arc<SharedState>>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchReport>, HttpError> {
    let service = state.service.clone();
    let params = service
        .defaults()
        .with_overrides(request.limit, request.min_results, request.threshold);

    // Vectorization is a blocking network round trip
    let report = tokio::task::spawn_blocking(move || service.search(&request.query, Some(params)))
        .await??;

    Ok(Json(report))
}

async fn health(State(state): State<Arc<SharedState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "corpus_size": state.service.corpus_len(),
        "vectorizer": state.service.vectorizer_name(),
    }))
}

#[derive(Debug, thiserror::Error)]
enum HttpError {
    #[error(transparent)]
    Search(#[from] SearchError),

    #[error("search task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            HttpError::Search(SearchError::Unavailable(_)) => {
                log::error!("{self}");
                StatusCode::SERVICE_UNAVAILABLE
            }
            HttpError::Search(SearchError::EmptyQuery | SearchError::InvalidParams(_)) => {
                StatusCode::BAD_REQUEST
            }
            HttpError::Task(_) => {
                log::error!("{self:?}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({"error": self.to_string()}))).into_response()
    }
}
