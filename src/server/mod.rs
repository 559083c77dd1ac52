use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Serialize;
use serde_json::json;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::config::{ConfigStore, Configuration, EndpointConfig};
use crate::error::{Result, RexecError};
use crate::jobs::{JobStatus, JobStore};
use crate::worker::CommandRunner;

pub mod request_id;

pub use request_id::RequestId;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ConfigStore>,
    pub jobs: Arc<RwLock<JobStore>>,
}

impl AppState {
    pub fn new(config_path: PathBuf, config: Configuration) -> Self {
        let max_jobs = config.max_jobs;
        Self {
            config: Arc::new(ConfigStore::new(config_path, config)),
            jobs: Arc::new(RwLock::new(JobStore::new(max_jobs))),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/run/{path}", get(trigger_job))
        .route("/status/{job_id}", get(job_status))
        .route("/result/{job_id}", get(job_result))
        .route("/output/{job_id}", get(job_output))
        .route("/reload", post(reload_config))
        .layer(middleware::from_fn(request_id::request_log))
        .layer(cors)
        .with_state(state)
}

/// Bind and serve until the shutdown token fires, then drain gracefully.
pub async fn serve(addr: SocketAddr, state: AppState, shutdown: CancellationToken) -> Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

/// `GET /run/{path}`: the whole job lifecycle, inline. Reserve, execute,
/// finalize, answer. The store lock is held only for the reservation and the
/// finalization, never across the child process's lifetime.
async fn trigger_job(State(state): State<AppState>, Path(path): Path<String>) -> Response {
    let config = state.config.current().await;
    let endpoint = match config.endpoint(&path) {
        Some(endpoint) => Arc::new(endpoint.clone()),
        None => {
            return (
                StatusCode::NOT_FOUND,
                format!("{}\n", RexecError::EndpointNotFound(path)),
            )
                .into_response();
        }
    };

    let job_id = match state.jobs.write().await.try_reserve(endpoint.clone()) {
        Ok(id) => id,
        Err(RexecError::EndpointBusy(_)) => {
            tracing::warn!(path = %endpoint.path, "rejected trigger, endpoint busy");
            return (
                StatusCode::CONFLICT,
                "A job for this endpoint is already running.",
            )
                .into_response();
        }
        Err(RexecError::StoreFull) => {
            tracing::warn!(path = %endpoint.path, "rejected trigger, job store full");
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                "Job store is at capacity, retry later.\n",
            )
                .into_response();
        }
        Err(e) => {
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };

    let runner = CommandRunner::new(config.max_output_bytes);
    let result = runner.run(job_id, &endpoint).await;

    let failed = result.status == JobStatus::Failed;
    let exit_code = result.exit_code;
    let output = result.output.clone();
    let detail = result.error.clone();
    state.jobs.write().await.finish(
        &job_id,
        result.status,
        result.pid,
        exit_code,
        result.output,
        result.truncated,
        result.error,
    );

    if failed {
        let detail = detail.unwrap_or_else(|| "unknown error".to_string());
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Job {} failed: {}\n{}", job_id, detail, output),
        )
            .into_response()
    } else {
        tracing::info!(job_id = %job_id, path = %endpoint.path, exit_code = ?exit_code, "job finished");
        (
            StatusCode::OK,
            format!("Job {} finished.\n{}", job_id, output),
        )
            .into_response()
    }
}

/// `GET /status/{job_id}`: two-valued status. A job that has reached either
/// terminal state reads as `Finished`; the distinction lives in `/result`.
async fn job_status(State(state): State<AppState>, Path(job_id): Path<String>) -> Response {
    match lookup_job(&state, &job_id).await {
        Some(job) if job.is_running() => (StatusCode::OK, "Running").into_response(),
        Some(_) => (StatusCode::OK, "Finished").into_response(),
        None => job_not_found(&job_id),
    }
}

#[derive(Serialize)]
struct JobResultBody {
    message: String,
    #[serde(rename = "requestID")]
    request_id: String,
    job: JobView,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JobView {
    #[serde(rename = "jobID")]
    job_id: String,
    endpoint: EndpointConfig,
    exit_code: Option<i32>,
    running: bool,
    output: String,
    truncated: bool,
    pid: Option<u32>,
    error: Option<String>,
}

/// `GET /result/{job_id}`: full job record as JSON.
async fn job_result(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(job_id): Path<String>,
) -> Response {
    match lookup_job(&state, &job_id).await {
        Some(job) => {
            let body = JobResultBody {
                message: "Job results".to_string(),
                request_id: request_id.0,
                job: JobView {
                    job_id: job.id.to_string(),
                    endpoint: job.endpoint.as_ref().clone(),
                    exit_code: job.exit_code,
                    running: job.is_running(),
                    output: job.output,
                    truncated: job.truncated,
                    pid: job.pid,
                    error: job.error,
                },
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "message": "No job found",
                "requestID": request_id.0,
                "jobID": job_id,
            })),
        )
            .into_response(),
    }
}

/// `GET /output/{job_id}`: raw captured stdout.
async fn job_output(State(state): State<AppState>, Path(job_id): Path<String>) -> Response {
    match lookup_job(&state, &job_id).await {
        Some(job) => (StatusCode::OK, job.output).into_response(),
        None => job_not_found(&job_id),
    }
}

/// `POST /reload`: swap in a freshly validated configuration snapshot.
/// On failure the previous snapshot keeps serving.
async fn reload_config(State(state): State<AppState>) -> Response {
    match state.config.reload().await {
        Ok(snapshot) => {
            tracing::info!(endpoints = snapshot.endpoints.len(), "configuration reloaded");
            (StatusCode::OK, "Configuration reloaded.\n").into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "configuration reload failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to reload configuration: {}\n", e),
            )
                .into_response()
        }
    }
}

/// A malformed id is indistinguishable from an unknown one to callers.
async fn lookup_job(state: &AppState, raw_id: &str) -> Option<crate::jobs::Job> {
    let id = Uuid::parse_str(raw_id).ok()?;
    state.jobs.read().await.get(&id)
}

fn job_not_found(raw_id: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        format!("{}\n", RexecError::JobNotFound(raw_id.to_string())),
    )
        .into_response()
}
