//! JSON HTTP server for analysis sessions.
//!
//! Exposes the import → categorize → visualize pipeline to browser clients.
//! A client uploads a history export to create a session, reads the category
//! breakdown, and then drives goal and chart generation against the session.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/sessions` | Upload an export, create a session |
//! | `GET`  | `/sessions/{id}` | Session summary and category breakdown |
//! | `GET`  | `/sessions/{id}/csv` | Categorized dataset as CSV |
//! | `POST` | `/sessions/{id}/goals` | Request exploratory goals |
//! | `POST` | `/sessions/{id}/charts` | Generate chart artifacts for a goal |
//! | `GET`  | `/sessions/{id}/charts/{index}/image` | Decoded PNG for one chart |
//! | `DELETE` | `/sessions/{id}` | Drop the session |
//!
//! Sessions are transient: they live in an in-memory map for the lifetime of
//! the process and are never persisted.
//!
//! # Error Contract
//!
//! All error responses share one schema:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "goal must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `viz_disabled` (400),
//! `timeout` (408), `upstream_error` (502), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::analyze::{self, Breakdown};
use crate::config::Config;
use crate::models::Dataset;
use crate::takeout;
use crate::viz::{self, ChartArtifact, DataSummary, Goal, VizProvider};

/// Maximum accepted upload size. Takeout exports routinely exceed axum's
/// default body limit.
const MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024;

/// One uploaded dataset plus the service results cached for it.
struct Session {
    dataset: Arc<Dataset>,
    /// Service summary, cached after the first goals/charts call.
    summary: Option<DataSummary>,
    /// Goals from the most recent goals call (referenced by index in
    /// chart requests).
    goals: Vec<Goal>,
    /// Charts from the most recent charts call (served by the image
    /// endpoint).
    charts: Vec<ChartArtifact>,
}

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    provider: Arc<dyn VizProvider>,
    sessions: Arc<RwLock<HashMap<Uuid, Session>>>,
}

impl AppState {
    pub fn new(config: Arc<Config>) -> anyhow::Result<Self> {
        let provider: Arc<dyn VizProvider> = Arc::from(viz::create_provider(&config.viz)?);
        Ok(Self {
            config,
            provider,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        })
    }
}

/// Build the router. Exposed separately from [`run_server`] so tests can
/// serve the app on an ephemeral port.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/sessions", post(handle_create_session))
        .route(
            "/sessions/{id}",
            get(handle_get_session).delete(handle_delete_session),
        )
        .route("/sessions/{id}/csv", get(handle_session_csv))
        .route("/sessions/{id}/goals", post(handle_goals))
        .route("/sessions/{id}/charts", post(handle_charts))
        .route("/sessions/{id}/charts/{index}/image", get(handle_chart_image))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server.
///
/// Binds to the address configured in `[server].bind` and serves until the
/// process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let state = AppState::new(Arc::new(config.clone()))?;

    let app = router(state);

    println!("History Lens server listening on http://{}", bind_addr);
    if !config.viz.is_enabled() {
        println!("  visualization provider disabled — goal/chart endpoints will return errors");
    }

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

/// Inner error detail with a machine-readable code and human-readable message.
#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn viz_disabled(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "viz_disabled".to_string(),
        message: message.into(),
    }
}

fn timeout_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::REQUEST_TIMEOUT,
        code: "timeout".to_string(),
        message: message.into(),
    }
}

fn upstream_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_GATEWAY,
        code: "upstream_error".to_string(),
        message: message.into(),
    }
}

/// Map service-call failures to the most appropriate HTTP status. Lets the
/// viz module signal configuration errors (disabled provider → 400) and
/// upstream failures (→ 502) without a custom error type.
fn classify_viz_error(err: anyhow::Error) -> AppError {
    let msg = err.to_string();

    if msg.contains("disabled") {
        viz_disabled(msg)
    } else if msg.contains("timed out") {
        timeout_error(msg)
    } else if msg.contains("service error")
        || msg.contains("Invalid service response")
        || msg.contains("after retries")
    {
        upstream_error(msg)
    } else {
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal".to_string(),
            message: msg,
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /sessions ============

#[derive(Deserialize)]
struct CreateSessionParams {
    /// Display name for the dataset, defaults to "history".
    name: Option<String>,
}

/// Session summary returned by create/get.
#[derive(Serialize)]
struct SessionResponse {
    id: String,
    name: String,
    fingerprint: String,
    breakdown: Breakdown,
}

fn session_response(id: Uuid, dataset: &Dataset) -> SessionResponse {
    SessionResponse {
        id: id.to_string(),
        name: dataset.name.clone(),
        fingerprint: dataset.fingerprint.clone(),
        breakdown: analyze::breakdown(&dataset.records),
    }
}

/// Handler for `POST /sessions`.
///
/// The request body is the raw export — `BrowserHistory.json` or the
/// Takeout `.zip` archive. Every entry is categorized at ingestion; the
/// response carries the session id and the category breakdown.
async fn handle_create_session(
    State(state): State<AppState>,
    Query(params): Query<CreateSessionParams>,
    body: Bytes,
) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
    if body.is_empty() {
        return Err(bad_request("request body must not be empty"));
    }

    let name = params.name.unwrap_or_else(|| "history".to_string());
    let dataset = takeout::dataset_from_bytes(&name, &body)
        .map_err(|e| bad_request(e.to_string()))?;

    let id = Uuid::new_v4();
    let response = session_response(id, &dataset);

    let session = Session {
        dataset: Arc::new(dataset),
        summary: None,
        goals: Vec::new(),
        charts: Vec::new(),
    };
    state.sessions.write().await.insert(id, session);

    Ok((StatusCode::CREATED, Json(response)))
}

// ============ GET /sessions/{id} ============

async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let id = parse_session_id(&id)?;
    let sessions = state.sessions.read().await;
    let session = sessions
        .get(&id)
        .ok_or_else(|| not_found(format!("no session with id: {}", id)))?;

    Ok(Json(session_response(id, &session.dataset)))
}

// ============ GET /sessions/{id}/csv ============

async fn handle_session_csv(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id = parse_session_id(&id)?;
    let sessions = state.sessions.read().await;
    let session = sessions
        .get(&id)
        .ok_or_else(|| not_found(format!("no session with id: {}", id)))?;

    let csv = crate::tabular::to_csv(&session.dataset.records);
    Ok((
        [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
        csv,
    )
        .into_response())
}

// ============ POST /sessions/{id}/goals ============

#[derive(Deserialize)]
struct GoalsRequest {
    /// Number of goals to request; defaults to the configured count.
    n: Option<usize>,
}

#[derive(Serialize)]
struct GoalsResponse {
    goals: Vec<Goal>,
}

async fn handle_goals(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<GoalsRequest>,
) -> Result<Json<GoalsResponse>, AppError> {
    let id = parse_session_id(&id)?;
    let n = request.n.unwrap_or(state.config.viz.goal_count);
    if n == 0 {
        return Err(bad_request("n must be >= 1"));
    }

    let (dataset, summary) = session_dataset(&state, id).await?;
    let summary = ensure_summary(&state, id, &dataset, summary).await?;

    let goals = viz::generate_goals(state.provider.as_ref(), &state.config.viz, &summary, n)
        .await
        .map_err(classify_viz_error)?;

    if let Some(session) = state.sessions.write().await.get_mut(&id) {
        session.goals = goals.clone();
    }

    Ok(Json(GoalsResponse { goals }))
}

// ============ POST /sessions/{id}/charts ============

#[derive(Deserialize)]
struct ChartsRequest {
    /// Free-form goal text (a user query).
    goal: Option<String>,
    /// Index into the goals from the most recent goals call.
    goal_index: Option<usize>,
}

#[derive(Serialize)]
struct ChartsResponse {
    goal: String,
    charts: Vec<ChartArtifact>,
}

async fn handle_charts(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ChartsRequest>,
) -> Result<Json<ChartsResponse>, AppError> {
    let id = parse_session_id(&id)?;

    // Resolve the goal before any service call.
    let goal_text = match (&request.goal, request.goal_index) {
        (Some(goal), _) => {
            if goal.trim().is_empty() {
                return Err(bad_request("goal must not be empty"));
            }
            goal.clone()
        }
        (None, Some(index)) => {
            let sessions = state.sessions.read().await;
            let session = sessions
                .get(&id)
                .ok_or_else(|| not_found(format!("no session with id: {}", id)))?;
            session
                .goals
                .get(index)
                .map(|g| g.question.clone())
                .ok_or_else(|| {
                    bad_request(format!(
                        "goal_index {} out of range ({} goals generated)",
                        index,
                        session.goals.len()
                    ))
                })?
        }
        (None, None) => return Err(bad_request("goal or goal_index required")),
    };

    let (dataset, summary) = session_dataset(&state, id).await?;
    let summary = ensure_summary(&state, id, &dataset, summary).await?;

    let charts = viz::generate_charts(
        state.provider.as_ref(),
        &state.config.viz,
        &summary,
        &goal_text,
    )
    .await
    .map_err(classify_viz_error)?;

    if let Some(session) = state.sessions.write().await.get_mut(&id) {
        session.charts = charts.clone();
    }

    Ok(Json(ChartsResponse {
        goal: goal_text,
        charts,
    }))
}

// ============ GET /sessions/{id}/charts/{index}/image ============

async fn handle_chart_image(
    State(state): State<AppState>,
    Path((id, index)): Path<(String, usize)>,
) -> Result<Response, AppError> {
    let id = parse_session_id(&id)?;
    let sessions = state.sessions.read().await;
    let session = sessions
        .get(&id)
        .ok_or_else(|| not_found(format!("no session with id: {}", id)))?;

    let chart = session.charts.get(index).ok_or_else(|| {
        not_found(format!(
            "no chart at index {} ({} charts generated)",
            index,
            session.charts.len()
        ))
    })?;

    let png = chart
        .decode_raster()
        .map_err(|e| upstream_error(e.to_string()))?
        .ok_or_else(|| not_found("chart has no raster image"))?;

    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}

// ============ DELETE /sessions/{id} ============

async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_session_id(&id)?;
    let removed = state.sessions.write().await.remove(&id);
    match removed {
        Some(_) => Ok(StatusCode::NO_CONTENT),
        None => Err(not_found(format!("no session with id: {}", id))),
    }
}

// ============ helpers ============

fn parse_session_id(id: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(id).map_err(|_| bad_request(format!("invalid session id: {}", id)))
}

/// Snapshot a session's dataset and cached summary without holding the map
/// lock across service calls.
async fn session_dataset(
    state: &AppState,
    id: Uuid,
) -> Result<(Arc<Dataset>, Option<DataSummary>), AppError> {
    let sessions = state.sessions.read().await;
    let session = sessions
        .get(&id)
        .ok_or_else(|| not_found(format!("no session with id: {}", id)))?;
    Ok((session.dataset.clone(), session.summary.clone()))
}

/// Return the cached summary or fetch and cache one. Concurrent callers may
/// both summarize; the last write wins, which is harmless for an idempotent
/// summary.
async fn ensure_summary(
    state: &AppState,
    id: Uuid,
    dataset: &Dataset,
    cached: Option<DataSummary>,
) -> Result<DataSummary, AppError> {
    if let Some(summary) = cached {
        return Ok(summary);
    }

    let summary = viz::summarize_dataset(state.provider.as_ref(), &state.config.viz, dataset)
        .await
        .map_err(classify_viz_error)?;

    if let Some(session) = state.sessions.write().await.get_mut(&id) {
        session.summary = Some(summary.clone());
    }

    Ok(summary)
}
