use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;

use crate::errors::StudioError;
use crate::settings::Settings;
use crate::store::{DebouncedSaver, LocalStore, keys};
use crate::workflow::Orchestrator;

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub settings: Mutex<Settings>,
    pub store: Arc<LocalStore>,
    pub saver: DebouncedSaver,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Build server state, restoring persisted settings from the store.
    pub fn new(orchestrator: Arc<Orchestrator>, store: Arc<LocalStore>) -> Self {
        let settings: Settings = store.get_json(keys::SETTINGS);
        let saver = DebouncedSaver::new(store.clone());
        Self {
            orchestrator,
            settings: Mutex::new(settings),
            store,
            saver,
        }
    }

    /// Override the editor save debounce window.
    pub fn with_debounce(mut self, delay: std::time::Duration) -> Self {
        self.saver = DebouncedSaver::new(self.store.clone()).with_delay(delay);
        self
    }
}

fn lock_settings(state: &AppState) -> MutexGuard<'_, Settings> {
    state
        .settings
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ── Request payload types ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RunRequest {
    pub prompt: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryRequest {
    pub stage_id: u32,
}

#[derive(Deserialize)]
pub struct OpenFileRequest {
    pub path: String,
}

#[derive(Deserialize)]
pub struct EditRequest {
    pub content: String,
}

// ── Error handling ────────────────────────────────────────────────────

pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

impl From<StudioError> for ApiError {
    fn from(error: StudioError) -> Self {
        match &error {
            StudioError::UnknownStage(_) => ApiError::NotFound(error.to_string()),
            StudioError::RunInProgress => ApiError::Conflict(error.to_string()),
            StudioError::NotRetryable { .. }
            | StudioError::NoRunRecorded
            | StudioError::InvalidTemplate(_) => ApiError::BadRequest(error.to_string()),
            StudioError::Other(_) => ApiError::Internal(error.to_string()),
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/settings", get(get_settings).post(update_settings))
        .route("/api/workspace", get(get_workspace))
        .route("/api/workspace/open", post(open_file))
        .route("/api/workspace/edit", post(edit_active_file))
        .route("/api/workflow", get(get_workflow))
        .route("/api/workflow/run", post(run_workflow))
        .route("/api/workflow/retry", post(retry_stage))
        .route("/health", get(health_check))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "OK"
}

async fn get_settings(State(state): State<SharedState>) -> Json<Settings> {
    Json(lock_settings(&state).clone())
}

/// Replace the settings document. The body is parsed by hand so malformed
/// JSON answers with the fixed `Invalid JSON data` message.
async fn update_settings(
    State(state): State<SharedState>,
    body: String,
) -> Result<Json<Settings>, ApiError> {
    let settings: Settings = serde_json::from_str(&body)
        .map_err(|_| ApiError::BadRequest("Invalid JSON data".to_string()))?;
    settings
        .validate()
        .map_err(|error| ApiError::BadRequest(error.to_string()))?;
    state
        .store
        .put_json(keys::SETTINGS, &settings)
        .map_err(|error| ApiError::Internal(error.to_string()))?;
    *lock_settings(&state) = settings.clone();
    Ok(Json(settings))
}

async fn get_workspace(State(state): State<SharedState>) -> impl IntoResponse {
    let workspace = state.orchestrator.workspace();
    let snapshot = workspace.lock().await.clone();
    Json(snapshot)
}

async fn open_file(
    State(state): State<SharedState>,
    Json(request): Json<OpenFileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let workspace = state.orchestrator.workspace();
    let mut workspace = workspace.lock().await;
    if !workspace.open_file(&request.path) {
        return Err(ApiError::NotFound(format!(
            "unknown file: {}",
            request.path
        )));
    }
    Ok(Json(serde_json::json!({ "activePath": request.path })))
}

/// Write through to the active file and queue a debounced editor save.
async fn edit_active_file(
    State(state): State<SharedState>,
    Json(request): Json<EditRequest>,
) -> Result<impl IntoResponse, ApiError> {
    {
        let workspace = state.orchestrator.workspace();
        let mut workspace = workspace.lock().await;
        if !workspace.edit_active(&request.content) {
            return Err(ApiError::BadRequest("no active file".to_string()));
        }
    }
    state
        .saver
        .schedule(keys::EDITOR_CODE, &request.content)
        .map_err(|error| ApiError::Internal(error.to_string()))?;
    Ok(Json(
        serde_json::json!({ "isSaving": state.saver.is_saving() }),
    ))
}

async fn get_workflow(State(state): State<SharedState>) -> impl IntoResponse {
    let handle = state.orchestrator.state();
    let snapshot = handle.lock().await.snapshot();
    Json(snapshot)
}

async fn run_workflow(
    State(state): State<SharedState>,
    Json(request): Json<RunRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if request.prompt.trim().is_empty() {
        return Err(ApiError::BadRequest("prompt must not be empty".to_string()));
    }
    let run_id = state.orchestrator.spawn_run(&request.prompt).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "runId": run_id })),
    ))
}

async fn retry_stage(
    State(state): State<SharedState>,
    Json(request): Json<RetryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let run_id = state.orchestrator.spawn_retry(request.stage_id).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "runId": run_id, "stageId": request.stage_id })),
    ))
}
