// HTTP API: login plus repository inspection and revert, all POST, all JSON.
// Every route except `/api/login` sits behind the bearer-token middleware.

pub mod auth;
pub mod error;

use std::sync::Arc;

use autosync_common::types::{ChangeEntry, CommitEntry, Pager, RepoSummary};
use axum::{
    extract::{Json, State},
    http::StatusCode,
    middleware,
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::api::auth::{require_bearer_auth, TokenService};
use crate::api::error::{ApiError, ErrorCode};
use crate::config::AuthConfig;
use crate::git::worker::{CommandExecutor, ProcessCommandExecutor};
use crate::sync::Runner;

pub struct AppState<E: CommandExecutor + 'static = ProcessCommandExecutor> {
    runner: Arc<Runner<E>>,
    tokens: Arc<TokenService>,
    auth: AuthConfig,
}

impl<E: CommandExecutor + 'static> Clone for AppState<E> {
    fn clone(&self) -> Self {
        Self {
            runner: Arc::clone(&self.runner),
            tokens: Arc::clone(&self.tokens),
            auth: self.auth.clone(),
        }
    }
}

impl<E: CommandExecutor + 'static> AppState<E> {
    pub fn new(runner: Arc<Runner<E>>, auth: AuthConfig) -> anyhow::Result<Self> {
        let tokens = Arc::new(TokenService::new(&auth.jwt_secret)?);
        Ok(Self { runner, tokens, auth })
    }
}

pub fn router<E: CommandExecutor + 'static>(state: AppState<E>) -> Router {
    let protected = Router::new()
        .route("/api/repos", post(list_repos))
        .route("/api/commits", post(list_commits))
        .route("/api/changes", post(list_changes))
        .route("/api/revert", post(revert))
        .layer(middleware::from_fn_with_state(Arc::clone(&state.tokens), require_bearer_auth));

    Router::new()
        .route("/api/login", post(login))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Request/response bodies ────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Debug, Deserialize, Serialize)]
struct LoginResponse {
    token: String,
}

#[derive(Debug, Deserialize, Serialize)]
struct CommitsRequest {
    id: usize,
    #[serde(default)]
    pager: Pager,
}

#[derive(Debug, Deserialize, Serialize)]
struct CommitsResponse {
    total: usize,
    list: Vec<CommitEntry>,
}

#[derive(Debug, Deserialize, Serialize)]
struct ChangesRequest {
    id: usize,
    hash: String,
}

#[derive(Debug, Deserialize, Serialize)]
struct RevertRequest {
    id: usize,
    hash: String,
    #[serde(default)]
    files: Vec<String>,
}

// ── Handlers ───────────────────────────────────────────────────────

async fn login<E: CommandExecutor + 'static>(
    State(state): State<AppState<E>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    if request.username != state.auth.username || request.password != state.auth.password {
        return Err(ApiError::new(
            ErrorCode::AuthInvalidCredentials,
            "invalid username or password",
        ));
    }

    let token = state
        .tokens
        .issue(&request.username)
        .map_err(|_| ApiError::new(ErrorCode::InternalError, "failed to issue token"))?;
    Ok(Json(LoginResponse { token }))
}

async fn list_repos<E: CommandExecutor + 'static>(
    State(state): State<AppState<E>>,
) -> Json<Vec<RepoSummary>> {
    Json(state.runner.summaries())
}

async fn list_commits<E: CommandExecutor + 'static>(
    State(state): State<AppState<E>>,
    Json(request): Json<CommitsRequest>,
) -> Result<Json<CommitsResponse>, ApiError> {
    let repo = state.runner.repository(request.id)?;
    let pager = request.pager;
    let (list, total) = run_git(move || repo.history(pager.index, pager.size)).await?;
    Ok(Json(CommitsResponse { total, list }))
}

async fn list_changes<E: CommandExecutor + 'static>(
    State(state): State<AppState<E>>,
    Json(request): Json<ChangesRequest>,
) -> Result<Json<Vec<ChangeEntry>>, ApiError> {
    let hash = validated_hash(request.hash)?;
    let repo = state.runner.repository(request.id)?;
    let changes = run_git(move || repo.changes(&hash)).await?;
    Ok(Json(changes))
}

async fn revert<E: CommandExecutor + 'static>(
    State(state): State<AppState<E>>,
    Json(request): Json<RevertRequest>,
) -> Result<StatusCode, ApiError> {
    let hash = validated_hash(request.hash)?;
    let repo = state.runner.repository(request.id)?;
    let files = if request.files.is_empty() { vec![".".to_string()] } else { request.files };

    run_git(move || repo.revert_files(&hash, &files)).await?;

    // The revert just rewrote the working tree; hold the scheduler back so
    // that churn is not committed straight back.
    state.runner.ignore(request.id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Git subprocesses block, so handlers run them off the async workers.
async fn run_git<T, F>(operation: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, crate::git::GitError> + Send + 'static,
{
    tokio::task::spawn_blocking(operation)
        .await
        .map_err(|_| ApiError::new(ErrorCode::InternalError, "git task failed"))?
        .map_err(ApiError::from)
}

fn validated_hash(hash: String) -> Result<String, ApiError> {
    if hash.trim().is_empty() {
        return Err(ApiError::new(ErrorCode::ValidationFailed, "hash must not be empty"));
    }
    Ok(hash)
}
