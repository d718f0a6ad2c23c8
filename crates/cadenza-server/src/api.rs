use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use cadenza_core::auth::QueueAuthorizer;
use cadenza_core::manager::{AdvanceOutcome, QueueManager};
use cadenza_media::resolver::{infer_kind, MediaReference, MediaResolver, ResolveError};
use cadenza_models::{ConversationId, MediaItem, MediaKind, MediaSource};

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<QueueManager>,
    pub authorizer: Arc<dyn QueueAuthorizer>,
    pub downloader: Arc<dyn MediaResolver>,
    /// Absent when yt-dlp is not installed; link requests then 422.
    pub extractor: Option<Arc<dyn MediaResolver>>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/health", get(health))
        .route(
            "/api/v1/conversations/{id}/queue",
            post(enqueue).get(list_queue),
        )
        .route("/api/v1/conversations/{id}/skip", post(skip))
        .route("/api/v1/conversations/{id}/stop", post(stop))
        .with_state(state)
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unprocessable: {0}")]
    Unprocessable(String),
    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, self.to_string()),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::Unprocessable(_) => (StatusCode::UNPROCESSABLE_ENTITY, self.to_string()),
            ApiError::Internal(err) => {
                tracing::error!("API internal error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<ResolveError> for ApiError {
    fn from(e: ResolveError) -> Self {
        ApiError::Unprocessable(e.to_string())
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// The acting user, from the `x-user-id` header.
fn require_user(headers: &HeaderMap) -> Result<i64, ApiError> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .ok_or(ApiError::Unauthorized)
}

async fn authorize(
    state: &AppState,
    headers: &HeaderMap,
    conversation_id: ConversationId,
) -> Result<i64, ApiError> {
    let user_id = require_user(headers)?;
    if !state.authorizer.can_control(user_id, conversation_id).await {
        return Err(ApiError::Forbidden);
    }
    Ok(user_id)
}

#[derive(Debug, Deserialize)]
pub struct EnqueueRequest {
    /// A page link for the extractor (YouTube and friends).
    pub url: Option<String>,
    /// An attachment to download, paired with `file_name`.
    pub attachment_url: Option<String>,
    pub file_name: Option<String>,
    /// A file already on the server's disk.
    pub file: Option<String>,
    /// Kind override for `file` references; inferred otherwise.
    pub kind: Option<MediaKind>,
    pub title: Option<String>,
    /// Coerce video sources to audio (the `.play` command flavor).
    #[serde(default)]
    pub audio_only: bool,
}

#[derive(Debug, Serialize)]
pub struct EnqueueResponse {
    pub position: usize,
    /// Whether this enqueue started playback itself.
    pub started: bool,
    pub title: String,
    /// Items dropped by the start attempt, if any.
    pub failed: Vec<String>,
}

async fn resolve_request(state: &AppState, req: &EnqueueRequest) -> Result<MediaItem, ApiError> {
    if let Some(url) = &req.url {
        let extractor = state.extractor.as_ref().ok_or_else(|| {
            ApiError::Unprocessable("link extraction unavailable (yt-dlp not installed)".into())
        })?;
        let reference = MediaReference::Link(url.clone());
        return Ok(extractor.resolve(&reference, req.audio_only).await?);
    }

    if let (Some(url), Some(file_name)) = (&req.attachment_url, &req.file_name) {
        let reference = MediaReference::Attachment {
            url: url.clone(),
            file_name: file_name.clone(),
        };
        return Ok(state.downloader.resolve(&reference, req.audio_only).await?);
    }

    if let Some(file) = &req.file {
        let kind = match (req.kind, infer_kind(file)) {
            (Some(kind), _) => kind,
            (None, Some(_)) if req.audio_only => MediaKind::Audio,
            (None, Some(kind)) => kind,
            (None, None) => {
                return Err(ApiError::BadRequest(format!(
                    "cannot infer media kind for '{file}'"
                )))
            }
        };
        let mut item = MediaItem::new(kind, MediaSource::LocalFile(file.into()));
        if let Some(title) = &req.title {
            item = item.with_title(title.clone());
        }
        return Ok(item);
    }

    Err(ApiError::BadRequest(
        "provide one of: url, attachment_url + file_name, file".into(),
    ))
}

async fn enqueue(
    State(state): State<AppState>,
    Path(conversation_id): Path<ConversationId>,
    headers: HeaderMap,
    Json(req): Json<EnqueueRequest>,
) -> Result<Json<EnqueueResponse>, ApiError> {
    let user_id = authorize(&state, &headers, conversation_id).await?;

    let item = resolve_request(&state, &req).await?.with_requester(user_id);
    let title = item.display_title();
    let receipt = state.manager.enqueue(conversation_id, item).await;

    let (started, failed) = match &receipt.outcome {
        Some(AdvanceOutcome::Started { failures, .. }) => (true, failure_titles(failures)),
        Some(AdvanceOutcome::Drained { failures }) => (false, failure_titles(failures)),
        _ => (false, Vec::new()),
    };

    Ok(Json(EnqueueResponse {
        position: receipt.position,
        started,
        title,
        failed,
    }))
}

fn failure_titles(failures: &[cadenza_core::manager::PlaybackFailure]) -> Vec<String> {
    failures.iter().map(|f| f.item.display_title()).collect()
}

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AdvanceResponse {
    Started { title: String, failed: Vec<String> },
    QueueEmpty { left: bool },
    Drained { failed: Vec<String> },
}

impl From<AdvanceOutcome> for AdvanceResponse {
    fn from(outcome: AdvanceOutcome) -> Self {
        match outcome {
            AdvanceOutcome::Started { item, failures } => AdvanceResponse::Started {
                title: item.display_title(),
                failed: failure_titles(&failures),
            },
            AdvanceOutcome::QueueEmpty { left } => AdvanceResponse::QueueEmpty { left },
            AdvanceOutcome::Drained { failures } => AdvanceResponse::Drained {
                failed: failure_titles(&failures),
            },
        }
    }
}

async fn skip(
    State(state): State<AppState>,
    Path(conversation_id): Path<ConversationId>,
    headers: HeaderMap,
) -> Result<Json<AdvanceResponse>, ApiError> {
    authorize(&state, &headers, conversation_id).await?;
    let outcome = state.manager.skip(conversation_id).await;
    Ok(Json(outcome.into()))
}

#[derive(Debug, Deserialize, Default)]
pub struct StopRequest {
    #[serde(default)]
    pub clear_queue: bool,
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub stopped: bool,
    pub cleared: usize,
}

async fn stop(
    State(state): State<AppState>,
    Path(conversation_id): Path<ConversationId>,
    headers: HeaderMap,
    req: Option<Json<StopRequest>>,
) -> Result<Json<StopResponse>, ApiError> {
    authorize(&state, &headers, conversation_id).await?;
    let clear_queue = req.map(|Json(r)| r.clear_queue).unwrap_or(false);
    let outcome = state.manager.stop(conversation_id, clear_queue).await;
    Ok(Json(StopResponse {
        stopped: outcome.was_active,
        cleared: outcome.cleared,
    }))
}

#[derive(Debug, Serialize)]
pub struct TrackSummary {
    pub position: usize,
    pub kind: MediaKind,
    pub title: String,
    pub requested_by: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct QueueResponse {
    pub now_playing: Option<TrackSummary>,
    pub pending: Vec<TrackSummary>,
}

fn summarize(position: usize, item: &MediaItem) -> TrackSummary {
    TrackSummary {
        position,
        kind: item.kind,
        title: item.display_title(),
        requested_by: item.requested_by,
    }
}

async fn list_queue(
    State(state): State<AppState>,
    Path(conversation_id): Path<ConversationId>,
) -> Json<QueueResponse> {
    let view = state.manager.list(conversation_id).await;
    Json(QueueResponse {
        now_playing: view.now_playing.as_ref().map(|item| summarize(0, item)),
        pending: view
            .pending
            .iter()
            .enumerate()
            .map(|(i, item)| summarize(i + 1, item))
            .collect(),
    })
}
