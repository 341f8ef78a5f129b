//! HTTP read and trigger interface.

use std::path::Path;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::app::{SecNewsError, StorageError};
use crate::domain::{Item, Source};
use crate::registry::SourceRegistry;
use crate::scheduler::{SchedulerHandle, SchedulerStatus, TriggerOutcome};
use crate::store::{clamp_limit, Store, DEFAULT_LIST_LIMIT};

#[derive(Clone)]
pub struct ApiState {
    pub registry: Arc<SourceRegistry>,
    pub store: Arc<dyn Store>,
    pub scheduler: SchedulerHandle,
}

pub fn router(state: ApiState, static_dir: Option<&Path>) -> Router {
    let api = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/news", get(list_news))
        .route("/api/sources", get(list_sources))
        .route("/api/refresh", post(refresh))
        .route("/api/status", get(status))
        .with_state(state);

    let api = match static_dir {
        Some(dir) => api.fallback_service(ServeDir::new(dir)),
        None => api,
    };

    api.layer(TraceLayer::new_for_http())
}

/// Handler failures. Only storage problems surface to clients.
#[derive(Debug)]
pub enum ApiError {
    Storage(StorageError),
    Internal(String),
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match self {
            ApiError::Storage(e) => {
                error!(error = %e, "Store read failed");
                format!("storage error: {e}")
            }
            ApiError::Internal(e) => {
                error!(error = %e, "Request failed");
                e
            }
        };
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": message })),
        )
            .into_response()
    }
}

#[derive(Debug, Deserialize)]
struct NewsQuery {
    limit: Option<usize>,
    offset: Option<usize>,
}

#[derive(Debug, Serialize)]
struct NewsPage {
    total: u64,
    limit: usize,
    offset: usize,
    items: Vec<Item>,
}

async fn list_news(
    State(state): State<ApiState>,
    Query(query): Query<NewsQuery>,
) -> Result<Json<NewsPage>, ApiError> {
    let limit = clamp_limit(query.limit.unwrap_or(DEFAULT_LIST_LIMIT));
    let offset = query.offset.unwrap_or(0);

    let store = state.store.clone();
    let (total, items) = tokio::task::spawn_blocking(move || {
        Ok::<_, StorageError>((store.count()?, store.list(limit, offset)?))
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok(Json(NewsPage {
        total,
        limit,
        offset,
        items,
    }))
}

#[derive(Debug, Serialize)]
struct SourceList {
    sources: Vec<Source>,
}

async fn list_sources(State(state): State<ApiState>) -> Json<SourceList> {
    Json(SourceList {
        sources: state.registry.list(),
    })
}

#[derive(Debug, Serialize)]
struct RefreshAccepted {
    status: TriggerOutcome,
}

async fn refresh(State(state): State<ApiState>) -> Response {
    match state.scheduler.trigger() {
        Ok(outcome) => {
            info!(?outcome, "Refresh requested over HTTP");
            (
                StatusCode::ACCEPTED,
                Json(RefreshAccepted { status: outcome }),
            )
                .into_response()
        }
        Err(e @ SecNewsError::SchedulerStopped) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
        Err(e) => ApiError::Internal(e.to_string()).into_response(),
    }
}

async fn status(State(state): State<ApiState>) -> Json<SchedulerStatus> {
    Json(state.scheduler.status())
}
