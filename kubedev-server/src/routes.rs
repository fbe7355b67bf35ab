use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bytes::Bytes;
use kubedev_types::EnvironmentState;
use serde::Deserialize;
use std::str::FromStr;
use uuid::Uuid;

use crate::app::AppState;
use crate::error::into_response;
use crate::principal::PrincipalExtractor;
use crate::sse;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/readyz", get(health))
        .route("/environments", get(list_environments).post(create_environment))
        .route("/environments/stream", post(create_environment_stream))
        .route(
            "/environments/{id}",
            get(get_environment).delete(delete_environment),
        )
        .route("/environments/{id}/start", post(start_environment))
        .route("/environments/{id}/stop", post(stop_environment))
        .route("/environments/{id}/restart", post(restart_environment))
        .route("/environments/{id}/logs", get(get_logs))
        .route("/environments/{id}/access", get(get_access_info))
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

async fn create_environment(
    State(state): State<AppState>,
    PrincipalExtractor(principal): PrincipalExtractor,
    Query(q): Query<CreateQuery>,
    body: Bytes,
) -> Response {
    match state
        .orchestrator
        .create(principal, &body, q.template_id.unwrap_or_default())
        .await
    {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(e) => into_response(e),
    }
}

#[derive(Deserialize)]
struct CreateQuery {
    template_id: Option<String>,
}

#[derive(Deserialize)]
struct CreateStreamRequest {
    template_id: String,
}

async fn create_environment_stream(
    State(state): State<AppState>,
    PrincipalExtractor(principal): PrincipalExtractor,
    Json(req): Json<CreateStreamRequest>,
) -> Response {
    let manifest = match state.templates.resolve(&req.template_id).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, format!("{e:#}")).into_response();
        }
    };
    let rx = state
        .orchestrator
        .create_stream(principal, manifest, req.template_id);
    sse::progress_stream(rx).into_response()
}

async fn get_environment(
    State(state): State<AppState>,
    PrincipalExtractor(principal): PrincipalExtractor,
    Path(id): Path<Uuid>,
) -> Response {
    match state.orchestrator.get(principal, id).await {
        Ok(record) => Json(record).into_response(),
        Err(e) => into_response(e),
    }
}

#[derive(Deserialize)]
struct ListQuery {
    owner: Option<Uuid>,
    state: Option<String>,
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

fn default_limit() -> i64 {
    50
}

async fn list_environments(
    State(state): State<AppState>,
    PrincipalExtractor(principal): PrincipalExtractor,
    Query(q): Query<ListQuery>,
) -> Response {
    let state_filter = match q.state.as_deref().map(EnvironmentState::from_str) {
        Some(Ok(s)) => Some(s),
        Some(Err(e)) => return (StatusCode::BAD_REQUEST, e).into_response(),
        None => None,
    };
    match state
        .orchestrator
        .list(principal, q.owner, state_filter, q.limit, q.offset)
        .await
    {
        Ok(records) => Json(records).into_response(),
        Err(e) => into_response(e),
    }
}

async fn start_environment(
    State(state): State<AppState>,
    PrincipalExtractor(principal): PrincipalExtractor,
    Path(id): Path<Uuid>,
) -> Response {
    match state.orchestrator.start(principal, id).await {
        Ok(record) => Json(record).into_response(),
        Err(e) => into_response(e),
    }
}

async fn stop_environment(
    State(state): State<AppState>,
    PrincipalExtractor(principal): PrincipalExtractor,
    Path(id): Path<Uuid>,
) -> Response {
    match state.orchestrator.stop(principal, id).await {
        Ok(record) => Json(record).into_response(),
        Err(e) => into_response(e),
    }
}

async fn restart_environment(
    State(state): State<AppState>,
    PrincipalExtractor(principal): PrincipalExtractor,
    Path(id): Path<Uuid>,
) -> Response {
    match state.orchestrator.restart(principal, id).await {
        Ok(record) => Json(record).into_response(),
        Err(e) => into_response(e),
    }
}

async fn delete_environment(
    State(state): State<AppState>,
    PrincipalExtractor(principal): PrincipalExtractor,
    Path(id): Path<Uuid>,
) -> Response {
    match state.orchestrator.delete(principal, id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => into_response(e),
    }
}

#[derive(Deserialize)]
struct LogsQuery {
    #[serde(default = "default_tail")]
    tail: i64,
}

fn default_tail() -> i64 {
    200
}

async fn get_logs(
    State(state): State<AppState>,
    PrincipalExtractor(principal): PrincipalExtractor,
    Path(id): Path<Uuid>,
    Query(q): Query<LogsQuery>,
) -> Response {
    match state.orchestrator.get_logs(principal, id, q.tail).await {
        Ok(lines) => Json(lines).into_response(),
        Err(e) => into_response(e),
    }
}

async fn get_access_info(
    State(state): State<AppState>,
    PrincipalExtractor(principal): PrincipalExtractor,
    Path(id): Path<Uuid>,
) -> Response {
    match state.orchestrator.get_access_info(principal, id).await {
        Ok(info) => Json(info).into_response(),
        Err(e) => into_response(e),
    }
}
