use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use tracing::warn;

use crate::structs::LoginRequest;
use crate::supervisor::{OpError, Supervisor};

#[derive(Clone)]
struct AppState {
    supervisor: Arc<Supervisor>,
}

pub fn get_app(supervisor: Arc<Supervisor>) -> Router {
    let state = AppState { supervisor };

    Router::new()
        .route("/v1/session", post(login))
        .route("/v1/processes", get(list_processes))
        .route("/v1/processes/{pid}", axum::routing::delete(delete_process))
        .route("/v1/applications", get(list_applications))
        .route(
            "/v1/applications/{id}/instances",
            put(start_application).delete(stop_capture),
        )
        .route("/v1/applications/{id}/output", get(application_output))
        .route("/v1/app-config/reload", put(reload_catalog))
        .with_state(state)
}

/// How the token travels is this layer's concern; the supervisor only
/// ever sees the opaque string.
fn bearer_token(headers: &HeaderMap) -> String {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .unwrap_or_default()
        .to_string()
}

fn reject(err: OpError) -> StatusCode {
    match &err {
        OpError::Unavailable(cause) => warn!(%cause, "operation unavailable"),
        OpError::Internal(cause) => warn!(%cause, "operation failed"),
        _ => {}
    }
    match err {
        OpError::Forbidden => StatusCode::FORBIDDEN,
        OpError::NotFound(_) => StatusCode::NOT_FOUND,
        OpError::Conflict(_) => StatusCode::CONFLICT,
        OpError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        OpError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> axum::response::Result<impl IntoResponse> {
    let token = state
        .supervisor
        .login(&body.username, &body.password)
        .await
        .map_err(reject)?;
    Ok(Json(token))
}

async fn list_processes(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> axum::response::Result<impl IntoResponse> {
    let processes = state
        .supervisor
        .list_processes(&bearer_token(&headers))
        .await
        .map_err(reject)?;
    Ok(Json(processes))
}

async fn delete_process(
    State(state): State<AppState>,
    Path(pid): Path<i32>,
    headers: HeaderMap,
) -> axum::response::Result<impl IntoResponse> {
    state
        .supervisor
        .delete_process(&bearer_token(&headers), pid)
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_applications(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> axum::response::Result<impl IntoResponse> {
    let views = state
        .supervisor
        .list_applications(&bearer_token(&headers))
        .await
        .map_err(reject)?;
    Ok(Json(views))
}

async fn start_application(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> axum::response::Result<impl IntoResponse> {
    let view = state
        .supervisor
        .start_application(&bearer_token(&headers), id)
        .await
        .map_err(reject)?;
    Ok(Json(view))
}

async fn stop_capture(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> axum::response::Result<impl IntoResponse> {
    state
        .supervisor
        .stop_capture(&bearer_token(&headers), id)
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn application_output(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> axum::response::Result<impl IntoResponse> {
    let lines = state
        .supervisor
        .application_output(&bearer_token(&headers), id)
        .await
        .map_err(reject)?;
    Ok(Json(lines))
}

async fn reload_catalog(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> axum::response::Result<impl IntoResponse> {
    let result = state
        .supervisor
        .reload_catalog(&bearer_token(&headers))
        .await
        .map_err(reject)?;
    Ok(Json(result))
}
