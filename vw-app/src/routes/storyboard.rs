use crate::routes::{error_response, json_rejection_response, parse_session_id, session_not_found};
use crate::server::AppState;
use axum::extract::Path;
use axum::extract::rejection::JsonRejection;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get};
use axum::{Extension, Json};
use serde::Deserialize;
use std::sync::Arc;
use vw_prompts::Shot;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ReplaceStoryboardRequest {
    shots: Vec<Shot>,
}

pub fn router() -> axum::Router {
    axum::Router::new()
        .route(
            "/api/v1/sessions/{id}/storyboard",
            get(get_storyboard).put(replace_storyboard),
        )
        .route("/api/v1/sessions/{id}/storyboard.csv", get(export_csv))
        .route("/api/v1/sessions/{id}/results", delete(clear_results))
}

fn no_storyboard() -> Response {
    error_response(
        StatusCode::NOT_FOUND,
        "not_found",
        "no storyboard yet; run the storyboard task in structured mode",
    )
}

#[tracing::instrument(level = "debug", skip_all)]
async fn get_storyboard(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_session_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match state
        .sessions
        .with_session(id, |s| s.results.storyboard().map(<[Shot]>::to_vec))
    {
        Some(Some(shots)) => Json(serde_json::json!({ "status": "ok", "shots": shots })).into_response(),
        Some(None) => no_storyboard(),
        None => session_not_found(),
    }
}

#[tracing::instrument(level = "info", skip_all)]
async fn replace_storyboard(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
    req: Result<Json<ReplaceStoryboardRequest>, JsonRejection>,
) -> Response {
    let id = match parse_session_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let Json(req) = match req {
        Ok(req) => req,
        Err(rejection) => return json_rejection_response(rejection),
    };
    let count = req.shots.len();
    match state
        .sessions
        .with_session(id, |s| s.results.replace_storyboard(req.shots))
    {
        Some(Ok(())) => {
            tracing::info!(shot_count = count, "storyboard edited");
            Json(serde_json::json!({ "status": "ok", "shot_count": count })).into_response()
        }
        Some(Err(reason)) => error_response(StatusCode::BAD_REQUEST, "invalid_input", reason),
        None => session_not_found(),
    }
}

#[tracing::instrument(level = "info", skip_all)]
async fn export_csv(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_session_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match state.sessions.with_session(id, |s| s.results.storyboard_csv()) {
        Some(Some(csv)) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"storyboard.csv\"",
                ),
            ],
            csv,
        )
            .into_response(),
        Some(None) => no_storyboard(),
        None => session_not_found(),
    }
}

#[tracing::instrument(level = "info", skip_all)]
async fn clear_results(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_session_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match state.sessions.with_session(id, |s| s.results.clear()) {
        Some(()) => Json(serde_json::json!({ "status": "ok" })).into_response(),
        None => session_not_found(),
    }
}
