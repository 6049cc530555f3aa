use crate::routes::{error_response, json_rejection_response, parse_session_id, session_not_found};
use crate::server::AppState;
use axum::extract::Path;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Extension, Json};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SetCredentialRequest {
    provider: String,
    #[serde(default)]
    api_key: String,
}

pub fn router() -> axum::Router {
    axum::Router::new()
        .route("/api/v1/sessions", get(list_sessions).post(create_session))
        .route("/api/v1/sessions/{id}", get(get_session).delete(delete_session))
        .route("/api/v1/sessions/{id}/reset", post(reset_session))
        .route("/api/v1/sessions/{id}/credentials", put(set_credential))
}

#[tracing::instrument(level = "debug", skip_all)]
async fn list_sessions(Extension(state): Extension<Arc<AppState>>) -> Json<serde_json::Value> {
    let sessions = state.sessions.list();
    Json(serde_json::json!({ "status": "ok", "sessions": sessions }))
}

#[tracing::instrument(level = "info", skip_all)]
async fn create_session(Extension(state): Extension<Arc<AppState>>) -> Response {
    let session = state.sessions.create();
    (
        StatusCode::CREATED,
        Json(serde_json::json!({ "status": "ok", "id": session.id, "session": session })),
    )
        .into_response()
}

#[tracing::instrument(level = "debug", skip_all)]
async fn get_session(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_session_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match state.sessions.summary(id) {
        Some(session) => Json(serde_json::json!({ "status": "ok", "session": session })).into_response(),
        None => session_not_found(),
    }
}

#[tracing::instrument(level = "info", skip_all)]
async fn delete_session(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_session_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    if state.sessions.delete(id) {
        Json(serde_json::json!({ "status": "ok" })).into_response()
    } else {
        session_not_found()
    }
}

#[tracing::instrument(level = "info", skip_all)]
async fn reset_session(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_session_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match state.sessions.with_session(id, |s| s.reset()) {
        Some(()) => Json(serde_json::json!({ "status": "ok" })).into_response(),
        None => session_not_found(),
    }
}

/// Stores a provider key for the session. A blank key removes it.
#[tracing::instrument(level = "info", skip_all)]
async fn set_credential(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
    req: Result<Json<SetCredentialRequest>, JsonRejection>,
) -> Response {
    let id = match parse_session_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let Json(req) = match req {
        Ok(req) => req,
        Err(rejection) => return json_rejection_response(rejection),
    };
    let config = match state.config.provider_config(&req.provider, &req.api_key) {
        Ok(config) => config,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, "invalid_input", e.to_string()),
    };
    let provider = config.name.clone();
    match state.sessions.with_session(id, |s| s.set_credential(config)) {
        Some(configured) => {
            tracing::info!(provider = %provider, configured, "session credential updated");
            Json(serde_json::json!({
                "status": "ok",
                "provider": provider,
                "configured": configured,
            }))
            .into_response()
        }
        None => session_not_found(),
    }
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::{empty_request, json_request, response_body_json};
    use crate::testing::{FakeFactory, test_state};
    use axum::Extension;
    use axum::http::StatusCode;
    use serde_json::json;
    use tower::util::ServiceExt;

    #[tokio::test]
    async fn create_then_delete_session() {
        let state = test_state(FakeFactory::replying("ok"));
        let app = super::router().layer(Extension(state.clone()));

        let response = app
            .clone()
            .oneshot(empty_request("POST", "/api/v1/sessions"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = response_body_json(response).await;
        let id = body.get("id").and_then(|v| v.as_str()).expect("id").to_string();

        let response = app
            .clone()
            .oneshot(empty_request("DELETE", &format!("/api/v1/sessions/{id}")))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(empty_request("GET", &format!("/api/v1/sessions/{id}")))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_session_id_is_rejected() {
        let app = super::router().layer(Extension(test_state(FakeFactory::replying("ok"))));
        let response = app
            .oneshot(empty_request("POST", "/api/v1/sessions/not-a-uuid/reset"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = response_body_json(response).await;
        assert_eq!(body.get("error").and_then(|v| v.as_str()), Some("invalid session id"));
    }

    #[tokio::test]
    async fn empty_key_removes_credential() {
        let state = test_state(FakeFactory::replying("ok"));
        let id = state.sessions.create().id;
        let app = super::router().layer(Extension(state.clone()));
        let uri = format!("/api/v1/sessions/{id}/credentials");

        let response = app
            .clone()
            .oneshot(json_request(
                "PUT",
                &uri,
                json!({ "provider": "DeepSeek", "api_key": "sk-live" }),
            ))
            .await
            .expect("response");
        let body = response_body_json(response).await;
        assert_eq!(body.get("provider").and_then(|v| v.as_str()), Some("deepseek"));
        assert_eq!(body.get("configured").and_then(|v| v.as_bool()), Some(true));
        assert!(!body.to_string().contains("sk-live"));

        let response = app
            .oneshot(json_request(
                "PUT",
                &uri,
                json!({ "provider": "deepseek", "api_key": "" }),
            ))
            .await
            .expect("response");
        let body = response_body_json(response).await;
        assert_eq!(body.get("configured").and_then(|v| v.as_bool()), Some(false));
        let remaining = state
            .sessions
            .with_session(id, |s| s.credentials.len())
            .expect("session");
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn unknown_provider_is_rejected() {
        let state = test_state(FakeFactory::replying("ok"));
        let id = state.sessions.create().id;
        let app = super::router().layer(Extension(state));
        let response = app
            .oneshot(json_request(
                "PUT",
                &format!("/api/v1/sessions/{id}/credentials"),
                json!({ "provider": "midjourney", "api_key": "k" }),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
