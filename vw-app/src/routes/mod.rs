pub mod health;
pub mod providers;
pub mod sessions;
pub mod storyboard;
pub mod tasks;

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::json;
use uuid::Uuid;
use vw_prompts::{ErrorKind, PromptError, PromptResult};

pub fn router() -> Router {
    Router::new()
        .merge(health::router())
        .merge(providers::router())
        .merge(sessions::router())
        .merge(tasks::router())
        .merge(storyboard::router())
}

pub(crate) fn error_response(
    status: StatusCode,
    error_kind: &str,
    message: impl Into<String>,
) -> Response {
    let message = message.into();
    tracing::debug!(status = status.as_u16(), error_kind, error = %message, "request rejected");
    (
        status,
        Json(json!({
            "status": "error",
            "error": message,
            "error_kind": error_kind,
        })),
    )
        .into_response()
}

fn body_rejection(status: StatusCode, message: String) -> Response {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        return error_response(status, "payload_too_large", message);
    }
    error_response(StatusCode::BAD_REQUEST, "invalid_input", message)
}

pub(crate) fn json_rejection_response(rejection: JsonRejection) -> Response {
    body_rejection(rejection.status(), rejection.body_text())
}

pub(crate) fn multipart_rejection_response(rejection: MultipartRejection) -> Response {
    body_rejection(rejection.status(), rejection.body_text())
}

pub(crate) fn parse_session_id(raw: &str) -> Result<Uuid, Response> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| error_response(StatusCode::BAD_REQUEST, "invalid_input", "invalid session id"))
}

pub(crate) fn session_not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "not_found", "session not found")
}

pub(crate) fn prompt_error_response(e: PromptError) -> Response {
    let kind = match &e {
        PromptError::EmptyContent | PromptError::ImageRequired(_) => "empty_content",
        PromptError::UnsupportedImage(_) => "unsupported_image",
        PromptError::MissingParameter(_) => "invalid_template",
        PromptError::VisionUnsupported(_) => "vision_unsupported",
    };
    error_response(StatusCode::BAD_REQUEST, kind, e.to_string())
}

pub(crate) fn result_response(result: PromptResult) -> Response {
    let Some(kind) = result.error_kind.filter(|_| !result.success) else {
        return (StatusCode::OK, Json(json!({ "status": "ok", "result": result }))).into_response();
    };
    let status = match kind {
        ErrorKind::MissingCredential => StatusCode::BAD_REQUEST,
        ErrorKind::Transport | ErrorKind::Format => StatusCode::BAD_GATEWAY,
    };
    (
        status,
        Json(json!({
            "status": "error",
            "error": result.error_message.clone().unwrap_or_default(),
            "error_kind": kind,
            "retryable": kind.retryable(),
            "result": result,
        })),
    )
        .into_response()
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::body::{Body, to_bytes};
    use axum::http::Request;

    pub(crate) async fn response_body_json(response: axum::response::Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body");
        serde_json::from_slice(&body).expect("response json")
    }

    pub(crate) fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    pub(crate) fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .expect("request")
    }
}
