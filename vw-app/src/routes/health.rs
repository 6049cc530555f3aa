use crate::server::AppState;
use axum::routing::get;
use axum::{Extension, Json};
use chrono::Utc;
use std::sync::Arc;

pub fn router() -> axum::Router {
    axum::Router::new().route("/api/v1/health", get(get_health))
}

#[tracing::instrument(level = "debug", skip_all)]
async fn get_health(Extension(state): Extension<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "checked_at": Utc::now(),
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "sessions": state.sessions.list().len(),
    }))
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::{empty_request, response_body_json};
    use crate::testing::{FakeFactory, test_state};
    use axum::Extension;
    use axum::http::StatusCode;
    use tower::util::ServiceExt;

    #[tokio::test]
    async fn health_reports_ok() {
        let state = test_state(FakeFactory::replying("ok"));
        state.sessions.create();
        let app = super::router().layer(Extension(state));
        let response = app
            .oneshot(empty_request("GET", "/api/v1/health"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = response_body_json(response).await;
        assert_eq!(body.get("status").and_then(|v| v.as_str()), Some("ok"));
        assert_eq!(body.get("sessions").and_then(|v| v.as_u64()), Some(1));
    }
}
