use crate::server::AppState;
use axum::routing::get;
use axum::{Extension, Json};
use std::sync::Arc;
use vw_llm::PROVIDERS;
use vw_prompts::TaskKind;

pub fn router() -> axum::Router {
    axum::Router::new()
        .route("/api/v1/providers", get(list_providers))
        .route("/api/v1/tasks", get(list_tasks))
}

/// Provider table with config overrides applied. Keys are never included.
#[tracing::instrument(level = "debug", skip_all)]
async fn list_providers(Extension(state): Extension<Arc<AppState>>) -> Json<serde_json::Value> {
    let defaults = &state.config.defaults;
    let mut providers = Vec::with_capacity(PROVIDERS.len());
    for descriptor in PROVIDERS {
        let resolved = match state.config.provider_config(descriptor.id, "") {
            Ok(resolved) => resolved,
            Err(e) => {
                return Json(serde_json::json!({ "status": "error", "error": e.to_string() }));
            }
        };
        providers.push(serde_json::json!({
            "id": descriptor.id,
            "display_name": descriptor.display_name,
            "kind": resolved.kind,
            "base_url": resolved.endpoint_base(),
            "text_model": resolved.text_model,
            "vision_model": resolved.vision_model,
            "supports_vision": resolved.supports_vision,
        }));
    }
    Json(serde_json::json!({
        "status": "ok",
        "providers": providers,
        "defaults": {
            "text_provider": defaults.text_provider,
            "vision_provider": defaults.vision_provider,
            "output_mode": defaults.output_mode,
        },
    }))
}

#[tracing::instrument(level = "debug", skip_all)]
async fn list_tasks() -> Json<serde_json::Value> {
    let tasks: Vec<serde_json::Value> = TaskKind::ALL
        .iter()
        .map(|kind| {
            serde_json::json!({
                "kind": kind,
                "needs_vision": kind.needs_vision(),
                "style_presets": kind.style_presets(),
            })
        })
        .collect();
    Json(serde_json::json!({
        "status": "ok",
        "tasks": tasks,
        "output_modes": ["free_text", "structured"],
    }))
}
