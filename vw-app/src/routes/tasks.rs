use crate::routes::{
    error_response, json_rejection_response, multipart_rejection_response, parse_session_id,
    prompt_error_response, result_response, session_not_found,
};
use crate::server::AppState;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::post;
use axum::{Extension, Json};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use vw_llm::find_provider;
use vw_prompts::{
    OutputMode, PromptTask, TaskKind, UserContent, build_request, encode_upload, style_map,
};

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct StoryboardRequest {
    script: String,
    #[serde(default)]
    style: String,
    #[serde(default)]
    provider: Option<String>,
    #[serde(default)]
    mode: Option<OutputMode>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CharacterSheetRequest {
    description: String,
    #[serde(default)]
    style: String,
    #[serde(default)]
    provider: Option<String>,
    #[serde(default)]
    mode: Option<OutputMode>,
}

pub fn router() -> axum::Router {
    axum::Router::new()
        .route(
            "/api/v1/sessions/{id}/tasks/image-to-prompt",
            post(image_to_prompt),
        )
        .route("/api/v1/sessions/{id}/tasks/storyboard", post(storyboard))
        .route(
            "/api/v1/sessions/{id}/tasks/character-sheet",
            post(character_sheet),
        )
}

/// Multipart fields: `image` (file), optional `note`, `provider`, `mode`.
#[tracing::instrument(level = "info", skip_all)]
async fn image_to_prompt(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let id = match parse_session_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let mut multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => return multipart_rejection_response(rejection),
    };

    let mut image = None;
    let mut note = None;
    let mut provider = None;
    let mut mode = None;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return error_response(e.status(), "invalid_input", format!("multipart: {e}"));
            }
        };
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let file_name = field.file_name().map(str::to_string);
                let bytes = match field.bytes().await {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        return error_response(e.status(), "invalid_input", format!("multipart: {e}"));
                    }
                };
                match encode_upload(&bytes, file_name.as_deref()) {
                    Ok(encoded) => image = Some(encoded),
                    Err(e) => return prompt_error_response(e),
                }
            }
            "note" | "provider" | "mode" => {
                let value = match field.text().await {
                    Ok(value) => value,
                    Err(e) => {
                        return error_response(e.status(), "invalid_input", format!("multipart: {e}"));
                    }
                };
                match name.as_str() {
                    "note" => note = Some(value),
                    "provider" => provider = Some(value).filter(|v| !v.trim().is_empty()),
                    _ => match parse_mode(&value) {
                        Some(parsed) => mode = Some(parsed),
                        None => {
                            return error_response(
                                StatusCode::BAD_REQUEST,
                                "invalid_input",
                                format!("unknown mode {:?}", value.trim()),
                            );
                        }
                    },
                }
            }
            other => {
                tracing::debug!(field = other, "ignoring unknown multipart field");
            }
        }
    }

    let Some(image) = image else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "empty_content",
            "please upload an image first",
        );
    };
    let mut content = UserContent::image(image);
    if let Some(note) = note {
        content = content.with_note(note);
    }
    run_task(&state, id, TaskKind::ImageToPrompt, provider, mode, content, "").await
}

#[tracing::instrument(level = "info", skip_all)]
async fn storyboard(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
    req: Result<Json<StoryboardRequest>, JsonRejection>,
) -> Response {
    let id = match parse_session_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let Json(req) = match req {
        Ok(req) => req,
        Err(rejection) => return json_rejection_response(rejection),
    };
    run_task(
        &state,
        id,
        TaskKind::ScriptToStoryboard,
        req.provider,
        req.mode,
        UserContent::text(req.script),
        &req.style,
    )
    .await
}

#[tracing::instrument(level = "info", skip_all)]
async fn character_sheet(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
    req: Result<Json<CharacterSheetRequest>, JsonRejection>,
) -> Response {
    let id = match parse_session_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let Json(req) = match req {
        Ok(req) => req,
        Err(rejection) => return json_rejection_response(rejection),
    };
    run_task(
        &state,
        id,
        TaskKind::CharacterSheet,
        req.provider,
        req.mode,
        UserContent::text(req.description),
        &req.style,
    )
    .await
}

async fn run_task(
    state: &AppState,
    id: Uuid,
    kind: TaskKind,
    provider: Option<String>,
    mode: Option<OutputMode>,
    content: UserContent,
    style: &str,
) -> Response {
    let defaults = &state.config.defaults;
    let requested = provider.unwrap_or_else(|| {
        if kind.needs_vision() {
            defaults.vision_provider.clone()
        } else {
            defaults.text_provider.clone()
        }
    });
    let Some(descriptor) = find_provider(&requested) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "invalid_input",
            format!("unknown provider {:?}", requested.trim()),
        );
    };

    // Lookup only; the shard lock must be released before the upstream call.
    let stored = match state
        .sessions
        .with_session(id, |s| s.credential(descriptor.id).cloned())
    {
        Some(stored) => stored,
        None => return session_not_found(),
    };
    let provider_config = match stored {
        Some(config) => config,
        None => match state.config.provider_config(descriptor.id, "") {
            Ok(config) => config,
            Err(e) => {
                return error_response(StatusCode::BAD_REQUEST, "invalid_input", e.to_string());
            }
        },
    };

    let style = match style.trim() {
        "" => kind.style_presets().first().copied().unwrap_or_default(),
        s => s,
    };
    let task = PromptTask::builtin(kind, mode.unwrap_or(defaults.output_mode));
    let request = match build_request(&provider_config, &task, content, &style_map(style)) {
        Ok(request) => request,
        Err(e) => return prompt_error_response(e),
    };

    let result = state.gateway.send(&request).await;
    if state
        .sessions
        .with_session(id, |s| s.results.record(result.clone()))
        .is_none()
    {
        tracing::warn!(session_id = %id, "session ended before result was recorded");
    }
    result_response(result)
}

fn parse_mode(raw: &str) -> Option<OutputMode> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "free_text" | "text" => Some(OutputMode::FreeText),
        "structured" | "json" => Some(OutputMode::Structured),
        _ => None,
    }
}
