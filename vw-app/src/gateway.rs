//! Prompt request gateway: one upstream call per user action.
//!
//! Every failure is folded into the returned [`PromptResult`]; nothing
//! propagates to the caller and nothing is retried.

use std::sync::Arc;
use std::time::Instant;
use vw_llm::{BackendFactory, LlmError};
use vw_prompts::{ErrorKind, OutputMode, PromptRequest, PromptResult};

#[derive(Clone)]
pub struct Gateway {
    factory: Arc<dyn BackendFactory>,
}

impl Gateway {
    pub fn new(factory: Arc<dyn BackendFactory>) -> Self {
        Self { factory }
    }

    #[tracing::instrument(
        level = "info",
        skip_all,
        fields(provider = %request.provider.name, model = %request.model, task = %request.kind())
    )]
    pub async fn send(&self, request: &PromptRequest) -> PromptResult {
        let kind = request.kind();
        let provider = request.provider.name.as_str();

        if !request.provider.has_credential() {
            tracing::warn!("no api key configured; request not sent");
            return PromptResult::failure(
                kind,
                provider,
                Some(&request.model),
                ErrorKind::MissingCredential,
                format!("please configure the {provider} API key first"),
            );
        }

        let backend = match self.factory.build(&request.provider) {
            Ok(backend) => backend,
            Err(e) => return failure_from_llm(request, e),
        };

        let started = Instant::now();
        let outcome = match &request.image {
            Some(image) => {
                backend
                    .send_vision(
                        &request.model,
                        request.system.as_deref(),
                        &request.prompt,
                        image.clone(),
                        request.options,
                    )
                    .await
            }
            None => {
                backend
                    .send_text(
                        &request.model,
                        request.system.as_deref(),
                        &request.prompt,
                        request.options,
                    )
                    .await
            }
        };
        let latency_ms = started.elapsed().as_millis() as u64;

        let text = match outcome {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, latency_ms, "upstream call failed");
                return failure_from_llm(request, e);
            }
        };
        tracing::info!(latency_ms, reply_chars = text.chars().count(), "upstream call completed");

        let result = PromptResult::text(kind, provider, &request.model, text);
        if request.task.output_mode() == OutputMode::Structured {
            let result = result.into_structured();
            if !result.success {
                tracing::warn!(
                    error = result.error_message.as_deref().unwrap_or_default(),
                    "structured reply rejected"
                );
            }
            return result;
        }
        result
    }
}

fn failure_from_llm(request: &PromptRequest, e: LlmError) -> PromptResult {
    let provider = request.provider.name.as_str();
    let kind = match e {
        LlmError::MissingCredential(_) => ErrorKind::MissingCredential,
        _ => ErrorKind::Transport,
    };
    PromptResult::failure(
        request.kind(),
        provider,
        Some(&request.model),
        kind,
        format!("{provider} call failed: {e}"),
    )
}
