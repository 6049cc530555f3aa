use crate::error::{LlmError, Result};
use crate::gemini::GeminiClient;
use crate::openai::OpenAiCompatibleClient;
use crate::provider::{ProviderConfig, ProviderKind};
use crate::types::{ChatMessage, ChatOptions, ChatRequest, ChatResponse, InlineImage};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Capability seam between the gateway and an upstream model API.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    fn provider(&self) -> &str;

    fn supports_vision(&self) -> bool;

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse>;

    async fn send_text(
        &self,
        model: &str,
        system: Option<&str>,
        prompt: &str,
        options: ChatOptions,
    ) -> Result<String> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(prompt));
        let resp = self
            .chat(&ChatRequest::new(model, messages).with_options(options))
            .await?;
        Ok(resp.content)
    }

    async fn send_vision(
        &self,
        model: &str,
        system: Option<&str>,
        prompt: &str,
        image: InlineImage,
        options: ChatOptions,
    ) -> Result<String> {
        if !self.supports_vision() {
            return Err(LlmError::Unsupported(format!(
                "provider {} has no vision model",
                self.provider()
            )));
        }
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user_with_image(prompt, image));
        let resp = self
            .chat(&ChatRequest::new(model, messages).with_options(options))
            .await?;
        Ok(resp.content)
    }
}

/// Builds a backend for a provider config. Swapped for fakes in tests.
pub trait BackendFactory: Send + Sync {
    fn build(&self, config: &ProviderConfig) -> Result<Arc<dyn ChatBackend>>;
}

#[derive(Clone)]
pub struct LlmClient {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl LlmClient {
    #[tracing::instrument(level = "debug", skip_all, fields(provider = %config.name))]
    pub fn new(config: &ProviderConfig, timeout: Duration) -> Result<Self> {
        if !config.has_credential() {
            return Err(LlmError::MissingCredential(config.name.clone()));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(%e, "reqwest client build failed; falling back to default client");
                reqwest::Client::new()
            });
        Ok(Self {
            config: config.clone(),
            client,
        })
    }

    pub fn kind(&self) -> ProviderKind {
        self.config.kind
    }
}

#[async_trait]
impl ChatBackend for LlmClient {
    fn provider(&self) -> &str {
        &self.config.name
    }

    fn supports_vision(&self) -> bool {
        self.config.supports_vision
    }

    #[tracing::instrument(level = "info", skip_all, fields(provider = %self.config.name))]
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        if request.has_images() && !self.config.supports_vision {
            return Err(LlmError::Unsupported(format!(
                "provider {} has no vision model",
                self.config.name
            )));
        }
        match self.config.kind {
            ProviderKind::OpenAiCompatible => {
                let c = OpenAiCompatibleClient::new(
                    self.client.clone(),
                    self.config.endpoint_base(),
                    &self.config.api_key,
                );
                c.chat(request).await
            }
            ProviderKind::Gemini => {
                let c = GeminiClient::new(
                    self.client.clone(),
                    self.config.endpoint_base(),
                    &self.config.api_key,
                );
                c.chat(request).await
            }
        }
    }
}

/// Factory producing real HTTP clients.
#[derive(Debug, Clone)]
pub struct HttpBackendFactory {
    timeout: Duration,
}

impl HttpBackendFactory {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl BackendFactory for HttpBackendFactory {
    fn build(&self, config: &ProviderConfig) -> Result<Arc<dyn ChatBackend>> {
        Ok(Arc::new(LlmClient::new(config, self.timeout)?))
    }
}
