//! In-process fakes shared by gateway and route tests.

use crate::config::WorkshopConfig;
use crate::server::AppState;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use vw_llm::{
    BackendFactory, ChatBackend, ChatRequest, ChatResponse, LlmError, ProviderConfig, Usage,
};
use vw_prompts::{OutputMode, PromptRequest, PromptTask, TaskKind, UserContent, build_request, style_map};

pub(crate) const TINY_JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

pub(crate) struct FakeFactory {
    reply: Result<String, String>,
    builds: AtomicUsize,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl FakeFactory {
    pub(crate) fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(text.to_string()),
            builds: AtomicUsize::new(0),
            requests: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub(crate) fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(message.to_string()),
            builds: AtomicUsize::new(0),
            requests: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub(crate) fn calls(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub(crate) fn last_request(&self) -> Option<ChatRequest> {
        self.requests.lock().expect("requests lock").last().cloned()
    }
}

impl BackendFactory for FakeFactory {
    fn build(&self, config: &ProviderConfig) -> vw_llm::Result<Arc<dyn ChatBackend>> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeBackend {
            provider: config.name.clone(),
            supports_vision: config.supports_vision,
            reply: self.reply.clone(),
            requests: self.requests.clone(),
        }))
    }
}

struct FakeBackend {
    provider: String,
    supports_vision: bool,
    reply: Result<String, String>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

#[async_trait]
impl ChatBackend for FakeBackend {
    fn provider(&self) -> &str {
        &self.provider
    }

    fn supports_vision(&self) -> bool {
        self.supports_vision
    }

    async fn chat(&self, request: &ChatRequest) -> vw_llm::Result<ChatResponse> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        match &self.reply {
            Ok(text) => Ok(ChatResponse {
                content: text.clone(),
                usage: Usage::default(),
                finish_reason: "stop".to_string(),
            }),
            Err(message) => Err(LlmError::Http(message.clone())),
        }
    }
}

pub(crate) fn request_for(
    provider: &str,
    api_key: &str,
    kind: TaskKind,
    mode: OutputMode,
    content: UserContent,
    style: &str,
) -> PromptRequest {
    let config = WorkshopConfig::default()
        .provider_config(provider, api_key)
        .expect("provider config");
    build_request(&config, &PromptTask::builtin(kind, mode), content, &style_map(style))
        .expect("build request")
}

pub(crate) fn test_state(factory: Arc<FakeFactory>) -> Arc<AppState> {
    Arc::new(AppState::new(WorkshopConfig::default(), factory))
}
