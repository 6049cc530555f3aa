//! BYO-key model clients for Visual Workshop.
//!
//! One adapter per upstream wire protocol behind the [`ChatBackend`] trait,
//! plus the static provider descriptor table.

mod client;
mod error;
mod gemini;
mod openai;
mod provider;
mod types;

pub use client::{BackendFactory, ChatBackend, HttpBackendFactory, LlmClient};
pub use error::{LlmError, Result};
pub use gemini::GeminiClient;
pub use openai::OpenAiCompatibleClient;
pub use provider::{PROVIDERS, ProviderConfig, ProviderDescriptor, ProviderKind, find_provider};
pub use types::{ChatMessage, ChatOptions, ChatRequest, ChatResponse, InlineImage, Role, Usage};
