use crate::content::UserContent;
use crate::error::{PromptError, Result};
use crate::task::{OutputMode, PromptTask, TaskKind};
use crate::templates;
use std::collections::BTreeMap;
use vw_llm::{ChatOptions, InlineImage, ProviderConfig};

/// A fully rendered call, ready for a backend.
#[derive(Debug, Clone)]
pub struct PromptRequest {
    pub provider: ProviderConfig,
    pub task: PromptTask,
    pub content: UserContent,
    pub model: String,
    pub system: Option<String>,
    pub prompt: String,
    pub image: Option<InlineImage>,
    pub options: ChatOptions,
}

impl PromptRequest {
    pub fn kind(&self) -> TaskKind {
        self.task.kind()
    }
}

/// Renders `task` against `content` and `style` for `provider`.
///
/// `style` overrides the task's own style parameters. The user text is
/// available to templates as `{content}`. For image tasks the text is an
/// optional note appended after the rendered template.
pub fn build_request(
    provider: &ProviderConfig,
    task: &PromptTask,
    content: UserContent,
    style: &BTreeMap<String, String>,
) -> Result<PromptRequest> {
    if content.is_empty() {
        return Err(PromptError::EmptyContent);
    }

    let kind = task.kind();
    let image = if kind.needs_vision() {
        let image = content
            .image
            .clone()
            .ok_or(PromptError::ImageRequired(kind.as_str()))?;
        Some(image)
    } else {
        if content.trimmed_text().is_none() {
            return Err(PromptError::EmptyContent);
        }
        None
    };

    let model = provider
        .model_for(kind.needs_vision())
        .ok_or_else(|| PromptError::VisionUnsupported(provider.name.clone()))?
        .to_string();

    let mut params = task.style_parameters().clone();
    params.extend(style.iter().map(|(k, v)| (k.clone(), v.clone())));
    let text = content.trimmed_text().unwrap_or_default().to_string();
    params.insert("content".to_string(), text.clone());

    let mut prompt = templates::render(task.template_text(), &params)?;
    if kind.needs_vision() && !text.is_empty() {
        prompt.push_str("\n\n");
        prompt.push_str(&text);
    }

    let options = ChatOptions {
        temperature: task.temperature(),
        json_mode: task.output_mode() == OutputMode::Structured,
    };

    tracing::debug!(
        provider = %provider.name,
        model = %model,
        task = %kind,
        prompt_chars = prompt.chars().count(),
        has_image = image.is_some(),
        "prompt request built"
    );

    Ok(PromptRequest {
        provider: provider.clone(),
        task: task.clone(),
        content,
        model,
        system: task.system_prompt().map(str::to_string),
        prompt,
        image,
        options,
    })
}

/// Convenience for the common single `style` parameter.
pub fn style_map(style: &str) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    map.insert("style".to_string(), style.trim().to_string());
    map
}
