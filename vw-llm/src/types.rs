use crate::error::{LlmError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Image carried inline with a message as base64 text.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineImage {
    pub mime_type: String,
    /// Standard base64, no `data:` prefix.
    pub data: String,
}

impl InlineImage {
    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: STANDARD.encode(bytes),
        }
    }

    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    pub fn parse_data_uri(uri: &str) -> Result<Self> {
        let rest = uri
            .trim()
            .strip_prefix("data:")
            .ok_or_else(|| LlmError::InvalidInput("data uri must start with data:".to_string()))?;
        let (meta, data) = rest
            .split_once(',')
            .ok_or_else(|| LlmError::InvalidInput("data uri missing ',' separator".to_string()))?;
        let mime_type = meta.strip_suffix(";base64").ok_or_else(|| {
            LlmError::InvalidInput(format!("data uri is not base64 encoded: {meta:?}"))
        })?;
        if mime_type.is_empty() {
            return Err(LlmError::InvalidInput(
                "data uri missing mime type".to_string(),
            ));
        }
        Ok(Self {
            mime_type: mime_type.to_string(),
            data: data.to_string(),
        })
    }

    pub fn decode(&self) -> Result<Vec<u8>> {
        STANDARD
            .decode(self.data.as_bytes())
            .map_err(|e| LlmError::InvalidInput(format!("invalid base64 image data: {e}")))
    }
}

impl std::fmt::Debug for InlineImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InlineImage")
            .field("mime_type", &self.mime_type)
            .field("data_len", &self.data.len())
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub images: Vec<InlineImage>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            images: Vec::new(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            images: Vec::new(),
        }
    }

    pub fn user_with_image(content: impl Into<String>, image: InlineImage) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            images: vec![image],
        }
    }
}

/// Per-call knobs. Anything left unset is omitted from the upstream request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatOptions {
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Ask the provider for a JSON object response.
    #[serde(default)]
    pub json_mode: bool,
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub options: ChatOptions,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            options: ChatOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }

    pub fn has_images(&self) -> bool {
        self.messages.iter().any(|m| !m.images.is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: String,
    pub usage: Usage,
    pub finish_reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uri_round_trips_original_bytes() {
        let bytes: Vec<u8> = (0u8..=255).chain([0xFF, 0xD8, 0xFF, 0x00]).collect();
        let image = InlineImage::from_bytes("image/jpeg", &bytes);
        let uri = image.data_uri();
        assert!(uri.starts_with("data:image/jpeg;base64,"));

        let parsed = InlineImage::parse_data_uri(&uri).expect("parse data uri");
        assert_eq!(parsed, image);
        assert_eq!(parsed.decode().expect("decode"), bytes);
    }

    #[test]
    fn parse_data_uri_rejects_non_base64_payload() {
        let err = InlineImage::parse_data_uri("data:text/plain,hello").expect_err("must fail");
        assert!(err.to_string().contains("not base64"));
    }

    #[test]
    fn debug_output_omits_image_payload() {
        let image = InlineImage::from_bytes("image/png", b"secret-pixels");
        let rendered = format!("{image:?}");
        assert!(!rendered.contains(&image.data));
        assert!(rendered.contains("image/png"));
    }
}
