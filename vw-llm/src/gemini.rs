use crate::error::{LlmError, Result};
use crate::types::{ChatMessage, ChatRequest, ChatResponse, Role, Usage};
use serde::{Deserialize, Serialize};

#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(http: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn generate_url(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    #[tracing::instrument(level = "info", skip_all, fields(model = %request.model))]
    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let req = GeminiRequest::from_request(request);

        // Header auth keeps the key out of request URLs and logs.
        let response = self
            .http
            .post(self.generate_url(&request.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&req)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(LlmError::Http(format!(
                "gemini generateContent status={status} body={body}"
            )));
        }

        let parsed: GeminiResponse = serde_json::from_str(&body)?;
        parsed.try_into()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

impl GeminiRequest {
    fn from_request(request: &ChatRequest) -> Self {
        let system_text: Vec<&str> = request
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();
        let system_instruction = (!system_text.is_empty()).then(|| GeminiContent {
            role: None,
            parts: vec![GeminiPart::Text {
                text: system_text.join("\n\n"),
            }],
        });

        let contents = request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(to_gemini_content)
            .collect();

        let options = &request.options;
        let generation_config =
            (options.temperature.is_some() || options.json_mode).then(|| GeminiGenerationConfig {
                temperature: options.temperature,
                response_mime_type: options
                    .json_mode
                    .then(|| "application/json".to_string()),
            });

        Self {
            system_instruction,
            contents,
            generation_config,
        }
    }
}

fn to_gemini_content(m: &ChatMessage) -> GeminiContent {
    let role = match m.role {
        Role::Assistant => "model",
        Role::System | Role::User => "user",
    };
    let mut parts = Vec::with_capacity(1 + m.images.len());
    if !m.content.is_empty() {
        parts.push(GeminiPart::Text {
            text: m.content.clone(),
        });
    }
    parts.extend(m.images.iter().map(|img| GeminiPart::Inline {
        inline_data: GeminiInlineData {
            mime_type: img.mime_type.clone(),
            data: img.data.clone(),
        },
    }));
    GeminiContent {
        role: Some(role.to_string()),
        parts,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: Option<GeminiUsage>,
    #[serde(default)]
    prompt_feedback: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiCandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiCandidatePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

impl TryFrom<GeminiResponse> for ChatResponse {
    type Error = LlmError;

    fn try_from(v: GeminiResponse) -> Result<Self> {
        let Some(candidate) = v.candidates.into_iter().next() else {
            let feedback = v
                .prompt_feedback
                .map(|f| f.to_string())
                .unwrap_or_else(|| "none".to_string());
            return Err(LlmError::ResponseFormat(format!(
                "gemini response missing candidates (prompt_feedback={feedback})"
            )));
        };

        let content: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        let usage = v.usage_metadata.map_or_else(Usage::default, |u| Usage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
        });

        Ok(ChatResponse {
            content,
            usage,
            finish_reason: candidate
                .finish_reason
                .unwrap_or_else(|| "unknown".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChatOptions, InlineImage};

    #[test]
    fn system_messages_move_to_system_instruction() {
        let request = ChatRequest::new(
            "gemini-1.5-flash",
            vec![
                ChatMessage::system("you are a director"),
                ChatMessage::user("storyboard this"),
            ],
        );
        let body =
            serde_json::to_value(GeminiRequest::from_request(&request)).expect("serialize");

        assert_eq!(
            body["systemInstruction"]["parts"][0]["text"],
            "you are a director"
        );
        let contents = body["contents"].as_array().expect("contents");
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[0]["parts"][0]["text"], "storyboard this");
        assert!(body.get("generationConfig").is_none());
    }

    #[test]
    fn images_become_inline_data_parts() {
        let image = InlineImage::from_bytes("image/png", b"\x89PNG");
        let request = ChatRequest::new(
            "gemini-1.5-flash",
            vec![ChatMessage::user_with_image("describe", image.clone())],
        )
        .with_options(ChatOptions {
            temperature: Some(0.4),
            json_mode: true,
        });
        let body =
            serde_json::to_value(GeminiRequest::from_request(&request)).expect("serialize");

        let parts = body["contents"][0]["parts"].as_array().expect("parts");
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[1]["inlineData"]["data"], image.data);
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
    }

    #[test]
    fn response_text_parts_are_concatenated() {
        let raw = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "part one, "}, {"text": "part two"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 7, "candidatesTokenCount": 5}
        }"#;
        let parsed: GeminiResponse = serde_json::from_str(raw).expect("parse body");
        let resp = ChatResponse::try_from(parsed).expect("convert");
        assert_eq!(resp.content, "part one, part two");
        assert_eq!(resp.finish_reason, "STOP");
        assert_eq!(resp.usage.completion_tokens, 5);
    }

    #[test]
    fn blocked_prompt_surfaces_feedback() {
        let raw = r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#;
        let parsed: GeminiResponse = serde_json::from_str(raw).expect("parse body");
        let err = ChatResponse::try_from(parsed).expect_err("must fail");
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn generate_url_embeds_model() {
        let c = GeminiClient::new(
            reqwest::Client::new(),
            "https://generativelanguage.googleapis.com/v1beta/",
            "k",
        );
        assert_eq!(
            c.generate_url("gemini-1.5-flash"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }
}
