use serde::{Deserialize, Serialize};

/// Upstream wire protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    OpenAiCompatible,
    Gemini,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ProviderDescriptor {
    pub id: &'static str,
    pub display_name: &'static str,
    pub kind: ProviderKind,
    pub base_url: &'static str,
    pub text_model: &'static str,
    pub vision_model: Option<&'static str>,
}

impl ProviderDescriptor {
    pub fn supports_vision(&self) -> bool {
        self.vision_model.is_some()
    }
}

pub const PROVIDERS: &[ProviderDescriptor] = &[
    ProviderDescriptor {
        id: "openai",
        display_name: "OpenAI",
        kind: ProviderKind::OpenAiCompatible,
        base_url: "https://api.openai.com/v1",
        text_model: "gpt-4o-mini",
        vision_model: Some("gpt-4o"),
    },
    ProviderDescriptor {
        id: "deepseek",
        display_name: "DeepSeek",
        kind: ProviderKind::OpenAiCompatible,
        base_url: "https://api.deepseek.com",
        text_model: "deepseek-chat",
        vision_model: None,
    },
    ProviderDescriptor {
        id: "qwen",
        display_name: "Alibaba Qwen (DashScope)",
        kind: ProviderKind::OpenAiCompatible,
        base_url: "https://dashscope.aliyuncs.com/compatible-mode/v1",
        text_model: "qwen-plus",
        vision_model: Some("qwen-vl-max"),
    },
    ProviderDescriptor {
        id: "siliconflow",
        display_name: "SiliconFlow",
        kind: ProviderKind::OpenAiCompatible,
        base_url: "https://api.siliconflow.cn/v1",
        text_model: "deepseek-ai/DeepSeek-V3",
        vision_model: Some("Qwen/Qwen2-VL-72B-Instruct"),
    },
    ProviderDescriptor {
        id: "gemini",
        display_name: "Google Gemini",
        kind: ProviderKind::Gemini,
        base_url: "https://generativelanguage.googleapis.com/v1beta",
        text_model: "gemini-1.5-flash",
        vision_model: Some("gemini-1.5-flash"),
    },
];

pub fn find_provider(id: &str) -> Option<&'static ProviderDescriptor> {
    let id = id.trim();
    PROVIDERS.iter().find(|p| p.id.eq_ignore_ascii_case(id))
}

/// Session-scoped provider credentials plus the resolved endpoint and models.
///
/// Held in memory only. `Debug` never prints the key.
#[derive(Clone)]
pub struct ProviderConfig {
    pub name: String,
    pub kind: ProviderKind,
    pub base_url: String,
    pub api_key: String,
    pub text_model: String,
    pub vision_model: Option<String>,
    pub supports_vision: bool,
}

impl ProviderConfig {
    pub fn from_descriptor(descriptor: &ProviderDescriptor, api_key: &str) -> Self {
        Self {
            name: descriptor.id.to_string(),
            kind: descriptor.kind,
            base_url: descriptor.base_url.to_string(),
            api_key: api_key.trim().to_string(),
            text_model: descriptor.text_model.to_string(),
            vision_model: descriptor.vision_model.map(str::to_string),
            supports_vision: descriptor.supports_vision(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_text_model(mut self, model: impl Into<String>) -> Self {
        self.text_model = model.into();
        self
    }

    pub fn with_vision_model(mut self, model: Option<String>) -> Self {
        self.supports_vision = model.is_some();
        self.vision_model = model;
        self
    }

    pub fn has_credential(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// Model id for a call; `None` when vision is requested but unsupported.
    pub fn model_for(&self, vision: bool) -> Option<&str> {
        if vision {
            if !self.supports_vision {
                return None;
            }
            return self.vision_model.as_deref();
        }
        Some(self.text_model.as_str())
    }

    pub fn endpoint_base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let key = if self.has_credential() {
            "<redacted>"
        } else {
            "<empty>"
        };
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("base_url", &self.base_url)
            .field("api_key", &key)
            .field("text_model", &self.text_model)
            .field("vision_model", &self.vision_model)
            .field("supports_vision", &self.supports_vision)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_ids_are_unique_and_lookup_is_case_insensitive() {
        let mut ids: Vec<_> = PROVIDERS.iter().map(|p| p.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), PROVIDERS.len());

        let qwen = find_provider(" QWEN ").expect("qwen descriptor");
        assert_eq!(qwen.vision_model, Some("qwen-vl-max"));
        assert!(find_provider("unknown").is_none());
    }

    #[test]
    fn deepseek_has_no_vision_model() {
        let deepseek = find_provider("deepseek").expect("deepseek descriptor");
        let cfg = ProviderConfig::from_descriptor(deepseek, "sk-test");
        assert!(!cfg.supports_vision);
        assert_eq!(cfg.model_for(true), None);
        assert_eq!(cfg.model_for(false), Some("deepseek-chat"));
    }

    #[test]
    fn whitespace_key_counts_as_missing() {
        let openai = find_provider("openai").expect("openai descriptor");
        assert!(!ProviderConfig::from_descriptor(openai, "   \t").has_credential());
        assert!(ProviderConfig::from_descriptor(openai, "sk-1").has_credential());
    }

    #[test]
    fn debug_redacts_api_key() {
        let openai = find_provider("openai").expect("openai descriptor");
        let cfg = ProviderConfig::from_descriptor(openai, "sk-very-secret");
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("sk-very-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn vision_override_toggles_support() {
        let deepseek = find_provider("deepseek").expect("deepseek descriptor");
        let cfg = ProviderConfig::from_descriptor(deepseek, "k")
            .with_vision_model(Some("deepseek-vl".to_string()));
        assert!(cfg.supports_vision);
        assert_eq!(cfg.model_for(true), Some("deepseek-vl"));
    }
}
