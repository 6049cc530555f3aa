//! Visual Workshop configuration loader.
//!
//! Every section is optional. API keys are never read from the file; they
//! arrive per session over the HTTP API.

use axum::http::HeaderValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use vw_llm::{ProviderConfig, find_provider};
use vw_prompts::OutputMode;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkshopConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    /// Per-provider endpoint/model overrides keyed by provider id.
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderOverride>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    /// Multipart upload cap for image tasks.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    /// Browser origins allowed to call the API. Empty disables CORS.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_bind_addr() -> String {
    "127.0.0.1:8501".to_string()
}

fn default_request_timeout_seconds() -> u64 {
    180
}

fn default_max_in_flight() -> usize {
    64
}

fn default_max_upload_bytes() -> usize {
    20 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            request_timeout_seconds: default_request_timeout_seconds(),
            max_in_flight: default_max_in_flight(),
            max_upload_bytes: default_max_upload_bytes(),
            cors_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_upstream_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_upstream_timeout_seconds() -> u64 {
    120
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_upstream_timeout_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_idle_ttl_seconds")]
    pub idle_ttl_seconds: u64,
}

fn default_idle_ttl_seconds() -> u64 {
    3600
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_ttl_seconds: default_idle_ttl_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default = "default_text_provider")]
    pub text_provider: String,
    #[serde(default = "default_vision_provider")]
    pub vision_provider: String,
    #[serde(default)]
    pub output_mode: OutputMode,
}

fn default_text_provider() -> String {
    "deepseek".to_string()
}

fn default_vision_provider() -> String {
    "qwen".to_string()
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            text_provider: default_text_provider(),
            vision_provider: default_vision_provider(),
            output_mode: OutputMode::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderOverride {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub text_model: Option<String>,
    /// Empty string disables vision for the provider.
    #[serde(default)]
    pub vision_model: Option<String>,
}

impl WorkshopConfig {
    /// Loads from `path`, else `./workshop.toml` when present, else defaults.
    pub async fn load(path: Option<PathBuf>) -> anyhow::Result<Self> {
        let (cfg, _) = Self::load_with_path(path).await?;
        Ok(cfg)
    }

    pub async fn load_with_path(path: Option<PathBuf>) -> anyhow::Result<(Self, Option<PathBuf>)> {
        let resolved = match path {
            Some(p) => Some(p),
            None => {
                let candidate = default_config_path();
                tokio::fs::try_exists(&candidate)
                    .await
                    .unwrap_or(false)
                    .then_some(candidate)
            }
        };

        let mut cfg = match &resolved {
            Some(path) => Self::from_file(path).await?,
            None => Self::default(),
        };
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok((cfg, resolved))
    }

    async fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| anyhow::anyhow!("read config {}: {e}", path.display()))?;
        toml::from_str(&contents).map_err(|e| anyhow::anyhow!("parse config {}: {e}", path.display()))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("VW_BIND_ADDR") {
            if !v.trim().is_empty() {
                self.server.bind_addr = v.trim().to_string();
            }
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.bind_addr()?;
        if self.server.request_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("server.request_timeout_seconds must be > 0"));
        }
        if self.server.max_in_flight == 0 {
            return Err(anyhow::anyhow!("server.max_in_flight must be > 0"));
        }
        if self.server.max_upload_bytes == 0 {
            return Err(anyhow::anyhow!("server.max_upload_bytes must be > 0"));
        }
        self.cors_origins()?;
        if self.upstream.timeout_seconds == 0 {
            return Err(anyhow::anyhow!("upstream.timeout_seconds must be > 0"));
        }
        if self.session.idle_ttl_seconds == 0 {
            return Err(anyhow::anyhow!("session.idle_ttl_seconds must be > 0"));
        }
        for id in self.providers.keys() {
            if find_provider(id).is_none() {
                return Err(anyhow::anyhow!("providers.{id}: unknown provider"));
            }
        }
        self.provider_config(&self.defaults.text_provider, "")
            .map_err(|e| anyhow::anyhow!("defaults.text_provider: {e}"))?;
        let vision = self
            .provider_config(&self.defaults.vision_provider, "")
            .map_err(|e| anyhow::anyhow!("defaults.vision_provider: {e}"))?;
        if !vision.supports_vision {
            return Err(anyhow::anyhow!(
                "defaults.vision_provider {:?} has no vision model",
                self.defaults.vision_provider
            ));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        self.server
            .bind_addr
            .parse()
            .map_err(|e| anyhow::anyhow!("server.bind_addr {:?}: {e}", self.server.bind_addr))
    }

    pub fn cors_origins(&self) -> anyhow::Result<Vec<HeaderValue>> {
        self.server
            .cors_origins
            .iter()
            .map(|o| {
                o.trim()
                    .parse::<HeaderValue>()
                    .map_err(|e| anyhow::anyhow!("server.cors_origins {o:?}: {e}"))
            })
            .collect()
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream.timeout_seconds)
    }

    pub fn session_idle_ttl(&self) -> Duration {
        Duration::from_secs(self.session.idle_ttl_seconds)
    }

    /// Resolves a provider id to a config with overrides applied.
    pub fn provider_config(&self, id: &str, api_key: &str) -> anyhow::Result<ProviderConfig> {
        let descriptor =
            find_provider(id).ok_or_else(|| anyhow::anyhow!("unknown provider {:?}", id.trim()))?;
        let mut cfg = ProviderConfig::from_descriptor(descriptor, api_key);
        if let Some(o) = self.providers.get(descriptor.id) {
            if let Some(url) = o.base_url.as_deref().filter(|s| !s.trim().is_empty()) {
                cfg = cfg.with_base_url(url.trim());
            }
            if let Some(model) = o.text_model.as_deref().filter(|s| !s.trim().is_empty()) {
                cfg = cfg.with_text_model(model.trim());
            }
            if let Some(model) = o.vision_model.as_deref() {
                let model = model.trim();
                cfg = cfg.with_vision_model((!model.is_empty()).then(|| model.to_string()));
            }
        }
        Ok(cfg)
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("workshop.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let cfg: WorkshopConfig = toml::from_str("").expect("parse empty config");
        cfg.validate().expect("defaults are valid");
        assert_eq!(cfg.server.bind_addr, "127.0.0.1:8501");
        assert_eq!(cfg.defaults.text_provider, "deepseek");
        assert_eq!(cfg.defaults.vision_provider, "qwen");
        assert_eq!(cfg.defaults.output_mode, OutputMode::FreeText);
    }

    #[test]
    fn example_config_is_valid() {
        let cfg: WorkshopConfig = toml::from_str(include_str!("../../workshop.example.toml"))
            .expect("parse example config");
        cfg.validate().expect("example config is valid");
        assert_eq!(cfg.server.max_upload_bytes, default_max_upload_bytes());
    }

    #[test]
    fn overrides_apply_to_provider_config() {
        let cfg: WorkshopConfig = toml::from_str(
            r#"
[providers.siliconflow]
base_url = "https://proxy.example.com/v1/"
text_model = "Qwen/Qwen2.5-72B-Instruct"

[providers.qwen]
vision_model = ""
"#,
        )
        .expect("parse config");

        let sf = cfg.provider_config("siliconflow", "k").expect("siliconflow");
        assert_eq!(sf.base_url, "https://proxy.example.com/v1/");
        assert_eq!(sf.endpoint_base(), "https://proxy.example.com/v1");
        assert_eq!(sf.text_model, "Qwen/Qwen2.5-72B-Instruct");

        let qwen = cfg.provider_config("qwen", "k").expect("qwen");
        assert!(!qwen.supports_vision);
        let err = cfg.validate().expect_err("vision default lost vision");
        assert!(err.to_string().contains("no vision model"));
    }

    #[test]
    fn unknown_provider_section_is_rejected() {
        let cfg: WorkshopConfig =
            toml::from_str("[providers.midjourney]\nbase_url = \"x\"\n").expect("parse config");
        let err = cfg.validate().expect_err("unknown provider");
        assert!(err.to_string().contains("providers.midjourney"));
    }

    #[test]
    fn text_only_vision_default_is_rejected() {
        let cfg: WorkshopConfig =
            toml::from_str("[defaults]\nvision_provider = \"deepseek\"\n").expect("parse config");
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_timeouts_are_rejected() {
        let cfg: WorkshopConfig =
            toml::from_str("[upstream]\ntimeout_seconds = 0\n").expect("parse config");
        let err = cfg.validate().expect_err("zero timeout");
        assert!(err.to_string().contains("upstream.timeout_seconds"));
    }

    #[test]
    fn cors_origins_must_be_header_values() {
        let cfg: WorkshopConfig = toml::from_str(
            "[server]\ncors_origins = [\"http://localhost:5173\", \"bad\\norigin\"]\n",
        )
        .expect("parse config");
        let err = cfg.validate().expect_err("bad origin");
        assert!(err.to_string().contains("server.cors_origins"));
    }

    #[tokio::test]
    async fn load_reads_explicit_path() {
        let path = std::env::temp_dir().join(format!(
            "visual-workshop-{}.toml",
            uuid::Uuid::new_v4()
        ));
        tokio::fs::write(&path, "[server]\nbind_addr = \"127.0.0.1:9100\"\n")
            .await
            .expect("write config");
        let (cfg, resolved) = WorkshopConfig::load_with_path(Some(path.clone()))
            .await
            .expect("load config");
        assert_eq!(resolved.as_deref(), Some(path.as_path()));
        assert_eq!(cfg.server.max_in_flight, 64);
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn load_fails_for_missing_explicit_path() {
        let path = std::env::temp_dir().join(format!("missing-{}.toml", uuid::Uuid::new_v4()));
        let err = WorkshopConfig::load(Some(path)).await.expect_err("missing file");
        assert!(err.to_string().contains("read config"));
    }
}
