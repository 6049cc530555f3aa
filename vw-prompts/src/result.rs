use crate::error::FormatError;
use crate::structured::{self, CharacterSheet, ImageAnalysis, Storyboard, StructuredOutput};
use crate::task::TaskKind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No key configured; nothing was sent.
    MissingCredential,
    /// Network, auth, rate-limit or provider-side failure.
    Transport,
    /// Reply was not the JSON that was asked for.
    Format,
}

impl ErrorKind {
    /// Whether re-running the same action can reasonably succeed.
    pub fn retryable(self) -> bool {
        !matches!(self, ErrorKind::MissingCredential)
    }
}

/// Outcome of one gateway call, ready for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptResult {
    pub task: TaskKind,
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    pub success: bool,
    #[serde(default)]
    pub raw_text: Option<String>,
    #[serde(default)]
    pub parsed_json: Option<Map<String, Value>>,
    #[serde(default)]
    pub error_kind: Option<ErrorKind>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl PromptResult {
    pub fn text(task: TaskKind, provider: &str, model: &str, raw_text: String) -> Self {
        Self {
            task,
            provider: provider.to_string(),
            model: Some(model.to_string()),
            success: true,
            raw_text: Some(raw_text),
            parsed_json: None,
            error_kind: None,
            error_message: None,
        }
    }

    pub fn failure(
        task: TaskKind,
        provider: &str,
        model: Option<&str>,
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            task,
            provider: provider.to_string(),
            model: model.map(str::to_string),
            success: false,
            raw_text: None,
            parsed_json: None,
            error_kind: Some(kind),
            error_message: Some(message.into()),
        }
    }

    /// Parses `raw_text` as JSON, checks it against the task's schema and
    /// records the outcome on `self`.
    ///
    /// On failure the result is flagged as a format error; the raw text is kept.
    pub fn into_structured(mut self) -> Self {
        if !self.success {
            return self;
        }
        let raw = self.raw_text.clone().unwrap_or_default();
        let checked = structured::parse_structured(&raw).and_then(|map| {
            match self.task {
                TaskKind::ImageToPrompt => ImageAnalysis::from_map(map.clone(), &raw).map(|_| ()),
                TaskKind::ScriptToStoryboard => Storyboard::from_map(map.clone(), &raw).map(|_| ()),
                TaskKind::CharacterSheet => CharacterSheet::from_map(map.clone(), &raw).map(|_| ()),
            }
            .map(|()| map)
        });
        match checked {
            Ok(map) => self.parsed_json = Some(map),
            Err(e) => {
                self.success = false;
                self.error_kind = Some(ErrorKind::Format);
                self.error_message = Some(e.to_string());
            }
        }
        self
    }

    pub fn parse_structured(&self) -> Result<Map<String, Value>, FormatError> {
        if let Some(map) = &self.parsed_json {
            return Ok(map.clone());
        }
        let raw = self.raw_text.as_deref().unwrap_or_default();
        structured::parse_structured(raw)
    }

    pub fn decode<T: StructuredOutput>(&self) -> Result<T, FormatError> {
        let raw = self.raw_text.as_deref().unwrap_or_default();
        let map = self.parse_structured()?;
        T::from_map(map, raw)
    }

    pub fn is_missing_credential(&self) -> bool {
        self.error_kind == Some(ErrorKind::MissingCredential)
    }
}
