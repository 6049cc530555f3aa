use crate::templates;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    ImageToPrompt,
    ScriptToStoryboard,
    CharacterSheet,
}

impl TaskKind {
    pub const ALL: [TaskKind; 3] = [
        TaskKind::ImageToPrompt,
        TaskKind::ScriptToStoryboard,
        TaskKind::CharacterSheet,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::ImageToPrompt => "image_to_prompt",
            TaskKind::ScriptToStoryboard => "script_to_storyboard",
            TaskKind::CharacterSheet => "character_sheet",
        }
    }

    pub fn needs_vision(self) -> bool {
        matches!(self, TaskKind::ImageToPrompt)
    }

    /// Style choices offered by the UI for this task.
    pub fn style_presets(self) -> &'static [&'static str] {
        match self {
            TaskKind::ImageToPrompt => &[],
            TaskKind::ScriptToStoryboard => &[
                "赛博朋克 (Cyberpunk)",
                "吉卜力动漫 (Ghibli)",
                "好莱坞大片 (Cinematic)",
                "皮克斯 3D (Pixar)",
            ],
            TaskKind::CharacterSheet => &[
                "二次元 (Anime)",
                "次世代 3D (Unreal Engine 5)",
                "油画 (Oil Painting)",
                "极简线条 (Line Art)",
            ],
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Markdown report meant to be shown as-is.
    #[default]
    FreeText,
    /// A JSON object the caller parses.
    Structured,
}

/// A task template plus its default style parameters. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTask {
    kind: TaskKind,
    output_mode: OutputMode,
    template_text: String,
    system_prompt: Option<String>,
    style_parameters: BTreeMap<String, String>,
    temperature: Option<f32>,
}

impl PromptTask {
    pub fn new(kind: TaskKind, output_mode: OutputMode, template_text: impl Into<String>) -> Self {
        Self {
            kind,
            output_mode,
            template_text: template_text.into(),
            system_prompt: None,
            style_parameters: BTreeMap::new(),
            temperature: None,
        }
    }

    pub fn builtin(kind: TaskKind, output_mode: OutputMode) -> Self {
        use OutputMode::{FreeText, Structured};
        let template = match (kind, output_mode) {
            (TaskKind::ImageToPrompt, FreeText) => templates::IMAGE_TO_PROMPT_FREE,
            (TaskKind::ImageToPrompt, Structured) => templates::IMAGE_TO_PROMPT_JSON,
            (TaskKind::ScriptToStoryboard, FreeText) => templates::STORYBOARD_FREE,
            (TaskKind::ScriptToStoryboard, Structured) => templates::STORYBOARD_JSON,
            (TaskKind::CharacterSheet, FreeText) => templates::CHARACTER_SHEET_FREE,
            (TaskKind::CharacterSheet, Structured) => templates::CHARACTER_SHEET_JSON,
        };
        let task = Self::new(kind, output_mode, template);
        match kind {
            TaskKind::ImageToPrompt => task.with_system_prompt(templates::PROMPT_EXPERT_SYSTEM),
            // High temperature keeps shot ideas varied.
            TaskKind::ScriptToStoryboard => task.with_temperature(1.3),
            TaskKind::CharacterSheet => task,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_style(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.style_parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    pub fn output_mode(&self) -> OutputMode {
        self.output_mode
    }

    pub fn template_text(&self) -> &str {
        &self.template_text
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    pub fn style_parameters(&self) -> &BTreeMap<String, String> {
        &self.style_parameters
    }

    pub fn temperature(&self) -> Option<f32> {
        self.temperature
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_storyboard_uses_high_temperature() {
        let task = PromptTask::builtin(TaskKind::ScriptToStoryboard, OutputMode::FreeText);
        assert_eq!(task.temperature(), Some(1.3));
        assert!(task.template_text().contains("{style}"));
        assert!(task.system_prompt().is_none());
    }

    #[test]
    fn builtin_image_task_carries_expert_system_prompt() {
        let task = PromptTask::builtin(TaskKind::ImageToPrompt, OutputMode::Structured);
        assert!(task.system_prompt().is_some());
        assert!(task.template_text().contains("prompt_en"));
        assert!(task.kind().needs_vision());
    }

    #[test]
    fn task_kind_serializes_as_snake_case() {
        let v = serde_json::to_value(TaskKind::ScriptToStoryboard).expect("serialize");
        assert_eq!(v, "script_to_storyboard");
        assert_eq!(TaskKind::CharacterSheet.to_string(), "character_sheet");
    }
}
