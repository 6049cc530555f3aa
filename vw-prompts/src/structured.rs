//! Reading JSON-mode model output.
//!
//! The reply is parsed as-is first, then with a surrounding markdown fence
//! removed, then as the outermost `{...}` slice. Typed decoders additionally
//! require every documented field to be present and non-empty; anything
//! else is a [`FormatError`] carrying the raw text.

use crate::error::FormatError;
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Removes markdown code-fence markers around a JSON payload.
///
/// Only a fence that opens the text is treated as one; backticks inside the
/// payload are left alone.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(after) = trimmed.strip_prefix("```") else {
        return trimmed.strip_suffix("```").unwrap_or(trimmed).trim();
    };
    // Language tag such as `json`.
    let after = after.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    after.strip_suffix("```").unwrap_or(after).trim()
}

/// Text between the first `{` and the last `}`.
fn object_slice(text: &str) -> Option<&str> {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => Some(&text[start..=end]),
        _ => None,
    }
}

/// Parses model output into a JSON object.
pub fn parse_structured(raw: &str) -> Result<Map<String, Value>, FormatError> {
    let trimmed = raw.trim();
    let stripped = strip_code_fences(raw);
    let first_err = match serde_json::from_str::<Value>(trimmed) {
        Ok(v) => return into_object(v, raw),
        Err(e) => e,
    };
    let mut first_err = first_err.to_string();
    if !stripped.is_empty() && stripped != trimmed {
        match serde_json::from_str::<Value>(stripped) {
            Ok(v) => return into_object(v, raw),
            Err(e) => first_err = e.to_string(),
        }
    }
    // Tolerate prose around the object.
    for text in [stripped, trimmed] {
        if let Some(sliced) = object_slice(text)
            && let Ok(v) = serde_json::from_str::<Value>(sliced)
        {
            return into_object(v, raw);
        }
    }
    Err(FormatError::new(first_err, raw))
}

fn into_object(value: Value, raw: &str) -> Result<Map<String, Value>, FormatError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(FormatError::new(
            format!("expected a JSON object, got {}", json_type_name(&other)),
            raw,
        )),
    }
}

fn json_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A schema-checked JSON reply for one task kind.
pub trait StructuredOutput: DeserializeOwned + Sized {
    fn validate(&self) -> Result<(), String>;

    fn from_raw(raw: &str) -> Result<Self, FormatError> {
        let map = parse_structured(raw)?;
        Self::from_map(map, raw)
    }

    fn from_map(map: Map<String, Value>, raw: &str) -> Result<Self, FormatError> {
        let out: Self = serde_json::from_value(Value::Object(map))
            .map_err(|e| FormatError::new(e.to_string(), raw))?;
        out.validate().map_err(|reason| FormatError::new(reason, raw))?;
        Ok(out)
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("field {field} is empty"));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAnalysis {
    #[serde(default, deserialize_with = "tags_from_list_or_string")]
    pub style_tags: Vec<String>,
    pub lighting_analysis: String,
    pub prompt_en: String,
    pub prompt_cn: String,
}

impl StructuredOutput for ImageAnalysis {
    fn validate(&self) -> Result<(), String> {
        if self.style_tags.is_empty() {
            return Err("field style_tags is empty".to_string());
        }
        require_non_empty("lighting_analysis", &self.lighting_analysis)?;
        require_non_empty("prompt_en", &self.prompt_en)?;
        require_non_empty("prompt_cn", &self.prompt_cn)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shot {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub action: String,
    pub camera_movement: String,
    pub lighting_atmosphere: String,
    pub midjourney_prompt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Storyboard {
    pub shots: Vec<Shot>,
}

impl Storyboard {
    /// The model is asked for this many shots; nothing enforces it.
    pub const REQUESTED_SHOTS: std::ops::RangeInclusive<usize> = 3..=5;
}

impl StructuredOutput for Storyboard {
    fn validate(&self) -> Result<(), String> {
        if self.shots.is_empty() {
            return Err("shots list is empty".to_string());
        }
        for shot in &self.shots {
            validate_shot(shot)?;
        }
        if !Self::REQUESTED_SHOTS.contains(&self.shots.len()) {
            tracing::warn!(
                shot_count = self.shots.len(),
                "storyboard shot count outside requested range"
            );
        }
        Ok(())
    }
}

/// Field checks shared by model replies and user edits of a shot list.
pub fn validate_shot(shot: &Shot) -> Result<(), String> {
    require_non_empty("camera_movement", &shot.camera_movement)
        .and_then(|_| require_non_empty("midjourney_prompt", &shot.midjourney_prompt))
        .map_err(|e| format!("shot {}: {e}", shot.id))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterSheet {
    pub character_analysis: String,
    pub prompt_3_view: String,
    pub prompt_dynamic: String,
}

impl StructuredOutput for CharacterSheet {
    fn validate(&self) -> Result<(), String> {
        require_non_empty("character_analysis", &self.character_analysis)?;
        require_non_empty("prompt_3_view", &self.prompt_3_view)?;
        require_non_empty("prompt_dynamic", &self.prompt_dynamic)
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!(
            "expected string or number, got {}",
            json_type_name(&other)
        ))),
    }
}

fn tags_from_list_or_string<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(Vec::new()),
        Value::String(s) => Ok(s
            .split([',', '，'])
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Ok(s),
                other => Err(de::Error::custom(format!(
                    "style tag must be a string, got {}",
                    json_type_name(&other)
                ))),
            })
            .collect(),
        other => Err(de::Error::custom(format!(
            "style_tags must be a list or string, got {}",
            json_type_name(&other)
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STORYBOARD_REPLY: &str = r#"```json
{
  "shots": [
    {"id": 1, "action": "A man walks through neon rain", "camera_movement": "slow dolly in",
     "lighting_atmosphere": "magenta neon, wet reflections", "midjourney_prompt": "/imagine prompt: lone man, neon rain --ar 16:9 --v 6.0"},
    {"id": "2", "action": "Close on his face", "camera_movement": "static close-up",
     "lighting_atmosphere": "cyan rim light", "midjourney_prompt": "/imagine prompt: close-up, rain drops --ar 16:9 --v 6.0"}
  ]
}
```"#;

    #[test]
    fn fenced_json_is_stripped_and_parsed() {
        for raw in [
            "```json\n{\"a\": 1}\n```",
            "```\n{\"a\": 1}\n```",
            "```json{\"a\": 1}```",
            "  {\"a\": 1}  ",
            "Here you go:\n```json\n{\"a\": 1}\n```\nEnjoy!",
        ] {
            let map = parse_structured(raw).expect("parse fenced json");
            assert_eq!(map.get("a"), Some(&Value::from(1)), "input {raw:?}");
        }
    }

    #[test]
    fn backticks_inside_a_valid_object_are_kept() {
        let raw = "{\"prompt_3_view\": \"wrap it in ```bash``` please\", \"n\": 1}";
        let map = parse_structured(raw).expect("valid json with backticks");
        assert_eq!(
            map.get("prompt_3_view"),
            Some(&Value::from("wrap it in ```bash``` please"))
        );

        let fenced = format!("```json\n{raw}\n```");
        let map = parse_structured(&fenced).expect("fenced json with backticks");
        assert_eq!(map.get("n"), Some(&Value::from(1)));
    }

    #[test]
    fn dangling_closing_fence_is_ignored() {
        for raw in ["{\"a\": 1}\n```", "```json\n{\"a\": 1}"] {
            let map = parse_structured(raw).expect("object with one fence");
            assert_eq!(map.get("a"), Some(&Value::from(1)), "input {raw:?}");
        }
    }

    #[test]
    fn prose_around_bare_object_is_tolerated() {
        let map = parse_structured("Sure! {\"prompt_en\": \"x\"} Hope that helps").expect("parse");
        assert_eq!(map.get("prompt_en"), Some(&Value::from("x")));
    }

    #[test]
    fn truncated_json_is_a_format_error_with_raw_text() {
        let raw = "```json\n{\"shots\": [{\"id\": 1, \"action\": \"walk";
        let err = parse_structured(raw).expect_err("truncated");
        assert_eq!(err.raw, raw);
        assert!(err.to_string().starts_with("model output format error, please retry"));
    }

    #[test]
    fn non_object_json_is_rejected() {
        let err = parse_structured("[1, 2]").expect_err("array");
        assert!(err.reason.contains("array"));
    }

    #[test]
    fn storyboard_accepts_numeric_and_string_ids() {
        let board = Storyboard::from_raw(STORYBOARD_REPLY).expect("storyboard");
        assert_eq!(board.shots.len(), 2);
        assert_eq!(board.shots[0].id, "1");
        assert_eq!(board.shots[1].id, "2");
        assert!(board.shots.iter().all(|s| !s.camera_movement.is_empty()));
    }

    #[test]
    fn storyboard_rejects_blank_midjourney_prompt() {
        let raw = r#"{"shots": [{"id": 1, "action": "a", "camera_movement": "pan",
            "lighting_atmosphere": "dusk", "midjourney_prompt": "  "}]}"#;
        let err = Storyboard::from_raw(raw).expect_err("blank prompt");
        assert!(err.reason.contains("midjourney_prompt"));
        assert_eq!(err.raw, raw);
    }

    #[test]
    fn storyboard_rejects_missing_field() {
        let raw = r#"{"shots": [{"id": 1, "action": "a", "midjourney_prompt": "p",
            "lighting_atmosphere": "dusk"}]}"#;
        let err = Storyboard::from_raw(raw).expect_err("missing camera_movement");
        assert!(err.reason.contains("camera_movement"));
    }

    #[test]
    fn image_analysis_accepts_comma_separated_tags() {
        let raw = r#"{"style_tags": "cyberpunk, cinematic，noir", "lighting_analysis": "low key",
            "prompt_en": "neon city at night", "prompt_cn": "夜晚的霓虹城市"}"#;
        let analysis = ImageAnalysis::from_raw(raw).expect("analysis");
        assert_eq!(analysis.style_tags, vec!["cyberpunk", "cinematic", "noir"]);
    }

    #[test]
    fn image_analysis_requires_tags_and_lighting() {
        let raw = r#"{"style_tags": ["noir"], "lighting_analysis": "",
            "prompt_en": "rainy alley", "prompt_cn": "雨巷"}"#;
        let err = ImageAnalysis::from_raw(raw).expect_err("blank lighting");
        assert!(err.reason.contains("lighting_analysis"));

        let raw = r#"{"lighting_analysis": "low key", "prompt_en": "rainy alley", "prompt_cn": "雨巷"}"#;
        let err = ImageAnalysis::from_raw(raw).expect_err("missing tags");
        assert!(err.reason.contains("style_tags"));
    }

    #[test]
    fn character_sheet_requires_all_prompts() {
        let raw = r#"{"character_analysis": "gothic lolita", "prompt_3_view": "three views", "prompt_dynamic": ""}"#;
        let err = CharacterSheet::from_raw(raw).expect_err("empty dynamic prompt");
        assert!(err.reason.contains("prompt_dynamic"));
    }
}
