//! Built-in prompt templates and `{name}` placeholder rendering.

use crate::error::{PromptError, Result};
use std::collections::BTreeMap;

pub(crate) const PROMPT_EXPERT_SYSTEM: &str = "你是一名资深的 AI 绘画提示词专家。";

pub(crate) const IMAGE_TO_PROMPT_FREE: &str = "请分析这张图片，输出标准双语报告：

### 🔍 中文画面解析
(详细描述画面主体、风格、光影、构图，约100字)

### 🎨 English Prompt
(基于分析生成的高质量 Midjourney 提示词)";

pub(crate) const IMAGE_TO_PROMPT_JSON: &str = "Analyze this image as a senior AI art prompt engineer.
Reply with one JSON object and nothing else, using exactly these keys:
{\"style_tags\": [\"...\"], \"lighting_analysis\": \"...\", \"prompt_en\": \"...\", \"prompt_cn\": \"...\"}
- style_tags: short art style keywords
- lighting_analysis: light sources, color temperature and mood
- prompt_en: a high quality Midjourney prompt in English
- prompt_cn: the same prompt in Chinese";

pub(crate) const STORYBOARD_FREE: &str = "你是一个电影分镜大师。请根据用户提供的剧本，设计 3-4 个关键分镜。
风格要求：{style}。

【重要】请严格按照以下 Markdown 格式输出，不要包含其他废话：

### 🎬 Shot 1
**📖 中文构思**：(详细描述画面内容、镜头角度、光影氛围)
**🖌️ Prompt**: `/imagine prompt: (英文提示词) --ar 16:9 --v 6.0`

### 🎬 Shot 2
**📖 中文构思**：...
**🖌️ Prompt**: ...

(以此类推)

剧本内容：
{content}";

pub(crate) const STORYBOARD_JSON: &str = "You are a film storyboard director. Design 3-5 key shots for the script below.
Visual style: {style}.
Reply with one JSON object and nothing else:
{\"shots\": [{\"id\": 1, \"action\": \"...\", \"camera_movement\": \"...\", \"lighting_atmosphere\": \"...\", \"midjourney_prompt\": \"/imagine prompt: ... --ar 16:9 --v 6.0\"}]}
Every field must be filled in. Number shots from 1.

Script:
{content}";

pub(crate) const CHARACTER_SHEET_FREE: &str = "我需要一个角色的三视图 Prompt。
角色：{content}
风格：{style}

请严格按照以下 Markdown 格式输出：

### 🧠 中文设计思路
(用中文简要说明角色的设计要点，如服装细节、发型、配饰、配色方案等)

### 🎨 English Prompt
```bash
(必须包含: three views, front view, side view, back view, full body shot, white background)
(此处生成完整的英文提示词)
```";

pub(crate) const CHARACTER_SHEET_JSON: &str = "Design a character turnaround sheet.
Character: {content}
Style: {style}
Reply with one JSON object and nothing else:
{\"character_analysis\": \"...\", \"prompt_3_view\": \"...\", \"prompt_dynamic\": \"...\"}
- character_analysis: design notes (outfit, hair, accessories, palette) in Chinese
- prompt_3_view: English prompt that includes three views, front view, side view, back view, full body shot, white background
- prompt_dynamic: English prompt for the same character in a dynamic action pose";

/// Replaces every `{name}` placeholder in one pass.
///
/// Only identifier-shaped names (`[A-Za-z_][A-Za-z0-9_]*`) are placeholders, so
/// literal JSON such as `{"id": 1}` passes through. Substituted values are not
/// re-scanned.
pub fn render(template: &str, params: &BTreeMap<String, String>) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) if is_placeholder_name(&after[..close]) => {
                let name = &after[..close];
                let value = params
                    .get(name)
                    .ok_or_else(|| PromptError::MissingParameter(name.to_string()))?;
                out.push_str(value);
                rest = &after[close + 1..];
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    Ok(out)
}

/// Placeholder names referenced by a template, in order of first appearance.
pub fn placeholders(template: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) if is_placeholder_name(&after[..close]) => {
                let name = &after[..close];
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
                rest = &after[close + 1..];
            }
            _ => rest = after,
        }
    }
    names
}

fn is_placeholder_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn render_substitutes_and_keeps_json_braces() {
        let out = render(
            "style={style} schema={\"id\": 1} body={content}",
            &params(&[("style", "Cyberpunk"), ("content", "rain")]),
        )
        .expect("render");
        assert_eq!(out, "style=Cyberpunk schema={\"id\": 1} body=rain");
    }

    #[test]
    fn render_does_not_rescan_substituted_values() {
        let out = render(
            "{content}",
            &params(&[("content", "literally {style}"), ("style", "x")]),
        )
        .expect("render");
        assert_eq!(out, "literally {style}");
    }

    #[test]
    fn render_reports_missing_parameter() {
        let err = render("{style}", &BTreeMap::new()).expect_err("missing style");
        assert!(matches!(err, PromptError::MissingParameter(name) if name == "style"));
    }

    #[test]
    fn builtin_templates_only_reference_known_parameters() {
        for template in [
            IMAGE_TO_PROMPT_FREE,
            IMAGE_TO_PROMPT_JSON,
            STORYBOARD_FREE,
            STORYBOARD_JSON,
            CHARACTER_SHEET_FREE,
            CHARACTER_SHEET_JSON,
        ] {
            for name in placeholders(template) {
                assert!(
                    name == "content" || name == "style",
                    "unexpected placeholder {name:?}"
                );
            }
        }
        assert_eq!(placeholders(STORYBOARD_JSON), vec!["style", "content"]);
    }
}
