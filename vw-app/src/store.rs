//! Per-session results. Replaces page-global state with an explicit value
//! that callers clear themselves.

use std::collections::HashMap;
use vw_prompts::{PromptResult, Shot, Storyboard, TaskKind, shots_to_csv, validate_shot};

#[derive(Debug, Clone, Default)]
pub struct ResultStore {
    last: HashMap<TaskKind, PromptResult>,
    storyboard: Option<Vec<Shot>>,
}

impl ResultStore {
    /// Keeps `result` as the latest for its task. Successful structured
    /// storyboards also replace the cached shot list.
    pub fn record(&mut self, result: PromptResult) {
        if result.task == TaskKind::ScriptToStoryboard && result.parsed_json.is_some() {
            match result.decode::<Storyboard>() {
                Ok(board) => self.storyboard = Some(board.shots),
                Err(e) => tracing::warn!(error = %e, "storyboard not cached"),
            }
        }
        self.last.insert(result.task, result);
    }

    pub fn last(&self, kind: TaskKind) -> Option<&PromptResult> {
        self.last.get(&kind)
    }

    pub fn storyboard(&self) -> Option<&[Shot]> {
        self.storyboard.as_deref()
    }

    /// Replaces the cached shots with a user-edited list.
    pub fn replace_storyboard(&mut self, shots: Vec<Shot>) -> Result<(), String> {
        for shot in &shots {
            validate_shot(shot)?;
        }
        self.storyboard = Some(shots);
        Ok(())
    }

    pub fn storyboard_csv(&self) -> Option<String> {
        self.storyboard.as_deref().map(shots_to_csv)
    }

    pub fn clear(&mut self) {
        self.last.clear();
        self.storyboard = None;
    }

    pub fn is_empty(&self) -> bool {
        self.last.is_empty() && self.storyboard.is_none()
    }
}
