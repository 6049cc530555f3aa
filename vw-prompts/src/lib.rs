//! Prompt tasks for Visual Workshop.
//!
//! Task templates, user content encoding, request building, and reading
//! structured model replies. No I/O happens here; the gateway sends what
//! [`build_request`] produces.

mod content;
mod csv;
mod error;
mod request;
mod result;
mod structured;
mod task;
mod templates;

pub use content::{ImageFormat, UserContent, encode_upload};
pub use csv::{SHOT_CSV_HEADER, shots_to_csv};
pub use error::{FormatError, PromptError, Result};
pub use request::{PromptRequest, build_request, style_map};
pub use result::{ErrorKind, PromptResult};
pub use structured::{
    CharacterSheet, ImageAnalysis, Shot, Storyboard, StructuredOutput, parse_structured,
    strip_code_fences, validate_shot,
};
pub use task::{OutputMode, PromptTask, TaskKind};
pub use templates::{placeholders, render};
