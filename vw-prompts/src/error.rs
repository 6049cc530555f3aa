use thiserror::Error;

pub type Result<T> = std::result::Result<T, PromptError>;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("content is empty")]
    EmptyContent,

    #[error("an image is required for {0}")]
    ImageRequired(&'static str),

    #[error("unsupported image: {0}")]
    UnsupportedImage(String),

    #[error("template parameter {0:?} has no value")]
    MissingParameter(String),

    #[error("provider {0} does not support image input")]
    VisionUnsupported(String),
}

/// Model output that could not be read as the expected JSON.
///
/// The raw text is kept so the caller can show it for manual inspection.
#[derive(Debug, Clone, Error)]
#[error("model output format error, please retry ({reason})")]
pub struct FormatError {
    pub reason: String,
    pub raw: String,
}

impl FormatError {
    pub fn new(reason: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            raw: raw.into(),
        }
    }
}
