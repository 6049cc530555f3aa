use crate::error::{PromptError, Result};
use vw_llm::InlineImage;

/// Upload formats accepted for image tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
}

impl ImageFormat {
    pub const ACCEPTED_EXTENSIONS: [&'static str; 4] = ["jpg", "jpeg", "png", "webp"];

    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }
        if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }
        if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            return Some(Self::Webp);
        }
        None
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
        }
    }
}

/// Encodes an uploaded file as an inline image.
///
/// The format comes from the file's magic bytes; a file name, when given,
/// must also carry one of the accepted extensions.
pub fn encode_upload(bytes: &[u8], file_name: Option<&str>) -> Result<InlineImage> {
    if bytes.is_empty() {
        return Err(PromptError::EmptyContent);
    }
    if let Some(name) = file_name.filter(|n| !n.trim().is_empty()) {
        let ext = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        if !ImageFormat::ACCEPTED_EXTENSIONS.contains(&ext.as_str()) {
            return Err(PromptError::UnsupportedImage(format!(
                "file {name:?} must be one of: {}",
                ImageFormat::ACCEPTED_EXTENSIONS.join(", ")
            )));
        }
    }
    let format = ImageFormat::sniff(bytes).ok_or_else(|| {
        PromptError::UnsupportedImage("bytes are not a JPEG, PNG or WebP image".to_string())
    })?;
    Ok(InlineImage::from_bytes(format.mime_type(), bytes))
}

/// Text and/or image supplied by the user for one invocation.
#[derive(Debug, Clone, Default)]
pub struct UserContent {
    pub text: Option<String>,
    pub image: Option<InlineImage>,
}

impl UserContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            image: None,
        }
    }

    pub fn image(image: InlineImage) -> Self {
        Self {
            text: None,
            image: Some(image),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.text = Some(note.into());
        self
    }

    /// Text with surrounding whitespace removed, or `None` when blank.
    pub fn trimmed_text(&self) -> Option<&str> {
        self.text.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.trimmed_text().is_none() && self.image.is_none()
    }
}
