use actix_multipart::form::{tempfile::TempFile, text::Text, MultipartForm};
use serde::Deserialize;
use std::borrow::Cow;
use validator::{Validate, ValidationError};

use crate::worker::{OptionSet, Resolution};

/// Tool types handled by the transcode queue; anything else is passed through
pub const TRANSCODE_TOOLS: [&str; 3] = ["video-enhancer", "unblur", "video-editor"];

pub const DEFAULT_TOOL_TYPE: &str = "video-enhancer";

/// Multipart body of an upload request
#[derive(MultipartForm)]
pub struct UploadForm {
    pub file: Option<TempFile>,
    #[multipart(rename = "toolType")]
    pub tool_type: Option<Text<String>>,
    pub resolution: Option<Text<String>>,
    #[multipart(rename = "enhanceMode")]
    pub enhance_mode: Option<Text<String>>,
    #[multipart(rename = "colorCorrect")]
    pub color_correct: Option<Text<String>>,
}

/// Text fields of an upload, with defaults applied
#[derive(Debug, Clone, Validate)]
pub struct UploadFields {
    #[validate(length(
        min = 1,
        max = 64,
        message = "toolType must be between 1 and 64 characters"
    ))]
    pub tool_type: String,
    #[validate(custom(function = "validate_resolution"))]
    pub resolution: String,
    pub enhance_mode: Option<String>,
    pub color_correct: bool,
}

impl UploadFields {
    pub fn from_form(form: &UploadForm) -> Self {
        let text = |field: &Option<Text<String>>| field.as_ref().map(|t| t.0.trim().to_string());

        Self {
            tool_type: text(&form.tool_type).unwrap_or_else(|| DEFAULT_TOOL_TYPE.to_string()),
            resolution: text(&form.resolution).unwrap_or_else(|| Resolution::default().to_string()),
            enhance_mode: text(&form.enhance_mode),
            color_correct: text(&form.color_correct).as_deref() == Some("true"),
        }
    }

    pub fn is_transcode(&self) -> bool {
        TRANSCODE_TOOLS.contains(&self.tool_type.as_str())
    }

    /// Normalized enhancement options
    ///
    /// `enhanceMode` of `denoise` or `deblur` enables that filter alone,
    /// `auto` enables both.
    pub fn option_set(&self) -> OptionSet {
        let mode = self.enhance_mode.as_deref();
        OptionSet {
            resolution: self.resolution.parse().unwrap_or_default(),
            denoise: matches!(mode, Some("denoise" | "auto")),
            deblur: matches!(mode, Some("deblur" | "auto")),
            color_correct: self.color_correct,
        }
    }
}

fn validate_resolution(resolution: &str) -> Result<(), ValidationError> {
    resolution.parse::<Resolution>().map(|_| ()).map_err(|msg| {
        let mut error = ValidationError::new("resolution");
        error.message = Some(Cow::Owned(msg));
        error
    })
}

/// Path parameters of a download request
#[derive(Debug, Deserialize, Validate)]
pub struct DownloadPath {
    #[validate(
        length(min = 1, max = 255, message = "Filename must be between 1 and 255 characters"),
        custom(function = "validate_filename")
    )]
    pub filename: String,
}

/// Downloads are served from one flat directory
fn validate_filename(filename: &str) -> Result<(), ValidationError> {
    if filename.contains('/') || filename.contains('\\') || filename.contains("..") {
        let mut error = ValidationError::new("filename");
        error.message = Some(Cow::Borrowed("Filename must not contain path segments"));
        return Err(error);
    }
    Ok(())
}
