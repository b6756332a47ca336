//! Export request parameters.
//!
//! Form fields arrive as loose strings; [`ExportParams::from_form_fields`]
//! turns them into a typed, range-checked value before anything downstream
//! sees them.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

/// Largest accepted |offset| in seconds.
pub const MAX_OFFSET_SECS: f64 = 3600.0;

const DEFAULT_OFFSET: f64 = 0.0;
const DEFAULT_CROSSFADE: f64 = 50.0;

/// Errors from parsing or validating export parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamsError {
    #[error("{field} must be a number, got '{value}'")]
    NotANumber { field: &'static str, value: String },

    #[error("{field} must be true or false, got '{value}'")]
    NotABool { field: &'static str, value: String },

    #[error("{0} must be a finite number")]
    NonFinite(&'static str),

    #[error("crossfade must be between 0 and 100, got {0}")]
    CrossfadeOutOfRange(f64),

    #[error("offset must be within ±3600 seconds, got {0}")]
    OffsetOutOfRange(f64),
}

/// Typed sync parameters for one export.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct ExportParams {
    /// Audio offset relative to the video, in seconds
    pub offset: f64,
    /// Weight of the replacement audio in the mix (0-100)
    #[validate(range(min = 0.0, max = 100.0))]
    pub crossfade: f64,
    /// Trim the video instead of padding the audio
    pub clip_video: bool,
}

impl Default for ExportParams {
    fn default() -> Self {
        Self {
            offset: DEFAULT_OFFSET,
            crossfade: DEFAULT_CROSSFADE,
            clip_video: false,
        }
    }
}

impl ExportParams {
    /// Check that the parameters are finite and in range.
    pub fn validated(self) -> Result<Self, ParamsError> {
        if !self.offset.is_finite() {
            return Err(ParamsError::NonFinite("offset"));
        }
        if !self.crossfade.is_finite() {
            return Err(ParamsError::NonFinite("crossfade"));
        }

        if self.validate().is_err() {
            return Err(ParamsError::CrossfadeOutOfRange(self.crossfade));
        }
        if self.offset.abs() > MAX_OFFSET_SECS {
            return Err(ParamsError::OffsetOutOfRange(self.offset));
        }

        Ok(self)
    }

    /// Build parameters from raw multipart form values.
    ///
    /// Absent (or blank) fields take their defaults: offset 0, crossfade 50,
    /// clip_video false.
    pub fn from_form_fields(
        offset: Option<&str>,
        crossfade: Option<&str>,
        clip_video: Option<&str>,
    ) -> Result<Self, ParamsError> {
        let params = Self {
            offset: parse_number("offset", offset, DEFAULT_OFFSET)?,
            crossfade: parse_number("crossfade", crossfade, DEFAULT_CROSSFADE)?,
            clip_video: parse_bool("clip_video", clip_video)?,
        };
        params.validated()
    }
}

fn parse_number(field: &'static str, raw: Option<&str>, default: f64) -> Result<f64, ParamsError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(default),
        Some(s) => s.parse::<f64>().map_err(|_| ParamsError::NotANumber {
            field,
            value: s.to_string(),
        }),
    }
}

fn parse_bool(field: &'static str, raw: Option<&str>) -> Result<bool, ParamsError> {
    let Some(s) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(false);
    };
    match s.to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Ok(true),
        "false" | "0" | "off" | "no" => Ok(false),
        _ => Err(ParamsError::NotABool {
            field,
            value: s.to_string(),
        }),
    }
}
