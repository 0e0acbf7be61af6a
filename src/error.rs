// src/error.rs
//
// Unified error handling for imgconv
// Uses thiserror for simple, type-safe error handling
//
// Per-item errors (unrecognized input, decode, capability, encode) are caught
// at the work-item boundary and recorded on the item; archive and probe
// errors propagate to the immediate caller of that operation.

use std::borrow::Cow;
use thiserror::Error;

/// imgconv error types
///
/// All errors are type-safe and provide clear, actionable messages.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConvertError {
    // Detection Errors
    #[error("Unsupported input format: {name}")]
    UnrecognizedInput { name: Cow<'static, str> },

    // Decode Errors
    #[error("Failed to decode image: {message}")]
    DecodeFailed { message: Cow<'static, str> },

    #[error("Image dimension {dimension} exceeds maximum {max}")]
    DimensionExceedsLimit { dimension: u32, max: u32 },

    #[error("Image pixel count {pixels} exceeds maximum {max}")]
    PixelCountExceedsLimit { pixels: u64, max: u64 },

    // Capability Errors
    #[error("{label} output is not supported by this platform")]
    UnsupportedCapability { label: Cow<'static, str> },

    // Encode Errors
    #[error("Failed to encode as {format}: {message}")]
    EncodeFailed {
        format: Cow<'static, str>,
        message: Cow<'static, str>,
    },

    #[error("Unsupported output format: {key}")]
    UnsupportedFormat { key: Cow<'static, str> },

    // Archive Errors
    #[error("No converted files available to archive")]
    EmptyArchive,

    #[error("Failed to build archive: {message}")]
    ArchiveFailed { message: Cow<'static, str> },

    // Queue State Errors
    #[error("A conversion pass is already running")]
    ConversionInProgress,
}

// Constructor Helpers
impl ConvertError {
    pub fn unrecognized_input(name: impl Into<Cow<'static, str>>) -> Self {
        Self::UnrecognizedInput { name: name.into() }
    }

    pub fn decode_failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::DecodeFailed {
            message: message.into(),
        }
    }

    pub fn dimension_exceeds_limit(dimension: u32, max: u32) -> Self {
        Self::DimensionExceedsLimit { dimension, max }
    }

    pub fn pixel_count_exceeds_limit(pixels: u64, max: u64) -> Self {
        Self::PixelCountExceedsLimit { pixels, max }
    }

    pub fn unsupported_capability(label: impl Into<Cow<'static, str>>) -> Self {
        Self::UnsupportedCapability {
            label: label.into(),
        }
    }

    pub fn encode_failed(
        format: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::EncodeFailed {
            format: format.into(),
            message: message.into(),
        }
    }

    pub fn unsupported_format(key: impl Into<Cow<'static, str>>) -> Self {
        Self::UnsupportedFormat { key: key.into() }
    }

    pub fn archive_failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::ArchiveFailed {
            message: message.into(),
        }
    }

    /// True for errors that are recorded on a single work item rather than
    /// propagated out of the conversion pass.
    pub fn is_per_item(&self) -> bool {
        matches!(
            self,
            Self::UnrecognizedInput { .. }
                | Self::DecodeFailed { .. }
                | Self::DimensionExceedsLimit { .. }
                | Self::PixelCountExceedsLimit { .. }
                | Self::UnsupportedCapability { .. }
                | Self::EncodeFailed { .. }
                | Self::UnsupportedFormat { .. }
        )
    }
}

// Result type alias
pub type Result<T> = std::result::Result<T, ConvertError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConvertError::unrecognized_input("data.xyz");
        assert!(err.to_string().contains("data.xyz"));

        let err = ConvertError::encode_failed("webp", "encoder rejected buffer");
        assert!(err.to_string().contains("webp"));
        assert!(err.to_string().contains("encoder rejected buffer"));
    }

    #[test]
    fn test_all_error_constructors() {
        let _ = ConvertError::unrecognized_input("file.xyz");
        let _ = ConvertError::decode_failed("truncated stream");
        let _ = ConvertError::dimension_exceeds_limit(40000, 32768);
        let _ = ConvertError::pixel_count_exceeds_limit(1_000_000_000, 100_000_000);
        let _ = ConvertError::unsupported_capability("WEBP");
        let _ = ConvertError::encode_failed("bmp", "zero-sized buffer");
        let _ = ConvertError::unsupported_format("xpm");
        let _ = ConvertError::archive_failed("zip finish failed");
    }

    #[test]
    fn test_per_item_classification() {
        assert!(ConvertError::unrecognized_input("x").is_per_item());
        assert!(ConvertError::decode_failed("x").is_per_item());
        assert!(ConvertError::unsupported_capability("AVIF").is_per_item());
        assert!(ConvertError::encode_failed("png", "x").is_per_item());
        assert!(!ConvertError::EmptyArchive.is_per_item());
        assert!(!ConvertError::ConversionInProgress.is_per_item());
        assert!(!ConvertError::archive_failed("x").is_per_item());
    }
}
