//! Error types for data parsing in inkbird-types.

use thiserror::Error;

/// Errors that can occur when interpreting INKBIRD values outside the
/// notification path (user input, persisted snapshots).
///
/// Frame decoding never produces this error: frames the codec does not
/// understand are reported as [`crate::frame::Decoded::Unrecognized`].
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// A textual or numeric value does not name a known setting.
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

/// Result type alias using inkbird-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
