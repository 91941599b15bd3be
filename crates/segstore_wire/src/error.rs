//! Error types for the wire crate.

use thiserror::Error;

/// Result type for wire operations.
pub type WireResult<T> = Result<T, WireError>;

/// Errors that can occur while serializing or deserializing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Unexpected end of input.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// The serialized version is not declared by the serializer.
    #[error("unsupported format version {version}")]
    UnsupportedVersion {
        /// The version found in the input.
        version: u8,
    },

    /// The serializer's version/revision declarations are inconsistent.
    #[error("invalid format declaration: {message}")]
    InvalidDeclaration {
        /// Description of the problem.
        message: String,
    },

    /// A string or byte field is too long for its length prefix.
    #[error("field too long: {len} bytes (max {max})")]
    FieldTooLong {
        /// Actual length.
        len: usize,
        /// Maximum encodable length.
        max: usize,
    },

    /// Invalid UTF-8 string.
    #[error("invalid UTF-8 string")]
    InvalidUtf8,

    /// A builder was missing a required field.
    #[error("missing field: {field}")]
    MissingField {
        /// Name of the missing field.
        field: &'static str,
    },

    /// The decoded data is structurally invalid.
    #[error("invalid data: {message}")]
    InvalidData {
        /// Description of the problem.
        message: String,
    },
}

impl WireError {
    /// Create an invalid declaration error.
    pub fn invalid_declaration(message: impl Into<String>) -> Self {
        Self::InvalidDeclaration {
            message: message.into(),
        }
    }

    /// Create an invalid data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }
}
