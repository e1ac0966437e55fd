//! Error types for container scanning and gain map metadata parsing.

use thiserror::Error;

/// Errors that can occur while inspecting a container or decoding metadata.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProbeError {
    /// Bad marker segment framing
    #[error("Malformed container at offset {offset}: {reason}")]
    MalformedContainer { offset: usize, reason: String },

    /// APP2 payload does not start with the ISO 21496-1 identifier
    #[error("Unrecognized APP2 signature: expected ISO 21496-1 URN")]
    UnrecognizedSignature,

    /// Payload shorter than the metadata layout requires
    #[error("Unexpected end of data reading {field} at offset {offset}: need {needed} bytes, {available} available")]
    UnexpectedEndOfData {
        field: String,
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// Field value outside its valid domain
    #[error("Invalid value for {field}: {value}")]
    InvalidField { field: String, value: String },

    /// No ISO 21496-1 record found anywhere in the file
    #[error("No ISO 21496-1 gain map metadata found")]
    NoGainMapMetadata,

    /// XMP parsing error
    #[error("XMP error: {0}")]
    XmpError(String),

    /// Hex dump could not be decoded
    #[error("Invalid hex dump at position {position}: {reason}")]
    InvalidHex { position: usize, reason: String },
}

impl ProbeError {
    pub(crate) fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        ProbeError::MalformedContainer {
            offset,
            reason: reason.into(),
        }
    }

    /// Moves a container offset measured inside a sub-slice to the whole file.
    pub(crate) fn shifted(self, base: usize) -> Self {
        match self {
            ProbeError::MalformedContainer { offset, reason } => ProbeError::MalformedContainer {
                offset: base + offset,
                reason,
            },
            other => other,
        }
    }

    pub(crate) fn invalid_field(field: impl Into<String>, value: impl ToString) -> Self {
        ProbeError::InvalidField {
            field: field.into(),
            value: value.to_string(),
        }
    }
}

/// Result type alias for scanning and decoding operations.
pub type Result<T> = std::result::Result<T, ProbeError>;

impl From<quick_xml::Error> for ProbeError {
    fn from(err: quick_xml::Error) -> Self {
        ProbeError::XmpError(err.to_string())
    }
}
