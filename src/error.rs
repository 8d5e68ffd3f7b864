//! Error types for exif-io

use std::io;

/// Result type for exif-io operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while parsing, editing or saving a JPEG file
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Storage I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid file format
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Invalid segment
    #[error("Invalid segment at offset {offset}: {reason}")]
    InvalidSegment { offset: u64, reason: String },

    /// A length field or declared payload runs past the end of the buffer
    #[error("Truncated segment at offset {offset}: needed {needed} bytes, {available} available")]
    TruncatedSegment {
        offset: u64,
        needed: u64,
        available: u64,
    },

    /// Start-of-scan data reaches the end of the buffer without a following marker
    #[error("Unterminated scan starting at offset {offset}")]
    UnterminatedScan { offset: u64 },

    /// The metadata codec rejected the EXIF bytes
    #[error("Metadata decode failed: {0}")]
    MetadataDecodeFailed(String),

    /// Reassembly was given an empty metadata payload
    #[error("Metadata payload is empty")]
    EmptyMetadata,

    /// The metadata codec could not serialize the block
    #[error("Metadata encode failed: {0}")]
    Encode(String),

    /// Data size exceeds maximum allowed
    #[error("Data too large: {size} bytes (max: {max})")]
    DataTooLarge { size: usize, max: usize },

    /// Field name not present in the field table
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// Text could not be converted to the field's type
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    /// No file is open in the editor
    #[error("No file is open")]
    NoSession,

    /// Save requested without a target path
    #[error("Session has no file path; use save_as")]
    NoPath,
}
