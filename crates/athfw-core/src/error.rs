//! Error types shared by the board and firmware codecs.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Invalid signature: expected {expected:?}")]
    BadSignature { expected: String },

    #[error("Buffer truncated at offset {offset}: need {needed} bytes, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Element type {type_id} at offset {offset} declares length {length}, only {remaining} bytes remain")]
    LengthOverrun {
        offset: usize,
        type_id: i32,
        length: i32,
        remaining: usize,
    },

    #[error("Unknown element type {type_id} in {scope}")]
    UnknownElement { scope: &'static str, type_id: i32 },

    #[error("Container too large: {size} bytes, maximum {max}")]
    Capacity { size: usize, max: usize },

    #[error("Unknown feature: {0}")]
    UnknownFeature(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CodecError {
    /// True for errors caused by a malformed container buffer.
    pub fn is_format(&self) -> bool {
        matches!(
            self,
            CodecError::BadSignature { .. }
                | CodecError::Truncated { .. }
                | CodecError::LengthOverrun { .. }
                | CodecError::UnknownElement { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;
