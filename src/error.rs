// In: src/error.rs

//! This module defines the single, unified error type for the entire codec.
//! It uses the `thiserror` crate to provide ergonomic, context-aware error handling.
//!
//! Decode-side errors leave the reader at an unknown position and are fatal for
//! the block being read. Append-side errors leave the column usable, although
//! composite columns do not roll back children that were already appended to.

use std::fmt;

use thiserror::Error;

use crate::types::Value;

#[derive(Error, Debug)]
pub enum CodecError {
    // =========================================================================
    // === Type resolution
    // =========================================================================
    #[error("unsupported column type \"{type_name}\" for column \"{name}\"")]
    UnsupportedColumnType { name: String, type_name: String },

    #[error("cannot parse type \"{input}\" at position {position}: {message}")]
    TypeParse {
        input: String,
        position: usize,
        message: String,
    },

    // =========================================================================
    // === Append / scan conversion errors
    // =========================================================================
    #[error("{0}")]
    ColumnConverter(ConverterError),

    #[error("{op}: invalid fixed size data: expected {expected} bytes, got {got}")]
    InvalidFixedSizeData {
        op: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("unknown element \"{element}\" for enum {type_name}")]
    UnknownElementForEnum { type_name: String, element: String },

    #[error("{type_name}: value {value} is outside of the representable range [{min}, {max}]")]
    DateOverflow {
        type_name: String,
        value: String,
        min: String,
        max: String,
    },

    #[error("invalid value for {type_name}: {message}")]
    InvalidValue { type_name: String, message: String },

    // =========================================================================
    // === Wire format errors
    // =========================================================================
    #[error("LowCardinality decode failed: {0}")]
    LowCardinalityDecode(String),

    #[error("{column}: unsupported serialization version {version}")]
    UnsupportedSerialization { column: String, version: u64 },

    #[error("LEB128 decoding error: {0}")]
    Leb128Decode(String),

    #[error("row count mismatch for column \"{column}\": expected {expected}, got {got}")]
    RowCountMismatch {
        column: String,
        expected: usize,
        got: usize,
    },

    // =========================================================================
    // === External Error Wrappers (Using #[from] for automatic conversion)
    // =========================================================================
    /// An error originating from the underlying reader or writer. A short read
    /// surfaces here as `UnexpectedEof`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error from the Serde JSON library, raised by JSON document conversion.
    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// An invalid `SKIP REGEXP` pattern in a JSON type.
    #[error("invalid regular expression: {0}")]
    Regex(#[from] regex::Error),

    #[error("Internal logic error (this is a bug): {0}")]
    InternalError(String),
}

/// Details of a host value that could not be converted to or from a column type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConverterError {
    pub op: &'static str,
    pub to: String,
    pub from: String,
    pub hint: Option<String>,
}

impl fmt::Display for ConverterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "converting {} to {} is unsupported (op: {})",
            self.from, self.to, self.op
        )?;
        if let Some(hint) = &self.hint {
            write!(f, ". {}", hint)?;
        }
        Ok(())
    }
}

impl CodecError {
    /// Builds a `ColumnConverter` error for a value that `to` cannot accept.
    pub fn converter(op: &'static str, to: &str, from: &Value) -> Self {
        CodecError::ColumnConverter(ConverterError {
            op,
            to: to.to_string(),
            from: from.kind().to_string(),
            hint: None,
        })
    }

    /// Same as [`CodecError::converter`] with an explanatory hint attached.
    pub fn converter_hint(op: &'static str, to: &str, from: &str, hint: impl Into<String>) -> Self {
        CodecError::ColumnConverter(ConverterError {
            op,
            to: to.to_string(),
            from: from.to_string(),
            hint: Some(hint.into()),
        })
    }

    pub fn unsupported(name: &str, type_name: impl fmt::Display) -> Self {
        CodecError::UnsupportedColumnType {
            name: name.to_string(),
            type_name: type_name.to_string(),
        }
    }

    pub fn invalid_value(type_name: &str, message: impl Into<String>) -> Self {
        CodecError::InvalidValue {
            type_name: type_name.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T, E = CodecError> = std::result::Result<T, E>;
