// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Conversion errors.

use crate::reflect::{MessageError, ScalarValue};
use crate::schema::FieldSchema;
use std::fmt;

/// Why a conversion failed.
#[derive(Debug, Clone, PartialEq)]
pub enum ConvertError {
    /// Declared struct size differs from the size computed from the schema.
    LayoutMismatch { expected: usize, actual: usize },
    /// Schema contains something without a native representation.
    UnsupportedSchema(String),
    /// A repeated-message byte range is not a whole number of elements.
    SizeCongruence { bytes: usize, element_size: usize },
    /// Map value does not fit the largest bucket.
    MapValueTooLarge { size: usize, max: usize },
    /// Map key appears twice in the message.
    DuplicateKey(String),
    /// Access past the end of the region being walked.
    CursorOverrun {
        offset: usize,
        size: usize,
        limit: usize,
    },
    /// Reflective message rejected an operation.
    Reflection(MessageError),
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LayoutMismatch { expected, actual } => write!(
                f,
                "Layout mismatch: schema needs {} bytes, struct has {}",
                expected, actual
            ),
            Self::UnsupportedSchema(msg) => write!(f, "Unsupported schema: {}", msg),
            Self::SizeCongruence {
                bytes,
                element_size,
            } => write!(
                f,
                "Array of {} bytes is not a multiple of element size {}",
                bytes, element_size
            ),
            Self::MapValueTooLarge { size, max } => {
                write!(f, "Map value too large: {} > {} bytes", size, max)
            }
            Self::DuplicateKey(key) => write!(f, "Duplicate map key: {}", key),
            Self::CursorOverrun {
                offset,
                size,
                limit,
            } => write!(
                f,
                "Cursor overrun: {} bytes at offset {} exceed {}",
                size, offset, limit
            ),
            Self::Reflection(e) => write!(f, "Reflection error: {}", e),
        }
    }
}

impl std::error::Error for ConvertError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Reflection(e) => Some(e),
            _ => None,
        }
    }
}

impl ConvertError {
    /// `value` read from the message does not fit `field`'s native type.
    pub(crate) fn mismatch(field: &FieldSchema, value: &ScalarValue) -> Self {
        Self::Reflection(MessageError::TypeMismatch {
            field: field.name.clone(),
            expected: field.kind.to_string(),
            got: value.kind_name().to_string(),
        })
    }
}

impl From<MessageError> for ConvertError {
    fn from(e: MessageError) -> Self {
        Self::Reflection(e)
    }
}

/// Result type for conversion steps.
pub type Result<T> = std::result::Result<T, ConvertError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_display() {
        let err = ConvertError::LayoutMismatch {
            expected: 96,
            actual: 88,
        };
        assert_eq!(
            err.to_string(),
            "Layout mismatch: schema needs 96 bytes, struct has 88"
        );
        assert_eq!(
            ConvertError::DuplicateKey("\"a\"".into()).to_string(),
            "Duplicate map key: \"a\""
        );
    }

    #[test]
    fn test_reflection_source() {
        let err = ConvertError::from(MessageError::FieldNotFound("x".into()));
        assert!(err.source().is_some());
        assert!(ConvertError::UnsupportedSchema("group".into()).source().is_none());
    }
}
