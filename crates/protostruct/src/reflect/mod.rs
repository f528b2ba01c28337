// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reflective message access.
//!
//! The conversion engine never touches message storage directly; it goes
//! through [`ReflectMessage`], the same capability set a protobuf
//! `Reflection` offers: scalar get/set, repeated get-by-index/append/size,
//! sub-message get/mutable-get/append-new, plus entry-wise map access.
//!
//! [`DynamicMessage`] is the in-crate implementation. With the
//! `prost-reflect` feature, `prost_reflect::DynamicMessage` implements the
//! trait as well, and [`schema_from_descriptor`] turns its descriptors into
//! [`MessageSchema`]s.

mod dynamic_message;
#[cfg(feature = "prost-reflect")]
mod prost_bridge;

pub use dynamic_message::{DynamicMessage, FromScalarValue};
#[cfg(feature = "prost-reflect")]
pub use prost_bridge::schema_from_descriptor;

use crate::schema::{FieldKind, FieldSchema, MessageSchema};
use std::fmt;
use std::sync::Arc;

/// Errors reported by a reflective message.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageError {
    FieldNotFound(String),
    TypeMismatch {
        field: String,
        expected: String,
        got: String,
    },
    InvalidOperation(String),
    IndexOutOfBounds { index: usize, length: usize },
}

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FieldNotFound(name) => write!(f, "Field not found: {}", name),
            Self::TypeMismatch {
                field,
                expected,
                got,
            } => write!(
                f,
                "Type mismatch on {}: expected {}, got {}",
                field, expected, got
            ),
            Self::InvalidOperation(msg) => write!(f, "Invalid operation: {}", msg),
            Self::IndexOutOfBounds { index, length } => {
                write!(f, "Index out of bounds: {} >= {}", index, length)
            }
        }
    }
}

impl std::error::Error for MessageError {}

/// A scalar field value crossing the reflection seam.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Bool(bool),
    /// Raw enum number.
    Enum(i32),
    String(String),
    Bytes(Vec<u8>),
}

impl ScalarValue {
    /// Short kind name, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::I32(_) => "int32",
            Self::I64(_) => "int64",
            Self::U32(_) => "uint32",
            Self::U64(_) => "uint64",
            Self::F32(_) => "float",
            Self::F64(_) => "double",
            Self::Bool(_) => "bool",
            Self::Enum(_) => "enum",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
        }
    }

    /// Try to get as i32.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::I32(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::I64(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as u32.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Self::U32(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as u64.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::U64(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as f32.
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Self::F32(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::F64(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Get enum number.
    pub fn enum_number(&self) -> Option<i32> {
        match self {
            Self::Enum(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Try to get as bytes.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I32(v) | Self::Enum(v) => write!(f, "{}", v),
            Self::I64(v) => write!(f, "{}", v),
            Self::U32(v) => write!(f, "{}", v),
            Self::U64(v) => write!(f, "{}", v),
            Self::F32(v) => write!(f, "{}", v),
            Self::F64(v) => write!(f, "{}", v),
            Self::Bool(v) => write!(f, "{}", v),
            Self::String(v) => write!(f, "{:?}", v),
            Self::Bytes(v) => {
                f.write_str("\"")?;
                for b in v {
                    write!(f, "\\x{:02x}", b)?;
                }
                f.write_str("\"")
            }
        }
    }
}

// Conversion traits
macro_rules! impl_from_scalar {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for ScalarValue {
            fn from(v: $ty) -> Self {
                Self::$variant(v)
            }
        }
    };
}

impl_from_scalar!(i32, I32);
impl_from_scalar!(i64, I64);
impl_from_scalar!(u32, U32);
impl_from_scalar!(u64, U64);
impl_from_scalar!(f32, F32);
impl_from_scalar!(f64, F64);
impl_from_scalar!(bool, Bool);
impl_from_scalar!(String, String);
impl_from_scalar!(Vec<u8>, Bytes);

impl From<&str> for ScalarValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

/// Value side of one map entry, as read through
/// [`ReflectMessage::map_entries`].
#[derive(Debug)]
pub enum MapValue<'a, M> {
    Scalar(ScalarValue),
    /// Message value, `None` when the entry carries none.
    Message(Option<&'a M>),
}

/// One `(key, value)` pair of a map field.
pub type MapEntry<'a, M> = (ScalarValue, MapValue<'a, M>);

/// Reflection interface consumed by the conversion engine.
///
/// Fields are addressed by the [`FieldSchema`] taken from [`schema`]; an
/// implementation may identify them by number, name or position.
///
/// The map methods have default implementations that store a map field as a
/// repeated list of two-field entry sub-messages. Libraries with native map
/// storage override all three.
///
/// [`schema`]: ReflectMessage::schema
pub trait ReflectMessage: Sized {
    /// Schema of this message.
    fn schema(&self) -> Result<Arc<MessageSchema>, MessageError>;

    /// Create an empty message of `schema`, a message type reachable from
    /// this one.
    fn new_message(&self, schema: &Arc<MessageSchema>) -> Result<Self, MessageError>;

    /// Read a singular scalar field (defaults when unset).
    fn get_scalar(&self, field: &FieldSchema) -> Result<ScalarValue, MessageError>;

    /// Write a singular scalar field.
    fn set_scalar(&mut self, field: &FieldSchema, value: ScalarValue) -> Result<(), MessageError>;

    /// Number of elements of a repeated or map field.
    fn repeated_len(&self, field: &FieldSchema) -> usize;

    /// Read one element of a repeated scalar field.
    fn get_repeated_scalar(
        &self,
        field: &FieldSchema,
        index: usize,
    ) -> Result<ScalarValue, MessageError>;

    /// Append to a repeated scalar field.
    fn add_scalar(&mut self, field: &FieldSchema, value: ScalarValue) -> Result<(), MessageError>;

    /// Read a singular sub-message, `None` when absent.
    fn get_message(&self, field: &FieldSchema) -> Option<&Self>;

    /// Get a singular sub-message for writing, creating it when absent.
    fn mutable_message(&mut self, field: &FieldSchema) -> Result<&mut Self, MessageError>;

    /// Read one element of a repeated message field.
    fn get_repeated_message(&self, field: &FieldSchema, index: usize)
        -> Result<&Self, MessageError>;

    /// Append a new empty element to a repeated message field.
    fn add_message(&mut self, field: &FieldSchema) -> Result<&mut Self, MessageError>;

    /// Entries of a map field, in storage order. Duplicate keys are
    /// reported as stored.
    fn map_entries(&self, field: &FieldSchema) -> Result<Vec<MapEntry<'_, Self>>, MessageError> {
        let (key_field, value_field) = entry_fields(field)?;
        (0..self.repeated_len(field))
            .map(|index| {
                let entry = self.get_repeated_message(field, index)?;
                let key = entry.get_scalar(key_field)?;
                let value = match value_field.kind {
                    FieldKind::Message(_) => MapValue::Message(entry.get_message(value_field)),
                    _ => MapValue::Scalar(entry.get_scalar(value_field)?),
                };
                Ok((key, value))
            })
            .collect()
    }

    /// Add a `key -> value` entry to a map field with a scalar value.
    fn insert_map_scalar(
        &mut self,
        field: &FieldSchema,
        key: ScalarValue,
        value: ScalarValue,
    ) -> Result<(), MessageError> {
        let (key_field, value_field) = entry_fields(field)?;
        let entry = self.add_message(field)?;
        entry.set_scalar(key_field, key)?;
        entry.set_scalar(value_field, value)
    }

    /// Add a `key -> message` entry to a map field, returning the empty
    /// value message for filling.
    fn insert_map_message(
        &mut self,
        field: &FieldSchema,
        key: ScalarValue,
    ) -> Result<&mut Self, MessageError> {
        let (key_field, value_field) = entry_fields(field)?;
        let entry = self.add_message(field)?;
        entry.set_scalar(key_field, key)?;
        entry.mutable_message(value_field)
    }
}

/// Key and value fields of a map field's entry schema.
pub(crate) fn entry_fields(
    field: &FieldSchema,
) -> Result<(&FieldSchema, &FieldSchema), MessageError> {
    match field.message_schema().map(|entry| entry.fields()) {
        Some([key, value]) if field.is_map() => Ok((key, value)),
        _ => Err(MessageError::InvalidOperation(format!(
            "{} is not a map",
            field.name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_accessors() {
        let v = ScalarValue::from(42u32);
        assert_eq!(v.as_u32(), Some(42));
        assert_eq!(v.as_i32(), None);

        let v = ScalarValue::from(std::f64::consts::PI);
        assert_eq!(v.as_f64(), Some(std::f64::consts::PI));

        let v = ScalarValue::from("hello");
        assert_eq!(v.as_str(), Some("hello"));
        assert_eq!(v.kind_name(), "string");

        assert_eq!(ScalarValue::Enum(2).enum_number(), Some(2));
        assert_eq!(ScalarValue::I32(2).enum_number(), None);
    }

    #[test]
    fn test_scalar_display() {
        assert_eq!(ScalarValue::I64(-5).to_string(), "-5");
        assert_eq!(ScalarValue::from("a\"b").to_string(), "\"a\\\"b\"");
        assert_eq!(ScalarValue::Bytes(vec![0, 255]).to_string(), "\"\\x00\\xff\"");
    }

    #[test]
    fn test_message_error_display() {
        let err = MessageError::IndexOutOfBounds {
            index: 3,
            length: 2,
        };
        assert_eq!(err.to_string(), "Index out of bounds: 3 >= 2");
    }
}
