// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Message schemas for runtime type information.
//!
//! A [`MessageSchema`] is the ordered field list of a reflective message.
//! The conversion engine derives the native struct layout from it, so field
//! order here is struct declaration order.
//!
//! # Example
//!
//! ```rust
//! use protostruct::schema::{FieldKind, SchemaBuilder};
//!
//! let point = SchemaBuilder::new("Point")
//!     .field("x", FieldKind::Double)
//!     .field("y", FieldKind::Double)
//!     .build();
//!
//! assert_eq!(point.fields().len(), 2);
//! assert_eq!(point.field_index("y"), Some(1));
//! ```

mod builder;

pub use builder::{EnumBuilder, SchemaBuilder};

use crate::reflect::ScalarValue;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Field value kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Int32,
    Int64,
    UInt32,
    UInt64,
    Float,
    Double,
    Bool,
    Enum(Arc<EnumSchema>),
    String,
    Bytes,
    /// Nested message.
    Message(Arc<MessageSchema>),
    /// Legacy proto2 group. Carried by the schema model but has no native
    /// representation.
    Group(Arc<MessageSchema>),
}

impl FieldKind {
    /// Kind name as written in a `.proto` file.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::UInt32 => "uint32",
            Self::UInt64 => "uint64",
            Self::Float => "float",
            Self::Double => "double",
            Self::Bool => "bool",
            Self::Enum(_) => "enum",
            Self::String => "string",
            Self::Bytes => "bytes",
            Self::Message(_) => "message",
            Self::Group(_) => "group",
        }
    }

    /// Nested schema for message kinds.
    pub fn message_schema(&self) -> Option<&Arc<MessageSchema>> {
        match self {
            Self::Message(schema) => Some(schema),
            _ => None,
        }
    }

    /// Default value of a scalar kind (`None` for messages).
    pub fn default_value(&self) -> Option<ScalarValue> {
        Some(match self {
            Self::Int32 => ScalarValue::I32(0),
            Self::Int64 => ScalarValue::I64(0),
            Self::UInt32 => ScalarValue::U32(0),
            Self::UInt64 => ScalarValue::U64(0),
            Self::Float => ScalarValue::F32(0.0),
            Self::Double => ScalarValue::F64(0.0),
            Self::Bool => ScalarValue::Bool(false),
            Self::Enum(e) => ScalarValue::Enum(e.default_number()),
            Self::String => ScalarValue::String(String::new()),
            Self::Bytes => ScalarValue::Bytes(Vec::new()),
            Self::Message(_) | Self::Group(_) => return None,
        })
    }

    /// Check if `value` is acceptable for a field of this kind.
    pub fn accepts(&self, value: &ScalarValue) -> bool {
        matches!(
            (self, value),
            (Self::Int32, ScalarValue::I32(_))
                | (Self::Int64, ScalarValue::I64(_))
                | (Self::UInt32, ScalarValue::U32(_))
                | (Self::UInt64, ScalarValue::U64(_))
                | (Self::Float, ScalarValue::F32(_))
                | (Self::Double, ScalarValue::F64(_))
                | (Self::Bool, ScalarValue::Bool(_))
                | (Self::Enum(_), ScalarValue::Enum(_))
                | (Self::String, ScalarValue::String(_))
                | (Self::Bytes, ScalarValue::Bytes(_))
        )
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enum(e) => write!(f, "enum {}", e.name),
            Self::Message(m) => write!(f, "message {}", m.name),
            Self::Group(m) => write!(f, "group {}", m.name),
            other => f.write_str(other.name()),
        }
    }
}

/// Field cardinality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    Singular,
    /// Repeated list.
    Repeated,
    /// Repeated list of two-field entries (`map<K, V>`).
    Map,
}

/// Field descriptor for message members.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    /// Field name.
    pub name: String,
    /// Field number (tag).
    pub number: u32,
    /// Value kind. For map fields this is `Message(entry)`.
    pub kind: FieldKind,
    /// Singular, repeated or map.
    pub cardinality: Cardinality,
}

impl FieldSchema {
    /// Create a singular field.
    pub fn new(name: impl Into<String>, number: u32, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            number,
            kind,
            cardinality: Cardinality::Singular,
        }
    }

    /// Create a repeated field.
    pub fn repeated(name: impl Into<String>, number: u32, kind: FieldKind) -> Self {
        Self {
            cardinality: Cardinality::Repeated,
            ..Self::new(name, number, kind)
        }
    }

    /// Create a map field over an entry schema.
    pub fn map(name: impl Into<String>, number: u32, entry: Arc<MessageSchema>) -> Self {
        Self {
            cardinality: Cardinality::Map,
            ..Self::new(name, number, FieldKind::Message(entry))
        }
    }

    /// Check if this field is a list or a map.
    pub fn is_repeated(&self) -> bool {
        self.cardinality != Cardinality::Singular
    }

    /// Check if this field is a map.
    pub fn is_map(&self) -> bool {
        self.cardinality == Cardinality::Map
    }

    /// Nested schema for message and map fields.
    pub fn message_schema(&self) -> Option<&Arc<MessageSchema>> {
        self.kind.message_schema()
    }
}

/// A complete message schema.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageSchema {
    /// Message type name.
    pub name: String,
    fields: Vec<FieldSchema>,
    map_entry: bool,
    by_number: HashMap<u32, usize>,
    by_name: HashMap<String, usize>,
}

impl MessageSchema {
    /// Create a message schema from its ordered fields.
    pub fn new(name: impl Into<String>, fields: Vec<FieldSchema>) -> Self {
        Self::indexed(name.into(), fields, false)
    }

    /// Create the synthetic two-field entry schema of a `map<K, V>` field.
    pub fn map_entry(name: impl Into<String>, key: FieldKind, value: FieldKind) -> Self {
        let fields = vec![
            FieldSchema::new("key", 1, key),
            FieldSchema::new("value", 2, value),
        ];
        Self::indexed(name.into(), fields, true)
    }

    fn indexed(name: String, fields: Vec<FieldSchema>, map_entry: bool) -> Self {
        let by_number = fields.iter().enumerate().map(|(i, f)| (f.number, i)).collect();
        let by_name = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.clone(), i))
            .collect();
        Self {
            name,
            fields,
            map_entry,
            by_number,
            by_name,
        }
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    /// Get field by name.
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.field_index(name).map(|i| &self.fields[i])
    }

    /// Get field index by name.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Index of `field` in this schema, matched by number and name.
    pub fn position_of(&self, field: &FieldSchema) -> Option<usize> {
        self.by_number
            .get(&field.number)
            .copied()
            .filter(|&i| self.fields[i].name == field.name)
    }

    /// Check if this is a synthetic map entry.
    pub fn is_map_entry(&self) -> bool {
        self.map_entry
    }

    /// Key field of a map entry.
    pub fn map_key(&self) -> Option<&FieldSchema> {
        self.map_entry.then(|| self.fields.first()).flatten()
    }

    /// Value field of a map entry.
    pub fn map_value(&self) -> Option<&FieldSchema> {
        self.map_entry.then(|| self.fields.get(1)).flatten()
    }
}

/// Enumeration schema.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumSchema {
    /// Enum type name.
    pub name: String,
    /// Enum variants, first one is the default.
    pub variants: Vec<EnumVariant>,
}

impl EnumSchema {
    /// Create enum schema.
    pub fn new(name: impl Into<String>, variants: Vec<EnumVariant>) -> Self {
        Self {
            name: name.into(),
            variants,
        }
    }

    /// Number of the first declared variant (0 for an empty enum).
    pub fn default_number(&self) -> i32 {
        self.variants.first().map_or(0, |v| v.number)
    }

    /// Get variant by name.
    pub fn variant(&self, name: &str) -> Option<&EnumVariant> {
        self.variants.iter().find(|v| v.name == name)
    }

    /// Get variant by number.
    pub fn variant_by_number(&self, number: i32) -> Option<&EnumVariant> {
        self.variants.iter().find(|v| v.number == number)
    }
}

/// Enum variant.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumVariant {
    /// Variant name.
    pub name: String,
    /// Variant number.
    pub number: i32,
}

impl EnumVariant {
    /// Create enum variant.
    pub fn new(name: impl Into<String>, number: i32) -> Self {
        Self {
            name: name.into(),
            number,
        }
    }
}
