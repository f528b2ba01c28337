// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! DynamicMessage container for runtime message manipulation.

use super::{MessageError, ReflectMessage, ScalarValue};
use crate::schema::{Cardinality, FieldKind, FieldSchema, MessageSchema};
use std::fmt;
use std::sync::Arc;

/// Storage of one field.
#[derive(Debug, Clone, PartialEq)]
enum Slot {
    Scalar(ScalarValue),
    List(Vec<ScalarValue>),
    /// Singular sub-message, created on first mutable access.
    Message(Option<Box<DynamicMessage>>),
    /// Repeated sub-messages or map entries, in insertion order.
    Messages(Vec<DynamicMessage>),
}

impl Slot {
    fn empty(field: &FieldSchema) -> Self {
        match (field.cardinality, field.kind.default_value()) {
            (Cardinality::Singular, Some(value)) => Self::Scalar(value),
            (Cardinality::Singular, None) => Self::Message(None),
            (Cardinality::Repeated, Some(_)) => Self::List(Vec::new()),
            _ => Self::Messages(Vec::new()),
        }
    }
}

fn nested_schema(field: &FieldSchema) -> Result<Arc<MessageSchema>, MessageError> {
    match &field.kind {
        FieldKind::Message(schema) | FieldKind::Group(schema) => Ok(Arc::clone(schema)),
        other => Err(MessageError::InvalidOperation(format!(
            "{} is {}, not a message",
            field.name, other
        ))),
    }
}

/// Dynamic message with runtime type checking.
///
/// Field values are stored per field in schema declaration order. Unset
/// scalars read as their kind's default; map entries keep insertion order and
/// are not deduplicated, exactly like the entry list of a reflective map
/// field.
#[derive(Debug, Clone)]
pub struct DynamicMessage {
    /// Message schema.
    schema: Arc<MessageSchema>,
    /// One slot per schema field.
    slots: Vec<Slot>,
}

impl DynamicMessage {
    /// Create a new message with default values.
    pub fn new(schema: &Arc<MessageSchema>) -> Self {
        Self {
            schema: Arc::clone(schema),
            slots: schema.fields().iter().map(Slot::empty).collect(),
        }
    }

    /// Get the message schema.
    pub fn descriptor(&self) -> &Arc<MessageSchema> {
        &self.schema
    }

    /// Reset every field to its default.
    pub fn clear(&mut self) {
        self.slots = self.schema.fields().iter().map(Slot::empty).collect();
    }

    /// Check if every field holds its default.
    pub fn is_default(&self) -> bool {
        *self == Self::new(&self.schema)
    }

    fn slot_index(&self, field: &FieldSchema) -> Result<usize, MessageError> {
        self.schema
            .position_of(field)
            .ok_or_else(|| MessageError::FieldNotFound(field.name.clone()))
    }

    fn named(&self, name: &str) -> Result<(Arc<MessageSchema>, usize), MessageError> {
        let index = self
            .schema
            .field_index(name)
            .ok_or_else(|| MessageError::FieldNotFound(name.to_string()))?;
        Ok((Arc::clone(&self.schema), index))
    }

    /// Get a singular scalar field value by name.
    pub fn get<T: FromScalarValue>(&self, name: &str) -> Result<T, MessageError> {
        let (schema, index) = self.named(name)?;
        let field = &schema.fields()[index];
        let value = self.get_scalar(field)?;
        T::from_scalar(&value).ok_or_else(|| MessageError::TypeMismatch {
            field: name.to_string(),
            expected: T::KIND.to_string(),
            got: value.kind_name().to_string(),
        })
    }

    /// Set a singular scalar field value by name.
    pub fn set(&mut self, name: &str, value: impl Into<ScalarValue>) -> Result<(), MessageError> {
        let (schema, index) = self.named(name)?;
        self.set_scalar(&schema.fields()[index], value.into())
    }

    /// Append to a repeated scalar field by name.
    pub fn push(&mut self, name: &str, value: impl Into<ScalarValue>) -> Result<(), MessageError> {
        let (schema, index) = self.named(name)?;
        self.add_scalar(&schema.fields()[index], value.into())
    }

    /// Elements of a repeated scalar field.
    pub fn list(&self, name: &str) -> Result<&[ScalarValue], MessageError> {
        let (_, index) = self.named(name)?;
        match &self.slots[index] {
            Slot::List(values) => Ok(values),
            _ => Err(MessageError::InvalidOperation(format!(
                "{} is not a repeated scalar",
                name
            ))),
        }
    }

    /// Singular sub-message by name, `None` when absent.
    pub fn message(&self, name: &str) -> Result<Option<&DynamicMessage>, MessageError> {
        let (_, index) = self.named(name)?;
        match &self.slots[index] {
            Slot::Message(message) => Ok(message.as_deref()),
            _ => Err(MessageError::InvalidOperation(format!(
                "{} is not a singular message",
                name
            ))),
        }
    }

    /// Singular sub-message by name for writing, created when absent.
    pub fn message_mut(&mut self, name: &str) -> Result<&mut DynamicMessage, MessageError> {
        let (schema, index) = self.named(name)?;
        self.mutable_message(&schema.fields()[index])
    }

    /// Elements of a repeated message or map field.
    pub fn messages(&self, name: &str) -> Result<&[DynamicMessage], MessageError> {
        let (_, index) = self.named(name)?;
        match &self.slots[index] {
            Slot::Messages(messages) => Ok(messages),
            _ => Err(MessageError::InvalidOperation(format!(
                "{} is not a repeated message",
                name
            ))),
        }
    }

    /// Append a new element to a repeated message field by name.
    pub fn push_message(&mut self, name: &str) -> Result<&mut DynamicMessage, MessageError> {
        let (schema, index) = self.named(name)?;
        self.add_message(&schema.fields()[index])
    }

    /// Append a `key -> value` entry to a map field with a scalar value.
    ///
    /// Entries are not deduplicated.
    pub fn add_map_entry(
        &mut self,
        name: &str,
        key: impl Into<ScalarValue>,
        value: impl Into<ScalarValue>,
    ) -> Result<(), MessageError> {
        let (schema, index) = self.named(name)?;
        self.insert_map_scalar(&schema.fields()[index], key.into(), value.into())
    }

    /// Append a `key -> message` entry to a map field, returning the value
    /// message for filling.
    pub fn add_map_message_entry(
        &mut self,
        name: &str,
        key: impl Into<ScalarValue>,
    ) -> Result<&mut DynamicMessage, MessageError> {
        let (schema, index) = self.named(name)?;
        self.insert_map_message(&schema.fields()[index], key.into())
    }

    fn write_text(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let pad = "  ".repeat(indent);
        for (field, slot) in self.schema.fields().iter().zip(&self.slots) {
            match slot {
                Slot::Scalar(value) => {
                    if field.kind.default_value().as_ref() != Some(value) {
                        write!(f, "{}{}: ", pad, field.name)?;
                        write_scalar(f, &field.kind, value)?;
                        writeln!(f)?;
                    }
                }
                Slot::List(values) => {
                    for value in values {
                        write!(f, "{}{}: ", pad, field.name)?;
                        write_scalar(f, &field.kind, value)?;
                        writeln!(f)?;
                    }
                }
                Slot::Message(Some(message)) => {
                    writeln!(f, "{}{} {{", pad, field.name)?;
                    message.write_text(f, indent + 1)?;
                    writeln!(f, "{}}}", pad)?;
                }
                Slot::Message(None) => {}
                Slot::Messages(messages) => {
                    for message in messages {
                        writeln!(f, "{}{} {{", pad, field.name)?;
                        message.write_text(f, indent + 1)?;
                        writeln!(f, "{}}}", pad)?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn write_scalar(f: &mut fmt::Formatter<'_>, kind: &FieldKind, value: &ScalarValue) -> fmt::Result {
    if let (FieldKind::Enum(schema), ScalarValue::Enum(number)) = (kind, value) {
        if let Some(variant) = schema.variant_by_number(*number) {
            return f.write_str(&variant.name);
        }
    }
    write!(f, "{}", value)
}

/// Debug dump in protobuf text format.
impl fmt::Display for DynamicMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_text(f, 0)
    }
}

impl PartialEq for DynamicMessage {
    fn eq(&self, other: &Self) -> bool {
        self.schema.name == other.schema.name
            && self.slots.len() == other.slots.len()
            && self.slots.iter().zip(&other.slots).all(|(a, b)| match (a, b) {
                // An absent sub-message equals a present default one.
                (Slot::Message(Some(m)), Slot::Message(None))
                | (Slot::Message(None), Slot::Message(Some(m))) => m.is_default(),
                _ => a == b,
            })
    }
}

impl ReflectMessage for DynamicMessage {
    fn schema(&self) -> Result<Arc<MessageSchema>, MessageError> {
        Ok(Arc::clone(&self.schema))
    }

    fn new_message(&self, schema: &Arc<MessageSchema>) -> Result<Self, MessageError> {
        Ok(Self::new(schema))
    }

    fn get_scalar(&self, field: &FieldSchema) -> Result<ScalarValue, MessageError> {
        match &self.slots[self.slot_index(field)?] {
            Slot::Scalar(value) => Ok(value.clone()),
            _ => Err(MessageError::InvalidOperation(format!(
                "{} is not a singular scalar",
                field.name
            ))),
        }
    }

    fn set_scalar(&mut self, field: &FieldSchema, value: ScalarValue) -> Result<(), MessageError> {
        if !field.kind.accepts(&value) {
            return Err(MessageError::TypeMismatch {
                field: field.name.clone(),
                expected: field.kind.to_string(),
                got: value.kind_name().to_string(),
            });
        }
        let index = self.slot_index(field)?;
        match &mut self.slots[index] {
            Slot::Scalar(slot) => {
                *slot = value;
                Ok(())
            }
            _ => Err(MessageError::InvalidOperation(format!(
                "{} is not a singular scalar",
                field.name
            ))),
        }
    }

    fn repeated_len(&self, field: &FieldSchema) -> usize {
        match self.slot_index(field).map(|i| &self.slots[i]) {
            Ok(Slot::List(values)) => values.len(),
            Ok(Slot::Messages(messages)) => messages.len(),
            _ => 0,
        }
    }

    fn get_repeated_scalar(
        &self,
        field: &FieldSchema,
        index: usize,
    ) -> Result<ScalarValue, MessageError> {
        match &self.slots[self.slot_index(field)?] {
            Slot::List(values) => {
                values
                    .get(index)
                    .cloned()
                    .ok_or(MessageError::IndexOutOfBounds {
                        index,
                        length: values.len(),
                    })
            }
            _ => Err(MessageError::InvalidOperation(format!(
                "{} is not a repeated scalar",
                field.name
            ))),
        }
    }

    fn add_scalar(&mut self, field: &FieldSchema, value: ScalarValue) -> Result<(), MessageError> {
        if !field.kind.accepts(&value) {
            return Err(MessageError::TypeMismatch {
                field: field.name.clone(),
                expected: field.kind.to_string(),
                got: value.kind_name().to_string(),
            });
        }
        let index = self.slot_index(field)?;
        match &mut self.slots[index] {
            Slot::List(values) => {
                values.push(value);
                Ok(())
            }
            _ => Err(MessageError::InvalidOperation(format!(
                "{} is not a repeated scalar",
                field.name
            ))),
        }
    }

    fn get_message(&self, field: &FieldSchema) -> Option<&Self> {
        match self.slot_index(field).map(|i| &self.slots[i]) {
            Ok(Slot::Message(message)) => message.as_deref(),
            _ => None,
        }
    }

    fn mutable_message(&mut self, field: &FieldSchema) -> Result<&mut Self, MessageError> {
        let schema = nested_schema(field)?;
        let index = self.slot_index(field)?;
        match &mut self.slots[index] {
            Slot::Message(message) => {
                Ok(message.get_or_insert_with(|| Box::new(Self::new(&schema))))
            }
            _ => Err(MessageError::InvalidOperation(format!(
                "{} is not a singular message",
                field.name
            ))),
        }
    }

    fn get_repeated_message(
        &self,
        field: &FieldSchema,
        index: usize,
    ) -> Result<&Self, MessageError> {
        match &self.slots[self.slot_index(field)?] {
            Slot::Messages(messages) => {
                messages
                    .get(index)
                    .ok_or(MessageError::IndexOutOfBounds {
                        index,
                        length: messages.len(),
                    })
            }
            _ => Err(MessageError::InvalidOperation(format!(
                "{} is not a repeated message",
                field.name
            ))),
        }
    }

    fn add_message(&mut self, field: &FieldSchema) -> Result<&mut Self, MessageError> {
        let schema = nested_schema(field)?;
        let index = self.slot_index(field)?;
        match &mut self.slots[index] {
            Slot::Messages(messages) => {
                messages.push(Self::new(&schema));
                let last = messages.len() - 1;
                Ok(&mut messages[last])
            }
            _ => Err(MessageError::InvalidOperation(format!(
                "{} is not a repeated message",
                field.name
            ))),
        }
    }
}

/// Trait for reading typed values out of a [`ScalarValue`].
pub trait FromScalarValue: Sized {
    /// Kind name used in mismatch errors.
    const KIND: &'static str;

    fn from_scalar(value: &ScalarValue) -> Option<Self>;
}

macro_rules! impl_from_scalar_value {
    ($ty:ty, $variant:ident, $name:expr) => {
        impl FromScalarValue for $ty {
            const KIND: &'static str = $name;

            fn from_scalar(value: &ScalarValue) -> Option<Self> {
                match value {
                    ScalarValue::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }
        }
    };
}

impl_from_scalar_value!(i64, I64, "int64");
impl_from_scalar_value!(u32, U32, "uint32");
impl_from_scalar_value!(u64, U64, "uint64");
impl_from_scalar_value!(f32, F32, "float");
impl_from_scalar_value!(f64, F64, "double");
impl_from_scalar_value!(bool, Bool, "bool");
impl_from_scalar_value!(String, String, "string");
impl_from_scalar_value!(Vec<u8>, Bytes, "bytes");

/// `i32` also reads enum numbers.
impl FromScalarValue for i32 {
    const KIND: &'static str = "int32";

    fn from_scalar(value: &ScalarValue) -> Option<Self> {
        match value {
            ScalarValue::I32(v) | ScalarValue::Enum(v) => Some(*v),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EnumBuilder, SchemaBuilder};

    fn sample_schema() -> Arc<MessageSchema> {
        let flag = Arc::new(EnumBuilder::new("Enum").variant("EN_FLAG1").variant("EN_FLAG2").build());
        let inner = Arc::new(SchemaBuilder::new("Inner").field("v", FieldKind::Int64).build());
        Arc::new(
            SchemaBuilder::new("Sample")
                .field("id", FieldKind::Int32)
                .field("ratio", FieldKind::Double)
                .string_field("name")
                .enum_field("flag", flag)
                .repeated_field("ids", FieldKind::UInt32)
                .message_field("inner", inner.clone())
                .repeated_message_field("inners", inner)
                .map_field("tags", FieldKind::String, FieldKind::Int32)
                .build(),
        )
    }

    #[test]
    fn test_set_get_scalars() {
        let schema = sample_schema();
        let mut msg = DynamicMessage::new(&schema);

        msg.set("id", 42i32).expect("set id");
        msg.set("ratio", 0.5f64).expect("set ratio");
        msg.set("name", "sensor").expect("set name");
        msg.set("flag", ScalarValue::Enum(1)).expect("set flag");

        assert_eq!(msg.get::<i32>("id").expect("get id"), 42);
        assert_eq!(msg.get::<f64>("ratio").expect("get ratio"), 0.5);
        assert_eq!(msg.get::<String>("name").expect("get name"), "sensor");
        assert_eq!(msg.get::<i32>("flag").expect("get flag"), 1);
        assert!(msg.get::<i32>("missing").is_err());
    }

    #[test]
    fn test_unset_scalars_read_default() {
        let schema = sample_schema();
        let msg = DynamicMessage::new(&schema);
        assert_eq!(msg.get::<i32>("id").expect("id"), 0);
        assert_eq!(msg.get::<String>("name").expect("name"), "");
        assert!(msg.is_default());
    }

    #[test]
    fn test_type_mismatch_rejected() {
        let schema = sample_schema();
        let mut msg = DynamicMessage::new(&schema);
        let err = msg.set("id", 1i64).expect_err("int64 into int32");
        assert!(matches!(err, MessageError::TypeMismatch { .. }));
        assert!(msg.push("id", 1i32).is_err());
    }

    #[test]
    fn test_repeated_and_nested() {
        let schema = sample_schema();
        let mut msg = DynamicMessage::new(&schema);
        msg.push("ids", 7u32).expect("push");
        msg.push("ids", 9u32).expect("push");
        msg.message_mut("inner").expect("inner").set("v", 5i64).expect("set v");
        msg.push_message("inners").expect("inners").set("v", 6i64).expect("set v");

        assert_eq!(msg.list("ids").expect("ids"), &[ScalarValue::U32(7), ScalarValue::U32(9)]);
        let inner = msg.message("inner").expect("inner").expect("present");
        assert_eq!(inner.get::<i64>("v").expect("v"), 5);
        assert_eq!(msg.messages("inners").expect("inners").len(), 1);
    }

    #[test]
    fn test_map_entries_keep_duplicates_in_order() {
        let schema = sample_schema();
        let mut msg = DynamicMessage::new(&schema);
        msg.add_map_entry("tags", "b", 2i32).expect("entry");
        msg.add_map_entry("tags", "a", 1i32).expect("entry");
        msg.add_map_entry("tags", "b", 3i32).expect("entry");

        let entries = msg.messages("tags").expect("tags");
        let keys: Vec<String> = entries
            .iter()
            .map(|e| e.get::<String>("key").expect("key"))
            .collect();
        assert_eq!(keys, vec!["b", "a", "b"]);
        assert!(msg.add_map_entry("ids", 1u32, 1u32).is_err());
    }

    #[test]
    fn test_absent_message_equals_default_message() {
        let schema = sample_schema();
        let a = DynamicMessage::new(&schema);
        let mut b = DynamicMessage::new(&schema);
        b.message_mut("inner").expect("inner");
        assert_eq!(a, b);

        b.message_mut("inner").expect("inner").set("v", 1i64).expect("v");
        assert_ne!(a, b);
    }

    #[test]
    fn test_display_text_format() {
        let schema = sample_schema();
        let mut msg = DynamicMessage::new(&schema);
        msg.set("id", 3i32).expect("id");
        msg.set("flag", ScalarValue::Enum(1)).expect("flag");
        msg.add_map_entry("tags", "k", 4i32).expect("entry");

        let text = msg.to_string();
        assert!(text.contains("id: 3\n"));
        assert!(text.contains("flag: EN_FLAG2\n"));
        assert!(text.contains("tags {\n  key: \"k\"\n  value: 4\n}\n"));
        assert!(!text.contains("ratio"));
    }

    #[test]
    fn test_clear() {
        let schema = sample_schema();
        let mut msg = DynamicMessage::new(&schema);
        msg.set("id", 3i32).expect("id");
        msg.clear();
        assert!(msg.is_default());
    }
}
