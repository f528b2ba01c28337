// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bridge between `prost-reflect` descriptors and [`MessageSchema`].
//!
//! [`schema_from_descriptor`] converts a [`MessageDescriptor`] into the
//! schema model the layout calculator walks, and
//! `prost_reflect::DynamicMessage` implements [`ReflectMessage`] on top of
//! its descriptor pool, so protobuf messages convert to and from native
//! structs without a hand-written schema.
//!
//! ## Type Mapping
//!
//! Wire-encoding variants collapse onto their value type: `sint32` and
//! `sfixed32` become `int32`, `fixed64` becomes `uint64`, and so on. Map
//! fields get a synthetic `key`/`value` entry schema named after the entry
//! descriptor. Recursive messages have no native layout and are rejected.

use super::{entry_fields, MapEntry, MapValue, MessageError, ReflectMessage, ScalarValue};
use crate::schema::{EnumSchema, EnumVariant, FieldKind, FieldSchema, MessageSchema};
use prost_reflect::{
    DynamicMessage, EnumDescriptor, FieldDescriptor, Kind, MapKey, MessageDescriptor,
    ReflectMessage as _, Value,
};
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Descriptor -> schema
// ---------------------------------------------------------------------------

/// Build the schema of `descriptor` and every message type it reaches.
///
/// Schemas are named by full type name, which is how
/// [`ReflectMessage::new_message`] finds them back in the pool.
///
/// # Errors
///
/// [`MessageError::InvalidOperation`] when a message type contains itself,
/// directly or through other messages.
pub fn schema_from_descriptor(
    descriptor: &MessageDescriptor,
) -> Result<Arc<MessageSchema>, MessageError> {
    SchemaConverter::default().message(descriptor)
}

#[derive(Default)]
struct SchemaConverter {
    messages: HashMap<String, Arc<MessageSchema>>,
    enums: HashMap<String, Arc<EnumSchema>>,
    in_progress: Vec<String>,
}

impl SchemaConverter {
    fn message(&mut self, descriptor: &MessageDescriptor) -> Result<Arc<MessageSchema>, MessageError> {
        let name = descriptor.full_name();
        if let Some(schema) = self.messages.get(name) {
            return Ok(Arc::clone(schema));
        }
        if self.in_progress.iter().any(|pending| pending == name) {
            return Err(MessageError::InvalidOperation(format!(
                "recursive message {} has no native layout",
                name
            )));
        }

        self.in_progress.push(name.to_string());
        let fields: Result<Vec<_>, _> = descriptor.fields().map(|f| self.field(&f)).collect();
        self.in_progress.pop();

        let schema = Arc::new(MessageSchema::new(name, fields?));
        self.messages.insert(name.to_string(), Arc::clone(&schema));
        Ok(schema)
    }

    fn field(&mut self, field: &FieldDescriptor) -> Result<FieldSchema, MessageError> {
        let number = field.number();
        if field.is_map() {
            let entry = field.kind();
            let entry = entry.as_message().ok_or_else(|| {
                MessageError::InvalidOperation(format!("map {} has no entry type", field.name()))
            })?;
            let key = self.kind(&entry_field(entry, 1)?)?;
            let value = self.kind(&entry_field(entry, 2)?)?;
            let schema = MessageSchema::map_entry(entry.full_name(), key, value);
            return Ok(FieldSchema::map(field.name(), number, Arc::new(schema)));
        }

        let kind = self.kind(field)?;
        Ok(if field.is_list() {
            FieldSchema::repeated(field.name(), number, kind)
        } else {
            FieldSchema::new(field.name(), number, kind)
        })
    }

    fn kind(&mut self, field: &FieldDescriptor) -> Result<FieldKind, MessageError> {
        Ok(match field.kind() {
            Kind::Double => FieldKind::Double,
            Kind::Float => FieldKind::Float,
            Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => FieldKind::Int32,
            Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => FieldKind::Int64,
            Kind::Uint32 | Kind::Fixed32 => FieldKind::UInt32,
            Kind::Uint64 | Kind::Fixed64 => FieldKind::UInt64,
            Kind::Bool => FieldKind::Bool,
            Kind::String => FieldKind::String,
            Kind::Bytes => FieldKind::Bytes,
            Kind::Enum(e) => FieldKind::Enum(self.enumeration(&e)),
            Kind::Message(m) if field.is_group() => FieldKind::Group(self.message(&m)?),
            Kind::Message(m) => FieldKind::Message(self.message(&m)?),
        })
    }

    fn enumeration(&mut self, descriptor: &EnumDescriptor) -> Arc<EnumSchema> {
        let name = descriptor.full_name();
        if let Some(schema) = self.enums.get(name) {
            return Arc::clone(schema);
        }
        let variants = descriptor
            .values()
            .map(|v| EnumVariant::new(v.name(), v.number()))
            .collect();
        let schema = Arc::new(EnumSchema::new(name, variants));
        self.enums.insert(name.to_string(), Arc::clone(&schema));
        schema
    }
}

fn entry_field(entry: &MessageDescriptor, number: u32) -> Result<FieldDescriptor, MessageError> {
    entry.get_field(number).ok_or_else(|| {
        MessageError::FieldNotFound(format!("{}.{}", entry.full_name(), number))
    })
}

// ---------------------------------------------------------------------------
// Value conversion
// ---------------------------------------------------------------------------

fn scalar_of(value: &Value) -> Option<ScalarValue> {
    Some(match value {
        Value::Bool(v) => ScalarValue::Bool(*v),
        Value::I32(v) => ScalarValue::I32(*v),
        Value::I64(v) => ScalarValue::I64(*v),
        Value::U32(v) => ScalarValue::U32(*v),
        Value::U64(v) => ScalarValue::U64(*v),
        Value::F32(v) => ScalarValue::F32(*v),
        Value::F64(v) => ScalarValue::F64(*v),
        Value::EnumNumber(v) => ScalarValue::Enum(*v),
        Value::String(v) => ScalarValue::String(v.clone()),
        Value::Bytes(v) => ScalarValue::Bytes(v.to_vec()),
        _ => return None,
    })
}

fn value_of(value: ScalarValue) -> Value {
    match value {
        ScalarValue::Bool(v) => Value::Bool(v),
        ScalarValue::I32(v) => Value::I32(v),
        ScalarValue::I64(v) => Value::I64(v),
        ScalarValue::U32(v) => Value::U32(v),
        ScalarValue::U64(v) => Value::U64(v),
        ScalarValue::F32(v) => Value::F32(v),
        ScalarValue::F64(v) => Value::F64(v),
        ScalarValue::Enum(v) => Value::EnumNumber(v),
        ScalarValue::String(v) => Value::String(v),
        ScalarValue::Bytes(v) => Value::Bytes(v.into()),
    }
}

fn scalar_of_key(key: &MapKey) -> ScalarValue {
    match key {
        MapKey::Bool(v) => ScalarValue::Bool(*v),
        MapKey::I32(v) => ScalarValue::I32(*v),
        MapKey::I64(v) => ScalarValue::I64(*v),
        MapKey::U32(v) => ScalarValue::U32(*v),
        MapKey::U64(v) => ScalarValue::U64(*v),
        MapKey::String(v) => ScalarValue::String(v.clone()),
    }
}

fn key_of(field: &FieldSchema, key: ScalarValue) -> Result<MapKey, MessageError> {
    Ok(match key {
        ScalarValue::Bool(v) => MapKey::Bool(v),
        ScalarValue::I32(v) => MapKey::I32(v),
        ScalarValue::I64(v) => MapKey::I64(v),
        ScalarValue::U32(v) => MapKey::U32(v),
        ScalarValue::U64(v) => MapKey::U64(v),
        ScalarValue::String(v) => MapKey::String(v),
        other => return Err(mismatch(field, "map key", &other)),
    })
}

fn mismatch(field: &FieldSchema, expected: &str, got: &ScalarValue) -> MessageError {
    MessageError::TypeMismatch {
        field: field.name.clone(),
        expected: expected.to_string(),
        got: got.kind_name().to_string(),
    }
}

fn not_a(field: &FieldSchema, what: &str) -> MessageError {
    MessageError::InvalidOperation(format!("{} is not a {}", field.name, what))
}

fn check_kind(field: &FieldSchema, kind: &FieldKind, value: &ScalarValue) -> Result<(), MessageError> {
    if kind.accepts(value) {
        Ok(())
    } else {
        Err(mismatch(field, kind.name(), value))
    }
}

/// Message type of a message-valued field (element type for lists).
fn message_type(descriptor: &FieldDescriptor) -> Option<MessageDescriptor> {
    descriptor.kind().as_message().cloned()
}

// ---------------------------------------------------------------------------
// ReflectMessage for prost_reflect::DynamicMessage
// ---------------------------------------------------------------------------

/// Descriptor of `field` in `message`, matched by number and name.
fn field_descriptor(
    message: &DynamicMessage,
    field: &FieldSchema,
) -> Result<FieldDescriptor, MessageError> {
    message
        .descriptor()
        .get_field(field.number)
        .filter(|d| d.name() == field.name)
        .ok_or_else(|| MessageError::FieldNotFound(field.name.clone()))
}

impl ReflectMessage for DynamicMessage {
    fn schema(&self) -> Result<Arc<MessageSchema>, MessageError> {
        schema_from_descriptor(&self.descriptor())
    }

    fn new_message(&self, schema: &Arc<MessageSchema>) -> Result<Self, MessageError> {
        self.descriptor()
            .parent_pool()
            .get_message_by_name(&schema.name)
            .map(DynamicMessage::new)
            .ok_or_else(|| MessageError::FieldNotFound(schema.name.clone()))
    }

    fn get_scalar(&self, field: &FieldSchema) -> Result<ScalarValue, MessageError> {
        let descriptor = field_descriptor(self, field)?;
        let value = self.get_field(&descriptor);
        scalar_of(&value).ok_or_else(|| not_a(field, "scalar"))
    }

    fn set_scalar(&mut self, field: &FieldSchema, value: ScalarValue) -> Result<(), MessageError> {
        let descriptor = field_descriptor(self, field)?;
        check_kind(field, &field.kind, &value)?;
        self.try_set_field(&descriptor, value_of(value))
            .map_err(|e| MessageError::InvalidOperation(e.to_string()))
    }

    fn repeated_len(&self, field: &FieldSchema) -> usize {
        let Ok(descriptor) = field_descriptor(self, field) else {
            return 0;
        };
        let value = self.get_field(&descriptor);
        match &*value {
            Value::List(list) => list.len(),
            Value::Map(map) => map.len(),
            _ => 0,
        }
    }

    fn get_repeated_scalar(
        &self,
        field: &FieldSchema,
        index: usize,
    ) -> Result<ScalarValue, MessageError> {
        let descriptor = field_descriptor(self, field)?;
        let value = self.get_field(&descriptor);
        let list = value.as_list().ok_or_else(|| not_a(field, "list"))?;
        let item = list.get(index).ok_or(MessageError::IndexOutOfBounds {
            index,
            length: list.len(),
        })?;
        scalar_of(item).ok_or_else(|| not_a(field, "scalar list"))
    }

    fn add_scalar(&mut self, field: &FieldSchema, value: ScalarValue) -> Result<(), MessageError> {
        let descriptor = field_descriptor(self, field)?;
        check_kind(field, &field.kind, &value)?;
        let list = self
            .get_field_mut(&descriptor)
            .as_list_mut()
            .ok_or_else(|| not_a(field, "list"))?;
        list.push(value_of(value));
        Ok(())
    }

    fn get_message(&self, field: &FieldSchema) -> Option<&Self> {
        let descriptor = field_descriptor(self, field).ok()?;
        // Unset fields come back as an owned default.
        match self.get_field(&descriptor) {
            Cow::Borrowed(Value::Message(message)) => Some(message),
            _ => None,
        }
    }

    fn mutable_message(&mut self, field: &FieldSchema) -> Result<&mut Self, MessageError> {
        let descriptor = field_descriptor(self, field)?;
        self.get_field_mut(&descriptor)
            .as_message_mut()
            .ok_or_else(|| not_a(field, "message"))
    }

    fn get_repeated_message(
        &self,
        field: &FieldSchema,
        index: usize,
    ) -> Result<&Self, MessageError> {
        let descriptor = field_descriptor(self, field)?;
        let list = match self.get_field(&descriptor) {
            Cow::Borrowed(Value::List(list)) => list.as_slice(),
            Cow::Borrowed(_) => return Err(not_a(field, "list")),
            Cow::Owned(_) => &[],
        };
        let item = list.get(index).ok_or(MessageError::IndexOutOfBounds {
            index,
            length: list.len(),
        })?;
        item.as_message().ok_or_else(|| not_a(field, "message list"))
    }

    fn add_message(&mut self, field: &FieldSchema) -> Result<&mut Self, MessageError> {
        let descriptor = field_descriptor(self, field)?;
        let element = message_type(&descriptor).ok_or_else(|| not_a(field, "message list"))?;
        let list = self
            .get_field_mut(&descriptor)
            .as_list_mut()
            .ok_or_else(|| not_a(field, "list"))?;
        list.push(Value::Message(DynamicMessage::new(element)));
        list.last_mut()
            .and_then(Value::as_message_mut)
            .ok_or_else(|| not_a(field, "message list"))
    }

    fn map_entries(&self, field: &FieldSchema) -> Result<Vec<MapEntry<'_, Self>>, MessageError> {
        let (_, value_field) = entry_fields(field)?;
        let descriptor = field_descriptor(self, field)?;
        let map = match self.get_field(&descriptor) {
            Cow::Borrowed(value) => value.as_map().ok_or_else(|| not_a(field, "map"))?,
            Cow::Owned(_) => return Ok(Vec::new()),
        };
        map.iter()
            .map(|(key, value)| {
                let value = match value_field.kind {
                    FieldKind::Message(_) => MapValue::Message(value.as_message()),
                    _ => MapValue::Scalar(
                        scalar_of(value).ok_or_else(|| not_a(value_field, "scalar"))?,
                    ),
                };
                Ok((scalar_of_key(key), value))
            })
            .collect()
    }

    fn insert_map_scalar(
        &mut self,
        field: &FieldSchema,
        key: ScalarValue,
        value: ScalarValue,
    ) -> Result<(), MessageError> {
        let (key_field, value_field) = entry_fields(field)?;
        check_kind(field, &key_field.kind, &key)?;
        check_kind(field, &value_field.kind, &value)?;
        let descriptor = field_descriptor(self, field)?;
        let key = key_of(field, key)?;
        let map = self
            .get_field_mut(&descriptor)
            .as_map_mut()
            .ok_or_else(|| not_a(field, "map"))?;
        map.insert(key, value_of(value));
        Ok(())
    }

    fn insert_map_message(
        &mut self,
        field: &FieldSchema,
        key: ScalarValue,
    ) -> Result<&mut Self, MessageError> {
        let (key_field, _) = entry_fields(field)?;
        check_kind(field, &key_field.kind, &key)?;
        let descriptor = field_descriptor(self, field)?;
        let value_type = message_type(&descriptor)
            .and_then(|entry| entry.get_field(2))
            .as_ref()
            .and_then(message_type)
            .ok_or_else(|| not_a(field, "message map"))?;
        let key = key_of(field, key)?;
        let map = self
            .get_field_mut(&descriptor)
            .as_map_mut()
            .ok_or_else(|| not_a(field, "map"))?;
        map.insert(key.clone(), Value::Message(DynamicMessage::new(value_type)));
        map.get_mut(&key)
            .and_then(Value::as_message_mut)
            .ok_or_else(|| not_a(field, "message map"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost_reflect::DescriptorPool;
    use prost_types::field_descriptor_proto::{Label, Type};
    use prost_types::{
        DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
        FileDescriptorProto, MessageOptions,
    };

    fn field(name: &str, number: i32, ty: Type, label: Label) -> FieldDescriptorProto {
        FieldDescriptorProto {
            name: Some(name.into()),
            number: Some(number),
            r#type: Some(ty as i32),
            label: Some(label as i32),
            ..Default::default()
        }
    }

    fn typed(mut proto: FieldDescriptorProto, type_name: &str) -> FieldDescriptorProto {
        proto.type_name = Some(type_name.into());
        proto
    }

    fn pool() -> DescriptorPool {
        let entry = DescriptorProto {
            name: Some("CountsEntry".into()),
            field: vec![
                field("key", 1, Type::String, Label::Optional),
                field("value", 2, Type::Sint64, Label::Optional),
            ],
            options: Some(MessageOptions {
                map_entry: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };
        let sample = DescriptorProto {
            name: Some("Sample".into()),
            field: vec![
                field("id", 1, Type::Fixed32, Label::Optional),
                typed(field("mode", 2, Type::Enum, Label::Optional), ".demo.Mode"),
                field("values", 3, Type::Double, Label::Repeated),
                typed(field("counts", 4, Type::Message, Label::Repeated), ".demo.Sample.CountsEntry"),
            ],
            nested_type: vec![entry],
            ..Default::default()
        };
        let node = DescriptorProto {
            name: Some("Node".into()),
            field: vec![typed(field("next", 1, Type::Message, Label::Optional), ".demo.Node")],
            ..Default::default()
        };
        let mode = EnumDescriptorProto {
            name: Some("Mode".into()),
            value: [("IDLE", 0), ("RUN", 3)]
                .into_iter()
                .map(|(name, number)| EnumValueDescriptorProto {
                    name: Some(name.into()),
                    number: Some(number),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };
        let file = FileDescriptorProto {
            name: Some("demo.proto".into()),
            package: Some("demo".into()),
            syntax: Some("proto3".into()),
            message_type: vec![sample, node],
            enum_type: vec![mode],
            ..Default::default()
        };

        let mut pool = DescriptorPool::new();
        pool.add_file_descriptor_proto(file).expect("valid file");
        pool
    }

    fn sample() -> DynamicMessage {
        DynamicMessage::new(pool().get_message_by_name("demo.Sample").expect("Sample"))
    }

    #[test]
    fn test_schema_from_descriptor() {
        let schema = sample().schema().expect("schema");
        assert_eq!(schema.name, "demo.Sample");
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["id", "mode", "values", "counts"]);

        assert_eq!(schema.fields()[0].kind, FieldKind::UInt32);
        match &schema.fields()[1].kind {
            FieldKind::Enum(mode) => {
                assert_eq!(mode.name, "demo.Mode");
                assert_eq!(mode.variant("RUN").map(|v| v.number), Some(3));
            }
            other => panic!("expected enum, got {}", other),
        }
        assert!(schema.fields()[2].is_repeated());

        let counts = &schema.fields()[3];
        assert!(counts.is_map());
        let entry = counts.message_schema().expect("entry");
        assert!(entry.is_map_entry());
        assert_eq!(entry.name, "demo.Sample.CountsEntry");
        assert_eq!(entry.map_key().map(|f| &f.kind), Some(&FieldKind::String));
        assert_eq!(entry.map_value().map(|f| &f.kind), Some(&FieldKind::Int64));
    }

    #[test]
    fn test_recursive_descriptor_rejected() {
        let node = pool().get_message_by_name("demo.Node").expect("Node");
        let err = schema_from_descriptor(&node).expect_err("recursive");
        assert!(matches!(err, MessageError::InvalidOperation(_)));
    }

    #[test]
    fn test_scalar_and_list_access() {
        let mut msg = sample();
        let schema = msg.schema().expect("schema");
        let [id, mode, values, _] = schema.fields() else {
            panic!("four fields");
        };

        assert_eq!(msg.get_scalar(id), Ok(ScalarValue::U32(0)));
        msg.set_scalar(id, ScalarValue::U32(7)).expect("set id");
        msg.set_scalar(mode, ScalarValue::Enum(3)).expect("set mode");
        assert_eq!(msg.get_scalar(id), Ok(ScalarValue::U32(7)));
        assert_eq!(msg.get_scalar(mode), Ok(ScalarValue::Enum(3)));

        let err = msg.set_scalar(id, ScalarValue::I64(1)).expect_err("wrong kind");
        assert!(matches!(err, MessageError::TypeMismatch { .. }));

        msg.add_scalar(values, ScalarValue::F64(1.5)).expect("push");
        msg.add_scalar(values, ScalarValue::F64(-2.0)).expect("push");
        assert_eq!(msg.repeated_len(values), 2);
        assert_eq!(msg.get_repeated_scalar(values, 1), Ok(ScalarValue::F64(-2.0)));
        assert_eq!(
            msg.get_repeated_scalar(values, 2),
            Err(MessageError::IndexOutOfBounds {
                index: 2,
                length: 2
            })
        );
    }

    #[test]
    fn test_map_access() {
        let mut msg = sample();
        let schema = msg.schema().expect("schema");
        let counts = &schema.fields()[3];

        assert!(msg.map_entries(counts).expect("empty").is_empty());
        msg.insert_map_scalar(counts, "a".into(), ScalarValue::I64(-4))
            .expect("insert");
        msg.insert_map_scalar(counts, "b".into(), ScalarValue::I64(9))
            .expect("insert");
        assert_eq!(msg.repeated_len(counts), 2);

        let mut entries: Vec<(ScalarValue, Option<ScalarValue>)> = msg
            .map_entries(counts)
            .expect("entries")
            .into_iter()
            .map(|(key, value)| match value {
                MapValue::Scalar(v) => (key, Some(v)),
                MapValue::Message(_) => (key, None),
            })
            .collect();
        entries.sort_by(|a, b| a.0.to_string().cmp(&b.0.to_string()));
        assert_eq!(
            entries,
            vec![
                (ScalarValue::from("a"), Some(ScalarValue::I64(-4))),
                (ScalarValue::from("b"), Some(ScalarValue::I64(9))),
            ]
        );

        let err = msg
            .insert_map_scalar(counts, ScalarValue::I32(1), ScalarValue::I64(0))
            .expect_err("wrong key kind");
        assert!(matches!(err, MessageError::TypeMismatch { .. }));
    }

    #[test]
    fn test_new_message_resolves_pool_types() {
        let msg = sample();
        let schema = msg.schema().expect("schema");
        let fresh = msg.new_message(&schema).expect("same type");
        assert_eq!(fresh.descriptor().full_name(), "demo.Sample");

        let unknown = Arc::new(MessageSchema::new("demo.Missing", Vec::new()));
        assert_eq!(
            msg.new_message(&unknown).err(),
            Some(MessageError::FieldNotFound("demo.Missing".into()))
        );
    }
}
