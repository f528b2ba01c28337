// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reflective message to native struct.

use crate::bucket::{self, MapKey, MapVisitor, OpaqueValue};
use crate::cursor::Cursor;
use crate::destroy;
use crate::error::{ConvertError, Result};
use crate::layout::{entry_schema, map_shape, try_layout, MapShape, MAP_LAYOUT};
use crate::native::{RawVec, StructBytes, StructMap, StructString, StructVec};
use crate::reflect::{MapValue, ReflectMessage, ScalarValue};
use crate::schema::{Cardinality, FieldKind, FieldSchema, MessageSchema};
use std::alloc;
use std::ptr;
use std::sync::Arc;

/// State of the bytes a decode step writes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Construct {
    /// The bytes hold a constructed value. Containers are dropped and
    /// replaced.
    Live,
    /// The bytes are fresh zeroed storage. Containers are written without
    /// reading or dropping what is there.
    Raw,
}

/// Decode `message`, whose schema is `schema`, into the `size` bytes at
/// `bytes`.
///
/// # Safety
///
/// `bytes` must point to a native struct mirroring `schema`; live when
/// `construct` is [`Construct::Live`], zero-filled when it is
/// [`Construct::Raw`].
pub(crate) unsafe fn decode_struct<M: ReflectMessage>(
    schema: &MessageSchema,
    message: &M,
    bytes: *mut u8,
    size: usize,
    construct: Construct,
) -> Result<()> {
    let layout = try_layout(schema)?;
    if layout.size != size {
        return Err(ConvertError::LayoutMismatch {
            expected: layout.size,
            actual: size,
        });
    }
    let mut cursor = Cursor::new(bytes, size);
    decode_fields(&mut cursor, schema, message, 0, construct)
}

/// Decode the fields of `schema` from `start` on, writing through `cursor`.
pub(crate) unsafe fn decode_fields<M: ReflectMessage>(
    cursor: &mut Cursor,
    schema: &MessageSchema,
    message: &M,
    start: usize,
    construct: Construct,
) -> Result<()> {
    for field in &schema.fields()[start..] {
        match (field.cardinality, &field.kind) {
            (Cardinality::Singular, FieldKind::Message(sub)) => {
                let mut child = cursor.child(try_layout(sub)?)?;
                let source = message.get_message(field);
                decode_message(&mut child, sub, message, source, construct)?;
            }
            (Cardinality::Singular, _) => {
                let value = message.get_scalar(field)?;
                write_scalar(cursor, field, value, construct)?;
            }
            (Cardinality::Repeated, FieldKind::Message(sub)) => {
                decode_messages(cursor, field, sub, message, construct)?;
            }
            (Cardinality::Repeated, kind) => {
                decode_scalars(cursor, field, kind, message, construct)?;
            }
            (Cardinality::Map, _) => decode_map(cursor, field, message, construct)?,
        }
    }
    Ok(())
}

/// Decode one sub-message, or the default message of `sub` when absent.
unsafe fn decode_message<M: ReflectMessage>(
    child: &mut Cursor,
    sub: &Arc<MessageSchema>,
    parent: &M,
    source: Option<&M>,
    construct: Construct,
) -> Result<()> {
    match source {
        Some(source) => decode_fields(child, sub, source, 0, construct),
        None => {
            let default = parent.new_message(sub)?;
            decode_fields(child, sub, &default, 0, construct)
        }
    }
}

/// Put a container in place, dropping the old one only when it is live.
unsafe fn store<T>(slot: *mut T, value: T, construct: Construct) {
    match construct {
        Construct::Live => *slot = value,
        Construct::Raw => ptr::write(slot, value),
    }
}

unsafe fn write_scalar(
    cursor: &mut Cursor,
    field: &FieldSchema,
    value: ScalarValue,
    construct: Construct,
) -> Result<()> {
    match (&field.kind, value) {
        (FieldKind::Int32, ScalarValue::I32(v)) => ptr::write(cursor.take_as()?, v),
        (FieldKind::Int64, ScalarValue::I64(v)) => ptr::write(cursor.take_as()?, v),
        (FieldKind::UInt32, ScalarValue::U32(v)) => ptr::write(cursor.take_as()?, v),
        (FieldKind::UInt64, ScalarValue::U64(v)) => ptr::write(cursor.take_as()?, v),
        (FieldKind::Float, ScalarValue::F32(v)) => ptr::write(cursor.take_as()?, v),
        (FieldKind::Double, ScalarValue::F64(v)) => ptr::write(cursor.take_as()?, v),
        (FieldKind::Bool, ScalarValue::Bool(v)) => ptr::write(cursor.take_as()?, v),
        (FieldKind::Enum(_), ScalarValue::Enum(v)) => ptr::write(cursor.take_as::<i32>()?, v),
        (FieldKind::String, ScalarValue::String(s)) => store(
            cursor.take_as::<StructString>()?,
            StructString::from(s),
            construct,
        ),
        (FieldKind::Bytes, ScalarValue::Bytes(b)) => store(
            cursor.take_as::<StructBytes>()?,
            StructBytes::from(b),
            construct,
        ),
        (_, value) => return Err(ConvertError::mismatch(field, &value)),
    }
    Ok(())
}

unsafe fn decode_scalars<M: ReflectMessage>(
    cursor: &mut Cursor,
    field: &FieldSchema,
    kind: &FieldKind,
    message: &M,
    construct: Construct,
) -> Result<()> {
    let vec = cursor.take_as::<RawVec>()?;
    match kind {
        FieldKind::Int32 => {
            let values = collect(message, field, ScalarValue::as_i32)?;
            store(vec.cast(), values, construct);
        }
        FieldKind::Int64 => {
            let values = collect(message, field, ScalarValue::as_i64)?;
            store(vec.cast(), values, construct);
        }
        FieldKind::UInt32 => {
            let values = collect(message, field, ScalarValue::as_u32)?;
            store(vec.cast(), values, construct);
        }
        FieldKind::UInt64 => {
            let values = collect(message, field, ScalarValue::as_u64)?;
            store(vec.cast(), values, construct);
        }
        FieldKind::Float => {
            let values = collect(message, field, ScalarValue::as_f32)?;
            store(vec.cast(), values, construct);
        }
        FieldKind::Double => {
            let values = collect(message, field, ScalarValue::as_f64)?;
            store(vec.cast(), values, construct);
        }
        FieldKind::Bool => {
            let values = collect(message, field, ScalarValue::as_bool)?;
            store(vec.cast(), values, construct);
        }
        FieldKind::Enum(_) => {
            let values = collect(message, field, ScalarValue::enum_number)?;
            store(vec.cast(), values, construct);
        }
        FieldKind::String => {
            let values = collect(message, field, |v| v.as_str().map(StructString::from))?;
            store(vec.cast(), values, construct);
        }
        FieldKind::Bytes => {
            let values = collect(message, field, |v| v.as_bytes().map(StructBytes::from))?;
            store(vec.cast(), values, construct);
        }
        FieldKind::Message(_) | FieldKind::Group(_) => {
            return Err(ConvertError::UnsupportedSchema(format!(
                "repeated {} is not a scalar list",
                kind
            )))
        }
    }
    Ok(())
}

fn collect<M: ReflectMessage, T>(
    message: &M,
    field: &FieldSchema,
    convert: impl Fn(&ScalarValue) -> Option<T>,
) -> Result<StructVec<T>> {
    let len = message.repeated_len(field);
    let mut values = StructVec::with_capacity(len);
    for index in 0..len {
        let value = message.get_repeated_scalar(field, index)?;
        values.push(convert(&value).ok_or_else(|| ConvertError::mismatch(field, &value))?);
    }
    Ok(values)
}

unsafe fn decode_messages<M: ReflectMessage>(
    cursor: &mut Cursor,
    field: &FieldSchema,
    sub: &MessageSchema,
    message: &M,
    construct: Construct,
) -> Result<()> {
    let vec = cursor.take_as::<RawVec>()?;
    let element = try_layout(sub)?;
    match construct {
        Construct::Live => destroy::destroy_repeated(vec, &field.kind)?,
        Construct::Raw => ptr::write(vec, RawVec::EMPTY),
    }

    let count = message.repeated_len(field);
    if count == 0 {
        return Ok(());
    }
    if element.size == 0 {
        return Err(ConvertError::UnsupportedSchema(format!(
            "repeated {} has zero-sized elements",
            field.name
        )));
    }

    let buffer = element.array(count)?;
    let begin = alloc::alloc_zeroed(buffer);
    if begin.is_null() {
        alloc::handle_alloc_error(buffer);
    }
    let end = begin.add(buffer.size());
    // Published before filling: zeroed elements are valid empty values.
    ptr::write(
        vec,
        RawVec {
            begin,
            end,
            cap_end: end,
        },
    );

    for index in 0..count {
        let source = message.get_repeated_message(field, index)?;
        let mut item = Cursor::new(begin.add(index * element.size), element.size);
        decode_fields(&mut item, sub, source, 0, Construct::Raw)?;
    }
    Ok(())
}

unsafe fn decode_map<M: ReflectMessage>(
    cursor: &mut Cursor,
    field: &FieldSchema,
    message: &M,
    construct: Construct,
) -> Result<()> {
    let map = cursor.take(MAP_LAYOUT)?;
    let entry = entry_schema(field)?;
    let shape = map_shape(entry)?;
    let visitor = DecodeMap {
        map,
        field,
        entry,
        shape,
        message,
        construct,
    };
    bucket::dispatch(&entry.fields()[0].kind, &shape, visitor)
}

/// Inserts one node per map entry, in message order.
struct DecodeMap<'a, M> {
    map: *mut u8,
    field: &'a FieldSchema,
    entry: &'a MessageSchema,
    shape: MapShape,
    message: &'a M,
    construct: Construct,
}

impl<M: ReflectMessage> MapVisitor for DecodeMap<'_, M> {
    type Output = ();

    unsafe fn visit<K: MapKey, B: OpaqueValue>(self) -> Result<()> {
        let map = self.map.cast::<StructMap<K, B>>();
        match self.construct {
            Construct::Live => destroy::drain_map(map, self.entry, &self.shape)?,
            Construct::Raw => ptr::write(map, StructMap::new()),
        }

        // SAFETY: the bucket-typed view is only used for node pointers and
        // keys; nodes are allocated with the real entry layout.
        let map = &mut *map;
        let node_layout = self.shape.entry.array(1)?;
        let [key_field, value_field] = self.entry.fields() else {
            return Err(ConvertError::UnsupportedSchema(format!(
                "map entry {} is not a key/value pair",
                self.entry.name
            )));
        };

        for (key_value, source) in self.message.map_entries(self.field)? {
            let key = K::from_scalar(&key_value)
                .ok_or_else(|| ConvertError::mismatch(key_field, &key_value))?;
            let node = map
                .insert_zeroed(key, node_layout)
                .ok_or_else(|| ConvertError::DuplicateKey(key_value.to_string()))?;
            let value_bytes = bucket::node_value(node, &self.shape);
            let mut value = Cursor::new(value_bytes, self.shape.value_size);
            match (&value_field.kind, source) {
                (FieldKind::Message(sub), MapValue::Message(source)) => {
                    let mut child = value.child(try_layout(sub)?)?;
                    decode_message(&mut child, sub, self.message, source, Construct::Raw)?;
                }
                (FieldKind::Message(sub), MapValue::Scalar(scalar)) => {
                    return Err(ConvertError::UnsupportedSchema(format!(
                        "map {} holds {} where message {} was expected",
                        self.field.name,
                        scalar.kind_name(),
                        sub.name
                    )))
                }
                (_, MapValue::Scalar(scalar)) => {
                    write_scalar(&mut value, value_field, scalar, Construct::Raw)?;
                }
                (kind, MapValue::Message(_)) => {
                    return Err(ConvertError::UnsupportedSchema(format!(
                        "map {} holds a message where {} was expected",
                        self.field.name, kind
                    )))
                }
            }
        }
        Ok(())
    }
}
