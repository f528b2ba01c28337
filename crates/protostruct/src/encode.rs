// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Native struct to reflective message.

use crate::bucket::{self, MapKey, MapVisitor, OpaqueValue};
use crate::cursor::Cursor;
use crate::error::{ConvertError, Result};
use crate::layout::{entry_schema, map_shape, try_layout, MapShape, MAP_LAYOUT};
use crate::native::{RawVec, StructBytes, StructMap, StructString, StructVec};
use crate::reflect::{ReflectMessage, ScalarValue};
use crate::schema::{Cardinality, FieldKind, FieldSchema, MessageSchema};

/// Encode the `size` bytes at `bytes` into `message`, whose schema is
/// `schema`.
///
/// # Safety
///
/// `bytes` must point to a live native struct mirroring `schema`.
pub(crate) unsafe fn encode_struct<M: ReflectMessage>(
    schema: &MessageSchema,
    bytes: *const u8,
    size: usize,
    message: &mut M,
) -> Result<()> {
    let layout = try_layout(schema)?;
    if layout.size != size {
        return Err(ConvertError::LayoutMismatch {
            expected: layout.size,
            actual: size,
        });
    }
    let mut cursor = Cursor::new(bytes.cast_mut(), size);
    encode_fields(&mut cursor, schema, message, 0)
}

/// Encode the fields of `schema` from `start` on, reading from `cursor`.
pub(crate) unsafe fn encode_fields<M: ReflectMessage>(
    cursor: &mut Cursor,
    schema: &MessageSchema,
    message: &mut M,
    start: usize,
) -> Result<()> {
    for field in &schema.fields()[start..] {
        match (field.cardinality, &field.kind) {
            (Cardinality::Singular, FieldKind::Message(sub)) => {
                let mut child = cursor.child(try_layout(sub)?)?;
                let target = message.mutable_message(field)?;
                encode_fields(&mut child, sub, target, 0)?;
            }
            (Cardinality::Singular, kind) => {
                let value = read_scalar(cursor, kind)?;
                message.set_scalar(field, value)?;
            }
            (Cardinality::Repeated, FieldKind::Message(sub)) => {
                encode_messages(cursor, field, sub, message)?;
            }
            (Cardinality::Repeated, kind) => encode_scalars(cursor, field, kind, message)?,
            (Cardinality::Map, _) => encode_map(cursor, field, message)?,
        }
    }
    Ok(())
}

unsafe fn read_scalar(cursor: &mut Cursor, kind: &FieldKind) -> Result<ScalarValue> {
    // SAFETY: the cursor hands out aligned in-bounds addresses of live
    // fields of the native type the kind maps to.
    Ok(match kind {
        FieldKind::Int32 => ScalarValue::I32(*cursor.take_as::<i32>()?),
        FieldKind::Int64 => ScalarValue::I64(*cursor.take_as::<i64>()?),
        FieldKind::UInt32 => ScalarValue::U32(*cursor.take_as::<u32>()?),
        FieldKind::UInt64 => ScalarValue::U64(*cursor.take_as::<u64>()?),
        FieldKind::Float => ScalarValue::F32(*cursor.take_as::<f32>()?),
        FieldKind::Double => ScalarValue::F64(*cursor.take_as::<f64>()?),
        FieldKind::Bool => ScalarValue::Bool(*cursor.take_as::<bool>()?),
        FieldKind::Enum(_) => ScalarValue::Enum(*cursor.take_as::<i32>()?),
        FieldKind::String => {
            ScalarValue::String((*cursor.take_as::<StructString>()?).as_str().to_owned())
        }
        FieldKind::Bytes => ScalarValue::Bytes((*cursor.take_as::<StructBytes>()?).to_vec()),
        FieldKind::Message(_) | FieldKind::Group(_) => {
            return Err(ConvertError::UnsupportedSchema(format!(
                "{} is not a scalar",
                kind
            )))
        }
    })
}

unsafe fn encode_scalars<M: ReflectMessage>(
    cursor: &mut Cursor,
    field: &FieldSchema,
    kind: &FieldKind,
    message: &mut M,
) -> Result<()> {
    let vec = cursor.take_as::<RawVec>()?;
    match kind {
        FieldKind::Int32 => append(message, field, vec.cast(), |v: &i32| ScalarValue::I32(*v)),
        FieldKind::Int64 => append(message, field, vec.cast(), |v: &i64| ScalarValue::I64(*v)),
        FieldKind::UInt32 => append(message, field, vec.cast(), |v: &u32| ScalarValue::U32(*v)),
        FieldKind::UInt64 => append(message, field, vec.cast(), |v: &u64| ScalarValue::U64(*v)),
        FieldKind::Float => append(message, field, vec.cast(), |v: &f32| ScalarValue::F32(*v)),
        FieldKind::Double => append(message, field, vec.cast(), |v: &f64| ScalarValue::F64(*v)),
        FieldKind::Bool => append(message, field, vec.cast(), |v: &bool| ScalarValue::Bool(*v)),
        FieldKind::Enum(_) => append(message, field, vec.cast(), |v: &i32| ScalarValue::Enum(*v)),
        FieldKind::String => append(message, field, vec.cast(), |v: &StructString| {
            ScalarValue::String(v.as_str().to_owned())
        }),
        FieldKind::Bytes => append(message, field, vec.cast(), |v: &StructBytes| {
            ScalarValue::Bytes(v.to_vec())
        }),
        FieldKind::Message(_) | FieldKind::Group(_) => Err(ConvertError::UnsupportedSchema(
            format!("repeated {} is not a scalar list", kind),
        )),
    }
}

unsafe fn append<M: ReflectMessage, T>(
    message: &mut M,
    field: &FieldSchema,
    values: *const StructVec<T>,
    convert: impl Fn(&T) -> ScalarValue,
) -> Result<()> {
    for value in (*values).iter() {
        message.add_scalar(field, convert(value))?;
    }
    Ok(())
}

unsafe fn encode_messages<M: ReflectMessage>(
    cursor: &mut Cursor,
    field: &FieldSchema,
    sub: &MessageSchema,
    message: &mut M,
) -> Result<()> {
    let element = try_layout(sub)?;
    let vec = &*cursor.take_as::<RawVec>()?;
    let bytes = vec.byte_len();
    if bytes == 0 {
        return Ok(());
    }
    if element.size == 0 || bytes % element.size != 0 {
        return Err(ConvertError::SizeCongruence {
            bytes,
            element_size: element.size,
        });
    }

    for index in 0..bytes / element.size {
        let mut item = Cursor::new(vec.begin.add(index * element.size), element.size);
        let target = message.add_message(field)?;
        encode_fields(&mut item, sub, target, 0)?;
    }
    Ok(())
}

unsafe fn encode_map<M: ReflectMessage>(
    cursor: &mut Cursor,
    field: &FieldSchema,
    message: &mut M,
) -> Result<()> {
    let map = cursor.take(MAP_LAYOUT)?;
    let entry = entry_schema(field)?;
    let shape = map_shape(entry)?;
    let visitor = EncodeMap {
        map,
        field,
        entry,
        shape,
        message,
    };
    bucket::dispatch(&entry.fields()[0].kind, &shape, visitor)
}

/// Inserts one entry per node, in key order.
struct EncodeMap<'a, M> {
    map: *const u8,
    field: &'a FieldSchema,
    entry: &'a MessageSchema,
    shape: MapShape,
    message: &'a mut M,
}

impl<M: ReflectMessage> MapVisitor for EncodeMap<'_, M> {
    type Output = ();

    unsafe fn visit<K: MapKey, B: OpaqueValue>(self) -> Result<()> {
        let Self {
            map,
            field,
            entry,
            shape,
            message,
        } = self;
        // SAFETY: every StructMap has the same representation; only node
        // pointers and keys are read through the bucket-typed view.
        let map = &*map.cast::<StructMap<K, B>>();
        let value_field = &entry.fields()[1];

        for node in map.node_ptrs() {
            let key = bucket::node_key(node).to_scalar();
            let mut value = Cursor::new(bucket::node_value(node, &shape), shape.value_size);
            match &value_field.kind {
                FieldKind::Message(sub) => {
                    let mut child = value.child(try_layout(sub)?)?;
                    let target = message.insert_map_message(field, key)?;
                    encode_fields(&mut child, sub, target, 0)?;
                }
                kind => {
                    let scalar = read_scalar(&mut value, kind)?;
                    message.insert_map_scalar(field, key, scalar)?;
                }
            }
        }
        Ok(())
    }
}
