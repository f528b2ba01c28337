// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Schema-driven drop of native values.
//!
//! A repeated-message or map field holds values whose Rust type the engine
//! never sees, so their destructors cannot be named. These functions walk
//! the schema instead and release every container by hand, leaving each
//! top-level container they were pointed at empty.

use crate::bucket::{self, MapKey, MapVisitor, OpaqueValue};
use crate::cursor::Cursor;
use crate::error::{ConvertError, Result};
use crate::layout::{element_layout, entry_schema, map_shape, try_layout, MapShape, MAP_LAYOUT};
use crate::native::{RawVec, StructBytes, StructMap, StructString, StructVec};
use crate::schema::{Cardinality, FieldKind, FieldSchema, MessageSchema};
use std::alloc;
use std::ptr;

/// Drop the fields of `schema` from `start` on, walking `cursor`.
///
/// Afterwards the region holds no live containers and must be treated as
/// uninitialized.
pub(crate) unsafe fn destroy_fields(
    cursor: &mut Cursor,
    schema: &MessageSchema,
    start: usize,
) -> Result<()> {
    for field in &schema.fields()[start..] {
        match (field.cardinality, &field.kind) {
            (Cardinality::Singular, FieldKind::Message(sub)) => {
                let mut child = cursor.child(try_layout(sub)?)?;
                destroy_fields(&mut child, sub, 0)?;
            }
            (Cardinality::Singular, FieldKind::String) => {
                ptr::drop_in_place(cursor.take_as::<StructString>()?);
            }
            (Cardinality::Singular, FieldKind::Bytes) => {
                ptr::drop_in_place(cursor.take_as::<StructBytes>()?);
            }
            (Cardinality::Singular, kind) => {
                cursor.take(element_layout(kind)?)?;
            }
            (Cardinality::Repeated, kind) => destroy_repeated(cursor.take_as::<RawVec>()?, kind)?,
            (Cardinality::Map, _) => destroy_map(cursor.take(MAP_LAYOUT)?, field)?,
        }
    }
    Ok(())
}

/// Drop every element of a repeated field and free its buffer, leaving an
/// empty vector.
pub(crate) unsafe fn destroy_repeated(vec: *mut RawVec, kind: &FieldKind) -> Result<()> {
    match kind {
        FieldKind::Int32 | FieldKind::Enum(_) => drop_vec::<i32>(vec),
        FieldKind::Int64 => drop_vec::<i64>(vec),
        FieldKind::UInt32 => drop_vec::<u32>(vec),
        FieldKind::UInt64 => drop_vec::<u64>(vec),
        FieldKind::Float => drop_vec::<f32>(vec),
        FieldKind::Double => drop_vec::<f64>(vec),
        FieldKind::Bool => drop_vec::<bool>(vec),
        FieldKind::String => drop_vec::<StructString>(vec),
        FieldKind::Bytes => drop_vec::<StructBytes>(vec),
        FieldKind::Message(sub) => {
            let element = try_layout(sub)?;
            let raw = &*vec;
            if !raw.begin.is_null() && element.size != 0 {
                for index in 0..raw.byte_len() / element.size {
                    let item_bytes = raw.begin.add(index * element.size);
                    let mut item = Cursor::new(item_bytes, element.size);
                    destroy_fields(&mut item, sub, 0)?;
                }
                // Buffers come from StructVec<T> or from the decoder, both
                // sized capacity * size_of::<T>() with T's alignment.
                let buffer = element.array(raw.byte_capacity() / element.size)?;
                alloc::dealloc(raw.begin, buffer);
            }
            ptr::write(vec, RawVec::EMPTY);
        }
        FieldKind::Group(sub) => {
            return Err(ConvertError::UnsupportedSchema(format!(
                "group {} has no native representation",
                sub.name
            )))
        }
    }
    Ok(())
}

unsafe fn drop_vec<T>(vec: *mut RawVec) {
    ptr::drop_in_place(vec.cast::<StructVec<T>>());
    ptr::write(vec, RawVec::EMPTY);
}

/// Drop every node of a map field, leaving an empty map.
pub(crate) unsafe fn destroy_map(map: *mut u8, field: &FieldSchema) -> Result<()> {
    let entry = entry_schema(field)?;
    let shape = map_shape(entry)?;
    bucket::dispatch(&entry.fields()[0].kind, &shape, DestroyMap { map, entry, shape })
}

struct DestroyMap<'a> {
    map: *mut u8,
    entry: &'a MessageSchema,
    shape: MapShape,
}

impl MapVisitor for DestroyMap<'_> {
    type Output = ();

    unsafe fn visit<K: MapKey, B: OpaqueValue>(self) -> Result<()> {
        drain_map::<K, B>(self.map.cast(), self.entry, &self.shape)
    }
}

/// Detach and free every node of `map`. Keys are dropped as `K`, values by
/// walking the value field of `entry`, nodes freed with the entry layout.
pub(crate) unsafe fn drain_map<K: MapKey, B: OpaqueValue>(
    map: *mut StructMap<K, B>,
    entry: &MessageSchema,
    shape: &MapShape,
) -> Result<()> {
    let node_layout = shape.entry.array(1)?;
    // Dropping `nodes` afterwards frees only the pointer buffer.
    let nodes = (*map).take_nodes();
    for node in nodes.iter() {
        ptr::drop_in_place(ptr::addr_of_mut!((*node.as_ptr()).key));
        let mut value = Cursor::new(bucket::node_value(*node, shape), shape.value_size);
        destroy_fields(&mut value, entry, 1)?;
        alloc::dealloc(node.as_ptr().cast(), node_layout);
    }
    Ok(())
}
