// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Native struct layout computed from a message schema.
//!
//! Fields are placed in declaration order following the C aggregate rules
//! `#[repr(C)]` uses: each field starts at the next multiple of its own
//! alignment, the struct is as aligned as its most aligned field, and its
//! size is padded to a multiple of that alignment. Every primitive size and
//! alignment comes from `size_of`/`align_of` of the native type.

use crate::error::{ConvertError, Result};
use crate::native::{RawVec, StructBytes, StructMap, StructString};
use crate::schema::{Cardinality, FieldKind, FieldSchema, MessageSchema};
use std::alloc::Layout;
use std::mem;

/// Size and alignment of a native struct (or of one field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StructLayout {
    pub size: usize,
    pub align: usize,
}

impl StructLayout {
    /// Sentinel for a schema with no native representation.
    pub const INVALID: StructLayout = StructLayout { size: 0, align: 0 };

    /// Layout of a struct with no fields.
    pub const EMPTY: StructLayout = StructLayout { size: 0, align: 1 };

    /// Layout of a native type.
    pub const fn of<T>() -> Self {
        Self {
            size: mem::size_of::<T>(),
            align: mem::align_of::<T>(),
        }
    }

    /// Check this is not [`StructLayout::INVALID`].
    pub fn is_valid(&self) -> bool {
        self.align != 0
    }

    /// Append a field, returning the grown layout and the field offset.
    ///
    /// Trailing padding is not added; see [`StructLayout::pad_to_align`].
    pub fn extend(self, field: StructLayout) -> (StructLayout, usize) {
        let offset = align_up(self.size, field.align);
        let grown = StructLayout {
            size: offset + field.size,
            align: self.align.max(field.align),
        };
        (grown, offset)
    }

    /// Round the size up to a multiple of the alignment.
    pub fn pad_to_align(self) -> StructLayout {
        StructLayout {
            size: align_up(self.size, self.align),
            align: self.align,
        }
    }

    /// Allocation layout for `count` consecutive structs.
    pub(crate) fn array(self, count: usize) -> Result<Layout> {
        let size = self
            .size
            .checked_mul(count)
            .ok_or_else(|| ConvertError::UnsupportedSchema("array size overflow".into()))?;
        Layout::from_size_align(size, self.align)
            .map_err(|e| ConvertError::UnsupportedSchema(e.to_string()))
    }
}

/// Layout of every `StructVec<T>`.
pub(crate) const VEC_LAYOUT: StructLayout = StructLayout::of::<RawVec>();

/// Layout of every `StructMap<K, V>`.
pub(crate) const MAP_LAYOUT: StructLayout = StructLayout::of::<StructMap<u8, u8>>();

/// Round `offset` up to a multiple of `align` (a power of two).
pub(crate) fn align_up(offset: usize, align: usize) -> usize {
    (offset + align).saturating_sub(1) & !(align.saturating_sub(1))
}

/// Layout of a `map<K, V>` entry node, and where its value region sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MapShape {
    /// Layout of the whole node (`Entry<K, V>`).
    pub entry: StructLayout,
    /// Offset of the value inside the node.
    pub value_offset: usize,
    /// Bytes from the value offset to the end of the node.
    pub value_size: usize,
}

/// Compute the native layout of `schema`.
///
/// Returns [`StructLayout::INVALID`] when the schema contains a group field,
/// a malformed map entry or a map key kind that cannot be a native key.
pub fn compute_layout(schema: &MessageSchema) -> StructLayout {
    try_layout(schema).unwrap_or(StructLayout::INVALID)
}

/// Offset of every field of `schema` inside its native struct, in
/// declaration order. `None` when the schema has no native layout.
pub fn field_offsets(schema: &MessageSchema) -> Option<Vec<usize>> {
    let mut layout = StructLayout::EMPTY;
    let mut offsets = Vec::with_capacity(schema.fields().len());
    for field in schema.fields() {
        let (grown, offset) = layout.extend(field_layout(field).ok()?);
        layout = grown;
        offsets.push(offset);
    }
    Some(offsets)
}

pub(crate) fn try_layout(schema: &MessageSchema) -> Result<StructLayout> {
    let layout = schema
        .fields()
        .iter()
        .try_fold(StructLayout::EMPTY, |layout, field| -> Result<StructLayout> {
            Ok(layout.extend(field_layout(field)?).0)
        })?;
    Ok(layout.pad_to_align())
}

/// Layout one field occupies inside its parent struct.
pub(crate) fn field_layout(field: &FieldSchema) -> Result<StructLayout> {
    match field.cardinality {
        Cardinality::Map => {
            map_shape(entry_schema(field)?)?;
            Ok(MAP_LAYOUT)
        }
        Cardinality::Repeated => {
            element_layout(&field.kind)?;
            Ok(VEC_LAYOUT)
        }
        Cardinality::Singular => element_layout(&field.kind),
    }
}

/// Layout of one value of `kind`: a singular field, or one element of a
/// repeated field.
pub(crate) fn element_layout(kind: &FieldKind) -> Result<StructLayout> {
    Ok(match kind {
        FieldKind::Int32 | FieldKind::Enum(_) => StructLayout::of::<i32>(),
        FieldKind::Int64 => StructLayout::of::<i64>(),
        FieldKind::UInt32 => StructLayout::of::<u32>(),
        FieldKind::UInt64 => StructLayout::of::<u64>(),
        FieldKind::Float => StructLayout::of::<f32>(),
        FieldKind::Double => StructLayout::of::<f64>(),
        FieldKind::Bool => StructLayout::of::<bool>(),
        FieldKind::String => StructLayout::of::<StructString>(),
        FieldKind::Bytes => StructLayout::of::<StructBytes>(),
        FieldKind::Message(schema) => try_layout(schema)?,
        FieldKind::Group(schema) => {
            return Err(ConvertError::UnsupportedSchema(format!(
                "group {} has no native representation",
                schema.name
            )))
        }
    })
}

/// Entry schema of a map field.
pub(crate) fn entry_schema(field: &FieldSchema) -> Result<&MessageSchema> {
    field.message_schema().map(|s| s.as_ref()).ok_or_else(|| {
        ConvertError::UnsupportedSchema(format!("map {} has no entry message", field.name))
    })
}

/// Check if `kind` may key a native map.
pub(crate) fn is_map_key(kind: &FieldKind) -> bool {
    matches!(
        kind,
        FieldKind::Int32
            | FieldKind::Int64
            | FieldKind::UInt32
            | FieldKind::UInt64
            | FieldKind::String
    )
}

/// Validate a map entry schema and compute its node layout.
pub(crate) fn map_shape(entry: &MessageSchema) -> Result<MapShape> {
    let [key, value] = entry.fields() else {
        return Err(ConvertError::UnsupportedSchema(format!(
            "map entry {} has {} fields, expected 2",
            entry.name,
            entry.fields().len()
        )));
    };
    if !is_map_key(&key.kind) {
        return Err(ConvertError::UnsupportedSchema(format!(
            "map entry {} cannot be keyed by {}",
            entry.name, key.kind
        )));
    }

    if key.cardinality != Cardinality::Singular || value.cardinality != Cardinality::Singular {
        return Err(ConvertError::UnsupportedSchema(format!(
            "map entry {} has a repeated key or value",
            entry.name
        )));
    }

    let (node, _) = StructLayout::EMPTY.extend(element_layout(&key.kind)?);
    let (node, value_offset) = node.extend(field_layout(value)?);
    let entry = node.pad_to_align();
    Ok(MapShape {
        entry,
        value_offset,
        value_size: entry.size - value_offset,
    })
}
