// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Opaque value buckets for map fields.
//!
//! Map code is generic over the key and value types, but a map value type
//! is only known from its schema at run time. The engine instantiates the
//! generic code once per rung of a fixed ladder of opaque value types,
//! `Bucket4<N>` / `Bucket8<N>` (`N` bytes, 4- or 8-byte aligned, `N` from
//! [`MIN_BUCKET_SIZE`] doubling up to [`MAX_MAP_VALUE_SIZE`]), and picks the
//! smallest rung the real value fits in.
//!
//! A bucket is only used to name `StructMap<K, Bucket>` and project the value
//! address of a node. Nodes are always allocated with the real entry layout,
//! so the bytes past the real value are never touched.

use crate::config::{BUCKET_ALIGNMENTS, MAX_MAP_VALUE_SIZE, MIN_BUCKET_SIZE};
use crate::error::{ConvertError, Result};
use crate::layout::{MapShape, StructLayout};
use crate::native::{Entry, StructString};
use crate::reflect::ScalarValue;
use crate::schema::FieldKind;
use std::ptr::{self, NonNull};

/// `N` opaque bytes, 4-byte aligned.
#[allow(dead_code)]
#[repr(C, align(4))]
pub(crate) struct Bucket4<const N: usize>([u8; N]);

/// `N` opaque bytes, 8-byte aligned.
#[allow(dead_code)]
#[repr(C, align(8))]
pub(crate) struct Bucket8<const N: usize>([u8; N]);

mod sealed {
    pub trait Sealed {}
}

/// Opaque stand-in for a map value type.
pub(crate) trait OpaqueValue: sealed::Sealed + Sized {
    const LAYOUT: StructLayout = StructLayout::of::<Self>();
}

impl<const N: usize> sealed::Sealed for Bucket4<N> {}
impl<const N: usize> sealed::Sealed for Bucket8<N> {}
impl<const N: usize> OpaqueValue for Bucket4<N> {}
impl<const N: usize> OpaqueValue for Bucket8<N> {}

/// Native type of a map key.
pub(crate) trait MapKey: Ord + Sized {
    fn from_scalar(value: &ScalarValue) -> Option<Self>;

    fn to_scalar(&self) -> ScalarValue;
}

macro_rules! impl_map_key {
    ($ty:ty, $variant:ident) => {
        impl MapKey for $ty {
            fn from_scalar(value: &ScalarValue) -> Option<Self> {
                match value {
                    ScalarValue::$variant(v) => Some(*v),
                    _ => None,
                }
            }

            fn to_scalar(&self) -> ScalarValue {
                ScalarValue::$variant(*self)
            }
        }
    };
}

impl_map_key!(i32, I32);
impl_map_key!(i64, I64);
impl_map_key!(u32, U32);
impl_map_key!(u64, U64);

impl MapKey for StructString {
    fn from_scalar(value: &ScalarValue) -> Option<Self> {
        value.as_str().map(StructString::from)
    }

    fn to_scalar(&self) -> ScalarValue {
        ScalarValue::String(self.as_str().to_owned())
    }
}

/// Generic map operation, run once the key type and bucket are chosen.
pub(crate) trait MapVisitor {
    type Output;

    /// # Safety
    ///
    /// Implementations dereference the map they were built around; the
    /// caller guarantees it is a `StructMap<K, V>` whose entry layout is the
    /// [`MapShape`] passed to [`dispatch`].
    unsafe fn visit<K: MapKey, B: OpaqueValue>(self) -> Result<Self::Output>;
}

/// Run `visitor` with the key type of `key` and the bucket for `shape`.
///
/// # Safety
///
/// See [`MapVisitor::visit`].
pub(crate) unsafe fn dispatch<V: MapVisitor>(
    key: &FieldKind,
    shape: &MapShape,
    visitor: V,
) -> Result<V::Output> {
    match key {
        FieldKind::Int32 => with_bucket::<i32, V>(shape, visitor),
        FieldKind::Int64 => with_bucket::<i64, V>(shape, visitor),
        FieldKind::UInt32 => with_bucket::<u32, V>(shape, visitor),
        FieldKind::UInt64 => with_bucket::<u64, V>(shape, visitor),
        FieldKind::String => with_bucket::<StructString, V>(shape, visitor),
        other => Err(ConvertError::UnsupportedSchema(format!(
            "map cannot be keyed by {}",
            other
        ))),
    }
}

unsafe fn with_bucket<K: MapKey, V: MapVisitor>(
    shape: &MapShape,
    visitor: V,
) -> Result<V::Output> {
    let size = shape.value_size;
    let too_large = ConvertError::MapValueTooLarge {
        size,
        max: MAX_MAP_VALUE_SIZE,
    };
    if size > MAX_MAP_VALUE_SIZE {
        return Err(too_large);
    }
    if !BUCKET_ALIGNMENTS.contains(&shape.entry.align) {
        return Err(ConvertError::UnsupportedSchema(format!(
            "map entry alignment {} (expected one of {:?})",
            shape.entry.align, BUCKET_ALIGNMENTS
        )));
    }

    // One arm per rung; the first rung that fits returns.
    macro_rules! ladder {
        ($bucket:ident: $($n:literal)*) => {
            $(
                if size <= $n {
                    return visitor.visit::<K, $bucket<$n>>();
                }
            )*
        };
    }

    match shape.entry.align {
        4 => {
            ladder!(Bucket4: 8 16 32 64 128 256 512 1024 2048);
            #[cfg(feature = "large-map-values")]
            ladder!(Bucket4: 4096 8192 16384 32768 65536);
        }
        8 => {
            ladder!(Bucket8: 8 16 32 64 128 256 512 1024 2048);
            #[cfg(feature = "large-map-values")]
            ladder!(Bucket8: 4096 8192 16384 32768 65536);
        }
        _ => {}
    }
    Err(too_large)
}

/// Borrow the key of a node.
///
/// # Safety
///
/// `node` must be a live node whose key outlives `'a`.
pub(crate) unsafe fn node_key<'a, K, B>(node: NonNull<Entry<K, B>>) -> &'a K {
    &*ptr::addr_of!((*node.as_ptr()).key)
}

/// Address of the value region of a node.
///
/// # Safety
///
/// `node` must be a live node of the map `shape` describes.
pub(crate) unsafe fn node_value<K, B>(node: NonNull<Entry<K, B>>, shape: &MapShape) -> *mut u8 {
    let value = ptr::addr_of_mut!((*node.as_ptr()).value).cast::<u8>();
    debug_assert_eq!(
        value as usize - node.as_ptr() as usize,
        shape.value_offset,
        "bucket projection moved the value"
    );
    value
}

struct SelectBucket;

impl MapVisitor for SelectBucket {
    type Output = StructLayout;

    unsafe fn visit<K: MapKey, B: OpaqueValue>(self) -> Result<StructLayout> {
        Ok(B::LAYOUT)
    }
}

/// Layout of the bucket a map value of `value_size` bytes in an entry
/// aligned to `align` is routed through.
///
/// Fails with [`ConvertError::MapValueTooLarge`] above
/// [`MAX_MAP_VALUE_SIZE`] and [`ConvertError::UnsupportedSchema`] for an
/// alignment other than 4 or 8.
pub fn select_bucket(
    value_size: usize,
    align: usize,
) -> std::result::Result<StructLayout, ConvertError> {
    let shape = MapShape {
        entry: StructLayout {
            size: value_size,
            align,
        },
        value_offset: 0,
        value_size,
    };
    // SAFETY: SelectBucket never touches memory.
    unsafe { dispatch(&FieldKind::Int32, &shape, SelectBucket) }
}

const _: () = assert!(MIN_BUCKET_SIZE == 8, "ladder arms start at 8 bytes");
#[cfg(not(feature = "large-map-values"))]
const _: () = assert!(MAX_MAP_VALUE_SIZE == 2048, "ladder arms end at 2048 bytes");
#[cfg(feature = "large-map-values")]
const _: () = assert!(MAX_MAP_VALUE_SIZE == 65536, "ladder arms end at 65536 bytes");
const _: () = assert!(
    BUCKET_ALIGNMENTS.len() == 2 && BUCKET_ALIGNMENTS[0] == 4 && BUCKET_ALIGNMENTS[1] == 8,
    "ladder arms exist for 4- and 8-byte alignment"
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::bucket_sizes;
    use crate::layout::map_shape;
    use crate::schema::MessageSchema;

    #[test]
    fn test_smallest_sufficient_bucket() {
        assert_eq!(select_bucket(1, 4), Ok(StructLayout { size: 8, align: 4 }));
        assert_eq!(select_bucket(8, 8), Ok(StructLayout { size: 8, align: 8 }));
        assert_eq!(select_bucket(9, 8), Ok(StructLayout { size: 16, align: 8 }));
        assert_eq!(select_bucket(100, 4), Ok(StructLayout { size: 128, align: 4 }));
        assert_eq!(select_bucket(0, 8), Ok(StructLayout { size: 8, align: 8 }));
    }

    #[test]
    fn test_every_rung_reachable() {
        for size in bucket_sizes() {
            assert_eq!(select_bucket(size, 8), Ok(StructLayout { size, align: 8 }));
            assert_eq!(select_bucket(size, 4), Ok(StructLayout { size, align: 4 }));
        }
    }

    #[test]
    fn test_oversize_and_bad_alignment() {
        assert_eq!(
            select_bucket(MAX_MAP_VALUE_SIZE + 1, 8),
            Err(ConvertError::MapValueTooLarge {
                size: MAX_MAP_VALUE_SIZE + 1,
                max: MAX_MAP_VALUE_SIZE
            })
        );
        assert!(matches!(
            select_bucket(16, 2),
            Err(ConvertError::UnsupportedSchema(_))
        ));
    }

    #[test]
    fn test_map_key_scalars() {
        assert_eq!(i64::from_scalar(&ScalarValue::I64(-3)), Some(-3));
        assert_eq!(u32::from_scalar(&ScalarValue::I32(3)), None);
        let key = StructString::from_scalar(&ScalarValue::from("k")).expect("string key");
        assert_eq!(key.to_scalar(), ScalarValue::String("k".into()));
    }

    struct ValueOffset;

    impl MapVisitor for ValueOffset {
        type Output = usize;

        unsafe fn visit<K: MapKey, B: OpaqueValue>(self) -> Result<usize> {
            let entry = std::mem::MaybeUninit::<Entry<K, B>>::uninit();
            let base = entry.as_ptr();
            let value = ptr::addr_of!((*base).value);
            Ok(value as usize - base as usize)
        }
    }

    #[test]
    fn test_bucket_projection_keeps_value_offset() {
        let cases = [
            (FieldKind::Int32, FieldKind::Int64),
            (FieldKind::Int64, FieldKind::Int32),
            (FieldKind::UInt32, FieldKind::Bool),
            (FieldKind::String, FieldKind::Double),
            (FieldKind::UInt64, FieldKind::String),
        ];
        for (key, value) in cases {
            let entry = MessageSchema::map_entry("E", key.clone(), value);
            let shape = map_shape(&entry).expect("entry");
            // SAFETY: ValueOffset only inspects an uninitialized local.
            let offset = unsafe { dispatch(&key, &shape, ValueOffset) }.expect("dispatch");
            assert_eq!(offset, shape.value_offset);
        }
    }
}
