// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # protostruct - native structs <-> reflective messages
//!
//! Converts between a `#[repr(C)]` Rust struct and a schema-described
//! reflective message without per-field glue. The native layout is derived
//! from the message schema alone, then walked in lock-step with the field
//! list while the message is read or written.
//!
//! ## Quick Start
//!
//! ```rust
//! use protostruct::native::{StructMap, StructString, StructVec};
//! use protostruct::reflect::DynamicMessage;
//! use protostruct::schema::{FieldKind, SchemaBuilder};
//! use std::sync::Arc;
//!
//! #[repr(C)]
//! struct Reading {
//!     sensor: StructString,
//!     samples: StructVec<f64>,
//!     limits: StructMap<i32, f32>,
//! }
//!
//! let schema = Arc::new(
//!     SchemaBuilder::new("Reading")
//!         .string_field("sensor")
//!         .repeated_field("samples", FieldKind::Double)
//!         .map_field("limits", FieldKind::Int32, FieldKind::Float)
//!         .build(),
//! );
//!
//! let reading = Reading {
//!     sensor: "t1".into(),
//!     samples: vec![20.5, 21.0].into(),
//!     limits: [(0, -40.0), (1, 85.0)].into(),
//! };
//!
//! let mut msg = DynamicMessage::new(&schema);
//! // SAFETY: Reading mirrors the schema field for field.
//! assert!(unsafe { protostruct::struct_to_proto(&reading, &mut msg) });
//!
//! // SAFETY: same layout contract as above.
//! let back: Reading = unsafe { protostruct::proto_to_new_struct(&msg) }.expect("decode");
//! assert_eq!(back.sensor, "t1");
//! assert_eq!(back.limits.get(&1), Some(&85.0));
//! ```
//!
//! ## Native Representation
//!
//! | Schema field        | Native field                |
//! |---------------------|-----------------------------|
//! | `int32` / `uint32`  | `i32` / `u32`               |
//! | `int64` / `uint64`  | `i64` / `u64`               |
//! | `float` / `double`  | `f32` / `f64`               |
//! | `bool`              | `bool`                      |
//! | `enum`              | `i32` (enum number)         |
//! | `string` / `bytes`  | `StructString` / `StructBytes` |
//! | message `M`         | `#[repr(C)]` struct for `M` |
//! | `repeated T`        | `StructVec<T>`              |
//! | `map<K, V>`         | `StructMap<K, V>`           |
//!
//! Map keys are `int32`, `int64`, `uint32`, `uint64` or `string`. Group
//! fields have no native form.
//!
//! ## Safety Contract
//!
//! The conversion functions are `unsafe`: the engine can only check that the
//! declared struct size equals the size computed from the schema. The caller
//! guarantees that the struct is `#[repr(C)]`, built only from the types
//! above, and mirrors the schema field for field.
//!
//! ## Modules Overview
//!
//! - [`schema`] - Message schemas and builders
//! - [`reflect`] - Reflection interface and [`DynamicMessage`](reflect::DynamicMessage)
//! - [`native`] - Layout-stable containers
//! - [`config`] - Conversion limits
//!
//! ## Features
//!
//! - `large-map-values` - raise the map value ceiling from 2 KiB to 64 KiB
//! - `prost-reflect` - implement [`ReflectMessage`](reflect::ReflectMessage)
//!   for `prost_reflect::DynamicMessage` and derive schemas from its
//!   descriptors

/// Conversion limits (bucket ladder, map value ceiling).
pub mod config;
/// Layout-stable containers for native records.
pub mod native;
/// Reflection interface and the in-crate dynamic message.
pub mod reflect;
/// Message schemas and builders.
pub mod schema;

mod bucket;
mod cursor;
mod decode;
mod destroy;
mod encode;
mod error;
mod layout;

pub use bucket::select_bucket;
pub use error::ConvertError;
pub use layout::{compute_layout, field_offsets, StructLayout};

use decode::Construct;
use reflect::ReflectMessage;
use schema::MessageSchema;
use std::mem::{self, MaybeUninit};
use std::sync::Arc;

/// Encode the native struct at `bytes` (`size` bytes long) into `message`.
///
/// Returns `false`, leaving `message` untouched, when `size` differs from the
/// layout of `message`'s schema. Other failures may leave `message` partially
/// written.
///
/// # Safety
///
/// `bytes` must point to a live, aligned native struct mirroring the schema
/// of `message`, valid for reads of `size` bytes.
pub unsafe fn struct_to_message<M: ReflectMessage>(
    bytes: *const u8,
    size: usize,
    message: &mut M,
) -> bool {
    let Some(schema) = resolve_schema(message) else {
        return false;
    };
    log::debug!("[protostruct] struct -> {} ({} bytes)", schema.name, size);
    match encode::encode_struct(&schema, bytes, size, message) {
        Ok(()) => true,
        Err(e) => {
            log::warn!("[protostruct] struct -> {} failed: {}", schema.name, e);
            false
        }
    }
}

/// Decode `message` into the live native struct at `bytes` (`size` bytes
/// long), replacing the content of every field.
///
/// Returns `false`, leaving the struct untouched, when `size` differs from
/// the layout of `message`'s schema. Other failures leave a valid struct
/// holding partially decoded content.
///
/// # Safety
///
/// `bytes` must point to a live, aligned native struct mirroring the schema
/// of `message`, valid for reads and writes of `size` bytes.
pub unsafe fn message_to_struct<M: ReflectMessage>(message: &M, bytes: *mut u8, size: usize) -> bool {
    decode_logged(message, bytes, size, Construct::Live)
}

/// Encode `value` into `message`.
///
/// # Safety
///
/// `T` must be a native struct mirroring the schema of `message`.
pub unsafe fn struct_to_proto<T, M: ReflectMessage>(value: &T, message: &mut M) -> bool {
    struct_to_message((value as *const T).cast(), mem::size_of::<T>(), message)
}

/// Decode `message` into `value`, replacing its content.
///
/// # Safety
///
/// `T` must be a native struct mirroring the schema of `message`.
pub unsafe fn proto_to_struct<M: ReflectMessage, T>(message: &M, value: &mut T) -> bool {
    message_to_struct(message, (value as *mut T).cast(), mem::size_of::<T>())
}

/// Build a new `T` from `message`.
///
/// Returns `None` on any failure; the partially built value is dropped.
///
/// # Safety
///
/// `T` must be a native struct mirroring the schema of `message`. The
/// all-zero bit pattern is then a valid empty `T`.
pub unsafe fn proto_to_new_struct<M: ReflectMessage, T>(message: &M) -> Option<T> {
    let mut slot = MaybeUninit::<T>::zeroed();
    let ok = decode_logged(message, slot.as_mut_ptr().cast(), mem::size_of::<T>(), Construct::Raw);
    // SAFETY: zeroed memory is a valid empty T, and a failed decode leaves
    // every container it touched valid.
    let value = slot.assume_init();
    ok.then_some(value)
}

unsafe fn decode_logged<M: ReflectMessage>(
    message: &M,
    bytes: *mut u8,
    size: usize,
    construct: Construct,
) -> bool {
    let Some(schema) = resolve_schema(message) else {
        return false;
    };
    log::debug!("[protostruct] {} -> struct ({} bytes, {:?})", schema.name, size, construct);
    match decode::decode_struct(&schema, message, bytes, size, construct) {
        Ok(()) => true,
        Err(e) => {
            log::warn!("[protostruct] {} -> struct failed: {}", schema.name, e);
            false
        }
    }
}

fn resolve_schema<M: ReflectMessage>(message: &M) -> Option<Arc<MessageSchema>> {
    match message.schema() {
        Ok(schema) => Some(schema),
        Err(e) => {
            log::warn!("[protostruct] message schema unavailable: {}", e);
            None
        }
    }
}
