// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Layout-stable containers for native records.
//!
//! Native records are `#[repr(C)]` structs, and the conversion engine has to
//! know where every byte of a container lives without knowing its element
//! type. `std` containers give no such guarantee, so records use these:
//!
//! | Schema field        | Native field          |
//! |---------------------|-----------------------|
//! | `string`            | [`StructString`]      |
//! | `bytes`             | [`StructBytes`]       |
//! | `repeated T`        | [`StructVec<T>`]      |
//! | `map<K, V>`         | [`StructMap<K, V>`]   |
//!
//! All of them are three pointers wide, pointer-aligned, and empty when
//! zero-filled.

mod map;
mod string;
mod vec;

pub use map::{Entry, Iter, StructMap};
pub use string::StructString;
pub use vec::StructVec;

pub(crate) use vec::RawVec;

/// Raw byte buffer.
pub type StructBytes = StructVec<u8>;
