// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Aligned walk over the bytes of a native struct.

use crate::error::{ConvertError, Result};
use crate::layout::{align_up, StructLayout};

/// Position inside a borrowed struct region.
///
/// Every access rounds the offset up to the value's alignment and then
/// consumes exactly the value's size. Accesses past `limit` fail with
/// [`ConvertError::CursorOverrun`]. The cursor never owns the memory.
#[derive(Debug)]
pub(crate) struct Cursor {
    base: *mut u8,
    offset: usize,
    limit: usize,
}

impl Cursor {
    /// Start a walk over `limit` bytes at `base`.
    ///
    /// # Safety
    ///
    /// `base` must be valid for reads (and writes, if the walk writes) of
    /// `limit` bytes and aligned for the struct living there, for as long as
    /// the cursor and any pointer it hands out are used.
    pub(crate) unsafe fn new(base: *mut u8, limit: usize) -> Self {
        Self {
            base,
            offset: 0,
            limit,
        }
    }

    /// Current offset from the start of the region.
    pub(crate) fn offset(&self) -> usize {
        self.offset
    }

    /// Claim the next value of `layout`, returning its address.
    pub(crate) fn take(&mut self, layout: StructLayout) -> Result<*mut u8> {
        let start = align_up(self.offset, layout.align);
        let end = start
            .checked_add(layout.size)
            .filter(|end| *end <= self.limit)
            .ok_or(ConvertError::CursorOverrun {
                offset: start,
                size: layout.size,
                limit: self.limit,
            })?;
        self.offset = end;
        Ok(self.base.wrapping_add(start))
    }

    /// Claim the next value of native type `T`.
    pub(crate) fn take_as<T>(&mut self) -> Result<*mut T> {
        self.take(StructLayout::of::<T>()).map(|ptr| ptr.cast())
    }

    /// Claim the next nested struct of `layout` and walk into it.
    pub(crate) fn child(&mut self, layout: StructLayout) -> Result<Cursor> {
        let base = self.take(layout)?;
        Ok(Cursor {
            base,
            offset: 0,
            limit: layout.size,
        })
    }
}
