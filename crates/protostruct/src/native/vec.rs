// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Growable array with a fixed three-pointer representation.

use std::alloc::{self, Layout};
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::ptr;
use std::slice;

/// Contiguous growable array, `#[repr(C)] { begin, end, cap_end }`.
///
/// The representation is the same for every `T`: three raw pointers, all
/// null when nothing is allocated. The byte length of the live elements is
/// `end - begin` whatever `T` is, which is what lets the conversion engine
/// walk an array of structs it only knows through a schema.
///
/// The buffer is allocated with `Layout::array::<T>(capacity)`.
/// Zero-sized element types are not supported.
#[repr(C)]
pub struct StructVec<T> {
    begin: *mut T,
    end: *mut T,
    cap_end: *mut T,
    _owns: PhantomData<T>,
}

// SAFETY: StructVec uniquely owns its buffer, like Vec<T>.
unsafe impl<T: Send> Send for StructVec<T> {}
unsafe impl<T: Sync> Sync for StructVec<T> {}

#[cold]
fn capacity_overflow() -> ! {
    panic!("StructVec capacity overflow")
}

impl<T> StructVec<T> {
    /// Create an empty array without allocating.
    pub const fn new() -> Self {
        Self {
            begin: ptr::null_mut(),
            end: ptr::null_mut(),
            cap_end: ptr::null_mut(),
            _owns: PhantomData,
        }
    }

    /// Create an empty array with room for `capacity` elements.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut vec = Self::new();
        vec.reserve_exact(capacity);
        vec
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        if self.begin.is_null() {
            return 0;
        }
        (self.end as usize - self.begin as usize) / mem::size_of::<T>()
    }

    /// Check if the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }

    /// Number of elements the buffer can hold.
    pub fn capacity(&self) -> usize {
        if self.begin.is_null() {
            return 0;
        }
        (self.cap_end as usize - self.begin as usize) / mem::size_of::<T>()
    }

    /// View as a slice.
    pub fn as_slice(&self) -> &[T] {
        if self.begin.is_null() {
            return &[];
        }
        // SAFETY: begin..end are initialized elements of one allocation.
        unsafe { slice::from_raw_parts(self.begin, self.len()) }
    }

    /// View as a mutable slice.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        if self.begin.is_null() {
            return &mut [];
        }
        let len = self.len();
        // SAFETY: begin..end are initialized elements uniquely owned by self.
        unsafe { slice::from_raw_parts_mut(self.begin, len) }
    }

    /// Append an element.
    pub fn push(&mut self, value: T) {
        if self.end == self.cap_end {
            self.grow(self.len() + 1);
        }
        // SAFETY: grow guarantees end < cap_end inside the buffer.
        unsafe {
            ptr::write(self.end, value);
            self.end = self.end.add(1);
        }
    }

    /// Remove and return the last element.
    pub fn pop(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        // SAFETY: the array is non-empty so end - 1 is initialized; it is
        // logically removed before being read out.
        unsafe {
            self.end = self.end.sub(1);
            Some(ptr::read(self.end))
        }
    }

    /// Insert an element at `index`, shifting later elements up.
    ///
    /// # Panics
    ///
    /// Panics if `index > len`.
    pub fn insert(&mut self, index: usize, value: T) {
        let len = self.len();
        assert!(index <= len, "insert index {} out of range {}", index, len);
        if self.end == self.cap_end {
            self.grow(len + 1);
        }
        // SAFETY: capacity > len after grow; the shifted range stays in bounds.
        unsafe {
            let at = self.begin.add(index);
            ptr::copy(at, at.add(1), len - index);
            ptr::write(at, value);
            self.end = self.end.add(1);
        }
    }

    /// Remove the element at `index`, shifting later elements down.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    pub fn remove(&mut self, index: usize) -> T {
        let len = self.len();
        assert!(index < len, "remove index {} out of range {}", index, len);
        // SAFETY: index < len; the element is read out before the tail is
        // moved over it.
        unsafe {
            let at = self.begin.add(index);
            let value = ptr::read(at);
            ptr::copy(at.add(1), at, len - index - 1);
            self.end = self.end.sub(1);
            value
        }
    }

    /// Drop every element, keeping the buffer.
    pub fn clear(&mut self) {
        let elements: *mut [T] = self.as_mut_slice();
        self.end = self.begin;
        // SAFETY: the elements were initialized and are no longer reachable.
        unsafe { ptr::drop_in_place(elements) };
    }

    /// Reserve room for exactly `additional` more elements.
    pub fn reserve_exact(&mut self, additional: usize) {
        let Some(needed) = self.len().checked_add(additional) else {
            capacity_overflow()
        };
        if needed > self.capacity() {
            self.reallocate(needed);
        }
    }

    fn grow(&mut self, min_capacity: usize) {
        let doubled = self.capacity().saturating_mul(2);
        self.reallocate(doubled.max(min_capacity).max(4));
    }

    fn reallocate(&mut self, capacity: usize) {
        assert!(
            mem::size_of::<T>() != 0,
            "StructVec does not support zero-sized elements"
        );
        let len = self.len();
        let Ok(new_layout) = Layout::array::<T>(capacity) else {
            capacity_overflow()
        };
        if new_layout.size() == 0 {
            return;
        }

        // SAFETY:
        // - new_layout has non-zero size (checked above)
        // - when begin is non-null it was allocated by this type with
        //   Layout::array::<T>(old capacity), which is what realloc receives
        let raw = unsafe {
            if self.begin.is_null() {
                alloc::alloc(new_layout)
            } else {
                let old_layout = Layout::array::<T>(self.capacity())
                    .unwrap_or_else(|_| capacity_overflow());
                alloc::realloc(self.begin.cast(), old_layout, new_layout.size())
            }
        };
        if raw.is_null() {
            alloc::handle_alloc_error(new_layout);
        }

        self.begin = raw.cast();
        // SAFETY: len <= capacity, both inside the new allocation.
        unsafe {
            self.end = self.begin.add(len);
            self.cap_end = self.begin.add(capacity);
        }
    }
}

impl<T> Drop for StructVec<T> {
    fn drop(&mut self) {
        if self.begin.is_null() {
            return;
        }
        let capacity = self.capacity();
        // SAFETY:
        // - begin..end are initialized elements owned by self
        // - the buffer was allocated with Layout::array::<T>(capacity)
        unsafe {
            ptr::drop_in_place(self.as_mut_slice() as *mut [T]);
            if let Ok(layout) = Layout::array::<T>(capacity) {
                alloc::dealloc(self.begin.cast(), layout);
            }
        }
    }
}

impl<T> Default for StructVec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Deref for StructVec<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T> DerefMut for StructVec<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T: Clone> Clone for StructVec<T> {
    fn clone(&self) -> Self {
        self.iter().cloned().collect()
    }
}

impl<T: PartialEq> PartialEq for StructVec<T> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Eq> Eq for StructVec<T> {}

impl<T: fmt::Debug> fmt::Debug for StructVec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T> From<Vec<T>> for StructVec<T> {
    fn from(values: Vec<T>) -> Self {
        let mut vec = Self::with_capacity(values.len());
        for value in values {
            vec.push(value);
        }
        vec
    }
}

impl<T: Clone> From<&[T]> for StructVec<T> {
    fn from(values: &[T]) -> Self {
        values.iter().cloned().collect()
    }
}

impl<T> FromIterator<T> for StructVec<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut vec = Self::with_capacity(iter.size_hint().0);
        vec.extend(iter);
        vec
    }
}

impl<T> Extend<T> for StructVec<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.push(value);
        }
    }
}

impl<'a, T> IntoIterator for &'a StructVec<T> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Type-erased view of any `StructVec<T>`.
///
/// Same field order and representation as `StructVec<T>`, so a pointer to
/// either can be reinterpreted as the other.
#[repr(C)]
pub(crate) struct RawVec {
    pub(crate) begin: *mut u8,
    pub(crate) end: *mut u8,
    pub(crate) cap_end: *mut u8,
}

impl RawVec {
    pub(crate) const EMPTY: RawVec = RawVec {
        begin: ptr::null_mut(),
        end: ptr::null_mut(),
        cap_end: ptr::null_mut(),
    };

    /// Bytes spanned by the live elements.
    pub(crate) fn byte_len(&self) -> usize {
        self.end as usize - self.begin as usize
    }

    /// Bytes spanned by the whole buffer.
    pub(crate) fn byte_capacity(&self) -> usize {
        self.cap_end as usize - self.begin as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_all_null() {
        let vec: StructVec<u64> = StructVec::new();
        assert!(vec.is_empty());
        assert_eq!(vec.len(), 0);
        assert_eq!(vec.capacity(), 0);
        assert_eq!(vec.as_slice(), &[] as &[u64]);

        // SAFETY: StructVec<u64> and [usize; 3] have the same size.
        let words: [usize; 3] = unsafe { mem::transmute(vec) };
        assert_eq!(words, [0, 0, 0]);
    }

    #[test]
    fn test_zeroed_is_valid_empty() {
        // SAFETY: the all-zero pattern is the empty representation.
        let vec: StructVec<String> = unsafe { mem::zeroed() };
        assert!(vec.is_empty());
        drop(vec);
    }

    #[test]
    fn test_push_pop_grow() {
        let mut vec = StructVec::new();
        for i in 0..100u32 {
            vec.push(i);
        }
        assert_eq!(vec.len(), 100);
        assert!(vec.capacity() >= 100);
        assert_eq!(vec[42], 42);
        assert_eq!(vec.pop(), Some(99));
        assert_eq!(vec.len(), 99);
    }

    #[test]
    fn test_insert_remove() {
        let mut vec: StructVec<i32> = StructVec::from(vec![1, 3, 4]);
        vec.insert(1, 2);
        vec.insert(4, 5);
        assert_eq!(vec.as_slice(), &[1, 2, 3, 4, 5]);
        assert_eq!(vec.remove(0), 1);
        assert_eq!(vec.as_slice(), &[2, 3, 4, 5]);
    }

    #[test]
    fn test_owned_elements_dropped() {
        let mut vec: StructVec<String> = ["a", "b"].iter().map(|s| s.to_string()).collect();
        let copy = vec.clone();
        vec.clear();
        assert!(vec.is_empty());
        assert_eq!(copy.len(), 2);
        assert_eq!(copy[1], "b");
    }

    #[test]
    fn test_representation_is_type_independent() {
        assert_eq!(mem::size_of::<StructVec<u8>>(), mem::size_of::<StructVec<[u64; 9]>>());
        assert_eq!(mem::size_of::<StructVec<u8>>(), mem::size_of::<RawVec>());
        assert_eq!(mem::align_of::<StructVec<u8>>(), mem::align_of::<RawVec>());
    }

    #[test]
    fn test_raw_view_byte_len() {
        let vec: StructVec<u64> = StructVec::from(vec![1, 2, 3]);
        // SAFETY: RawVec has the representation of StructVec<T>.
        let raw = unsafe { &*(&vec as *const StructVec<u64>).cast::<RawVec>() };
        assert_eq!(raw.byte_len(), 24);
        assert!(raw.byte_capacity() >= 24);
    }
}
