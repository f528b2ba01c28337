// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Ordered node map with a fixed representation.

use super::StructVec;
use std::alloc::{self, Layout};
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ptr::{self, NonNull};
use std::slice;

/// One heap node of a [`StructMap`]: key first, then value.
///
/// This is the native counterpart of a map entry message, so its layout is
/// the layout of the two-field entry schema.
#[repr(C)]
#[derive(Debug, Clone, PartialEq)]
pub struct Entry<K, V> {
    pub key: K,
    pub value: V,
}

/// Map kept in ascending key order, `#[repr(C)]` around a sorted
/// `StructVec` of node pointers.
///
/// Every node is a separate heap allocation of exactly
/// `Layout::new::<Entry<K, V>>()`. The representation is the same for every
/// `K` and `V`, and the all-zero pattern is the empty map.
#[repr(C)]
pub struct StructMap<K, V> {
    nodes: StructVec<NonNull<Entry<K, V>>>,
    _owns: PhantomData<Entry<K, V>>,
}

// SAFETY: StructMap uniquely owns its nodes, like BTreeMap<K, V>.
unsafe impl<K: Send, V: Send> Send for StructMap<K, V> {}
unsafe impl<K: Sync, V: Sync> Sync for StructMap<K, V> {}

impl<K, V> StructMap<K, V> {
    /// Create an empty map without allocating.
    pub const fn new() -> Self {
        Self {
            nodes: StructVec::new(),
            _owns: PhantomData,
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the map is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate entries in ascending key order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            nodes: self.nodes.iter(),
            _map: PhantomData,
        }
    }

    /// Iterate keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(k, _)| k)
    }

    /// Iterate values in ascending key order.
    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, v)| v)
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        let nodes = mem::take(&mut self.nodes);
        for node in nodes.iter() {
            // SAFETY: every node was created by Box::into_raw (or with the
            // same layout by insert_zeroed) and is owned by this map only.
            drop(unsafe { Box::from_raw(node.as_ptr()) });
        }
    }

    /// Node pointers in ascending key order.
    pub(crate) fn node_ptrs(&self) -> impl Iterator<Item = NonNull<Entry<K, V>>> + '_ {
        self.nodes.iter().copied()
    }

    /// Detach every node, leaving the map empty. The caller takes ownership
    /// of the returned nodes.
    pub(crate) fn take_nodes(&mut self) -> StructVec<NonNull<Entry<K, V>>> {
        mem::take(&mut self.nodes)
    }

    /// Borrow the key of a node without touching its value.
    ///
    /// # Safety
    ///
    /// `node` must point to a node whose key is initialized and outlives `'a`.
    unsafe fn key_of<'a>(node: NonNull<Entry<K, V>>) -> &'a K {
        &*ptr::addr_of!((*node.as_ptr()).key)
    }
}

impl<K: Ord, V> StructMap<K, V> {
    fn search(&self, key: &K) -> Result<usize, usize> {
        self.nodes
            // SAFETY: nodes in the vector always hold an initialized key.
            .binary_search_by(|node| unsafe { Self::key_of(*node) }.cmp(key))
    }

    /// Insert a value, returning the previous value for this key.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        match self.search(&key) {
            Ok(index) => {
                let node = self.nodes[index];
                // SAFETY: node is a live entry owned by this map.
                let slot = unsafe { &mut (*node.as_ptr()).value };
                Some(mem::replace(slot, value))
            }
            Err(index) => {
                let node = NonNull::from(Box::leak(Box::new(Entry { key, value })));
                self.nodes.insert(index, node);
                None
            }
        }
    }

    /// Get a value by key.
    pub fn get(&self, key: &K) -> Option<&V> {
        let index = self.search(key).ok()?;
        // SAFETY: node is a live entry owned by this map.
        Some(unsafe { &(*self.nodes[index].as_ptr()).value })
    }

    /// Get a mutable value by key.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let index = self.search(key).ok()?;
        // SAFETY: node is a live entry uniquely owned by this map.
        Some(unsafe { &mut (*self.nodes[index].as_ptr()).value })
    }

    /// Check if a key is present.
    pub fn contains_key(&self, key: &K) -> bool {
        self.search(key).is_ok()
    }

    /// Remove an entry, returning its value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let index = self.search(key).ok()?;
        let node = self.nodes.remove(index);
        // SAFETY: node was detached from the map and is owned here.
        let entry = unsafe { Box::from_raw(node.as_ptr()) };
        Some(entry.value)
    }

    /// Insert a node for `key` whose value bytes are zero, allocated with
    /// `node_layout`. Returns `None`, dropping `key`, if the key is present.
    ///
    /// # Safety
    ///
    /// - `node_layout` must be the layout the owning typed map uses for its
    ///   nodes (the true `Entry<K, V>` layout), which may be smaller than
    ///   `Entry<K, V>` for the `V` this view is instantiated with.
    /// - The all-zero pattern must be a valid value of the owner's value type.
    /// - The returned node must only be accessed through raw pointers.
    pub(crate) unsafe fn insert_zeroed(
        &mut self,
        key: K,
        node_layout: Layout,
    ) -> Option<NonNull<Entry<K, V>>> {
        let index = self.search(&key).err()?;
        let raw = alloc::alloc_zeroed(node_layout);
        let Some(node) = NonNull::new(raw.cast::<Entry<K, V>>()) else {
            alloc::handle_alloc_error(node_layout)
        };
        ptr::write(ptr::addr_of_mut!((*node.as_ptr()).key), key);
        self.nodes.insert(index, node);
        Some(node)
    }
}

impl<K, V> Drop for StructMap<K, V> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<K, V> Default for StructMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Clone, V: Clone> Clone for StructMap<K, V> {
    fn clone(&self) -> Self {
        self.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

impl<K: PartialEq, V: PartialEq> PartialEq for StructMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other.iter()).all(|(a, b)| a == b)
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for StructMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: Ord, V> FromIterator<(K, V)> for StructMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<K: Ord, V> Extend<(K, V)> for StructMap<K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K: Ord, V, const N: usize> From<[(K, V); N]> for StructMap<K, V> {
    fn from(entries: [(K, V); N]) -> Self {
        entries.into_iter().collect()
    }
}

impl<'a, K, V> IntoIterator for &'a StructMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the entries of a [`StructMap`] in key order.
pub struct Iter<'a, K, V> {
    nodes: slice::Iter<'a, NonNull<Entry<K, V>>>,
    _map: PhantomData<&'a StructMap<K, V>>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.nodes.next()?;
        // SAFETY: nodes are live while the map is borrowed for 'a.
        let entry = unsafe { &*node.as_ptr() };
        Some((&entry.key, &entry.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.nodes.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}
