// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UTF-8 text buffer over [`StructVec<u8>`].

use super::StructVec;
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;

/// Owned UTF-8 string with the representation of `StructVec<u8>`.
#[repr(transparent)]
#[derive(Default, Clone, PartialEq, Eq)]
pub struct StructString {
    bytes: StructVec<u8>,
}

impl StructString {
    /// Create an empty string without allocating.
    pub const fn new() -> Self {
        Self {
            bytes: StructVec::new(),
        }
    }

    /// Borrow as `str`.
    pub fn as_str(&self) -> &str {
        // SAFETY: every constructor and mutator only stores valid UTF-8.
        unsafe { std::str::from_utf8_unchecked(self.bytes.as_slice()) }
    }

    /// Borrow the UTF-8 bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.bytes.as_slice()
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if the string is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Append a string slice.
    pub fn push_str(&mut self, s: &str) {
        self.bytes.reserve_exact(s.len());
        self.bytes.extend(s.bytes());
    }

    /// Truncate to empty, keeping the buffer.
    pub fn clear(&mut self) {
        self.bytes.clear();
    }
}

impl Deref for StructString {
    type Target = str;

    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl Borrow<str> for StructString {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl AsRef<str> for StructString {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl From<&str> for StructString {
    fn from(s: &str) -> Self {
        let mut out = Self::new();
        out.push_str(s);
        out
    }
}

impl From<String> for StructString {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<&StructString> for String {
    fn from(s: &StructString) -> Self {
        s.as_str().to_owned()
    }
}

impl PartialEq<str> for StructString {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for StructString {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl PartialOrd for StructString {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StructString {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl Hash for StructString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl fmt::Debug for StructString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl fmt::Display for StructString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem;

    #[test]
    fn test_from_and_compare() {
        let s = StructString::from("msg1member7");
        assert_eq!(s, "msg1member7");
        assert_eq!(s.len(), 11);
        assert_eq!(s.to_string(), "msg1member7");
        assert_eq!(format!("{:?}", s), "\"msg1member7\"");
    }

    #[test]
    fn test_ordering_follows_str() {
        let mut keys = vec![
            StructString::from("b"),
            StructString::from("ab"),
            StructString::from("a"),
        ];
        keys.sort();
        let sorted: Vec<&str> = keys.iter().map(|k| k.as_str()).collect();
        assert_eq!(sorted, vec!["a", "ab", "b"]);
    }

    #[test]
    fn test_push_str() {
        let mut s = StructString::new();
        s.push_str("héllo");
        s.push_str(" wörld");
        assert_eq!(s.as_str(), "héllo wörld");
        s.clear();
        assert!(s.is_empty());
    }

    #[test]
    fn test_layout_matches_byte_vec() {
        assert_eq!(mem::size_of::<StructString>(), mem::size_of::<StructVec<u8>>());
        assert_eq!(mem::align_of::<StructString>(), mem::align_of::<StructVec<u8>>());
    }
}
