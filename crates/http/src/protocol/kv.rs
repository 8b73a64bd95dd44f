//! An ordered list of `(key, value)` byte pairs.
//!
//! [`KvList`] backs query args, header fields and cookies. Lookups are linear scans since
//! these lists hold a handful of entries. Removed and cleared slots keep their buffers, so a
//! list that is reused message after message stops allocating once it has seen its largest
//! message.

use bytes::BytesMut;
use std::fmt;

/// A single `(key, value)` pair owned by a [`KvList`].
#[derive(Default, Clone, PartialEq, Eq)]
pub struct KeyValue {
    key: BytesMut,
    value: BytesMut,
}

impl KeyValue {
    #[inline]
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    #[inline]
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    #[inline]
    pub(crate) fn value_mut(&mut self) -> &mut BytesMut {
        &mut self.value
    }

    #[inline]
    pub(crate) fn key_mut(&mut self) -> &mut BytesMut {
        &mut self.key
    }

    fn clear(&mut self) {
        self.key.clear();
        self.value.clear();
    }
}

impl fmt::Debug for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {:?}", String::from_utf8_lossy(&self.key), String::from_utf8_lossy(&self.value))
    }
}

/// Ordered, duplicate-permitting list of [`KeyValue`] pairs.
#[derive(Default, Clone)]
pub struct KvList {
    /// `items[..len]` are live, the rest are spare slots kept for their buffers.
    items: Vec<KeyValue>,
    len: usize,
}

impl KvList {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Removes every pair, keeping the allocated slots.
    #[inline]
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Returns a cleared slot at the end of the list.
    pub(crate) fn alloc(&mut self) -> &mut KeyValue {
        if self.len == self.items.len() {
            self.items.push(KeyValue::default());
        } else {
            self.items[self.len].clear();
        }
        self.len += 1;
        &mut self.items[self.len - 1]
    }

    /// Appends a pair, even if `key` is already present.
    pub fn append(&mut self, key: &[u8], value: &[u8]) {
        let kv = self.alloc();
        kv.key.extend_from_slice(key);
        kv.value.extend_from_slice(value);
    }

    /// Overwrites the value of the first pair with `key`, or appends a new pair.
    pub fn set(&mut self, key: &[u8], value: &[u8]) {
        match self.find_mut(key) {
            Some(kv) => {
                kv.value.clear();
                kv.value.extend_from_slice(value);
            }
            None => self.append(key, value),
        }
    }

    /// Removes every pair with `key` and returns how many were removed.
    ///
    /// A removed slot is rotated past the live tail, so its buffers are reused later.
    pub fn delete_all(&mut self, key: &[u8]) -> usize {
        let mut removed = 0;
        let mut i = 0;
        while i < self.len {
            if self.items[i].key() == key {
                self.items[i..self.len].rotate_left(1);
                self.len -= 1;
                removed += 1;
            } else {
                i += 1;
            }
        }
        removed
    }

    /// The value of the first pair with `key`.
    pub fn peek(&self, key: &[u8]) -> Option<&[u8]> {
        self.iter().find(|kv| kv.key() == key).map(KeyValue::value)
    }

    /// Every value stored under `key`, in insertion order.
    pub fn peek_all(&self, key: &[u8]) -> Vec<&[u8]> {
        self.iter().filter(|kv| kv.key() == key).map(KeyValue::value).collect()
    }

    pub fn has(&self, key: &[u8]) -> bool {
        self.iter().any(|kv| kv.key() == key)
    }

    pub fn get(&self, index: usize) -> Option<&KeyValue> {
        self.iter().nth(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, KeyValue> {
        self.items[..self.len].iter()
    }

    pub(crate) fn find_mut(&mut self, key: &[u8]) -> Option<&mut KeyValue> {
        self.items[..self.len].iter_mut().find(|kv| kv.key() == key)
    }

    /// Calls `f` for each pair in insertion order.
    pub fn visit_all<F>(&self, mut f: F)
    where
        F: FnMut(&[u8], &[u8]),
    {
        for kv in self.iter() {
            f(kv.key(), kv.value());
        }
    }

    /// Deep-copies every pair into `dst`, reusing its slots.
    pub fn copy_to(&self, dst: &mut KvList) {
        dst.clear();
        for kv in self.iter() {
            dst.append(kv.key(), kv.value());
        }
    }
}

impl<'a> IntoIterator for &'a KvList {
    type Item = &'a KeyValue;
    type IntoIter = std::slice::Iter<'a, KeyValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl PartialEq for KvList {
    fn eq(&self, other: &Self) -> bool {
        self.items[..self.len] == other.items[..other.len]
    }
}

impl Eq for KvList {}

impl fmt::Debug for KvList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
