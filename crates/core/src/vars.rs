// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Packed variable storage: a flat byte buffer holding `name=value\0`
//! entries back to back. Lookup is a linear scan — the expected entry
//! count per service is small (a handful of env vars, args and fd
//! assignments) so the simplicity wins over a hash map, and it keeps the
//! whole store trivially copyable into a fixed-capacity buffer.

use crate::error::VarError;

/// Backing storage for a [`VarStore`].
pub enum VarStorage {
    /// Grows without bound (subject to available memory).
    Heap(Vec<u8>),
    /// Bounded to `capacity` bytes; `set` fails with
    /// [`VarError::StoreFull`] rather than growing past it. Mirrors
    /// services launched from a fixed-size preallocated pool.
    Pool { buf: Vec<u8>, capacity: usize },
}

impl VarStorage {
    fn bytes(&self) -> &[u8] {
        match self {
            VarStorage::Heap(buf) => buf,
            VarStorage::Pool { buf, .. } => buf,
        }
    }

    fn bytes_mut(&mut self) -> &mut Vec<u8> {
        match self {
            VarStorage::Heap(buf) => buf,
            VarStorage::Pool { buf, .. } => buf,
        }
    }

    fn capacity(&self) -> Option<usize> {
        match self {
            VarStorage::Heap(_) => None,
            VarStorage::Pool { capacity, .. } => Some(*capacity),
        }
    }
}

/// A packed `name=value\0` store, shift-inserting and shift-deleting
/// entries in place to avoid per-entry allocations.
pub struct VarStore {
    storage: VarStorage,
}

fn validate_name(name: &str) -> Result<(), VarError> {
    if name.is_empty() || name.contains('=') || name.contains('\0') {
        return Err(VarError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn validate_value(value: &str) -> Result<(), VarError> {
    if value.contains('\0') {
        return Err(VarError::InvalidValue);
    }
    Ok(())
}

impl VarStore {
    pub fn heap() -> Self {
        VarStore {
            storage: VarStorage::Heap(Vec::new()),
        }
    }

    pub fn pool(capacity: usize) -> Self {
        VarStore {
            storage: VarStorage::Pool {
                buf: Vec::new(),
                capacity,
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.storage.bytes().is_empty()
    }

    pub fn len_bytes(&self) -> usize {
        self.storage.bytes().len()
    }

    /// Find the byte range of the entry for `name`, if present.
    fn find(&self, name: &str) -> Option<(usize, usize)> {
        let buf = self.storage.bytes();
        let mut start = 0;
        while start < buf.len() {
            let end = buf[start..]
                .iter()
                .position(|&b| b == 0)
                .map(|p| start + p)
                .unwrap_or(buf.len());
            let entry = &buf[start..end];
            if let Some(eq) = entry.iter().position(|&b| b == b'=') {
                if &entry[..eq] == name.as_bytes() {
                    return Some((start, end + 1));
                }
            }
            start = end + 1;
        }
        None
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        let (start, end) = self.find(name)?;
        let entry = &self.storage.bytes()[start..end - 1];
        let eq = entry.iter().position(|&b| b == b'=')?;
        std::str::from_utf8(&entry[eq + 1..]).ok()
    }

    /// Set `name` to `value`, or delete it if `value` is `None`.
    pub fn set(&mut self, name: &str, value: Option<&str>) -> Result<(), VarError> {
        validate_name(name)?;
        if let Some(v) = value {
            validate_value(v)?;
        }

        let existing = self.find(name);
        let new_entry: Vec<u8> = match value {
            Some(v) => format!("{name}={v}\0").into_bytes(),
            None => Vec::new(),
        };

        let current_len = self.storage.bytes().len();
        let removed_len = existing.map(|(s, e)| e - s).unwrap_or(0);
        let grown_by = new_entry.len() as isize - removed_len as isize;
        if let Some(capacity) = self.storage.capacity() {
            let projected = current_len as isize + grown_by;
            if projected < 0 || projected as usize > capacity {
                return Err(VarError::StoreFull { capacity });
            }
        }

        let buf = self.storage.bytes_mut();
        match existing {
            Some((start, end)) => {
                buf.splice(start..end, new_entry);
            }
            None => {
                buf.extend_from_slice(&new_entry);
            }
        }
        Ok(())
    }

    pub fn unset(&mut self, name: &str) -> Result<(), VarError> {
        self.set(name, None)
    }

    /// Iterate `(name, value)` pairs in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        let buf = self.storage.bytes();
        VarIter { buf, pos: 0 }
    }
}

struct VarIter<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Iterator for VarIter<'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.buf.len() {
            return None;
        }
        let end = self.buf[self.pos..]
            .iter()
            .position(|&b| b == 0)
            .map(|p| self.pos + p)
            .unwrap_or(self.buf.len());
        let entry = &self.buf[self.pos..end];
        self.pos = end + 1;
        let eq = entry.iter().position(|&b| b == b'=')?;
        let name = std::str::from_utf8(&entry[..eq]).ok()?;
        let value = std::str::from_utf8(&entry[eq + 1..]).ok()?;
        Some((name, value))
    }
}

#[cfg(test)]
#[path = "vars_tests.rs"]
mod tests;
