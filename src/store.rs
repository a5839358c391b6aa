use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::errors::BufferFull;

/// A fixed capacity, append-only byte store.
///
/// The store is owned by a single writer. Bytes are only ever appended, and an
/// appended byte is never written again, so a [`StoreView`] taken at any point
/// keeps seeing exactly the bytes that existed when it was created, while the
/// writer keeps appending behind it.
///
/// The backing memory is allocated once, at creation. Running out of capacity is
/// reported with [`BufferFull`], the store never grows.
#[derive(Debug)]
pub struct AppendOnlyStore {
    bytes: Arc<[AtomicU8]>,
    len: usize,
}

impl AppendOnlyStore {
    /// Creates an empty store that can hold up to `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: (0..capacity).map(|_| AtomicU8::new(0)).collect(),
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Number of bytes appended so far.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn remaining(&self) -> usize {
        self.capacity() - self.len
    }

    /// Appends a single byte.
    pub fn push(&mut self, byte: u8) -> Result<(), BufferFull> {
        let slot = self.bytes.get(self.len).ok_or(BufferFull)?;
        slot.store(byte, Ordering::Relaxed);
        self.len += 1;
        Ok(())
    }

    /// Appends all the bytes, or none of them if they don't fit.
    pub fn extend_from_slice(&mut self, data: &[u8]) -> Result<(), BufferFull> {
        if data.len() > self.remaining() {
            return Err(BufferFull);
        }
        for byte in data {
            self.push(*byte)?;
        }
        Ok(())
    }

    /// Returns an immutable view over the bytes appended so far.
    ///
    /// This is O(1): the view shares the backing memory and only records the
    /// current length.
    pub fn view(&self) -> StoreView {
        StoreView {
            bytes: Arc::clone(&self.bytes),
            len: self.len,
        }
    }
}

/// A frozen prefix of an [`AppendOnlyStore`].
///
/// Views are cheap to clone and can be sent to other threads.
#[derive(Debug, Clone)]
pub struct StoreView {
    bytes: Arc<[AtomicU8]>,
    len: usize,
}

impl StoreView {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the byte at `index`, or `None` past the end of the view.
    #[inline]
    pub fn get(&self, index: usize) -> Option<u8> {
        if index >= self.len {
            return None;
        }
        self.bytes.get(index).map(|b| b.load(Ordering::Relaxed))
    }

    /// Copies the viewed bytes out.
    pub fn to_vec(&self) -> Vec<u8> {
        self.bytes[..self.len]
            .iter()
            .map(|b| b.load(Ordering::Relaxed))
            .collect()
    }
}
