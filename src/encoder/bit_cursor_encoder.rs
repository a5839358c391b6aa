use std::io::Write;

use crate::{
    bit_cursor::{high_bits_mask, BitPayload, BitSnapshot},
    errors::{BufferFull, Result, TsBufError},
    framing::write_count,
    store::AppendOnlyStore,
};

/// Writes bits, most significant bit first, into an [`AppendOnlyStore`].
///
/// Complete bytes go to the store. The byte being filled stays in the writer
/// until it is complete, and is copied into every snapshot.
///
/// All writes check the remaining capacity first: a write that doesn't fit
/// returns [`BufferFull`] and leaves the writer untouched.
#[derive(Debug)]
pub struct BitCursorWriter {
    store: AppendOnlyStore,
    partial: u8,
    partial_bits: u8,
}

impl BitCursorWriter {
    pub fn new(store: AppendOnlyStore) -> Self {
        Self {
            store,
            partial: 0,
            partial_bits: 0,
        }
    }

    /// Creates a writer over a new store of `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(AppendOnlyStore::with_capacity(capacity))
    }

    /// Recreates a writer from a serialised bit string, so it can keep appending.
    pub(crate) fn from_payload(payload: &BitPayload, capacity: usize) -> Result<Self> {
        let needed_bits = payload.bit_len();
        let too_small = || TsBufError::CapacityTooSmall {
            needed_bits,
            capacity_bytes: capacity,
        };
        if needed_bits > capacity * 8 {
            return Err(too_small());
        }

        let mut store = AppendOnlyStore::with_capacity(capacity);
        store
            .extend_from_slice(payload.bytes)
            .map_err(|_| too_small())?;

        Ok(Self {
            store,
            partial: payload.partial & high_bits_mask(payload.partial_bits),
            partial_bits: payload.partial_bits,
        })
    }

    pub fn capacity_bytes(&self) -> usize {
        self.store.capacity()
    }

    pub fn written_bits(&self) -> usize {
        self.store.len() * 8 + self.partial_bits as usize
    }

    pub fn remaining_bits(&self) -> usize {
        self.capacity_bytes() * 8 - self.written_bits()
    }

    #[inline]
    pub fn can_write_bits(&self, num_bits: usize) -> bool {
        num_bits <= self.remaining_bits()
    }

    fn push_bit(&mut self, bit: bool) -> std::result::Result<(), BufferFull> {
        if bit {
            self.partial |= 0x80 >> self.partial_bits;
        }
        self.partial_bits += 1;
        if self.partial_bits == 8 {
            self.store.push(self.partial)?;
            self.partial = 0;
            self.partial_bits = 0;
        }
        Ok(())
    }

    pub fn write_bit(&mut self, bit: bool) -> std::result::Result<(), BufferFull> {
        if !self.can_write_bits(1) {
            return Err(BufferFull);
        }
        self.push_bit(bit)
    }

    /// Writes the `num_bits` low bits of `value`, up to 32.
    pub fn write_uint(
        &mut self,
        value: u32,
        num_bits: u32,
    ) -> std::result::Result<(), BufferFull> {
        debug_assert!(num_bits <= 32);
        if !self.can_write_bits(num_bits as usize) {
            return Err(BufferFull);
        }
        for shift in (0..num_bits).rev() {
            self.push_bit((value >> shift) & 1 == 1)?;
        }
        Ok(())
    }

    /// Writes `value` in two's complement on `num_bits` bits.
    ///
    /// The value must fit, higher bits are dropped.
    pub fn write_integer(
        &mut self,
        value: i32,
        num_bits: u32,
    ) -> std::result::Result<(), BufferFull> {
        self.write_uint(value as u32, num_bits)
    }

    /// Freezes the bits written so far. O(1), the store bytes are shared.
    pub fn snapshot(&self) -> BitSnapshot {
        BitSnapshot::new(self.store.view(), self.partial, self.partial_bits)
    }
}

impl BitSnapshot {
    /// Writes the bit string: the complete bytes count, the bytes, the number
    /// of used bits in the partial byte, and the partial byte.
    pub fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        let bytes = self.view().to_vec();
        write_count(bytes.len(), writer)?;
        writer.write_all(&bytes)?;

        let (partial, partial_bits) = self.partial();
        write_count(partial_bits as usize, writer)?;
        writer.write_all(&[partial])?;
        Ok(())
    }
}
