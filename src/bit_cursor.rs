use std::io::Read;

use bitstream_io::{BigEndian, BitRead, BitReader};
use nom::{
    bytes::complete::take,
    combinator::verify,
    number::complete::u8 as read_u8,
    IResult,
};

use crate::{
    errors::{Result, TsBufError},
    framing::read_count,
    store::StoreView,
};

pub use crate::encoder::bit_cursor_encoder::BitCursorWriter;

/// Keeps the `count` most significant bits of a byte.
#[inline]
pub(crate) fn high_bits_mask(count: u8) -> u8 {
    match count {
        0 => 0,
        8..=u8::MAX => 0xFF,
        _ => 0xFF << (8 - count),
    }
}

/// An immutable bit string: the complete bytes of a store view, followed by the
/// writer's partial byte at the time of the snapshot.
#[derive(Debug, Clone)]
pub struct BitSnapshot {
    view: StoreView,
    partial: u8,
    partial_bits: u8,
}

impl BitSnapshot {
    pub(crate) fn new(view: StoreView, partial: u8, partial_bits: u8) -> Self {
        Self {
            view,
            partial,
            partial_bits,
        }
    }

    /// Number of meaningful bits.
    pub fn bit_len(&self) -> usize {
        self.view.len() * 8 + self.partial_bits as usize
    }

    /// The complete bytes.
    pub fn view(&self) -> &StoreView {
        &self.view
    }

    /// The trailing incomplete byte and how many of its high bits are used.
    pub fn partial(&self) -> (u8, u8) {
        (self.partial, self.partial_bits)
    }

    /// Starts reading the bits from the beginning.
    pub fn reader(&self) -> BitCursorReader {
        let bytes = SnapshotBytes {
            view: self.view.clone(),
            position: 0,
            partial: (self.partial_bits > 0).then_some(self.partial),
        };
        BitCursorReader {
            bits: BitReader::endian(bytes, BigEndian),
            remaining_bits: self.bit_len(),
        }
    }
}

struct SnapshotBytes {
    view: StoreView,
    position: usize,
    partial: Option<u8>,
}

impl Read for SnapshotBytes {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut read = 0;
        for slot in buf.iter_mut() {
            if let Some(byte) = self.view.get(self.position) {
                self.position += 1;
                *slot = byte;
            } else if let Some(byte) = self.partial.take() {
                *slot = byte;
            } else {
                break;
            }
            read += 1;
        }
        Ok(read)
    }
}

/// Reads bits and fixed width integers, most significant bit first.
///
/// Reading past the last meaningful bit of the snapshot is an error, the zero
/// padding of the partial byte is never served.
pub struct BitCursorReader {
    bits: BitReader<SnapshotBytes, BigEndian>,
    remaining_bits: usize,
}

impl std::fmt::Debug for BitCursorReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitCursorReader")
            .field("remaining_bits", &self.remaining_bits)
            .finish_non_exhaustive()
    }
}

impl BitCursorReader {
    pub fn remaining_bits(&self) -> usize {
        self.remaining_bits
    }

    fn consume(&mut self, count: u32) -> Result<()> {
        let count = count as usize;
        if count > self.remaining_bits {
            return Err(TsBufError::Corrupted(format!(
                "reading {} bits but only {} are left",
                count, self.remaining_bits
            )));
        }
        self.remaining_bits -= count;
        Ok(())
    }

    pub fn read_bit(&mut self) -> Result<bool> {
        self.consume(1)?;
        Ok(self.bits.read_bit()?)
    }

    /// Reads an unsigned integer stored on `num_bits` bits, up to 32.
    pub fn read_uint(&mut self, num_bits: u32) -> Result<u32> {
        if num_bits > 32 {
            return Err(TsBufError::Corrupted(format!(
                "cannot read {} bits into 32 bits",
                num_bits
            )));
        }
        if num_bits == 0 {
            return Ok(0);
        }
        self.consume(num_bits)?;
        Ok(self.bits.read::<u32>(num_bits)?)
    }

    /// Reads a two's complement integer stored on `num_bits` bits.
    ///
    /// With 32 bits, this returns the raw bit pattern.
    pub fn read_integer(&mut self, num_bits: u32) -> Result<i32> {
        let raw = self.read_uint(num_bits)?;
        if num_bits == 0 {
            return Ok(0);
        }
        let shift = 32 - num_bits;
        Ok(((raw << shift) as i32) >> shift)
    }
}

/// A serialised bit string, borrowed from the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BitPayload<'a> {
    pub bytes: &'a [u8],
    pub partial: u8,
    pub partial_bits: u8,
}

impl BitPayload<'_> {
    pub fn bit_len(&self) -> usize {
        self.bytes.len() * 8 + self.partial_bits as usize
    }
}

/// Reads a bit string: the complete bytes count, the bytes, the number of
/// used bits in the partial byte, and the partial byte.
pub(crate) fn read_bit_payload(input: &[u8]) -> IResult<&[u8], BitPayload> {
    let (remaining_input, num_bytes) = read_count(input)?;
    let (remaining_input, bytes) = take(num_bytes)(remaining_input)?;
    let (remaining_input, partial_bits) =
        verify(read_count, |bits: &usize| *bits < 8)(remaining_input)?;
    let (remaining_input, partial) = read_u8(remaining_input)?;

    let partial_bits = partial_bits as u8;
    Ok((
        remaining_input,
        BitPayload {
            bytes,
            partial: partial & high_bits_mask(partial_bits),
            partial_bits,
        },
    ))
}
