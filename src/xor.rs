use nom::{number::complete::be_u32, sequence::tuple, IResult};

use crate::{
    bit_cursor::{read_bit_payload, BitCursorReader, BitCursorWriter, BitPayload, BitSnapshot},
    errors::{Result, TsBufError},
    framing::{read_count, read_magic, XOR_MAGIC, XOR_MAGIC_END},
};

/// Compresses a stream of `f32` by XOR-ing each value with the previous one.
///
/// The first value is stored raw on 32 bits. Each following value starts with
/// control bits:
///
/// * `0`: same value as the previous one.
/// * `10`: the meaningful bits of the XOR fit the leading and trailing zeros
///   window of the previous value's bits, and only those bits follow.
/// * `11`: 5 bits of leading zeros, 6 bits of meaningful bits count, then the
///   meaningful bits.
///
/// The `10` window comes from the previous value itself, not from the previous
/// XOR as in the Gorilla paper. Decoding mirrors it so the stream stays exact.
#[derive(Debug)]
pub struct XorBuffer {
    pub(crate) writer: BitCursorWriter,
    pub(crate) previous_value_bits: u32,
    pub(crate) total: usize,
}

impl XorBuffer {
    pub fn new(writer: BitCursorWriter) -> Self {
        Self {
            writer,
            previous_value_bits: 0,
            total: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(BitCursorWriter::with_capacity(capacity))
    }

    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn writer(&self) -> &BitCursorWriter {
        &self.writer
    }

    /// The last value pushed, if any.
    pub fn last(&self) -> Option<f32> {
        (self.total > 0).then(|| f32::from_bits(self.previous_value_bits))
    }

    pub fn snapshot(&self) -> XorSnapshot {
        XorSnapshot::new(self.writer.snapshot(), self.total, self.previous_value_bits)
    }

    /// Restores a buffer written by [`XorSnapshot::write`] into a new store of
    /// `capacity` bytes.
    pub fn restore(input: &[u8], capacity: usize) -> Result<(&[u8], Self)> {
        let (remaining_input, frame) = read_xor_frame(input)?;
        Ok((remaining_input, Self::from_frame(&frame, capacity)?))
    }

    pub(crate) fn from_frame(frame: &XorFrame, capacity: usize) -> Result<Self> {
        let buffer = Self {
            writer: BitCursorWriter::from_payload(&frame.payload, capacity)?,
            previous_value_bits: frame.previous_value_bits,
            total: frame.total,
        };

        let mut snapshot = buffer.snapshot();
        for value in snapshot.by_ref() {
            value?;
        }
        let left = snapshot.reader.remaining_bits();
        if left != 0 {
            return Err(TsBufError::Corrupted(format!(
                "{} bits left after {} values",
                left, frame.total
            )));
        }
        if frame.total > 0 && snapshot.previous_value_bits != frame.previous_value_bits {
            return Err(TsBufError::Corrupted(format!(
                "last value is {:#010x} but the stream saved {:#010x}",
                snapshot.previous_value_bits, frame.previous_value_bits
            )));
        }
        Ok(buffer)
    }
}

/// A frozen view of a [`XorBuffer`], decoding its values in order.
#[derive(Debug)]
pub struct XorSnapshot {
    pub(crate) bits: BitSnapshot,
    pub(crate) last_value_bits: u32,
    reader: BitCursorReader,
    previous_value_bits: u32,
    total: usize,
    served: usize,
}

impl XorSnapshot {
    pub(crate) fn new(bits: BitSnapshot, total: usize, last_value_bits: u32) -> Self {
        Self {
            reader: bits.reader(),
            bits,
            last_value_bits,
            previous_value_bits: 0,
            total,
            served: 0,
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    fn next_value_bits(&mut self) -> Result<u32> {
        if self.served == 0 {
            return self.reader.read_uint(32);
        }
        if !self.reader.read_bit()? {
            return Ok(self.previous_value_bits);
        }

        let (trailing_zeros, meaningful_bits) = if !self.reader.read_bit()? {
            if self.previous_value_bits == 0 {
                return Err(TsBufError::Corrupted(
                    "reused window of a zero value".to_string(),
                ));
            }
            let leading_zeros = self.previous_value_bits.leading_zeros();
            let trailing_zeros = self.previous_value_bits.trailing_zeros();
            (trailing_zeros, 32 - leading_zeros - trailing_zeros)
        } else {
            let leading_zeros = self.reader.read_uint(5)?;
            let meaningful_bits = self.reader.read_uint(6)?;
            if meaningful_bits == 0 || leading_zeros + meaningful_bits > 32 {
                return Err(TsBufError::Corrupted(format!(
                    "invalid window: {} leading zeros, {} meaningful bits",
                    leading_zeros, meaningful_bits
                )));
            }
            (32 - leading_zeros - meaningful_bits, meaningful_bits)
        };

        let xor = self.reader.read_uint(meaningful_bits)? << trailing_zeros;
        Ok(self.previous_value_bits ^ xor)
    }
}

impl Iterator for XorSnapshot {
    type Item = Result<f32>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.served >= self.total {
            return None;
        }
        match self.next_value_bits() {
            Ok(value_bits) => {
                self.previous_value_bits = value_bits;
                self.served += 1;
                Some(Ok(f32::from_bits(value_bits)))
            }
            Err(error) => {
                self.served = self.total;
                Some(Err(error))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.total - self.served;
        (left, Some(left))
    }
}

impl ExactSizeIterator for XorSnapshot {}

#[derive(Debug)]
pub(crate) struct XorFrame<'a> {
    pub total: usize,
    pub previous_value_bits: u32,
    pub payload: BitPayload<'a>,
}

pub(crate) fn read_xor_frame(input: &[u8]) -> IResult<&[u8], XorFrame> {
    let (remaining_input, (_, total, previous_value_bits, payload, _)) = tuple((
        read_magic(XOR_MAGIC),
        read_count,
        be_u32,
        read_bit_payload,
        read_magic(XOR_MAGIC_END),
    ))(input)?;

    Ok((
        remaining_input,
        XorFrame {
            total,
            previous_value_bits,
            payload,
        },
    ))
}
