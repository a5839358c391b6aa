use nom::{sequence::tuple, IResult};

use crate::{
    bit_cursor::{read_bit_payload, BitCursorReader, BitCursorWriter, BitPayload, BitSnapshot},
    errors::{Result, TsBufError},
    framing::{read_count, read_magic, GORILLA_MAGIC, GORILLA_MAGIC_END},
};

pub use crate::encoder::gorilla_encoder::write_gorilla_int;

/// Reads the bucket prefix of a Gorilla integer.
///
/// It consists of 1 bits and a final 0, up to 4 bits.
/// When it's 4 bits long, the final 0 is skipped.
fn read_gorilla_bucket(reader: &mut BitCursorReader) -> Result<u8> {
    for i in 0..4 {
        // A 0 is the end of the bucket prefix.
        if !reader.read_bit()? {
            return Ok(i);
        }
    }
    Ok(4)
}

#[inline]
pub(crate) fn gorilla_bucket_to_num_bits(bucket: u8) -> u32 {
    match bucket {
        0 => 0,
        1 => 7,
        2 => 9,
        3 => 12,
        _ => 32,
    }
}

/// Reads a Gorilla encoded signed integer.
pub fn read_gorilla_int(reader: &mut BitCursorReader) -> Result<i32> {
    let bucket = read_gorilla_bucket(reader)?;
    reader.read_integer(gorilla_bucket_to_num_bits(bucket))
}

/// An append-only sequence of Gorilla encoded integers.
///
/// Holds the delta of deltas of a timestamp buffer.
#[derive(Debug)]
pub struct GorillaBuffer {
    pub(crate) writer: BitCursorWriter,
    pub(crate) total: usize,
}

impl GorillaBuffer {
    pub fn new(writer: BitCursorWriter) -> Self {
        Self { writer, total: 0 }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(BitCursorWriter::with_capacity(capacity))
    }

    /// Number of integers written.
    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn writer(&self) -> &BitCursorWriter {
        &self.writer
    }

    pub fn snapshot(&self) -> GorillaSnapshot {
        GorillaSnapshot::new(self.writer.snapshot(), self.total)
    }

    /// Restores a buffer written by [`GorillaSnapshot::write`] into a new store
    /// of `capacity` bytes.
    pub fn restore(input: &[u8], capacity: usize) -> Result<(&[u8], Self)> {
        let (remaining_input, frame) = read_gorilla_frame(input)?;
        Ok((remaining_input, Self::from_frame(&frame, capacity)?))
    }

    pub(crate) fn from_frame(frame: &GorillaFrame, capacity: usize) -> Result<Self> {
        let buffer = Self {
            writer: BitCursorWriter::from_payload(&frame.payload, capacity)?,
            total: frame.total,
        };

        // Every integer must decode, and nothing may be left over.
        let mut snapshot = buffer.snapshot();
        for value in snapshot.by_ref() {
            value?;
        }
        let left = snapshot.reader.remaining_bits();
        if left != 0 {
            return Err(TsBufError::Corrupted(format!(
                "{} bits left after {} integers",
                left, frame.total
            )));
        }
        Ok(buffer)
    }
}

/// A frozen view of a [`GorillaBuffer`], decoding its integers in order.
#[derive(Debug)]
pub struct GorillaSnapshot {
    pub(crate) bits: BitSnapshot,
    reader: BitCursorReader,
    total: usize,
    served: usize,
}

impl GorillaSnapshot {
    fn new(bits: BitSnapshot, total: usize) -> Self {
        Self {
            reader: bits.reader(),
            bits,
            total,
            served: 0,
        }
    }

    /// Number of integers in the snapshot, served or not.
    pub fn total(&self) -> usize {
        self.total
    }
}

impl Iterator for GorillaSnapshot {
    type Item = Result<i32>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.served >= self.total {
            return None;
        }
        let value = read_gorilla_int(&mut self.reader);
        // Stop at the first error, the bit position is lost.
        self.served = if value.is_ok() {
            self.served + 1
        } else {
            self.total
        };
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.total - self.served;
        (left, Some(left))
    }
}

impl ExactSizeIterator for GorillaSnapshot {}

#[derive(Debug)]
pub(crate) struct GorillaFrame<'a> {
    pub total: usize,
    pub payload: BitPayload<'a>,
}

pub(crate) fn read_gorilla_frame(input: &[u8]) -> IResult<&[u8], GorillaFrame> {
    let (remaining_input, (_, total, payload, _)) = tuple((
        read_magic(GORILLA_MAGIC),
        read_count,
        read_bit_payload,
        read_magic(GORILLA_MAGIC_END),
    ))(input)?;

    Ok((remaining_input, GorillaFrame { total, payload }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(snapshot: GorillaSnapshot) -> Vec<i32> {
        snapshot.collect::<Result<Vec<_>>>().unwrap()
    }

    #[test]
    fn test_bucket_sizes() {
        assert_eq!(gorilla_bucket_to_num_bits(0), 0);
        assert_eq!(gorilla_bucket_to_num_bits(1), 7);
        assert_eq!(gorilla_bucket_to_num_bits(2), 9);
        assert_eq!(gorilla_bucket_to_num_bits(3), 12);
        assert_eq!(gorilla_bucket_to_num_bits(4), 32);
    }

    #[test]
    fn test_buffer() {
        let mut buffer = GorillaBuffer::with_capacity(16);
        for value in [10, 40, i32::MAX, i32::MIN] {
            buffer.write_integer(value).unwrap();
        }
        assert_eq!(buffer.len(), 4);
        assert_eq!(collect(buffer.snapshot()), vec![10, 40, i32::MAX, i32::MIN]);
    }

    #[test]
    fn test_zeros() {
        let mut buffer = GorillaBuffer::with_capacity(10);
        for value in [0, 0, i32::MAX, i32::MIN] {
            buffer.write_integer(value).unwrap();
        }
        assert_eq!(collect(buffer.snapshot()), vec![0, 0, i32::MAX, i32::MIN]);
    }

    #[test]
    fn test_snapshot_immutability() {
        let mut buffer = GorillaBuffer::with_capacity(10);
        buffer.write_integer(10).unwrap();
        let first = buffer.snapshot();
        buffer.write_integer(20).unwrap();
        let second = buffer.snapshot();

        assert_eq!(first.len(), 1);
        assert_eq!(collect(first), vec![10]);
        assert_eq!(collect(second), vec![10, 20]);
    }

    #[test]
    fn test_snapshot_of_large_buffer() {
        let mut buffer = GorillaBuffer::with_capacity(2000);
        let mut snapshot_at_100 = None;
        for i in 0..500 {
            buffer.write_integer(i).unwrap();
            if i == 100 {
                snapshot_at_100 = Some(buffer.snapshot());
            }
        }
        let expected: Vec<i32> = (0..500).collect();
        assert_eq!(collect(buffer.snapshot()), expected);
        assert_eq!(collect(snapshot_at_100.unwrap()), expected[..101].to_vec());
    }

    #[test]
    fn test_restore_rejects_wrong_total() {
        let mut buffer = GorillaBuffer::with_capacity(64);
        for value in [1, -300, 5000] {
            buffer.write_integer(value).unwrap();
        }
        let mut serialised = Vec::new();
        buffer.snapshot().write(&mut serialised).unwrap();

        // Claim one integer less than written: bits are left over
        let mut fewer = serialised.clone();
        fewer[4 + GORILLA_MAGIC.len() + 3] = 2;
        let error = GorillaBuffer::restore(&fewer, 64).unwrap_err();
        assert!(error.to_string().contains("left"));

        // Claim one integer more than written: the decoding runs out of bits
        let mut more = serialised;
        more[4 + GORILLA_MAGIC.len() + 3] = 4;
        assert!(matches!(
            GorillaBuffer::restore(&more, 64),
            Err(TsBufError::Corrupted(_))
        ));
    }
}
