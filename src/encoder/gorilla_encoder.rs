use std::io::Write;

use crate::{
    bit_cursor::BitCursorWriter,
    errors::BufferFull,
    framing::{write_count, write_magic, GORILLA_MAGIC, GORILLA_MAGIC_END},
    gorilla::{GorillaBuffer, GorillaSnapshot},
};

fn write_bucket(
    control: u32,
    control_bits: u32,
    value: i32,
    value_bits: u32,
    writer: &mut BitCursorWriter,
) -> Result<(), BufferFull> {
    // Check the whole field first so a full buffer never gets half of it.
    if !writer.can_write_bits((control_bits + value_bits) as usize) {
        return Err(BufferFull);
    }
    writer.write_uint(control, control_bits)?;
    writer.write_integer(value, value_bits)
}

/// Writes a signed integer with the Gorilla variable length encoding.
///
/// | range            | control | value bits |
/// |------------------|---------|------------|
/// | 0                | `0`     | 0          |
/// | [-64, 63]        | `10`    | 7          |
/// | [-256, 255]      | `110`   | 9          |
/// | [-2048, 2047]    | `1110`  | 12         |
/// | everything else  | `1111`  | 32         |
pub fn write_gorilla_int(value: i32, writer: &mut BitCursorWriter) -> Result<(), BufferFull> {
    match value {
        0 => writer.write_bit(false),
        -64..=63 => write_bucket(0b10, 2, value, 7, writer),
        -256..=255 => write_bucket(0b110, 3, value, 9, writer),
        -2048..=2047 => write_bucket(0b1110, 4, value, 12, writer),
        _ => write_bucket(0b1111, 4, value, 32, writer),
    }
}

impl GorillaBuffer {
    /// Appends an integer. Nothing is written if it doesn't fit.
    pub fn write_integer(&mut self, value: i32) -> Result<(), BufferFull> {
        write_gorilla_int(value, &mut self.writer)?;
        self.total += 1;
        Ok(())
    }
}

impl GorillaSnapshot {
    /// Writes the snapshot so it can be restored with [`GorillaBuffer::restore`].
    pub fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        write_magic(GORILLA_MAGIC, writer)?;
        write_count(self.total(), writer)?;
        self.bits.write(writer)?;
        write_magic(GORILLA_MAGIC_END, writer)?;
        Ok(())
    }
}
