use std::io::Write;

use crate::{
    bit_cursor::BitCursorWriter,
    errors::BufferFull,
    framing::{write_count, write_magic, XOR_MAGIC, XOR_MAGIC_END},
    xor::{XorBuffer, XorSnapshot},
};

/// Writes the XOR of a value with the previous one, after the first value.
fn write_xor(
    xor: u32,
    previous_value_bits: u32,
    writer: &mut BitCursorWriter,
) -> Result<(), BufferFull> {
    if xor == 0 {
        return writer.write_bit(false);
    }

    let leading_zeros = xor.leading_zeros();
    let trailing_zeros = xor.trailing_zeros();
    let meaningful_bits = 32 - leading_zeros - trailing_zeros;

    if leading_zeros == previous_value_bits.leading_zeros()
        && trailing_zeros == previous_value_bits.trailing_zeros()
    {
        if !writer.can_write_bits(2 + meaningful_bits as usize) {
            return Err(BufferFull);
        }
        writer.write_uint(0b10, 2)?;
    } else {
        if !writer.can_write_bits(2 + 5 + 6 + meaningful_bits as usize) {
            return Err(BufferFull);
        }
        writer.write_uint(0b11, 2)?;
        writer.write_uint(leading_zeros, 5)?;
        writer.write_uint(meaningful_bits, 6)?;
    }
    writer.write_uint(xor >> trailing_zeros, meaningful_bits)
}

impl XorBuffer {
    /// Appends a value. Nothing is written if it doesn't fit.
    pub fn push(&mut self, value: f32) -> Result<(), BufferFull> {
        let value_bits = value.to_bits();
        if self.total == 0 {
            self.writer.write_uint(value_bits, 32)?;
        } else {
            write_xor(
                value_bits ^ self.previous_value_bits,
                self.previous_value_bits,
                &mut self.writer,
            )?;
        }
        self.previous_value_bits = value_bits;
        self.total += 1;
        Ok(())
    }
}

impl XorSnapshot {
    /// Writes the snapshot so it can be restored with [`XorBuffer::restore`].
    pub fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        write_magic(XOR_MAGIC, writer)?;
        write_count(self.total(), writer)?;
        writer.write_all(&self.last_value_bits.to_be_bytes())?;
        self.bits.write(writer)?;
        write_magic(XOR_MAGIC_END, writer)?;
        Ok(())
    }
}
