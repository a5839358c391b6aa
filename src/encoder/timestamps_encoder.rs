use std::io::Write;

use crate::{
    errors::{Result, TsBufError},
    framing::{write_count, write_magic, TIME_DIFF_MAGIC, TIME_DIFF_MAGIC_END},
    timestamps::{TimeDiffBuffer, TimeDiffSnapshot},
};

impl TimeDiffBuffer {
    /// Appends a timestamp.
    ///
    /// On error the buffer is left as it was: negative timestamps, intervals
    /// changing by more than 32 bits, and full residual stores are all
    /// rejected before anything is written.
    pub fn push(&mut self, timestamp: i64) -> Result<()> {
        if timestamp < 0 {
            return Err(TsBufError::NegativeTimestamp(timestamp));
        }

        match self.total {
            0 => {
                self.first = timestamp;
                self.previous = timestamp;
            }
            1 => {
                self.second = timestamp;
                self.before_previous = self.previous;
                self.previous = timestamp;
            }
            _ => {
                let previous_delta = self.previous as i128 - self.before_previous as i128;
                let delta = timestamp as i128 - self.previous as i128;
                let delta_of_delta = delta - previous_delta;
                let residual = i32::try_from(delta_of_delta)
                    .map_err(|_| TsBufError::JitterOutOfRange { delta_of_delta })?;

                self.residuals.write_integer(residual)?;
                self.before_previous = self.previous;
                self.previous = timestamp;
            }
        }
        self.total += 1;
        Ok(())
    }
}

impl TimeDiffSnapshot {
    /// Writes the snapshot so it can be restored with [`TimeDiffBuffer::restore`].
    pub fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        write_magic(TIME_DIFF_MAGIC, writer)?;
        write_count(self.total(), writer)?;
        writer.write_all(&self.first.to_be_bytes())?;
        writer.write_all(&self.second.to_be_bytes())?;
        writer.write_all(&self.before_last.to_be_bytes())?;
        writer.write_all(&self.last.to_be_bytes())?;
        self.residuals.write(writer)?;
        write_magic(TIME_DIFF_MAGIC_END, writer)?;
        Ok(())
    }
}
