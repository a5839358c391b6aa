use std::io::Write;

use tracing::debug;

use crate::{
    errors::{Result, TsBufError},
    framing::{write_bytes, write_count, write_magic, TIME_SERIES_MAGIC, TIME_SERIES_MAGIC_END},
    series::{SeriesSnapshot, TimeSeries},
    timestamps::TimeDiffBuffer,
    xor::XorBuffer,
};

/// Pushes into the last buffer, appending a new buffer when the push asks for
/// a rotation. Gives up after `max_attempts` buffers.
fn push_with_rotation<B>(
    buffers: &mut Vec<B>,
    max_attempts: usize,
    kind: &'static str,
    new_buffer: impl Fn() -> B,
    mut push: impl FnMut(&mut B) -> Result<()>,
) -> Result<()> {
    let mut attempt = 1;
    loop {
        let result = match buffers.last_mut() {
            Some(buffer) => push(buffer),
            None => Err(TsBufError::BufferFull),
        };
        match result {
            Ok(()) => return Ok(()),
            Err(error) if error.needs_rotation() && attempt < max_attempts => {
                debug!(
                    kind,
                    attempt,
                    buffers = buffers.len() + 1,
                    %error,
                    "rotating buffer"
                );
                buffers.push(new_buffer());
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}

impl TimeSeries {
    /// Appends a sample, rotating the timestamp or value buffer when it's full.
    ///
    /// A timestamp whose interval changes by more than 32 bits also starts a
    /// new timestamp buffer.
    pub fn put(&mut self, timestamp: i64, value: f32) -> Result<()> {
        if timestamp < 0 {
            return Err(TsBufError::NegativeTimestamp(timestamp));
        }

        let max_attempts = self.config.max_append_attempts;
        let timestamp_capacity = self.config.timestamp_buffer_capacity;
        let value_capacity = self.config.value_buffer_capacity;

        push_with_rotation(
            &mut self.timestamps,
            max_attempts,
            "timestamps",
            || TimeDiffBuffer::with_capacity(timestamp_capacity),
            |buffer| buffer.push(timestamp),
        )?;
        // A fresh value buffer always takes a first value, so with two
        // attempts or more this can't fail after the timestamp went in.
        push_with_rotation(
            &mut self.values,
            max_attempts,
            "values",
            || XorBuffer::with_capacity(value_capacity),
            |buffer| Ok(buffer.push(value)?),
        )?;

        self.total += 1;
        Ok(())
    }
}

impl SeriesSnapshot {
    /// Writes the snapshot so it can be restored with [`TimeSeries::restore`].
    pub fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        write_magic(TIME_SERIES_MAGIC, writer)?;
        write_bytes(self.shard_id.as_bytes(), writer)?;
        write_count(self.total, writer)?;

        write_count(self.timestamps.len(), writer)?;
        write_count(self.timestamp_buffer_capacity, writer)?;
        for snapshot in &self.timestamps {
            snapshot.write(writer)?;
        }

        write_count(self.values.len(), writer)?;
        write_count(self.value_buffer_capacity, writer)?;
        for snapshot in &self.values {
            snapshot.write(writer)?;
        }

        write_magic(TIME_SERIES_MAGIC_END, writer)?;
        Ok(())
    }
}
