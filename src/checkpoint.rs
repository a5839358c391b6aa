//! Checkpoint of many series in a single byte stream.
//!
//! Layout: series count, timestamp buffer capacity, value buffer capacity, each
//! "TimeSeries" stream, then a big-endian CRC32 Castagnoli of everything
//! before it. All counts are big-endian 32 bits integers.

use std::io::Write;

use nom::{multi::many_m_n, sequence::tuple, IResult};
use tracing::{debug, warn};

use crate::{
    config::BufferConfig,
    crc32c::{split_checked_crc32c, write_crc32c},
    errors::{Result, TsBufError},
    framing::{read_count, write_count},
    series::{read_series_frame, SeriesFrame, SeriesSnapshot, TimeSeries},
};

/// The content of a checkpoint.
#[derive(Debug)]
pub struct Checkpoint {
    /// Sizing for series created after the restore.
    pub config: BufferConfig,
    pub series: Vec<TimeSeries>,
}

/// Writes the snapshots of many series, followed by the checksum.
pub fn write_checkpoint<W: Write>(
    config: &BufferConfig,
    series: &[SeriesSnapshot],
    writer: &mut W,
) -> std::io::Result<()> {
    let mut buffer: Vec<u8> = Vec::new();
    write_count(series.len(), &mut buffer)?;
    write_count(config.timestamp_buffer_capacity, &mut buffer)?;
    write_count(config.value_buffer_capacity, &mut buffer)?;
    for snapshot in series {
        snapshot.write(&mut buffer)?;
    }

    writer.write_all(&buffer)?;
    write_crc32c(&buffer, writer)?;
    Ok(())
}

struct CheckpointFrame<'a> {
    timestamp_buffer_capacity: usize,
    value_buffer_capacity: usize,
    series: Vec<SeriesFrame<'a>>,
}

fn read_checkpoint_frame(input: &[u8]) -> IResult<&[u8], CheckpointFrame> {
    let (remaining_input, (len, timestamp_buffer_capacity, value_buffer_capacity)) =
        tuple((read_count, read_count, read_count))(input)?;
    let (remaining_input, series) = many_m_n(len, len, read_series_frame)(remaining_input)?;
    Ok((
        remaining_input,
        CheckpointFrame {
            timestamp_buffer_capacity,
            value_buffer_capacity,
            series,
        },
    ))
}

fn restore_checkpoint(input: &[u8]) -> Result<Checkpoint> {
    let data = split_checked_crc32c(input)?;
    let (remaining_input, frame) = read_checkpoint_frame(data)?;
    if !remaining_input.is_empty() {
        return Err(TsBufError::Corrupted(format!(
            "{} bytes after the last series",
            remaining_input.len()
        )));
    }

    let config = BufferConfig::new(frame.timestamp_buffer_capacity, frame.value_buffer_capacity);
    config
        .validate()
        .map_err(|error| TsBufError::Corrupted(error.to_string()))?;

    let series = frame
        .series
        .iter()
        .map(TimeSeries::from_frame)
        .collect::<Result<Vec<_>>>()?;
    Ok(Checkpoint { config, series })
}

/// Restores every series of a checkpoint written by [`write_checkpoint`].
///
/// The checksum is verified before anything is parsed. Nothing is returned
/// unless every series restores.
pub fn read_checkpoint(input: &[u8]) -> Result<Checkpoint> {
    match restore_checkpoint(input) {
        Ok(checkpoint) => {
            debug!(
                series = checkpoint.series.len(),
                bytes = input.len(),
                "restored checkpoint"
            );
            Ok(checkpoint)
        }
        Err(error) => {
            warn!(%error, bytes = input.len(), "rejected checkpoint");
            Err(error)
        }
    }
}
