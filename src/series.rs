use nom::{multi::many_m_n, sequence::tuple, IResult};
use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::{
    config::BufferConfig,
    errors::{Result, TsBufError},
    framing::{read_count, read_magic, read_string, TIME_SERIES_MAGIC, TIME_SERIES_MAGIC_END},
    merge::BatchMergeDecoder,
    timestamps::{read_time_diff_frame, TimeDiffBuffer, TimeDiffFrame, TimeDiffSnapshot},
    xor::{read_xor_frame, XorBuffer, XorFrame, XorSnapshot},
};

/// The full history of one series.
///
/// Buffers have a fixed capacity. When the last timestamp or value buffer
/// can't take a sample, a new one is appended to its list. Both lists always
/// hold the same number of samples, but they rotate independently.
///
/// [`put`](Self::put) takes `&mut self` and [`snapshot`](Self::snapshot)
/// takes `&self`, so only the thread owning the series, or a lock around it,
/// can take snapshots. The snapshots themselves are `Send` and decode on any
/// thread while the owner keeps appending.
#[derive(Debug)]
pub struct TimeSeries {
    pub(crate) shard_id: String,
    pub(crate) total: usize,
    pub(crate) timestamps: Vec<TimeDiffBuffer>,
    pub(crate) values: Vec<XorBuffer>,
    pub(crate) config: BufferConfig,
}

impl TimeSeries {
    pub fn new(shard_id: impl Into<String>, config: BufferConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            shard_id: shard_id.into(),
            total: 0,
            timestamps: vec![TimeDiffBuffer::with_capacity(
                config.timestamp_buffer_capacity,
            )],
            values: vec![XorBuffer::with_capacity(config.value_buffer_capacity)],
            config,
        })
    }

    pub fn shard_id(&self) -> &str {
        &self.shard_id
    }

    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn config(&self) -> &BufferConfig {
        &self.config
    }

    pub fn timestamp_buffers(&self) -> &[TimeDiffBuffer] {
        &self.timestamps
    }

    pub fn value_buffers(&self) -> &[XorBuffer] {
        &self.values
    }

    /// Freezes every buffer. O(1) per buffer.
    pub fn snapshot(&self) -> SeriesSnapshot {
        SeriesSnapshot {
            shard_id: self.shard_id.clone(),
            total: self.total,
            timestamp_buffer_capacity: self.config.timestamp_buffer_capacity,
            value_buffer_capacity: self.config.value_buffer_capacity,
            timestamps: self.timestamps.iter().map(TimeDiffBuffer::snapshot).collect(),
            values: self.values.iter().map(XorBuffer::snapshot).collect(),
        }
    }

    /// Restores a series written by [`SeriesSnapshot::write`].
    ///
    /// The stream only records the buffer capacities, so the restored series
    /// gets the default `max_append_attempts`.
    pub fn restore(input: &[u8]) -> Result<(&[u8], Self)> {
        let (remaining_input, frame) = read_series_frame(input).map_err(|error| {
            let error = TsBufError::from(error);
            warn!(%error, bytes = input.len(), "rejected series stream");
            error
        })?;
        let series = Self::from_frame(&frame).map_err(|error| {
            warn!(shard_id = %frame.shard_id, %error, "rejected series stream");
            error
        })?;
        debug!(
            shard_id = %series.shard_id,
            samples = series.total,
            timestamp_buffers = series.timestamps.len(),
            value_buffers = series.values.len(),
            "restored series"
        );
        Ok((remaining_input, series))
    }

    pub(crate) fn from_frame(frame: &SeriesFrame) -> Result<Self> {
        let config = BufferConfig::new(
            frame.timestamp_buffer_capacity,
            frame.value_buffer_capacity,
        );
        config
            .validate()
            .map_err(|error| TsBufError::Corrupted(error.to_string()))?;

        let mut timestamps = frame
            .timestamps
            .iter()
            .map(|frame| TimeDiffBuffer::from_frame(frame, config.timestamp_buffer_capacity))
            .collect::<Result<Vec<_>>>()?;
        let mut values = frame
            .values
            .iter()
            .map(|frame| XorBuffer::from_frame(frame, config.value_buffer_capacity))
            .collect::<Result<Vec<_>>>()?;

        let timestamp_count: usize = timestamps.iter().map(TimeDiffBuffer::len).sum();
        let value_count: usize = values.iter().map(XorBuffer::len).sum();
        if timestamp_count != frame.total || value_count != frame.total {
            return Err(TsBufError::Corrupted(format!(
                "series of {} samples holds {} timestamps and {} values",
                frame.total, timestamp_count, value_count
            )));
        }

        if timestamps.is_empty() {
            timestamps.push(TimeDiffBuffer::with_capacity(
                config.timestamp_buffer_capacity,
            ));
        }
        if values.is_empty() {
            values.push(XorBuffer::with_capacity(config.value_buffer_capacity));
        }

        Ok(Self {
            shard_id: frame.shard_id.to_string(),
            total: frame.total,
            timestamps,
            values,
            config,
        })
    }
}

/// A frozen view of every buffer of a [`TimeSeries`].
#[derive(Debug)]
pub struct SeriesSnapshot {
    pub(crate) shard_id: String,
    pub(crate) total: usize,
    pub(crate) timestamp_buffer_capacity: usize,
    pub(crate) value_buffer_capacity: usize,
    pub(crate) timestamps: SmallVec<TimeDiffSnapshot, 2>,
    pub(crate) values: SmallVec<XorSnapshot, 2>,
}

impl SeriesSnapshot {
    pub fn shard_id(&self) -> &str {
        &self.shard_id
    }

    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn timestamps(&self) -> &[TimeDiffSnapshot] {
        &self.timestamps
    }

    pub fn values(&self) -> &[XorSnapshot] {
        &self.values
    }

    /// Decodes the samples as `(time, value)` pairs.
    pub fn into_decoder(self) -> Result<BatchMergeDecoder> {
        BatchMergeDecoder::new(self.timestamps, self.values)
    }
}

#[derive(Debug)]
pub(crate) struct SeriesFrame<'a> {
    pub shard_id: &'a str,
    pub total: usize,
    pub timestamp_buffer_capacity: usize,
    pub timestamps: Vec<TimeDiffFrame<'a>>,
    pub value_buffer_capacity: usize,
    pub values: Vec<XorFrame<'a>>,
}

fn read_time_diff_frames(input: &[u8]) -> IResult<&[u8], (usize, Vec<TimeDiffFrame>)> {
    let (remaining_input, (len, capacity)) = tuple((read_count, read_count))(input)?;
    let (remaining_input, frames) = many_m_n(len, len, read_time_diff_frame)(remaining_input)?;
    Ok((remaining_input, (capacity, frames)))
}

fn read_xor_frames(input: &[u8]) -> IResult<&[u8], (usize, Vec<XorFrame>)> {
    let (remaining_input, (len, capacity)) = tuple((read_count, read_count))(input)?;
    let (remaining_input, frames) = many_m_n(len, len, read_xor_frame)(remaining_input)?;
    Ok((remaining_input, (capacity, frames)))
}

pub(crate) fn read_series_frame(input: &[u8]) -> IResult<&[u8], SeriesFrame> {
    let (
        remaining_input,
        (
            _,
            shard_id,
            total,
            (timestamp_buffer_capacity, timestamps),
            (value_buffer_capacity, values),
            _,
        ),
    ) = tuple((
        read_magic(TIME_SERIES_MAGIC),
        read_string,
        read_count,
        read_time_diff_frames,
        read_xor_frames,
        read_magic(TIME_SERIES_MAGIC_END),
    ))(input)?;

    Ok((
        remaining_input,
        SeriesFrame {
            shard_id,
            total,
            timestamp_buffer_capacity,
            timestamps,
            value_buffer_capacity,
            values,
        },
    ))
}
