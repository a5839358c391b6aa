//! Decodes the timestamp and value buffers of a series as `(time, value)` pairs.
//!
//! Timestamp and value buffers rotate independently, so the two lists don't
//! have to be split at the same sample. Each list keeps its own cursor.

use smallvec::SmallVec;

use crate::{
    errors::{Result, TsBufError},
    timestamps::TimeDiffSnapshot,
    xor::XorSnapshot,
};

/// Pulls the next item from a list of snapshots, moving to the next snapshot
/// when the current one is exhausted.
fn next_from<S, T>(snapshots: &mut [S], index: &mut usize) -> Option<Result<T>>
where
    S: Iterator<Item = Result<T>>,
{
    while let Some(snapshot) = snapshots.get_mut(*index) {
        if let Some(item) = snapshot.next() {
            return Some(item);
        }
        *index += 1;
    }
    None
}

/// A forward only decoder over the snapshots of one series.
///
/// Every call resumes where the previous one stopped. The first error ends the
/// decoding.
#[derive(Debug)]
pub struct BatchMergeDecoder {
    timestamps: SmallVec<TimeDiffSnapshot, 2>,
    values: SmallVec<XorSnapshot, 2>,
    timestamp_index: usize,
    value_index: usize,
    remaining: usize,
    pending_error: Option<TsBufError>,
}

impl BatchMergeDecoder {
    /// Fails with [`TsBufError::SampleCountMismatch`] if the two lists don't
    /// hold the same number of samples.
    pub fn new(
        timestamps: impl IntoIterator<Item = TimeDiffSnapshot>,
        values: impl IntoIterator<Item = XorSnapshot>,
    ) -> Result<Self> {
        let timestamps: SmallVec<TimeDiffSnapshot, 2> = timestamps.into_iter().collect();
        let values: SmallVec<XorSnapshot, 2> = values.into_iter().collect();

        let timestamp_count: usize = timestamps.iter().map(|snapshot| snapshot.len()).sum();
        let value_count: usize = values.iter().map(|snapshot| snapshot.len()).sum();
        if timestamp_count != value_count {
            return Err(TsBufError::SampleCountMismatch {
                timestamps: timestamp_count,
                values: value_count,
            });
        }

        Ok(Self {
            timestamps,
            values,
            timestamp_index: 0,
            value_index: 0,
            remaining: timestamp_count,
            pending_error: None,
        })
    }

    pub fn has_more(&self) -> bool {
        self.remaining > 0 || self.pending_error.is_some()
    }

    /// Number of samples not decoded yet.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    fn next_sample(&mut self) -> Result<(i64, f32)> {
        let timestamp = next_from(&mut self.timestamps, &mut self.timestamp_index);
        let value = next_from(&mut self.values, &mut self.value_index);
        match (timestamp, value) {
            (Some(timestamp), Some(value)) => Ok((timestamp?, value?)),
            _ => Err(TsBufError::Corrupted(format!(
                "snapshots ended with {} samples left",
                self.remaining
            ))),
        }
    }

    /// Decodes up to `min(times.len(), values.len())` samples into the two
    /// slices, and returns how many were written. Returns 0 once exhausted.
    ///
    /// When decoding fails after some samples of the batch, those samples are
    /// returned and the error comes with the next call.
    pub fn next_batch(&mut self, times: &mut [i64], values: &mut [f32]) -> Result<usize> {
        if let Some(error) = self.pending_error.take() {
            return Err(error);
        }
        let size = times.len().min(values.len()).min(self.remaining);
        for i in 0..size {
            match self.next_sample() {
                Ok((timestamp, value)) => {
                    times[i] = timestamp;
                    values[i] = value;
                    self.remaining -= 1;
                }
                Err(error) => {
                    self.remaining = 0;
                    if i == 0 {
                        return Err(error);
                    }
                    self.pending_error = Some(error);
                    return Ok(i);
                }
            }
        }
        Ok(size)
    }
}

impl Iterator for BatchMergeDecoder {
    type Item = Result<(i64, f32)>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(error) = self.pending_error.take() {
            return Some(Err(error));
        }
        if self.remaining == 0 {
            return None;
        }
        let sample = self.next_sample();
        self.remaining = if sample.is_ok() { self.remaining - 1 } else { 0 };
        Some(sample)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.remaining + usize::from(self.pending_error.is_some());
        (left, Some(left))
    }
}

impl ExactSizeIterator for BatchMergeDecoder {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{timestamps::TimeDiffBuffer, xor::XorBuffer};

    fn timestamp_buffers(segments: &[&[i64]]) -> Vec<TimeDiffBuffer> {
        segments
            .iter()
            .map(|segment| {
                let mut buffer = TimeDiffBuffer::with_capacity(64);
                for timestamp in segment.iter() {
                    buffer.push(*timestamp).unwrap();
                }
                buffer
            })
            .collect()
    }

    fn value_buffers(segments: &[&[f32]]) -> Vec<XorBuffer> {
        segments
            .iter()
            .map(|segment| {
                let mut buffer = XorBuffer::with_capacity(64);
                for value in segment.iter() {
                    buffer.push(*value).unwrap();
                }
                buffer
            })
            .collect()
    }

    fn decoder(timestamps: &[&[i64]], values: &[&[f32]]) -> Result<BatchMergeDecoder> {
        BatchMergeDecoder::new(
            timestamp_buffers(timestamps).iter().map(TimeDiffBuffer::snapshot),
            value_buffers(values).iter().map(XorBuffer::snapshot),
        )
    }

    #[test]
    fn test_different_boundaries() {
        let mut decoder = decoder(
            &[&[10, 20], &[30, 40, 50, 60], &[70]],
            &[&[1.0, 2.0, 3.0, 4.0, 5.0], &[6.0, 7.0]],
        )
        .unwrap();
        assert_eq!(decoder.remaining(), 7);

        let mut times = [0i64; 3];
        let mut values = [0f32; 3];
        assert_eq!(decoder.next_batch(&mut times, &mut values).unwrap(), 3);
        assert_eq!(times, [10, 20, 30]);
        assert_eq!(values, [1.0, 2.0, 3.0]);

        assert_eq!(decoder.next_batch(&mut times, &mut values).unwrap(), 3);
        assert_eq!(times, [40, 50, 60]);
        assert_eq!(values, [4.0, 5.0, 6.0]);
        assert!(decoder.has_more());

        assert_eq!(decoder.next_batch(&mut times, &mut values).unwrap(), 1);
        assert_eq!((times[0], values[0]), (70, 7.0));
        assert!(!decoder.has_more());
        assert_eq!(decoder.next_batch(&mut times, &mut values).unwrap(), 0);
    }

    #[test]
    fn test_uneven_output_slices() {
        let mut decoder = decoder(&[&[1, 2, 3]], &[&[0.5, 0.25, 0.125]]).unwrap();
        let mut times = [0i64; 5];
        let mut values = [0f32; 2];
        assert_eq!(decoder.next_batch(&mut times, &mut values).unwrap(), 2);
        assert_eq!(decoder.remaining(), 1);
    }

    #[test]
    fn test_empty_buffers_are_skipped() {
        let decoder = decoder(&[&[], &[5], &[], &[6]], &[&[1.5, 2.5], &[]]).unwrap();
        let samples = decoder.collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(samples, vec![(5, 1.5), (6, 2.5)]);
    }

    #[test]
    fn test_count_mismatch() {
        let error = decoder(&[&[1, 2, 3]], &[&[1.0, 2.0]]).unwrap_err();
        assert!(matches!(
            error,
            TsBufError::SampleCountMismatch {
                timestamps: 3,
                values: 2
            }
        ));
    }

    #[test]
    fn test_error_after_partial_batch() {
        let timestamps = timestamp_buffers(&[&[1, 2, 3]]);
        let values = value_buffers(&[&[1.0, 2.0]]);
        // Claims one more value than the bits hold
        let short = values[0].snapshot();
        let overcounted = XorSnapshot::new(short.bits.clone(), 3, short.last_value_bits);
        let mut decoder =
            BatchMergeDecoder::new([timestamps[0].snapshot()], [overcounted]).unwrap();

        let mut times = [0i64; 3];
        let mut samples = [0f32; 3];
        assert_eq!(decoder.next_batch(&mut times, &mut samples).unwrap(), 2);
        assert_eq!(&times[..2], &[1, 2]);
        assert_eq!(&samples[..2], &[1.0, 2.0]);

        assert!(decoder.has_more());
        assert!(matches!(
            decoder.next_batch(&mut times, &mut samples),
            Err(TsBufError::Corrupted(_))
        ));
        assert!(!decoder.has_more());
        assert_eq!(decoder.next_batch(&mut times, &mut samples).unwrap(), 0);
    }

    #[test]
    fn test_no_snapshots() {
        let mut decoder = BatchMergeDecoder::new(Vec::new(), Vec::new()).unwrap();
        assert!(!decoder.has_more());
        assert!(decoder.next().is_none());
    }
}
