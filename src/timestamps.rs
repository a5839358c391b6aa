use nom::{number::complete::be_i64, sequence::tuple, IResult};

use crate::{
    errors::{Result, TsBufError},
    framing::{read_count, read_magic, TIME_DIFF_MAGIC, TIME_DIFF_MAGIC_END},
    gorilla::{read_gorilla_frame, GorillaBuffer, GorillaFrame, GorillaSnapshot},
};

/// Compresses a timestamp stream with delta of delta encoding.
///
/// The two first timestamps are kept verbatim. From the third one, only the
/// change of interval is stored, as Gorilla integers in the residual buffer.
///
/// Timestamps don't have to be increasing. But a change of interval that
/// doesn't fit in 32 bits is rejected with [`TsBufError::JitterOutOfRange`].
#[derive(Debug)]
pub struct TimeDiffBuffer {
    pub(crate) total: usize,
    pub(crate) first: i64,
    pub(crate) second: i64,
    pub(crate) previous: i64,
    pub(crate) before_previous: i64,
    pub(crate) residuals: GorillaBuffer,
}

impl TimeDiffBuffer {
    pub fn new(residuals: GorillaBuffer) -> Self {
        Self {
            total: 0,
            first: 0,
            second: 0,
            previous: 0,
            before_previous: 0,
            residuals,
        }
    }

    /// Creates a buffer whose residuals are stored in `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(GorillaBuffer::with_capacity(capacity))
    }

    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// The last timestamp pushed, if any.
    pub fn last(&self) -> Option<i64> {
        (self.total > 0).then_some(self.previous)
    }

    /// The delta of deltas, from the third timestamp onward.
    pub fn residuals(&self) -> &GorillaBuffer {
        &self.residuals
    }

    pub fn snapshot(&self) -> TimeDiffSnapshot {
        TimeDiffSnapshot {
            total: self.total,
            first: self.first,
            second: self.second,
            last: self.previous,
            before_last: self.before_previous,
            previous: self.second,
            before_previous: self.first,
            served: 0,
            residuals: self.residuals.snapshot(),
        }
    }

    /// Restores a buffer written by [`TimeDiffSnapshot::write`]. The residuals
    /// get a new store of `capacity` bytes.
    pub fn restore(input: &[u8], capacity: usize) -> Result<(&[u8], Self)> {
        let (remaining_input, frame) = read_time_diff_frame(input)?;
        Ok((remaining_input, Self::from_frame(&frame, capacity)?))
    }

    pub(crate) fn from_frame(frame: &TimeDiffFrame, capacity: usize) -> Result<Self> {
        let expected_residuals = frame.total.saturating_sub(2);
        if frame.residuals.total != expected_residuals {
            return Err(TsBufError::Corrupted(format!(
                "{} timestamps but {} residuals",
                frame.total, frame.residuals.total
            )));
        }

        let buffer = Self {
            total: frame.total,
            first: frame.first,
            second: frame.second,
            previous: frame.last,
            before_previous: frame.before_last,
            residuals: GorillaBuffer::from_frame(&frame.residuals, capacity)?,
        };

        // The replay must end on the saved state, or the next push would
        // compute its residual from the wrong interval.
        let mut snapshot = buffer.snapshot();
        let mut last = None;
        let mut before_last = 0;
        for timestamp in snapshot.by_ref() {
            if let Some(previous) = last {
                before_last = previous;
            }
            last = Some(timestamp?);
        }
        let consistent = match last {
            None => true,
            Some(last) if frame.total == 1 => last == frame.last,
            Some(last) => last == frame.last && before_last == frame.before_last,
        };
        if !consistent {
            return Err(TsBufError::Corrupted(format!(
                "replay ends on {:?} but the stream saved ({}, {})",
                last, frame.before_last, frame.last
            )));
        }
        Ok(buffer)
    }
}

/// A frozen view of a [`TimeDiffBuffer`], decoding its timestamps in order.
#[derive(Debug)]
pub struct TimeDiffSnapshot {
    total: usize,
    pub(crate) first: i64,
    pub(crate) second: i64,
    pub(crate) last: i64,
    pub(crate) before_last: i64,
    previous: i64,
    before_previous: i64,
    served: usize,
    pub(crate) residuals: GorillaSnapshot,
}

impl TimeDiffSnapshot {
    pub fn total(&self) -> usize {
        self.total
    }

    fn next_timestamp(&mut self) -> Result<i64> {
        let delta_of_delta = self.residuals.next().ok_or_else(|| {
            TsBufError::Corrupted(format!("missing residual for timestamp {}", self.served))
        })??;

        let timestamp = self
            .previous
            .checked_sub(self.before_previous)
            .and_then(|delta| delta.checked_add(delta_of_delta as i64))
            .and_then(|delta| self.previous.checked_add(delta))
            .ok_or_else(|| {
                TsBufError::Corrupted(format!("timestamp {} overflows", self.served))
            })?;

        self.before_previous = self.previous;
        self.previous = timestamp;
        Ok(timestamp)
    }
}

impl Iterator for TimeDiffSnapshot {
    type Item = Result<i64>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.served >= self.total {
            return None;
        }
        let timestamp = match self.served {
            0 => Ok(self.first),
            1 => Ok(self.second),
            _ => self.next_timestamp(),
        };
        self.served = if timestamp.is_ok() {
            self.served + 1
        } else {
            self.total
        };
        Some(timestamp)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.total - self.served;
        (left, Some(left))
    }
}

impl ExactSizeIterator for TimeDiffSnapshot {}

#[derive(Debug)]
pub(crate) struct TimeDiffFrame<'a> {
    pub total: usize,
    pub first: i64,
    pub second: i64,
    pub before_last: i64,
    pub last: i64,
    pub residuals: GorillaFrame<'a>,
}

pub(crate) fn read_time_diff_frame(input: &[u8]) -> IResult<&[u8], TimeDiffFrame> {
    let (remaining_input, (_, total, first, second, before_last, last, residuals, _)) =
        tuple((
            read_magic(TIME_DIFF_MAGIC),
            read_count,
            be_i64,
            be_i64,
            be_i64,
            be_i64,
            read_gorilla_frame,
            read_magic(TIME_DIFF_MAGIC_END),
        ))(input)?;

    Ok((
        remaining_input,
        TimeDiffFrame {
            total,
            first,
            second,
            before_last,
            last,
            residuals,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};

    const T0: i64 = 1_717_000_000_000;

    fn store(series: &[i64], capacity: usize) -> TimeDiffBuffer {
        let mut buffer = TimeDiffBuffer::with_capacity(capacity);
        for timestamp in series {
            buffer.push(*timestamp).unwrap();
        }
        buffer
    }

    fn decode(snapshot: TimeDiffSnapshot) -> Vec<i64> {
        snapshot.collect::<Result<Vec<_>>>().unwrap()
    }

    #[test]
    fn test_short_series() {
        let cases: Vec<Vec<i64>> = vec![
            vec![],
            vec![T0],
            vec![T0, T0],
            vec![T0, T0 + 10],
            vec![T0, T0 + 10, T0 + 20],
            vec![T0, T0 + 10, T0 + 20, T0 + 30],
            vec![T0, T0 + 10, T0 + 20, T0 + i32::MAX as i64],
            vec![T0, T0 - 10, T0 + 20, T0 + 30],
        ];
        for series in cases {
            let buffer = store(&series, 20);
            assert_eq!(buffer.len(), series.len());
            assert_eq!(decode(buffer.snapshot()), series);
        }
    }

    #[test]
    fn test_constant_interval_residuals() {
        let buffer = store(&[T0, T0 + 10, T0 + 20, T0 + 30], 20);
        let residuals = buffer.residuals().snapshot();
        assert_eq!(residuals.len(), 2);
        assert_eq!(residuals.collect::<Result<Vec<_>>>().unwrap(), vec![0, 0]);
    }

    #[test]
    fn test_random_series() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        let mut timestamp = T0;
        let series: Vec<i64> = (0..2000)
            .map(|_| {
                timestamp += rng.gen_range(-10..30);
                timestamp
            })
            .collect();
        let buffer = store(&series, 2500);
        assert_eq!(decode(buffer.snapshot()), series);
    }

    #[test]
    fn test_snapshot_ignores_later_pushes() {
        let mut buffer = store(&[T0, T0 + 10, T0 + 21], 20);
        let snapshot = buffer.snapshot();
        buffer.push(T0 + 30).unwrap();
        buffer.push(T0 + 45).unwrap();

        assert_eq!(snapshot.len(), 3);
        assert_eq!(decode(snapshot), vec![T0, T0 + 10, T0 + 21]);
        assert_eq!(buffer.snapshot().len(), 5);
    }

    #[test]
    fn test_restore_rejects_inconsistent_state() {
        let buffer = store(&[T0, T0 + 10, T0 + 21, T0 + 30], 20);
        let mut serialised = Vec::new();
        buffer.snapshot().write(&mut serialised).unwrap();
        assert!(TimeDiffBuffer::restore(&serialised, 20).is_ok());

        // Corrupt the low byte of the saved last timestamp
        let last_offset = 4 + TIME_DIFF_MAGIC.len() + 4 + 8 * 3;
        let mut corrupted = serialised.clone();
        corrupted[last_offset + 7] ^= 1;
        assert!(matches!(
            TimeDiffBuffer::restore(&corrupted, 20),
            Err(TsBufError::Corrupted(_))
        ));

        // Claim more timestamps than there are residuals
        let mut corrupted = serialised;
        corrupted[4 + TIME_DIFF_MAGIC.len() + 3] = 5;
        assert!(matches!(
            TimeDiffBuffer::restore(&corrupted, 20),
            Err(TsBufError::Corrupted(_))
        ));
    }
}
