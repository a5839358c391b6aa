use thiserror::Error;

/// Returned by every bit-level write that would go past the store capacity.
///
/// Nothing is written when this is returned.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("buffer is full")]
pub struct BufferFull;

#[derive(Error, Debug)]
pub enum TsBufError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("buffer is full")]
    BufferFull,

    #[error("delta of delta {delta_of_delta} does not fit in 32 bits")]
    JitterOutOfRange { delta_of_delta: i128 },

    #[error("negative timestamp: {0}")]
    NegativeTimestamp(i64),

    #[error("corrupted stream: {0}")]
    Corrupted(String),

    #[error("payload of {needed_bits} bits does not fit a {capacity_bytes} bytes buffer")]
    CapacityTooSmall {
        needed_bits: usize,
        capacity_bytes: usize,
    },

    #[error("{timestamps} timestamps but {values} values")]
    SampleCountMismatch { timestamps: usize, values: usize },

    #[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl TsBufError {
    /// Whether the caller should start a new buffer and retry the push there.
    pub fn needs_rotation(&self) -> bool {
        matches!(
            self,
            TsBufError::BufferFull | TsBufError::JitterOutOfRange { .. }
        )
    }
}

impl From<BufferFull> for TsBufError {
    fn from(_: BufferFull) -> Self {
        TsBufError::BufferFull
    }
}

impl From<nom::Err<nom::error::Error<&[u8]>>> for TsBufError {
    fn from(err: nom::Err<nom::error::Error<&[u8]>>) -> Self {
        match err {
            nom::Err::Incomplete(needed) => {
                TsBufError::Corrupted(format!("truncated stream: {:?}", needed))
            }
            nom::Err::Error(e) | nom::Err::Failure(e) => TsBufError::Corrupted(format!(
                "Nom error: {:?} with {} bytes left",
                e.code,
                e.input.len()
            )),
        }
    }
}

pub type Result<T> = std::result::Result<T, TsBufError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_hint() {
        assert!(TsBufError::BufferFull.needs_rotation());
        assert!(TsBufError::JitterOutOfRange { delta_of_delta: 1 << 40 }.needs_rotation());
        assert!(!TsBufError::NegativeTimestamp(-1).needs_rotation());
        assert!(!TsBufError::Corrupted("nope".into()).needs_rotation());
    }

    #[test]
    fn test_nom_error_conversion() {
        let input: &[u8] = b"abc";
        let err: TsBufError =
            nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)).into();
        assert!(matches!(err, TsBufError::Corrupted(_)));
        assert!(err.to_string().contains("Tag"));

        let err: TsBufError = nom::Err::<nom::error::Error<&[u8]>>::Incomplete(
            nom::Needed::new(4),
        )
        .into();
        assert!(err.to_string().contains("truncated"));
    }
}
