//!
//! Compressed, append-only time series buffers with lock-free snapshots.
//!
//! ## Features
//!
//! - Timestamps compressed with delta of delta encoding, the residuals being
//!   stored as Gorilla variable length integers.
//! - `f32` values compressed by XOR with the previous value ([Gorilla](https://www.vldb.org/pvldb/vol8/p1816-teller.pdf) style).
//! - Fixed capacity buffers. A full buffer is an ordinary result, and a series
//!   rotates to a new buffer by itself.
//! - O(1) snapshots: a single writer keeps appending while any number of
//!   threads decode what was written before their snapshot.
//! - A framed binary format to write and restore buffers, series, and
//!   checksummed checkpoints of many series.
//!
//! ## Example
//!
//! ```rust
//! use rusty_tsbuf::{BufferConfig, TimeSeries};
//!
//! let mut series = TimeSeries::new("cpu.load", BufferConfig::default()).unwrap();
//! for (timestamp, value) in [(1000, 1.0), (1010, 1.0), (1021, 2.0), (1030, 2.0)] {
//!     series.put(timestamp, value).unwrap();
//! }
//!
//! // The snapshot doesn't see later samples
//! let snapshot = series.snapshot();
//! series.put(1040, 3.0).unwrap();
//!
//! let mut decoder = snapshot.into_decoder().unwrap();
//! let mut times = [0i64; 8];
//! let mut values = [0f32; 8];
//! let count = decoder.next_batch(&mut times, &mut values).unwrap();
//! assert_eq!(count, 4);
//! assert_eq!(times[..count], [1000, 1010, 1021, 1030]);
//! assert_eq!(values[..count], [1.0, 1.0, 2.0, 2.0]);
//!
//! // Serialise the series and restore it
//! let mut buffer: Vec<u8> = Vec::new();
//! series.snapshot().write(&mut buffer).unwrap();
//! let (_, restored) = TimeSeries::restore(&buffer).unwrap();
//! assert_eq!(restored.len(), 5);
//! ```

/// Bit level reader and writer.
pub mod bit_cursor;
/// Checkpoint of many series.
pub mod checkpoint;
pub mod config;
mod crc32c;
mod encoder;
mod errors;
/// Magic markers and fixed-width fields of the serialised format.
pub mod framing;
/// Gorilla variable length integers.
pub mod gorilla;
pub mod merge;
/// Segmented series.
pub mod series;
/// Fixed capacity append-only byte store.
pub mod store;
/// Delta of delta timestamp compression.
pub mod timestamps;
/// XOR value compression.
pub mod xor;

// Re-exports
pub use bit_cursor::{BitCursorReader, BitCursorWriter, BitSnapshot};

pub use checkpoint::{read_checkpoint, write_checkpoint, Checkpoint};

pub use config::BufferConfig;

pub use errors::{BufferFull, Result, TsBufError};

pub use gorilla::{GorillaBuffer, GorillaSnapshot};

pub use merge::BatchMergeDecoder;

pub use series::{SeriesSnapshot, TimeSeries};

pub use store::{AppendOnlyStore, StoreView};

pub use timestamps::{TimeDiffBuffer, TimeDiffSnapshot};

pub use xor::{XorBuffer, XorSnapshot};
