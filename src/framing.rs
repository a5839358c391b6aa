//! Fixed-width big-endian fields and length-prefixed magic markers.
//!
//! Every serialised buffer is wrapped between two magic markers. A marker is a
//! 32 bits length followed by its ASCII bytes.

use std::io::Write;

use nom::{
    bytes::complete::tag,
    combinator::{map_res, verify},
    multi::length_data,
    number::complete::{be_i32, be_u32},
    IResult,
};

pub const XOR_MAGIC: &str = "XOR";
pub const XOR_MAGIC_END: &str = "XOR_END";
pub const GORILLA_MAGIC: &str = "GorillaBuffer";
pub const GORILLA_MAGIC_END: &str = "GorillaBufferEnd";
pub const TIME_DIFF_MAGIC: &str = "TimeDiff";
pub const TIME_DIFF_MAGIC_END: &str = "TimeDiffEnd";
pub const TIME_SERIES_MAGIC: &str = "TimeSeries";
pub const TIME_SERIES_MAGIC_END: &str = "TimeSeriesEnd";

pub fn write_magic<W: Write>(magic: &str, writer: &mut W) -> std::io::Result<()> {
    write_bytes(magic.as_bytes(), writer)
}

/// Writes a length-prefixed byte string.
pub fn write_bytes<W: Write>(bytes: &[u8], writer: &mut W) -> std::io::Result<()> {
    write_count(bytes.len(), writer)?;
    writer.write_all(bytes)
}

/// Writes a count as a big-endian signed 32 bits integer.
pub fn write_count<W: Write>(count: usize, writer: &mut W) -> std::io::Result<()> {
    let count = i32::try_from(count).map_err(|_| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "count does not fit in 32 bits",
        )
    })?;
    writer.write_all(&count.to_be_bytes())
}

/// Reads a magic marker and fails unless it is exactly `expected`.
pub fn read_magic<'a>(expected: &'static str) -> impl Fn(&'a [u8]) -> IResult<&'a [u8], ()> {
    move |input: &'a [u8]| {
        let (remaining_input, _) =
            verify(be_u32, |len: &u32| *len as usize == expected.len())(input)?;
        let (remaining_input, _) = tag(expected.as_bytes())(remaining_input)?;
        Ok((remaining_input, ()))
    }
}

/// Reads a non-negative big-endian 32 bits count.
pub fn read_count(input: &[u8]) -> IResult<&[u8], usize> {
    map_res(be_i32, usize::try_from)(input)
}

/// Reads a length-prefixed UTF-8 string.
pub fn read_string(input: &[u8]) -> IResult<&[u8], &str> {
    map_res(length_data(read_count), std::str::from_utf8)(input)
}
