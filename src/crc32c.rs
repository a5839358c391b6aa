use nom::{number::complete::be_u32, IResult};

use crate::errors::{Result, TsBufError};

/// Size of the checksum trailer.
pub const CRC32C_LEN: usize = 4;

/// Reads a big-endian CRC32 Castagnoli checksum.
pub fn read_crc32c(input: &[u8]) -> IResult<&[u8], u32> {
    be_u32(input)
}

#[inline]
pub fn compute_crc32c(input: &[u8]) -> u32 {
    ::crc32c::crc32c(input)
}

pub fn write_crc32c<W: std::io::Write>(input: &[u8], writer: &mut W) -> std::io::Result<()> {
    let crc32c = compute_crc32c(input);
    writer.write_all(&crc32c.to_be_bytes())?;
    Ok(())
}

/// Splits `input` into its data and checksum trailer, and checks the data.
pub fn split_checked_crc32c(input: &[u8]) -> Result<&[u8]> {
    if input.len() < CRC32C_LEN {
        return Err(TsBufError::Corrupted(format!(
            "{} bytes is too short for a checksum",
            input.len()
        )));
    }
    let (data, trailer) = input.split_at(input.len() - CRC32C_LEN);
    let (_, expected) = read_crc32c(trailer)?;
    let actual = compute_crc32c(data);
    if expected != actual {
        return Err(TsBufError::ChecksumMismatch { expected, actual });
    }
    Ok(data)
}
