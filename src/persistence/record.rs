//! On-disk record framing.
//!
//! ```text
//! +----------------+------------------+----------------+
//! | length: u32 BE | payload (length) | crc32: u32 BE  |
//! +----------------+------------------+----------------+
//! ```
//!
//! The checksum is CRC-32 (IEEE) over the payload bytes only.

use std::io;

use crc32fast::Hasher;

pub const LENGTH_SIZE: usize = 4;
pub const CRC_SIZE: usize = 4;
/// Bytes a record occupies on top of its payload.
pub const FRAME_OVERHEAD: u64 = (LENGTH_SIZE + CRC_SIZE) as u64;

#[inline]
pub fn checksum(payload: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(payload);
    hasher.finalize()
}

/// Total on-disk size of a record with a payload of `length` bytes.
#[inline]
pub fn record_size(length: u32) -> u64 {
    FRAME_OVERHEAD + u64::from(length)
}

pub fn encode(payload: &[u8]) -> io::Result<Vec<u8>> {
    let length = u32::try_from(payload.len()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("payload of {} bytes exceeds the record size limit", payload.len()),
        )
    })?;

    let mut buf = Vec::with_capacity(payload.len() + LENGTH_SIZE + CRC_SIZE);
    buf.extend_from_slice(&length.to_be_bytes());
    buf.extend_from_slice(payload);
    buf.extend_from_slice(&checksum(payload).to_be_bytes());
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let record = encode(b"abc").unwrap();
        assert_eq!(record.len() as u64, record_size(3));
        assert_eq!(&record[..4], &[0, 0, 0, 3]);
        assert_eq!(&record[4..7], b"abc");
        assert_eq!(&record[7..], &checksum(b"abc").to_be_bytes());
    }

    #[test]
    fn test_checksum_is_crc32_ieee() {
        // standard check value for "123456789"
        assert_eq!(checksum(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn test_empty_payload_is_framed() {
        let record = encode(b"").unwrap();
        assert_eq!(record.len(), 8);
        assert_eq!(&record[..4], &[0, 0, 0, 0]);
    }
}
