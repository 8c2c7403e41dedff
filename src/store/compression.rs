//! Zlib compression for dataset payloads.
//!
//! Compressed payloads carry an 8-byte little-endian uncompressed size in
//! front of the zlib stream. Whether a payload is compressed is recorded in
//! its dataset header, never guessed from the bytes.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::util::{Error, Result};

/// Compress data using zlib at `level` (clamped to 1-9).
pub fn compress(data: &[u8], level: i32) -> Result<Vec<u8>> {
    let level = level.clamp(1, 9) as u32;
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level));
    encoder.write_all(data)?;
    let compressed = encoder.finish()?;

    let mut result = Vec::with_capacity(8 + compressed.len());
    result.extend_from_slice(&(data.len() as u64).to_le_bytes());
    result.extend_from_slice(&compressed);
    Ok(result)
}

/// Decompress data written by [`compress`].
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < 8 {
        return Err(Error::corrupt("compressed payload shorter than its size prefix"));
    }
    let mut size = [0u8; 8];
    size.copy_from_slice(&data[..8]);
    let uncompressed_size = u64::from_le_bytes(size);

    let mut decoder = ZlibDecoder::new(&data[8..]);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| Error::corrupt(format!("zlib stream: {}", e)))?;

    if decompressed.len() as u64 != uncompressed_size {
        return Err(Error::corrupt(format!(
            "decompressed {} bytes, header says {}",
            decompressed.len(),
            uncompressed_size
        )));
    }
    Ok(decompressed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_decompress() {
        let original = b"peak ground acceleration ".repeat(100);
        let compressed = compress(&original, 6).unwrap();
        assert!(compressed.len() < original.len());
        assert_eq!(decompress(&compressed).unwrap(), original);
    }

    #[test]
    fn test_empty_payload() {
        let compressed = compress(&[], 6).unwrap();
        assert_eq!(decompress(&compressed).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_size_prefix_checked() {
        let mut compressed = compress(b"some bytes some bytes", 9).unwrap();
        compressed[0] ^= 0x01;
        assert!(matches!(decompress(&compressed), Err(Error::Corrupt(_))));
        assert!(matches!(decompress(b"abc"), Err(Error::Corrupt(_))));
    }
}
