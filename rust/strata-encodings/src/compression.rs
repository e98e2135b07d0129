use std::io::{Read, Write};

use strata_common::{Result, error::Error};
use strata_format::Codec;

/// Default zstd level used when writing pages.
pub const ZSTD_LEVEL: i32 = 3;

/// Block codec applied to whole pages.
pub trait BlockCodec: Send + Sync {
    fn codec(&self) -> Codec;

    /// Compresses `bytes`, appending the result to `target`.
    fn compress(&self, bytes: &[u8], target: &mut Vec<u8>) -> Result<()>;

    /// Decompresses `encoded` into a buffer of exactly `uncompressed_size` bytes.
    fn decompress(&self, encoded: &[u8], uncompressed_size: usize) -> Result<Vec<u8>>;
}

pub struct Uncompressed;

impl BlockCodec for Uncompressed {
    fn codec(&self) -> Codec {
        Codec::Uncompressed
    }

    fn compress(&self, bytes: &[u8], target: &mut Vec<u8>) -> Result<()> {
        target.extend_from_slice(bytes);
        Ok(())
    }

    fn decompress(&self, encoded: &[u8], uncompressed_size: usize) -> Result<Vec<u8>> {
        if encoded.len() != uncompressed_size {
            return Err(Error::invalid_format("uncompressed page size mismatch"));
        }
        Ok(encoded.to_vec())
    }
}

pub struct Zstd;

impl BlockCodec for Zstd {
    fn codec(&self) -> Codec {
        Codec::Zstd
    }

    fn compress(&self, bytes: &[u8], target: &mut Vec<u8>) -> Result<()> {
        let mut zstd = zstd::stream::write::Encoder::new(target, ZSTD_LEVEL)
            .map_err(|e| Error::io("Failed to create ZSTD encoder", e))?;
        zstd.write_all(bytes)
            .map_err(|e| Error::io("Failed to write ZSTD compressed data", e))?;
        zstd.finish()
            .map_err(|e| Error::io("Failed to finish ZSTD encoder", e))?;
        Ok(())
    }

    fn decompress(&self, encoded: &[u8], uncompressed_size: usize) -> Result<Vec<u8>> {
        let zstd = zstd::stream::read::Decoder::new(encoded)
            .map_err(|e| Error::io("Failed to create ZSTD decoder", e))?;
        let mut target = Vec::with_capacity(uncompressed_size);
        // One extra byte so that an oversized frame is detected below.
        zstd.take(uncompressed_size as u64 + 1)
            .read_to_end(&mut target)
            .map_err(|e| Error::io("Failed to decompress ZSTD page", e))?;
        if target.len() != uncompressed_size {
            return Err(Error::invalid_format("ZSTD decompressed size mismatch"));
        }
        Ok(target)
    }
}

pub struct Lz4;

impl BlockCodec for Lz4 {
    fn codec(&self) -> Codec {
        Codec::Lz4
    }

    fn compress(&self, bytes: &[u8], target: &mut Vec<u8>) -> Result<()> {
        let max_compressed_size = lz4::block::compress_bound(bytes.len())
            .map_err(|e| Error::io("Failed to compute LZ4 bound", e))?;
        let orig_size = target.len();
        target.resize(orig_size + max_compressed_size, 0);
        let enc_buffer = &mut target[orig_size..];
        let size = lz4::block::compress_to_buffer(
            bytes,
            Some(lz4::block::CompressionMode::FAST(1)),
            false,
            enc_buffer,
        )
        .map_err(|e| Error::io("Failed to compress block with LZ4", e))?;
        target.truncate(orig_size + size);
        Ok(())
    }

    fn decompress(&self, encoded: &[u8], uncompressed_size: usize) -> Result<Vec<u8>> {
        let mut target = vec![0u8; uncompressed_size];
        if uncompressed_size == 0 {
            return Ok(target);
        }
        let expected = i32::try_from(uncompressed_size)
            .map_err(|_| Error::invalid_format("LZ4 page exceeds the block size limit"))?;
        let decompressed_size =
            lz4::block::decompress_to_buffer(encoded, Some(expected), &mut target)
                .map_err(|e| Error::io("Failed to decompress block with LZ4", e))?;
        if decompressed_size != uncompressed_size {
            return Err(Error::invalid_format("LZ4 decompressed size mismatch"));
        }
        Ok(target)
    }
}

/// Returns the block codec implementation for the given codec.
pub fn block_codec(codec: Codec) -> &'static dyn BlockCodec {
    match codec {
        Codec::Uncompressed => &Uncompressed,
        Codec::Lz4 => &Lz4,
        Codec::Zstd => &Zstd,
    }
}

pub fn compress(codec: Codec, bytes: &[u8]) -> Result<Vec<u8>> {
    let mut target = Vec::new();
    block_codec(codec).compress(bytes, &mut target)?;
    Ok(target)
}

pub fn decompress(codec: Codec, encoded: &[u8], uncompressed_size: usize) -> Result<Vec<u8>> {
    block_codec(codec).decompress(encoded, uncompressed_size)
}
