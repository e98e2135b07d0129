//! Footer encoding and decoding.
//!
//! ```text
//! [MAGIC] ... [metadata] [metadata_len: u64 LE] [metadata_checksum: u32 LE] [MAGIC]
//! ```
//!
//! The metadata is encoded with bincode using fixed-length integers.

use strata_common::{Result, error::Error, verify_data};
use strata_io::ReadAt;

use crate::{checksum, metadata::FileMetadata};

pub const MAGIC: [u8; 4] = *b"STRT";

/// Size of the fixed trailer following the metadata: length, checksum and magic.
pub const TRAILER_SIZE: usize = 8 + 4 + MAGIC.len();

/// Smallest possible valid file: header magic plus an empty metadata trailer.
pub const MIN_FILE_SIZE: u64 = (MAGIC.len() + TRAILER_SIZE) as u64;

/// Preferred number of bytes fetched from the end of the file on the first footer
/// read, enough to hold the metadata of most files. Clamped to the storage profile
/// of the reader.
pub const PRECACHED_SUFFIX_SIZE: u64 = 64 * 1024;

fn binc_config() -> impl bincode::config::Config {
    bincode::config::standard().with_fixed_int_encoding()
}

/// Encodes the metadata together with the trailer. The caller places the returned
/// bytes right after the last page.
pub fn encode_footer(metadata: &FileMetadata) -> Result<Vec<u8>> {
    let mut buf = bincode::encode_to_vec(metadata, binc_config())
        .map_err(|e| Error::serialization("file metadata", e))?;
    let len = buf.len() as u64;
    let checksum = checksum::compute(&buf);
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(&checksum.to_le_bytes());
    buf.extend_from_slice(&MAGIC);
    Ok(buf)
}

/// Decodes and verifies the metadata of a Strata file.
pub fn read_metadata(reader: &dyn ReadAt) -> Result<FileMetadata> {
    let size = reader.size().map_err(|e| Error::io("file size", e))?;
    verify_data!(file_size, size >= MIN_FILE_SIZE);

    let suffix_len = (reader
        .storage_profile()
        .clamp_io_size(PRECACHED_SUFFIX_SIZE as usize) as u64)
        .max(TRAILER_SIZE as u64);
    let suffix_start = size.saturating_sub(suffix_len);
    let suffix = reader
        .read_at(suffix_start..size)
        .map_err(|e| Error::io("footer", e))?;
    verify_data!(footer, suffix.len() as u64 == size - suffix_start);

    let trailer = &suffix[suffix.len() - TRAILER_SIZE..];
    verify_data!(magic, trailer[12..] == MAGIC);
    let metadata_len = u64::from_le_bytes(le_array(&trailer[..8]));
    let metadata_checksum = u32::from_le_bytes(le_array(&trailer[8..12]));
    verify_data!(metadata_len, metadata_len <= size - MIN_FILE_SIZE);

    let metadata_end = size - TRAILER_SIZE as u64;
    let metadata_start = metadata_end - metadata_len;
    let metadata_bytes = if metadata_start >= suffix_start {
        let start = (metadata_start - suffix_start) as usize;
        suffix.slice_with_length(start, metadata_len as usize)
    } else {
        log::debug!(
            "metadata of {metadata_len} bytes exceeds the precached suffix, fetching separately"
        );
        reader
            .read_at(metadata_start..metadata_end)
            .map_err(|e| Error::io("file metadata", e))?
    };
    verify_data!(metadata, metadata_bytes.len() as u64 == metadata_len);
    checksum::validate_buffer(&metadata_bytes, metadata_checksum, "file metadata")?;

    let header = if suffix_start == 0 {
        suffix.slice_with_length(0, MAGIC.len())
    } else {
        reader
            .read_at(0..MAGIC.len() as u64)
            .map_err(|e| Error::io("file header", e))?
    };
    verify_data!(magic, header.as_slice() == MAGIC);

    let (metadata, _): (FileMetadata, usize) =
        bincode::decode_from_slice(&metadata_bytes, binc_config())
            .map_err(|e| Error::serialization("file metadata", e))?;
    metadata.verify(MAGIC.len() as u64..metadata_start)?;
    Ok(metadata)
}

fn le_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut array = [0u8; N];
    array.copy_from_slice(&bytes[..N]);
    array
}
