use strata_common::{Result, error::Error};

/// Validates a buffer by comparing its computed checksum with the provided checksum.
///
/// # Arguments
///
/// * `buf` - A byte slice representing the buffer to be validated.
/// * `checksum` - The expected checksum.
/// * `name` - Name of the element being validated, used for error reporting.
///
/// # Errors
///
/// Returns `ChecksumMismatch` if the computed checksum does not match the provided one.
pub fn validate_buffer(buf: &[u8], checksum: u32, name: &str) -> Result<()> {
    if compute(buf) == checksum {
        Ok(())
    } else {
        Err(Error::checksum_mismatch(name))
    }
}

/// Computes a checksum for a given buffer using the xxHash algorithm.
pub fn compute(buf: &[u8]) -> u32 {
    let h = xxhash_rust::xxh3::xxh3_64(buf);
    (h as u32) ^ ((h >> 32) as u32)
}
