//! Implementations of `ReadAt` for memory buffers.

use std::ops::Range;

use arrow_buffer::Buffer;

use crate::{ReadAt, StorageProfile, verify};

fn memory_profile() -> StorageProfile {
    StorageProfile {
        min_io_size: 1,
        max_io_size: StorageProfile::default().max_io_size,
    }
}

fn clamp_range(range: Range<u64>, len: usize) -> Range<usize> {
    let start = range.start.min(len as u64) as usize;
    let end = range.end.min(len as u64) as usize;
    start..end.max(start)
}

impl ReadAt for Vec<u8> {
    fn size(&self) -> std::io::Result<u64> {
        Ok(self.len() as u64)
    }

    fn read_at(&self, range: Range<u64>) -> std::io::Result<Buffer> {
        verify!(range.end >= range.start);
        let range = clamp_range(range, self.len());
        Ok(Buffer::from_slice_ref(&self[range]))
    }

    fn storage_profile(&self) -> StorageProfile {
        memory_profile()
    }
}

impl ReadAt for Buffer {
    fn size(&self) -> std::io::Result<u64> {
        Ok(self.len() as u64)
    }

    fn read_at(&self, range: Range<u64>) -> std::io::Result<Buffer> {
        verify!(range.end >= range.start);
        let range = clamp_range(range, self.len());
        Ok(self.slice_with_length(range.start, range.len()))
    }

    fn storage_profile(&self) -> StorageProfile {
        memory_profile()
    }
}
