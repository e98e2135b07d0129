//! `ReadAt` over a local file.
//!
//! A source file is immutable for the duration of a read session, so its length is
//! captured when the reader is opened. Reads are clamped to that length.

use std::{fs::File, io, ops::Range, path::Path};

use arrow_buffer::Buffer;

use crate::{ReadAt, StorageProfile, verify};

/// Positional reader of a local file.
pub struct FileReader {
    file: File,
    len: u64,
    profile: StorageProfile,
}

impl FileReader {
    /// Profile reported for local files unless overridden with
    /// [`FileReader::with_profile`].
    pub fn local_profile() -> StorageProfile {
        StorageProfile {
            min_io_size: 64 * 1024,
            max_io_size: 16 * 1024 * 1024,
        }
    }

    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<FileReader> {
        FileReader::from_file(File::open(path)?)
    }

    pub fn from_file(file: File) -> io::Result<FileReader> {
        let len = file.metadata()?.len();
        Ok(FileReader {
            file,
            len,
            profile: FileReader::local_profile(),
        })
    }

    /// Overrides the reported storage profile, e.g. for files on network mounts.
    pub fn with_profile(mut self, profile: StorageProfile) -> FileReader {
        self.profile = profile;
        self
    }
}

impl ReadAt for FileReader {
    fn size(&self) -> io::Result<u64> {
        Ok(self.len)
    }

    fn read_at(&self, range: Range<u64>) -> io::Result<Buffer> {
        verify!(range.end >= range.start);
        let start = range.start.min(self.len);
        let end = range.end.min(self.len);
        let len = usize::try_from(end - start)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "read range too large"))?;
        let mut buf = vec![0u8; len];
        read_exact_at(&self.file, start, &mut buf)?;
        Ok(Buffer::from_vec(buf))
    }

    fn storage_profile(&self) -> StorageProfile {
        self.profile.clone()
    }
}

#[cfg(unix)]
fn read_exact_at(file: &File, pos: u64, buf: &mut [u8]) -> io::Result<()> {
    use std::os::unix::fs::FileExt;

    file.read_exact_at(buf, pos)
}

#[cfg(windows)]
fn read_exact_at(file: &File, mut pos: u64, mut buf: &mut [u8]) -> io::Result<()> {
    use std::os::windows::fs::FileExt;

    while !buf.is_empty() {
        let n = file.seek_read(buf, pos)?;
        if n == 0 {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        buf = &mut buf[n..];
        pos += n as u64;
    }
    Ok(())
}
