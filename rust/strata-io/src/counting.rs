//! A `ReadAt` wrapper that keeps track of the fetch activity against the wrapped object.

use std::{
    ops::Range,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use arrow_buffer::Buffer;

use crate::{ReadAt, StorageProfile};

/// Snapshot of the fetch counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// Number of `read_at` calls.
    pub requests: u64,
    /// Total number of bytes returned by `read_at`.
    pub bytes: u64,
}

#[derive(Default)]
struct Counters {
    requests: AtomicU64,
    bytes: AtomicU64,
}

/// Shared handle to the counters of a `CountingReadAt`, usable after the reader
/// itself has been moved into a `dyn ReadAt`.
#[derive(Clone, Default)]
pub struct FetchTracker(Arc<Counters>);

impl FetchTracker {
    pub fn snapshot(&self) -> FetchStats {
        FetchStats {
            requests: self.0.requests.load(Ordering::Relaxed),
            bytes: self.0.bytes.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.0.requests.store(0, Ordering::Relaxed);
        self.0.bytes.store(0, Ordering::Relaxed);
    }
}

pub struct CountingReadAt<R> {
    inner: R,
    tracker: FetchTracker,
}

impl<R: ReadAt> CountingReadAt<R> {
    pub fn new(inner: R) -> CountingReadAt<R> {
        CountingReadAt {
            inner,
            tracker: FetchTracker::default(),
        }
    }

    pub fn tracker(&self) -> FetchTracker {
        self.tracker.clone()
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: ReadAt> ReadAt for CountingReadAt<R> {
    fn size(&self) -> std::io::Result<u64> {
        self.inner.size()
    }

    fn read_at(&self, range: Range<u64>) -> std::io::Result<Buffer> {
        let buf = self.inner.read_at(range)?;
        let counters = &self.tracker.0;
        counters.requests.fetch_add(1, Ordering::Relaxed);
        counters.bytes.fetch_add(buf.len() as u64, Ordering::Relaxed);
        Ok(buf)
    }

    fn storage_profile(&self) -> StorageProfile {
        self.inner.storage_profile()
    }
}
