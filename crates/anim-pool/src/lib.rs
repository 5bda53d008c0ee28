//! Lock-free recycle bin for animation frame buffers.
//!
//! When an animation is too long to keep fully resident, already displayed
//! frames get evicted from the frame buffer and later regenerated by a fresh
//! decoder. Instead of freeing the pixel storage of an evicted frame and
//! allocating a new one a moment later, the frame queue can hand the backing
//! `Vec<u8>` to a [`RecycleBin`], and the decoder draws from the bin when it
//! assembles the next frame.
//!
//! # Memory Flow
//!
//! ```text
//! 1. Decoder allocates (or reuses) a pixel buffer and fills it
//! 2. Buffer is frozen into a frame and inserted into the frame queue
//! 3. Display advances past the frame; the queue evicts it
//! 4. If no display reference is left, the buffer goes to the bin
//! 5. Decoder calls take() for its next frame and reuses the allocation
//! ```
//!
//! The bin is bounded: once `max_retained` buffers are waiting, further
//! buffers are simply dropped so that an idle decoder cannot cause the bin
//! to hoard memory.
//!
//! # Example
//!
//! ```
//! use anim_pool::RecycleBin;
//!
//! let bin = RecycleBin::new(4);
//! assert!(bin.recycle(vec![7u8; 64]));
//!
//! let buffer = bin.take_or_alloc(64);
//! assert_eq!(buffer.len(), 64);
//! assert_eq!(bin.total_reused(), 1);
//! ```

use crossbeam_queue::SegQueue;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Shared state behind every [`RecycleBin`] handle.
struct RecycleBinInner {
    /// Lock-free queue of buffers waiting for reuse
    free_buffers: SegQueue<Vec<u8>>,
    /// Upper bound on buffers kept in `free_buffers`
    max_retained: usize,
    /// Number of buffers currently waiting
    retained: AtomicUsize,
    /// Metrics: buffers accepted by `recycle()`
    total_recycled: AtomicU64,
    /// Metrics: buffers handed back out by `take()`
    total_reused: AtomicU64,
    /// Metrics: buffers rejected because the bin was full
    total_dropped: AtomicU64,
}

/// Bounded, thread-safe bin of reusable pixel buffers.
///
/// Cloning is cheap (an `Arc` increment); all clones share the same storage,
/// which is how the frame queue (producer of evicted buffers) and the decoder
/// (consumer) talk to each other without sharing a lock.
#[derive(Clone)]
pub struct RecycleBin {
    inner: Arc<RecycleBinInner>,
}

impl RecycleBin {
    /// Create an empty bin that retains at most `max_retained` buffers.
    ///
    /// # Panics
    ///
    /// Panics if `max_retained` is 0.
    #[must_use]
    pub fn new(max_retained: usize) -> Self {
        assert!(max_retained > 0, "max_retained must be > 0");

        Self {
            inner: Arc::new(RecycleBinInner {
                free_buffers: SegQueue::new(),
                max_retained,
                retained: AtomicUsize::new(0),
                total_recycled: AtomicU64::new(0),
                total_reused: AtomicU64::new(0),
                total_dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Offer a buffer for reuse.
    ///
    /// Returns `false` (and drops the buffer) when the bin is already full.
    pub fn recycle(&self, buffer: Vec<u8>) -> bool {
        let previous = self.inner.retained.fetch_add(1, Ordering::AcqRel);
        if previous >= self.inner.max_retained {
            self.inner.retained.fetch_sub(1, Ordering::AcqRel);
            self.inner.total_dropped.fetch_add(1, Ordering::Relaxed);
            trace!(
                capacity = buffer.capacity(),
                max_retained = self.inner.max_retained,
                "Recycle bin full, dropping buffer"
            );
            return false;
        }

        self.inner.free_buffers.push(buffer);
        self.inner.total_recycled.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Take a waiting buffer, if any.
    ///
    /// The returned buffer keeps whatever length and contents it had when it
    /// was recycled; callers resize it to their needs.
    #[must_use]
    pub fn take(&self) -> Option<Vec<u8>> {
        let buffer = self.inner.free_buffers.pop()?;
        self.inner.retained.fetch_sub(1, Ordering::AcqRel);
        self.inner.total_reused.fetch_add(1, Ordering::Relaxed);
        Some(buffer)
    }

    /// Take a waiting buffer resized to exactly `len` bytes, or allocate a
    /// zeroed one if the bin is empty.
    ///
    /// A reused buffer whose length already equals `len` is returned without
    /// touching its contents; the caller is expected to overwrite every byte.
    #[must_use]
    pub fn take_or_alloc(&self, len: usize) -> Vec<u8> {
        match self.take() {
            Some(mut buffer) => {
                buffer.resize(len, 0);
                buffer
            }
            None => vec![0u8; len],
        }
    }

    /// Number of buffers currently waiting for reuse.
    #[must_use]
    pub fn retained(&self) -> usize {
        self.inner.retained.load(Ordering::Acquire)
    }

    /// Maximum number of buffers the bin will hold.
    #[must_use]
    pub fn max_retained(&self) -> usize {
        self.inner.max_retained
    }

    /// Total buffers accepted since creation.
    #[must_use]
    pub fn total_recycled(&self) -> u64 {
        self.inner.total_recycled.load(Ordering::Relaxed)
    }

    /// Total buffers handed back out since creation.
    #[must_use]
    pub fn total_reused(&self) -> u64 {
        self.inner.total_reused.load(Ordering::Relaxed)
    }

    /// Total buffers dropped because the bin was full.
    #[must_use]
    pub fn total_dropped(&self) -> u64 {
        self.inner.total_dropped.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for RecycleBin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecycleBin")
            .field("retained", &self.retained())
            .field("max_retained", &self.inner.max_retained)
            .field("total_recycled", &self.total_recycled())
            .field("total_reused", &self.total_reused())
            .field("total_dropped", &self.total_dropped())
            .finish()
    }
}
