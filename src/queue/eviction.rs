//! What happens to a frame when the queue drops it from its slot.
//!
//! The queue decides *when* a frame leaves the buffer; the eviction strategy
//! decides what becomes of it. Plain discarding just drops the handle.
//! Recycling hands the pixel buffer back to a [`RecycleBin`] so the decoder can
//! assemble the next frame without a fresh allocation.
//!
//! A frame can only be recycled if the queue holds the last handle to it. The
//! display side may still be drawing an evicted frame; in that case the handle
//! is simply dropped and the buffer is freed once the display lets go.

use crate::frame::Frame;
use anim_pool::RecycleBin;
use tracing::trace;

/// Eviction behaviour, selected once when the queue is built.
#[derive(Debug, Clone, Default)]
pub enum EvictionStrategy {
    /// Drop evicted frames.
    #[default]
    Discard,
    /// Return evicted pixel buffers to the bin when no other handle exists.
    Recycle(RecycleBin),
}

impl EvictionStrategy {
    /// Recycling strategy with a bin retaining at most `max_retained` buffers.
    #[must_use]
    pub fn recycling(max_retained: usize) -> Self {
        Self::Recycle(RecycleBin::new(max_retained))
    }

    /// The bin decoders should draw from, if this strategy recycles.
    #[must_use]
    pub fn recycle_bin(&self) -> Option<&RecycleBin> {
        match self {
            Self::Discard => None,
            Self::Recycle(bin) => Some(bin),
        }
    }

    /// Dispose of a frame that left the buffer.
    pub(crate) fn evict(&self, frame: Frame) {
        let Self::Recycle(bin) = self else {
            return;
        };

        let index = frame.index();
        match frame.try_reclaim() {
            Ok(pixels) => {
                bin.recycle(pixels);
            }
            Err(still_displayed) => {
                trace!(
                    index,
                    handles = still_displayed.handle_count(),
                    "Evicted frame still referenced, not recycling"
                );
            }
        }
    }
}
