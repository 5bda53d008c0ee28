//! Memory accounting for resident frames.
//!
//! A [`FrameMemoryReport`] is a snapshot of which frames a provider currently
//! holds and how many heap bytes each one owns. It is taken under the frames
//! lock alone, so memory reporters never wait on a running decode.

use crate::buffer::FrameSlots;
use serde::Serialize;

/// One resident frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameMemoryEntry {
    /// Frame index
    pub index: usize,
    /// Heap bytes owned by the frame
    pub bytes: usize,
}

/// Snapshot of resident frames.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FrameMemoryReport {
    /// Resident frames in index order
    pub entries: Vec<FrameMemoryEntry>,
    /// Total slots, resident or not
    pub slot_count: usize,
    /// Pixel buffers parked in the recycle bin
    pub recycled_buffers: usize,
}

impl FrameMemoryReport {
    /// Build a report from slot storage.
    #[must_use]
    pub fn from_slots(slots: &FrameSlots) -> Self {
        Self {
            entries: slots
                .iter_resident()
                .map(|(index, frame)| FrameMemoryEntry {
                    index,
                    bytes: frame.size_in_bytes(),
                })
                .collect(),
            slot_count: slots.len(),
            recycled_buffers: 0,
        }
    }

    /// Attach the recycle bin occupancy.
    #[must_use]
    pub fn with_recycled_buffers(mut self, recycled_buffers: usize) -> Self {
        self.recycled_buffers = recycled_buffers;
        self
    }

    /// Number of resident frames.
    #[must_use]
    pub fn resident_frames(&self) -> usize {
        self.entries.len()
    }

    /// Sum of per-frame bytes.
    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.entries.iter().map(|entry| entry.bytes).sum()
    }
}
