//! Slot storage for animation frames.
//!
//! [`FrameSlots`] is an ordered, growable sequence of optional frame handles
//! indexed by frame number. During the first decode pass it grows by
//! appending; once the frame count is known it is compacted and its length
//! never changes again. Slots may be emptied (frame discarded) and refilled
//! (frame redecoded) any number of times.
//!
//! The storage keeps a running count of populated slots so the queue can
//! report residency in O(1); everything else is plain `Vec<Option<Frame>>`.

use crate::frame::Frame;

/// Ordered frame slots with residency tracking.
#[derive(Debug, Default)]
pub struct FrameSlots {
    slots: Vec<Option<Frame>>,
    resident: usize,
}

impl FrameSlots {
    /// Create empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of slots (populated or not).
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no slot has ever been created.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Frame at `index`, or `None` if out of range or empty.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Frame> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Whether slot `index` exists and holds a frame.
    #[must_use]
    pub fn is_populated(&self, index: usize) -> bool {
        self.get(index).is_some()
    }

    /// Append a new slot holding `frame`.
    pub fn push(&mut self, frame: Frame) {
        self.slots.push(Some(frame));
        self.resident += 1;
    }

    /// Put `frame` into existing slot `index`, returning what was there.
    ///
    /// Out-of-range indices leave the storage untouched and hand the frame
    /// back as `Err`.
    pub fn replace(&mut self, index: usize, frame: Frame) -> Result<Option<Frame>, Frame> {
        let Some(slot) = self.slots.get_mut(index) else {
            return Err(frame);
        };
        let previous = slot.replace(frame);
        if previous.is_none() {
            self.resident += 1;
        }
        Ok(previous)
    }

    /// Empty slot `index`, returning the frame it held.
    pub fn take(&mut self, index: usize) -> Option<Frame> {
        let frame = self.slots.get_mut(index)?.take()?;
        self.resident -= 1;
        Some(frame)
    }

    /// Release spare capacity once the final length is known.
    pub fn compact(&mut self) {
        self.slots.shrink_to_fit();
    }

    /// Number of populated slots.
    #[must_use]
    pub fn resident_count(&self) -> usize {
        self.resident
    }

    /// Populated slots in index order.
    pub fn iter_resident(&self) -> impl Iterator<Item = (usize, &Frame)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|frame| (index, frame)))
    }

    /// Sum of [`Frame::size_in_bytes`] over populated slots.
    #[must_use]
    pub fn resident_bytes(&self) -> usize {
        self.iter_resident()
            .map(|(_, frame)| frame.size_in_bytes())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{FrameSize, RawFrame};

    fn frame(index: usize) -> Frame {
        RawFrame::new(index, FrameSize::new(1, 1)).finish()
    }

    #[test]
    fn test_push_and_get() {
        let mut slots = FrameSlots::new();
        assert!(slots.is_empty());

        slots.push(frame(0));
        slots.push(frame(1));

        assert_eq!(slots.len(), 2);
        assert_eq!(slots.resident_count(), 2);
        assert_eq!(slots.get(1).map(Frame::index), Some(1));
        assert!(slots.get(2).is_none());
    }

    #[test]
    fn test_take_and_replace_track_residency() {
        let mut slots = FrameSlots::new();
        slots.push(frame(0));
        slots.push(frame(1));

        assert!(slots.take(1).is_some());
        assert!(slots.take(1).is_none());
        assert_eq!(slots.resident_count(), 1);
        assert!(!slots.is_populated(1));
        assert_eq!(slots.len(), 2);

        let previous = slots.replace(1, frame(1)).unwrap();
        assert!(previous.is_none());
        assert_eq!(slots.resident_count(), 2);

        let previous = slots.replace(1, frame(1)).unwrap();
        assert!(previous.is_some());
        assert_eq!(slots.resident_count(), 2);
    }

    #[test]
    fn test_replace_out_of_range() {
        let mut slots = FrameSlots::new();
        let rejected = slots.replace(3, frame(3));
        assert!(rejected.is_err());
        assert!(slots.is_empty());
    }

    #[test]
    fn test_iter_resident_skips_holes() {
        let mut slots = FrameSlots::new();
        for i in 0..4 {
            slots.push(frame(i));
        }
        slots.take(2);

        let indices: Vec<usize> = slots.iter_resident().map(|(i, _)| i).collect();
        assert_eq!(indices, vec![0, 1, 3]);
        assert_eq!(
            slots.resident_bytes(),
            3 * slots.get(0).map(Frame::size_in_bytes).unwrap()
        );
    }
}
