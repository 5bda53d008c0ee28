//! Retain-or-discard policy for decoded animation frames.
//!
//! [`AnimationFrameQueue`] sits between a decoder (producer) and the display
//! loop (consumer). It tracks two cursors over a [`FrameSlots`] buffer plus a
//! count of frames owed by the decoder, and answers two questions:
//!
//! - After an insert: should the decoder keep going?
//! - After an advance or reset: does a new decode run need to be scheduled?
//!
//! # Modes
//!
//! ```text
//!            mark_complete(), len <= threshold
//!  Filling ─────────────────────────────────────▶ Retained   (keeps every frame)
//!     │
//!     └──────────────────────────────────────────▶ Discarding (keeps a window)
//!            mark_complete(), len >  threshold
//! ```
//!
//! The decision is made from the final frame count and never revisited. In
//! discarding mode only frame 0, the previous frame, the displayed frame and
//! the decoder's look-ahead window stay resident; everything else is evicted
//! and regenerated by a fresh decoder on the next loop.
//!
//! # Sizing
//!
//! The decoder is asked for `batch` frames at a time and never has more than
//! `2 * batch` outstanding. The threshold is raised to at least
//! `2 * batch + 2` so that frames being redecoded can never land on the two
//! slots (current and previous) the display still needs.
//!
//! # Threading
//!
//! The queue itself is not synchronized. The provider keeps it behind its
//! frames lock; `insert`/`mark_complete` come from the decode worker and
//! `advance`/`reset`/`get` from the display side.

pub mod eviction;

pub use eviction::EvictionStrategy;

use crate::buffer::FrameSlots;
use crate::frame::Frame;
use anim_pool::RecycleBin;
use tracing::{debug, trace};

/// Largest accepted batch size. Keeps `2 * batch + 2` from overflowing.
pub const MAX_BATCH: usize = usize::MAX / 4;

/// Lifecycle state of the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueMode {
    /// First pass, total frame count not yet known.
    Filling,
    /// Complete and small enough to keep every frame.
    Retained,
    /// Complete and over the threshold; displayed frames are evicted.
    Discarding,
}

/// Sizing limits fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueLimits {
    /// Frame count above which frames are discarded after display.
    pub threshold: usize,
    /// Frames requested from the decoder per burst.
    pub batch: usize,
}

impl QueueLimits {
    /// Clamp raw limits into their usable range.
    ///
    /// `batch` is clamped to `[1, MAX_BATCH]` and `threshold` raised to at
    /// least `2 * batch + 2`.
    #[must_use]
    pub fn clamped(threshold: usize, batch: usize) -> Self {
        let batch = batch.clamp(1, MAX_BATCH);
        let threshold = threshold.max(2 * batch + 2);
        Self { threshold, batch }
    }
}

/// Cursor and counter bookkeeping shared by every eviction strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Cursors {
    /// Next slot the decoder will fill.
    insert: usize,
    /// Slot currently handed to the display.
    displayed: usize,
    /// Frames requested from the decoder but not yet inserted.
    pending: usize,
    /// The first pass finished; slot count is frozen.
    size_known: bool,
}

/// Frame buffer with decoder flow control and a retain/discard policy.
#[derive(Debug)]
pub struct AnimationFrameQueue {
    limits: QueueLimits,
    cursors: Cursors,
    frames: FrameSlots,
    strategy: EvictionStrategy,
    eager_first_pass_discard: bool,
}

impl AnimationFrameQueue {
    /// Create a queue with clamped limits and the plain discard strategy.
    ///
    /// The decoder starts out owing `2 * batch` frames.
    #[must_use]
    pub fn new(threshold: usize, batch: usize) -> Self {
        let limits = QueueLimits::clamped(threshold, batch);
        let queue = Self {
            limits,
            cursors: Cursors {
                pending: 2 * limits.batch,
                ..Cursors::default()
            },
            frames: FrameSlots::new(),
            strategy: EvictionStrategy::Discard,
            eager_first_pass_discard: true,
        };

        debug!(
            requested_threshold = threshold,
            requested_batch = batch,
            threshold = limits.threshold,
            batch = limits.batch,
            "Frame queue initialized"
        );
        queue
    }

    /// Use `strategy` for evicted frames.
    #[must_use]
    pub fn with_strategy(mut self, strategy: EvictionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Enable or disable discarding already displayed frames at the moment
    /// the first pass crosses the threshold. When disabled, all eviction
    /// happens in [`advance`](Self::advance).
    #[must_use]
    pub fn with_eager_first_pass_discard(mut self, enabled: bool) -> Self {
        self.eager_first_pass_discard = enabled;
        self
    }

    // =========================================================================
    // Decoder side
    // =========================================================================

    /// Store a frame the decoder was asked for.
    ///
    /// Returns whether the decoder still owes frames and should keep going.
    /// A frame for slot 0 is dropped when slot 0 is already filled: frame 0 is
    /// never evicted, so later passes do not replace it.
    pub fn insert(&mut self, frame: Frame) -> bool {
        debug_assert!(self.cursors.pending > 0, "insert without a pending request");

        let index = self.cursors.insert;
        if self.cursors.size_known {
            debug_assert!(self.may_discard(), "redecoding a retained animation");
            debug_assert!(index < self.frames.len(), "insert past the final frame");
            self.store(index, frame);
        } else {
            if index >= self.frames.len() {
                self.frames.push(frame);
            } else {
                self.store(index, frame);
            }

            if self.eager_first_pass_discard
                && self.frames.len() - 1 == self.limits.threshold
                && self.cursors.displayed > 1
            {
                self.discard_displayed_prefix();
            }
        }

        self.cursors.insert += 1;
        self.cursors.pending = self.cursors.pending.saturating_sub(1);
        trace!(
            index,
            pending = self.cursors.pending,
            len = self.frames.len(),
            "Inserted frame"
        );
        self.cursors.pending > 0
    }

    /// Record that the decoder reached the last frame.
    ///
    /// The next inserted frame belongs to slot 0 again. On the first call the
    /// slot count is frozen; if every frame fits under the threshold the
    /// decoder is released for good. Returns whether it still owes frames.
    pub fn mark_complete(&mut self) -> bool {
        debug_assert!(
            self.cursors.insert == self.frames.len(),
            "completion before the last slot was filled"
        );
        self.cursors.insert = 0;

        if !self.cursors.size_known {
            self.cursors.size_known = true;
            self.frames.compact();

            if !self.may_discard() {
                self.cursors.pending = 0;
            }

            debug!(
                frames = self.frames.len(),
                mode = ?self.mode(),
                pending = self.cursors.pending,
                "First pass complete"
            );
        }

        self.cursors.pending > 0
    }

    // =========================================================================
    // Display side
    // =========================================================================

    /// Frame at `index`, if currently resident.
    ///
    /// `None` means "not available yet": the slot is out of range, was
    /// discarded, or the decoder has not caught up.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Frame> {
        self.frames.get(index).cloned()
    }

    /// Move the display cursor one frame forward.
    ///
    /// The cursor only moves onto a populated slot, and only wraps to 0 once
    /// the frame count is known. Returns whether a new decode run must be
    /// scheduled because the look-ahead dropped below one batch and no run
    /// was already owed frames.
    pub fn advance(&mut self) -> bool {
        if self.frames.is_empty() {
            debug_assert!(false, "advance on an empty frame queue");
            return false;
        }

        let len = self.frames.len();
        let proposed = self.cursors.displayed + 1;
        if proposed == len {
            if self.cursors.size_known {
                self.cursors.displayed = 0;
            }
        } else if self.frames.is_populated(proposed) {
            self.cursors.displayed = proposed;
        }

        let displayed = self.cursors.displayed;
        if self.may_discard() {
            if displayed > 2 {
                self.evict(displayed - 2);
            } else if displayed == 0 {
                debug_assert!(len > 2);
                self.evict(len - 2);
                self.evict(len - 1);
            }
        }

        if self.cursors.size_known && !self.may_discard() {
            return false;
        }

        let buffered = self.buffered_ahead();
        if buffered < self.limits.batch {
            self.cursors.pending += self.limits.batch;
            let restart = self.cursors.pending == self.limits.batch;
            debug!(
                displayed,
                buffered,
                pending = self.cursors.pending,
                restart,
                "Requested another batch"
            );
            return restart;
        }

        false
    }

    /// Call [`advance`](Self::advance) up to `steps` times.
    ///
    /// Returns whether any step asked for a decoder restart.
    pub fn advance_by(&mut self, steps: usize) -> bool {
        let mut restart = false;
        for _ in 0..steps {
            restart |= self.advance();
        }
        restart
    }

    /// Rewind the display to frame 0.
    ///
    /// With `advance_only` the caller guarantees nothing was discarded, so
    /// only the display cursor moves (and an oversized outstanding request is
    /// cut down to one frame). Otherwise every frame but frame 0 is evicted
    /// and decoding starts over with a fresh `2 * batch` request. Returns
    /// whether a new decode run must be scheduled.
    pub fn reset(&mut self, advance_only: bool) -> bool {
        self.cursors.displayed = 0;

        if advance_only {
            debug_assert!(!self.may_discard(), "cheap reset on a discarding queue");

            let cursors = &mut self.cursors;
            if cursors.pending > 1 && cursors.insert > 2 * self.limits.batch {
                debug_assert!(!cursors.size_known);
                cursors.pending = 1;
            }
            return false;
        }

        debug_assert!(self.may_discard(), "full reset on a retained queue");
        let restart = self.cursors.pending == 0;
        self.cursors.insert = 0;
        self.cursors.pending = 2 * self.limits.batch;

        for index in 1..self.frames.len() {
            self.evict(index);
        }

        debug!(
            pending = self.cursors.pending,
            restart, "Discarded all frames after frame 0"
        );
        restart
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Whether more frames exist than the threshold allows keeping.
    #[must_use]
    pub fn may_discard(&self) -> bool {
        self.frames.len() > self.limits.threshold
    }

    /// Whether the first pass finished and the frame count is known.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.cursors.size_known
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn mode(&self) -> QueueMode {
        match (self.cursors.size_known, self.may_discard()) {
            (false, _) => QueueMode::Filling,
            (true, false) => QueueMode::Retained,
            (true, true) => QueueMode::Discarding,
        }
    }

    /// Index of the frame currently displayed.
    #[must_use]
    pub fn displayed(&self) -> usize {
        self.cursors.displayed
    }

    /// Frames the decoder owes.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.cursors.pending
    }

    /// Next slot the decoder fills.
    #[must_use]
    pub fn insert_index(&self) -> usize {
        self.cursors.insert
    }

    /// Clamped batch size.
    #[must_use]
    pub fn batch(&self) -> usize {
        self.limits.batch
    }

    /// Clamped threshold.
    #[must_use]
    pub fn threshold(&self) -> usize {
        self.limits.threshold
    }

    /// Both limits.
    #[must_use]
    pub fn limits(&self) -> QueueLimits {
        self.limits
    }

    /// Number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether no frame was ever inserted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Number of frames currently held.
    #[must_use]
    pub fn resident_count(&self) -> usize {
        self.frames.resident_count()
    }

    /// Underlying slot storage.
    #[must_use]
    pub fn frames(&self) -> &FrameSlots {
        &self.frames
    }

    /// Bin evicted buffers go to, when recycling.
    #[must_use]
    pub fn recycle_bin(&self) -> Option<&RecycleBin> {
        self.strategy.recycle_bin()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn store(&mut self, index: usize, frame: Frame) {
        if index == 0 && self.frames.is_populated(0) {
            return;
        }

        match self.frames.replace(index, frame) {
            Ok(Some(previous)) => {
                trace!(index, "Replaced resident frame");
                self.strategy.evict(previous);
            }
            Ok(None) => {}
            Err(rejected) => {
                trace!(index, len = self.frames.len(), "Dropped frame past the end");
                drop(rejected);
            }
        }
    }

    fn evict(&mut self, index: usize) {
        if index == 0 {
            return;
        }
        if let Some(frame) = self.frames.take(index) {
            self.strategy.evict(frame);
        }
    }

    fn discard_displayed_prefix(&mut self) {
        let end = self.cursors.displayed - 1;
        debug!(
            threshold = self.limits.threshold,
            displayed = self.cursors.displayed,
            "First pass crossed threshold, discarding displayed frames"
        );
        for index in 1..end {
            self.evict(index);
        }
    }

    /// Frames resident or owed ahead of the displayed one.
    fn buffered_ahead(&self) -> usize {
        let Cursors {
            insert,
            displayed,
            pending,
            ..
        } = self.cursors;

        if displayed > insert {
            pending + insert + self.frames.len() - displayed - 1
        } else {
            (pending + insert).saturating_sub(displayed + 1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{FrameSize, RawFrame};

    fn empty_frame() -> Frame {
        RawFrame::new(0, FrameSize::new(1, 1)).finish()
    }

    /// Insert `count` frames, optionally completing, returning the last
    /// keep-decoding answer.
    fn fill(queue: &mut AnimationFrameQueue, count: usize, complete: bool) -> bool {
        let mut keep_decoding = false;
        for _ in 0..count {
            keep_decoding = queue.insert(empty_frame());
        }
        if complete {
            keep_decoding = queue.mark_complete();
        }
        keep_decoding
    }

    fn fill_until_stopped(queue: &mut AnimationFrameQueue) {
        while fill(queue, 1, false) {}
    }

    fn assert_populated(queue: &AnimationFrameQueue, range: std::ops::Range<usize>, expected: bool) {
        for index in range {
            assert_eq!(
                queue.frames().is_populated(index),
                expected,
                "slot {} populated",
                index
            );
        }
    }

    #[test]
    fn test_initial_state() {
        let queue = AnimationFrameQueue::new(800, 100);

        assert_eq!(queue.threshold(), 800);
        assert_eq!(queue.batch(), 100);
        assert_eq!(queue.displayed(), 0);
        assert_eq!(queue.pending(), 200);
        assert!(!queue.may_discard());
        assert!(!queue.is_complete());
        assert!(queue.is_empty());
        assert_eq!(queue.mode(), QueueMode::Filling);
    }

    #[test]
    fn test_threshold_too_small() {
        let queue = AnimationFrameQueue::new(0, 10);
        assert_eq!(queue.threshold(), 22);
        assert_eq!(queue.batch(), 10);
        assert_eq!(queue.pending(), 20);
    }

    #[test]
    fn test_batch_too_small() {
        let queue = AnimationFrameQueue::new(10, 0);
        assert_eq!(queue.threshold(), 10);
        assert_eq!(queue.batch(), 1);
        assert_eq!(queue.pending(), 2);
    }

    #[test]
    fn test_batch_too_big() {
        let queue = AnimationFrameQueue::new(50, usize::MAX);
        assert_eq!(queue.batch(), usize::MAX / 4);
        assert_eq!(queue.threshold(), queue.batch() * 2 + 2);
        assert_eq!(queue.pending(), queue.batch() * 2);
    }

    #[test]
    fn test_degenerate_limits_clamp() {
        let queue = AnimationFrameQueue::new(0, 0);
        assert_eq!(queue.batch(), 1);
        assert_eq!(queue.threshold(), 4);
        assert_eq!(queue.pending(), 2);
    }

    #[test]
    fn test_finish_under_batch_and_threshold() {
        let mut queue = AnimationFrameQueue::new(30, 10);
        assert_eq!(queue.pending(), 20);

        let mut first_frame: Option<Frame> = None;
        for i in 0..5 {
            let frame = empty_frame();
            assert!(queue.insert(frame.clone()));
            assert!(!queue.is_complete());

            if i == 4 {
                assert!(!queue.mark_complete());
                assert!(queue.is_complete());
                assert_eq!(queue.pending(), 0);
                assert_eq!(queue.mode(), QueueMode::Retained);
            }

            assert!(!queue.may_discard());
            assert!(queue.get(i).unwrap().ptr_eq(&frame));
            assert_eq!(queue.len(), i + 1);

            assert!(!queue.advance());
            assert_eq!(queue.displayed(), i);

            let first = first_frame.get_or_insert(frame);
            assert!(queue.get(0).unwrap().ptr_eq(first));
        }

        // Loop again; everything is still there and the display wraps.
        for i in 0..queue.len() {
            assert!(queue.get(i).is_some());
            assert!(!queue.advance());
        }
        assert_eq!(queue.displayed(), 4);
        assert_eq!(queue.resident_count(), 5);
    }

    #[test]
    fn test_finish_multiple_batches_under_threshold() {
        let mut queue = AnimationFrameQueue::new(30, 2);
        assert_eq!(queue.pending(), 4);

        loop {
            let keep_decoding = fill(&mut queue, 1, false);
            assert!(!queue.is_complete());
            assert!(!queue.may_discard());
            if !keep_decoding {
                break;
            }
        }
        assert_eq!(queue.pending(), 0);
        assert_eq!(queue.len(), 4);

        // Progress until the queue asks for more.
        let mut i = 0;
        loop {
            assert!(queue.get(i).is_some());
            i += 1;
            if queue.advance() {
                break;
            }
        }
        assert_eq!(queue.pending(), 2);
        assert_eq!(queue.displayed(), 2);

        assert!(!fill(&mut queue, 1, true));
        assert!(queue.is_complete());
        assert_eq!(queue.pending(), 0);
        assert_eq!(queue.len(), 5);

        while i < queue.len() {
            assert!(queue.get(i).is_some());
            assert!(!queue.advance());
            i += 1;
        }

        for i in 0..queue.len() {
            assert!(queue.get(i).is_some());
            assert!(!queue.advance());
        }

        for i in 0..3 {
            assert!(queue.get(i).is_some());
            assert!(!queue.advance());
        }

        // Under the threshold only the display cursor moves.
        assert!(!queue.reset(true));
        assert_populated(&queue, 0..5, true);
        assert_eq!(queue.pending(), 0);
        assert_eq!(queue.displayed(), 0);
    }

    #[test]
    fn test_may_discard() {
        let mut queue = AnimationFrameQueue::new(8, 3);
        assert_eq!(queue.pending(), 6);

        loop {
            let keep_decoding = fill(&mut queue, 1, false);
            assert!(!queue.is_complete());
            assert!(!queue.may_discard());
            if !keep_decoding {
                break;
            }
        }
        assert_eq!(queue.pending(), 0);
        assert_eq!(queue.len(), 6);

        let mut i = 0;
        loop {
            assert!(queue.get(i).is_some());
            i += 1;
            if queue.advance() {
                break;
            }
        }
        assert_eq!(queue.pending(), 3);
        assert_eq!(queue.displayed(), 3);

        fill_until_stopped(&mut queue);
        assert!(!queue.is_complete());
        assert!(queue.may_discard());
        assert_eq!(queue.pending(), 0);
        assert_eq!(queue.len(), 9);

        // Crossing the threshold freed the already displayed frame 1.
        assert_populated(&queue, 0..1, true);
        assert_populated(&queue, 1..2, false);
        assert_populated(&queue, 2..9, true);

        // Frames two behind the display are evicted as it moves.
        loop {
            assert!(queue.get(i).is_some());
            i += 1;
            let restart = queue.advance();
            assert!(!queue.frames().is_populated(i - 2));
            assert!(queue.frames().is_populated(i - 1));
            if restart {
                break;
            }
        }
        assert_eq!(queue.pending(), 3);
        assert_eq!(queue.displayed(), 6);

        // The last frame completes the pass; the decoder still owes frames
        // for the next loop.
        assert!(fill(&mut queue, 1, true));
        assert!(queue.is_complete());
        assert_eq!(queue.mode(), QueueMode::Discarding);
        assert_eq!(queue.pending(), 2);
        assert_eq!(queue.len(), 10);

        // Remaining requests replace slots, they never grow the buffer.
        fill_until_stopped(&mut queue);
        assert_eq!(queue.pending(), 0);
        assert_eq!(queue.len(), 10);

        // Loop around until the display hits a missing frame.
        loop {
            if i == queue.len() {
                i = 0;
            }
            if queue.get(i).is_none() {
                break;
            }
            i += 1;
            queue.advance();
        }
        assert_eq!(queue.pending(), 3);
        assert_eq!(i, 2);
        assert_eq!(queue.displayed(), 1);

        let owed = queue.pending();
        assert!(!fill(&mut queue, owed, false));
        assert_eq!(queue.pending(), 0);

        assert!(queue.get(i).is_some());
        queue.advance();
        assert_eq!(queue.displayed(), 2);
        assert!(queue.frames().is_populated(i - 2));
        assert!(queue.frames().is_populated(i - 1));
        i += 1;

        // Past frame 2, the previous-previous frame is cleared again.
        assert!(queue.get(i).is_some());
        queue.advance();
        assert_eq!(queue.displayed(), 3);
        assert!(!queue.frames().is_populated(i - 2));
        assert!(queue.frames().is_populated(i - 1));
    }

    #[test]
    fn test_advance_does_not_wrap_before_complete() {
        let mut queue = AnimationFrameQueue::new(30, 10);
        fill(&mut queue, 3, false);

        queue.advance_by(5);
        assert_eq!(queue.displayed(), 2);

        queue.mark_complete();
        queue.advance();
        assert_eq!(queue.displayed(), 0);
    }

    #[test]
    fn test_advance_waits_for_missing_frame() {
        let mut queue = AnimationFrameQueue::new(30, 10);
        fill(&mut queue, 2, false);

        queue.advance();
        assert_eq!(queue.displayed(), 1);
        queue.advance();
        assert_eq!(queue.displayed(), 1);
    }

    #[test]
    fn test_get_is_stable_and_bounded() {
        let mut queue = AnimationFrameQueue::new(30, 10);
        assert!(queue.get(0).is_none());

        fill(&mut queue, 2, false);
        let a = queue.get(1).unwrap();
        let b = queue.get(1).unwrap();
        assert!(a.ptr_eq(&b));
        assert!(queue.get(2).is_none());
        assert!(queue.get(usize::MAX).is_none());
    }

    /// Decode a first pass of `total` frames, advancing the display
    /// whenever the decoder has been told to stop.
    fn play_first_pass(queue: &mut AnimationFrameQueue, total: usize) {
        let mut inserted = 0;
        while inserted < total {
            if queue.pending() == 0 {
                queue.advance();
                continue;
            }
            queue.insert(empty_frame());
            inserted += 1;
        }
        queue.mark_complete();
    }

    #[test]
    fn test_threshold_decides_discarding() {
        let mut retained = AnimationFrameQueue::new(4, 1);
        play_first_pass(&mut retained, 4);
        assert_eq!(retained.len(), 4);
        assert!(!retained.may_discard());
        assert_eq!(retained.mode(), QueueMode::Retained);

        let mut discarding = AnimationFrameQueue::new(4, 1);
        play_first_pass(&mut discarding, 5);
        assert_eq!(discarding.len(), 5);
        assert!(discarding.may_discard());
        assert_eq!(discarding.mode(), QueueMode::Discarding);
    }

    #[test]
    fn test_full_reset_keeps_only_first_frame() {
        let mut queue = AnimationFrameQueue::new(8, 3);
        play_first_pass(&mut queue, 12);
        assert_eq!(queue.mode(), QueueMode::Discarding);

        // Play until the display loops back to frame 0.
        let mut guard = 0;
        loop {
            if queue.pending() > 0 {
                queue.insert(empty_frame());
            }
            queue.advance();
            guard += 1;
            if queue.displayed() == 0 || guard > 100 {
                break;
            }
        }
        assert_eq!(queue.displayed(), 0);

        let was_idle = queue.pending() == 0;
        assert_eq!(queue.reset(false), was_idle);
        assert_eq!(queue.resident_count(), 1);
        assert!(queue.frames().is_populated(0));
        assert_eq!(queue.pending(), 6);
        assert_eq!(queue.insert_index(), 0);
        assert_eq!(queue.len(), 12);
    }

    #[test]
    fn test_full_reset_restarts_idle_decoder() {
        let mut queue = AnimationFrameQueue::new(4, 1);
        play_first_pass(&mut queue, 6);
        while queue.pending() > 0 {
            queue.insert(empty_frame());
        }

        assert!(queue.reset(false));
        assert_eq!(queue.pending(), 2);

        // A second reset while the decoder is still owed frames does not
        // schedule a duplicate run.
        assert!(!queue.reset(false));
    }

    #[test]
    fn test_cheap_reset_trims_oversized_request() {
        let mut queue = AnimationFrameQueue::new(100, 2);
        fill_until_stopped(&mut queue);
        assert!(queue.advance_by(3));
        assert_eq!(queue.pending(), 2);
        fill(&mut queue, 1, false);

        // Look-ahead drops again while the decoder is still running.
        assert!(!queue.advance());
        assert_eq!(queue.pending(), 3);
        assert_eq!(queue.insert_index(), 5);

        assert!(!queue.reset(true));
        assert_eq!(queue.displayed(), 0);
        assert_eq!(queue.pending(), 1);
    }

    #[test]
    fn test_cheap_reset_keeps_initial_request() {
        let mut queue = AnimationFrameQueue::new(100, 2);
        assert!(!queue.reset(true));
        assert_eq!(queue.pending(), 4);

        fill(&mut queue, 1, false);
        assert!(!queue.reset(true));
        assert_eq!(queue.pending(), 3);
    }

    #[test]
    fn test_lazy_discard_keeps_prefix_until_advance() {
        let mut queue = AnimationFrameQueue::new(8, 3).with_eager_first_pass_discard(false);
        fill_until_stopped(&mut queue);
        while !queue.advance() {}
        fill_until_stopped(&mut queue);

        assert!(queue.may_discard());
        assert_populated(&queue, 0..9, true);

        queue.advance();
        assert!(!queue.frames().is_populated(2));
        assert!(queue.frames().is_populated(1));
    }

    #[test]
    fn test_recycling_strategy_fills_bin() {
        let mut queue =
            AnimationFrameQueue::new(8, 3).with_strategy(EvictionStrategy::recycling(8));
        fill_until_stopped(&mut queue);
        while !queue.advance() {}
        fill_until_stopped(&mut queue);

        let bin = queue.recycle_bin().unwrap();
        assert_eq!(bin.total_recycled(), 1);
        assert_eq!(bin.take().map(|b| b.len()), Some(4));
    }
}
