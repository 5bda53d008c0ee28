//! Decode driver for one animated rendition.
//!
//! [`AnimationSurfaceProvider`] owns the decoder, pumps it on a decode worker,
//! feeds the frames into an [`AnimationFrameQueue`] and serves them to the
//! display side.
//!
//! # Locking
//!
//! Two locks, always taken in this order:
//!
//! ```text
//! decoding  ──▶  frames
//! ```
//!
//! `decoding` guards the decoder and is held for a whole decode run.
//! `frames` guards the queue and is held only for single queue operations, so
//! the display never waits behind a long decode. Memory reports take `frames`
//! alone. Observers and the surface cache are never called with `frames` held.
//!
//! # Regenerating Frames
//!
//! Once an animation is over its frame threshold, displayed frames are thrown
//! away. A decoder cannot seek backwards, so every loop starts a brand new one
//! built by the [`DecoderFactory`] from the provider's [`RedecodeRequest`].
//! If that fails, or the new decoder fails part-way, the provider records a
//! sticky redecode error, drops the decoder and inserts nothing until
//! [`clear_redecode_error`](AnimationSurfaceProvider::clear_redecode_error),
//! which rewinds playback to frame 0 with a fresh decoder.

use crate::config::AnimationConfig;
use crate::decode_pool::{DecodeScheduler, DecodeTask};
use crate::decoder::{
    AnimationDecoder, DecodeStatus, DecoderFactory, RedecodeRequest, TerminalState,
};
use crate::frame::{Frame, SurfaceKey};
use crate::memory::FrameMemoryReport;
use crate::observer::{ImageObserver, SurfaceCache};
use crate::queue::{AnimationFrameQueue, EvictionStrategy, QueueLimits, QueueMode};
use anim_pool::RecycleBin;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, debug_span, error, info, warn};

/// Live decoded surfaces assumed per animation for size accounting: the
/// composited frame, the previous composited frame and the frame being
/// decoded.
const LOGICAL_SURFACE_COUNT: usize = 3;

/// Everything outside the provider that it talks to.
#[derive(Clone)]
pub struct ProviderCollaborators {
    /// Builds decoders for redecode passes
    pub factory: Arc<dyn DecoderFactory>,
    /// Runs decode passes
    pub scheduler: Arc<dyn DecodeScheduler>,
    /// Told once when the first frame exists
    pub surface_cache: Arc<dyn SurfaceCache>,
    /// Image that requested the decode; released after the first pass
    pub image: Arc<dyn ImageObserver>,
}

struct DecodingState {
    decoder: Option<Box<dyn AnimationDecoder>>,
    request: RedecodeRequest,
    image: Option<Arc<dyn ImageObserver>>,
}

/// Decode driver and frame source for one animated rendition.
pub struct AnimationSurfaceProvider {
    key: SurfaceKey,
    decode_bytes_at_a_time: usize,
    factory: Arc<dyn DecoderFactory>,
    scheduler: Arc<dyn DecodeScheduler>,
    surface_cache: Arc<dyn SurfaceCache>,
    recycle_bin: Option<RecycleBin>,

    // Lock order: `decoding` before `frames`.
    decoding: Mutex<DecodingState>,
    frames: Mutex<AnimationFrameQueue>,

    available: AtomicBool,
    redecode_error: AtomicBool,
    waiting_for_data: AtomicBool,
}

impl AnimationSurfaceProvider {
    /// Wrap `decoder`, sizing the frame queue from `config`.
    ///
    /// The threshold is the number of frames of `key.size` that fit in the
    /// configured budget; the batch is `frames_on_demand_min_frames`. Nothing
    /// is decoded until [`start`](Self::start).
    #[must_use]
    pub fn new(
        key: SurfaceKey,
        mut decoder: Box<dyn AnimationDecoder>,
        config: &AnimationConfig,
        collaborators: ProviderCollaborators,
    ) -> Arc<Self> {
        let threshold = config.frames_threshold(key.size);
        let batch = config.frames_on_demand_min_frames;
        let limits = QueueLimits::clamped(threshold, batch);

        let strategy = if config.recycle_frames {
            EvictionStrategy::recycling(limits.batch.saturating_mul(2))
        } else {
            EvictionStrategy::Discard
        };
        let recycle_bin = strategy.recycle_bin().cloned();
        if let Some(bin) = &recycle_bin {
            decoder.attach_recycle_bin(bin.clone());
        }

        let queue = AnimationFrameQueue::new(threshold, batch)
            .with_strategy(strategy)
            .with_eager_first_pass_discard(config.eager_first_pass_discard);

        info!(
            image_id = key.image_id,
            size = %key.size,
            threshold = queue.threshold(),
            batch = queue.batch(),
            recycle = recycle_bin.is_some(),
            "Animation provider created"
        );

        let request = decoder.redecode_request();
        Arc::new(Self {
            key,
            decode_bytes_at_a_time: config.decode_bytes_at_a_time,
            factory: collaborators.factory,
            scheduler: collaborators.scheduler,
            surface_cache: collaborators.surface_cache,
            recycle_bin,
            decoding: Mutex::new(DecodingState {
                decoder: Some(decoder),
                request,
                image: Some(collaborators.image),
            }),
            frames: Mutex::new(queue),
            available: AtomicBool::new(false),
            redecode_error: AtomicBool::new(false),
            waiting_for_data: AtomicBool::new(false),
        })
    }

    // =========================================================================
    // Scheduling
    // =========================================================================

    /// Schedule the first decode run.
    pub fn start(self: &Arc<Self>) {
        self.schedule();
    }

    /// Source data arrived; continue a decode that stopped for lack of it.
    ///
    /// Returns whether a run was scheduled.
    pub fn resume(self: &Arc<Self>) -> bool {
        if self.waiting_for_data.swap(false, Ordering::AcqRel) {
            debug!(image_id = self.key.image_id, "Resuming decode with new data");
            self.schedule();
            return true;
        }
        false
    }

    fn schedule(self: &Arc<Self>) {
        let task: Arc<dyn DecodeTask> = Arc::clone(self) as Arc<dyn DecodeTask>;
        self.scheduler.async_run(task);
    }

    // =========================================================================
    // Display side
    // =========================================================================

    /// Step the animation, or rewind it to frame 0 when `reset` is set.
    ///
    /// Schedules a decode run when the queue asks for one.
    pub fn advance(self: &Arc<Self>, reset: bool) {
        let restart = if reset {
            self.reset()
        } else {
            self.frames.lock().advance()
        };

        if restart {
            debug!(
                image_id = self.key.image_id,
                pending = self.frames.lock().pending(),
                "Queueing decode run"
            );
            self.schedule();
        }
    }

    fn reset(&self) -> bool {
        {
            // Under the threshold nothing was discarded, so only the display
            // cursor moves and the decoder need not be touched.
            let mut frames = self.frames.lock();
            if !frames.may_discard() {
                info!(image_id = self.key.image_id, "Fast reset");
                return frames.reset(true);
            }
        }

        info!(image_id = self.key.image_id, "Slow reset");
        self.restart_from_first_frame()
    }

    /// Evict everything but frame 0 and hand the queue a new decoder.
    /// Returns whether a run must be scheduled.
    fn restart_from_first_frame(&self) -> bool {
        let mut decoding = self.decoding.lock();
        // Without a decoder no run can be owed, whatever the queue thinks.
        let was_stopped = decoding.decoder.is_none();
        self.recreate_decoder(&mut decoding);
        let restart = self.frames.lock().reset(false);
        decoding.decoder.is_some() && (restart || was_stopped)
    }

    /// Frame `index` for drawing, if it is resident.
    #[must_use]
    pub fn drawable_ref(&self, index: usize) -> Option<Frame> {
        let frames = self.frames.lock();
        if !self.is_available() {
            warn!(index, "Drawable frame requested from a placeholder");
            return None;
        }
        frames.get(index)
    }

    /// Whether the first frame is fully decoded.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        let frames = self.frames.lock();
        if !self.is_available() {
            warn!("Finished state requested from a placeholder");
            return false;
        }
        frames.get(0).is_some_and(|frame| frame.is_finished())
    }

    /// Whether every frame is decoded and kept.
    #[must_use]
    pub fn is_fully_decoded(&self) -> bool {
        let frames = self.frames.lock();
        frames.is_complete() && !frames.may_discard()
    }

    /// Whether the first frame has been announced.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    // =========================================================================
    // Accounting and status
    // =========================================================================

    /// Bytes charged to this provider regardless of residency.
    #[must_use]
    pub fn logical_size_in_bytes(&self) -> usize {
        self.key.size.byte_len().saturating_mul(LOGICAL_SURFACE_COUNT)
    }

    /// Resident frames and their sizes. Takes only the frames lock.
    #[must_use]
    pub fn memory_report(&self) -> FrameMemoryReport {
        let frames = self.frames.lock();
        let recycled = self.recycle_bin.as_ref().map_or(0, RecycleBin::retained);
        FrameMemoryReport::from_slots(frames.frames()).with_recycled_buffers(recycled)
    }

    /// Whether a redecode failed and decoding is halted.
    #[must_use]
    pub fn has_redecode_error(&self) -> bool {
        self.redecode_error.load(Ordering::Acquire)
    }

    /// Acknowledge a redecode error so decoding may resume.
    ///
    /// The failed decoder stopped somewhere in the middle of a pass, so
    /// playback restarts at frame 0 with a new decoder, as after a slow reset.
    /// Returns whether an error was set.
    pub fn clear_redecode_error(self: &Arc<Self>) -> bool {
        if !self.redecode_error.swap(false, Ordering::AcqRel) {
            return false;
        }
        info!(image_id = self.key.image_id, "Redecode error cleared, restarting");
        if self.restart_from_first_frame() {
            self.schedule();
        }
        true
    }

    /// Whether a decoder is still held.
    #[must_use]
    pub fn has_decoder(&self) -> bool {
        self.decoding.lock().decoder.is_some()
    }

    /// Rendition key.
    #[must_use]
    pub fn key(&self) -> SurfaceKey {
        self.key
    }

    /// Frames the decoder owes.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.frames.lock().pending()
    }

    /// Index of the displayed frame.
    #[must_use]
    pub fn displayed(&self) -> usize {
        self.frames.lock().displayed()
    }

    /// Slots in the frame queue.
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.frames.lock().len()
    }

    /// Frames currently resident.
    #[must_use]
    pub fn resident_count(&self) -> usize {
        self.frames.lock().resident_count()
    }

    /// Frame queue lifecycle state.
    #[must_use]
    pub fn mode(&self) -> QueueMode {
        self.frames.lock().mode()
    }

    /// Clamped frame threshold.
    #[must_use]
    pub fn threshold(&self) -> usize {
        self.frames.lock().threshold()
    }

    /// Clamped batch size.
    #[must_use]
    pub fn batch(&self) -> usize {
        self.frames.lock().batch()
    }

    /// Bin shared with the decoder, when recycling.
    #[must_use]
    pub fn recycle_bin(&self) -> Option<&RecycleBin> {
        self.recycle_bin.as_ref()
    }

    // =========================================================================
    // Decode run
    // =========================================================================

    fn decode_loop(&self, decoding: &mut DecodingState) {
        loop {
            if self.has_redecode_error() {
                return;
            }
            if self.frames.lock().pending() == 0 {
                debug!("No frames owed, yielding");
                return;
            }

            let Some(decoder) = decoding.decoder.as_mut() else {
                debug!("Decoder already released");
                return;
            };

            // Raised before decoding so that a resume() landing between
            // NeedMoreData and our return still schedules a run.
            self.waiting_for_data.store(true, Ordering::Release);
            let status = decoder.decode();
            if status != DecodeStatus::NeedMoreData {
                self.waiting_for_data.store(false, Ordering::Release);
            }

            match status {
                DecodeStatus::Terminal(state) => {
                    let keep_decoding = self.check_for_new_frame_at_terminal(decoding, state);
                    if self.has_redecode_error() {
                        decoding.decoder = None;
                        return;
                    }
                    self.finish_decoding(decoding, state);
                    if decoding.decoder.is_none() || !keep_decoding {
                        return;
                    }
                    debug!(generation = decoding.request.generation, "Starting next pass");
                }
                DecodeStatus::NeedMoreData => {
                    self.notify_progress(decoding);
                    return;
                }
                DecodeStatus::OutputAvailable => {
                    self.notify_progress(decoding);
                    if !self.check_for_new_frame_at_yield(decoding) {
                        return;
                    }
                }
            }
        }
    }

    /// Insert the frame the decoder just produced. Returns whether to keep
    /// decoding.
    fn check_for_new_frame_at_yield(&self, decoding: &mut DecodingState) -> bool {
        let Some(frame) = decoding.decoder.as_mut().and_then(|d| d.take_current_frame()) else {
            warn!("Decoder yielded without a frame");
            return true;
        };

        let (keep_decoding, first_frame) = {
            let mut frames = self.frames.lock();
            let keep_decoding = frames.insert(frame);
            debug!(
                pending = frames.pending(),
                frames = frames.len(),
                "Got frame"
            );
            (keep_decoding, frames.len() == 1)
        };

        if first_frame {
            self.announce_surface_available();
        }
        keep_decoding
    }

    /// Pick up a last frame, if any, and close the pass. Returns whether the
    /// decoder still owes frames.
    ///
    /// A recreated decoder that fails sets the redecode error instead, unless
    /// it fails on the final slot of an animation whose first pass ended the
    /// same way.
    fn check_for_new_frame_at_terminal(
        &self,
        decoding: &mut DecodingState,
        state: TerminalState,
    ) -> bool {
        let frame = decoding.decoder.as_mut().and_then(|d| d.take_current_frame());
        let redecoding = decoding.request.generation > 0;

        let (keep_decoding, first_frame) = {
            let mut frames = self.frames.lock();

            if state == TerminalState::Failure && redecoding {
                let at_known_end = frames.is_complete()
                    && frame.is_some()
                    && frames.insert_index() + 1 == frames.len();
                if !at_known_end {
                    self.redecode_error.store(true, Ordering::Release);
                    error!(
                        image_id = self.key.image_id,
                        generation = decoding.request.generation,
                        slot = frames.insert_index(),
                        "Redecode failed, halting decode"
                    );
                    return false;
                }
            } else if state == TerminalState::Failure {
                warn!(
                    image_id = self.key.image_id,
                    frames = frames.len(),
                    "Decode failed, keeping frames decoded so far"
                );
            }

            match frame {
                Some(frame) => {
                    if frames.pending() > 0 {
                        frames.insert(frame);
                    }
                }
                None if frames.is_empty() => return false,
                None => {}
            }

            let keep_decoding = frames.mark_complete();
            debug!(
                frames = frames.len(),
                pending = frames.pending(),
                mode = ?frames.mode(),
                "Pass complete"
            );
            (keep_decoding, frames.len() == 1)
        };

        if first_frame {
            self.announce_surface_available();
        }
        keep_decoding
    }

    fn finish_decoding(&self, decoding: &mut DecodingState, state: TerminalState) {
        let (frame_count, may_discard) = {
            let frames = self.frames.lock();
            (frames.len(), frames.may_discard())
        };

        if let Some(image) = decoding.image.take() {
            info!(
                image_id = self.key.image_id,
                frames = frame_count,
                ?state,
                "Decode complete"
            );
            image.notify_decode_complete(self.key, frame_count, state);
        }

        if may_discard {
            self.recreate_decoder(decoding);
        } else {
            decoding.decoder = None;
        }
    }

    fn recreate_decoder(&self, decoding: &mut DecodingState) {
        decoding.request = decoding.request.next_generation();
        match self.factory.create_for_redecode(&decoding.request) {
            Ok(mut decoder) => {
                if let Some(bin) = &self.recycle_bin {
                    decoder.attach_recycle_bin(bin.clone());
                }
                decoding.decoder = Some(decoder);
            }
            Err(err) => {
                error!(
                    image_id = self.key.image_id,
                    generation = decoding.request.generation,
                    error = %err,
                    "Failed to recreate decoder"
                );
                decoding.decoder = None;
                self.redecode_error.store(true, Ordering::Release);
            }
        }
    }

    fn notify_progress(&self, decoding: &DecodingState) {
        if let Some(image) = &decoding.image {
            let frames = self.frames.lock().len();
            image.notify_progress(self.key, frames);
        }
    }

    fn announce_surface_available(&self) {
        if self.available.swap(true, Ordering::AcqRel) {
            return;
        }
        info!(image_id = self.key.image_id, "First frame available");
        self.surface_cache.surface_available(self.key);
    }
}

impl DecodeTask for AnimationSurfaceProvider {
    fn run(&self) {
        let span = debug_span!(
            "decode_run",
            image_id = self.key.image_id,
            size = %self.key.size
        );
        let _enter = span.enter();

        if self.has_redecode_error() {
            debug!("Redecode error pending, not decoding");
            return;
        }

        let mut decoding = self.decoding.lock();
        self.decode_loop(&mut decoding);
    }

    fn should_prefer_sync_run(&self) -> bool {
        let decoding = self.decoding.lock();
        decoding
            .decoder
            .as_ref()
            .is_some_and(|decoder| decoder.should_sync_decode(self.decode_bytes_at_a_time))
    }
}

impl std::fmt::Debug for AnimationSurfaceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimationSurfaceProvider")
            .field("key", &self.key)
            .field("available", &self.is_available())
            .field("redecode_error", &self.has_redecode_error())
            .finish_non_exhaustive()
    }
}
