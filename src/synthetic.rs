//! Deterministic in-memory decoder for tests, benchmarks and the simulator.
//!
//! The "encoding" is trivial: every source byte is one frame, and the frame's
//! pixels are filled with that byte value. A zero byte is corrupt data: the
//! decoder emits the frame it was working on as unfinished and ends with
//! [`TerminalState::Failure`].
//!
//! [`SyntheticDecoderFactory`] builds redecode decoders and can be told to
//! fail, either outright or by corrupting a given frame of every redecode.

use crate::decoder::{
    AnimationDecoder, DecodeStatus, DecoderFactory, RedecodeRequest, SourceBuffer, TerminalState,
};
use crate::error::{AnimError, AnimResult};
use crate::frame::{Frame, RawFrame, SurfaceKey};
use anim_pool::RecycleBin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::trace;

/// Display duration of every synthetic frame.
pub const SYNTHETIC_FRAME_TIMEOUT_MS: u32 = 40;

/// Source byte that marks a corrupt frame.
pub const CORRUPT_BYTE: u8 = 0;

/// One-frame-per-byte decoder.
#[derive(Debug)]
pub struct SyntheticDecoder {
    request: RedecodeRequest,
    offset: usize,
    current: Option<Frame>,
    recycle_bin: Option<RecycleBin>,
    corrupt_at: Option<usize>,
    terminal: Option<TerminalState>,
}

impl SyntheticDecoder {
    /// Decoder over `source` producing frames of `key.size`.
    #[must_use]
    pub fn new(source: SourceBuffer, key: SurfaceKey) -> Self {
        Self::from_request(RedecodeRequest::new(source, key))
    }

    fn from_request(request: RedecodeRequest) -> Self {
        Self {
            request,
            offset: 0,
            current: None,
            recycle_bin: None,
            corrupt_at: None,
            terminal: None,
        }
    }

    /// Treat frame `index` as corrupt regardless of its byte.
    #[must_use]
    pub fn with_corrupt_frame(mut self, index: usize) -> Self {
        self.corrupt_at = Some(index);
        self
    }

    /// Frames produced so far.
    #[must_use]
    pub fn frames_decoded(&self) -> usize {
        self.offset
    }

    fn assemble(&self, index: usize, value: u8) -> RawFrame {
        let size = self.request.key.size;
        let pixels = match &self.recycle_bin {
            Some(bin) => bin.take_or_alloc(size.byte_len()),
            None => vec![0u8; size.byte_len()],
        };
        let mut raw = RawFrame::with_buffer(index, size, pixels);
        raw.set_timeout_ms(SYNTHETIC_FRAME_TIMEOUT_MS);
        raw.pixels_mut().fill(value);
        raw
    }
}

impl AnimationDecoder for SyntheticDecoder {
    fn decode(&mut self) -> DecodeStatus {
        if let Some(state) = self.terminal {
            return DecodeStatus::Terminal(state);
        }

        let index = self.offset;
        let Some(byte) = self.request.source.byte_at(index) else {
            if self.request.source.is_complete() {
                self.terminal = Some(TerminalState::Success);
                return DecodeStatus::Terminal(TerminalState::Success);
            }
            return DecodeStatus::NeedMoreData;
        };

        self.offset += 1;
        if byte == CORRUPT_BYTE || self.corrupt_at == Some(index) {
            // Only the first half of the rows made it.
            let mut raw = self.assemble(index, byte);
            let half = raw.pixels_mut().len() / 2;
            raw.pixels_mut()[half..].fill(0);
            self.current = Some(raw.abort());
            self.terminal = Some(TerminalState::Failure);
            trace!(index, generation = self.request.generation, "Corrupt frame");
            return DecodeStatus::Terminal(TerminalState::Failure);
        }

        self.current = Some(self.assemble(index, byte).finish());
        DecodeStatus::OutputAvailable
    }

    fn take_current_frame(&mut self) -> Option<Frame> {
        self.current.take()
    }

    fn redecode_request(&self) -> RedecodeRequest {
        self.request.clone()
    }

    fn should_sync_decode(&self, bytes_at_a_time: usize) -> bool {
        let remaining = self.request.source.len().saturating_sub(self.offset);
        self.request.source.is_complete() && remaining <= bytes_at_a_time
    }

    fn attach_recycle_bin(&mut self, bin: RecycleBin) {
        self.recycle_bin = Some(bin);
    }
}

/// Factory for [`SyntheticDecoder`] redecodes.
#[derive(Debug, Default)]
pub struct SyntheticDecoderFactory {
    fail_creation: AtomicBool,
    corrupt_redecode_at: Option<usize>,
    created: AtomicUsize,
}

impl SyntheticDecoderFactory {
    /// Factory that always succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every decoder this factory builds hits a corrupt frame at `index`.
    #[must_use]
    pub fn with_corrupt_redecode_at(mut self, index: usize) -> Self {
        self.corrupt_redecode_at = Some(index);
        self
    }

    /// Make subsequent `create_for_redecode` calls fail (or succeed again).
    pub fn set_fail_creation(&self, fail: bool) {
        self.fail_creation.store(fail, Ordering::Release);
    }

    /// Number of decoders built so far.
    #[must_use]
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Acquire)
    }
}

impl DecoderFactory for SyntheticDecoderFactory {
    fn create_for_redecode(
        &self,
        request: &RedecodeRequest,
    ) -> AnimResult<Box<dyn AnimationDecoder>> {
        if self.fail_creation.load(Ordering::Acquire) {
            return Err(AnimError::Redecode(format!(
                "synthetic decoder for image {} refused (generation {})",
                request.key.image_id, request.generation
            )));
        }

        if request.source.is_empty() {
            return Err(AnimError::Decode(format!(
                "no source data for image {}",
                request.key.image_id
            )));
        }

        self.created.fetch_add(1, Ordering::AcqRel);
        let mut decoder = SyntheticDecoder::from_request(request.clone());
        decoder.corrupt_at = self.corrupt_redecode_at;
        Ok(Box::new(decoder))
    }
}
