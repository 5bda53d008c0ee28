//! Decoder contract consumed by the surface provider.
//!
//! A decoder turns source bytes into frames one step at a time. Each call to
//! [`AnimationDecoder::decode`] runs until the decoder has a frame ready, runs
//! out of input, or reaches the end of the animation. The provider then takes
//! the frame with [`AnimationDecoder::take_current_frame`].
//!
//! Decoders are never cloned with their state. When discarded frames have to
//! be regenerated, the provider asks a [`DecoderFactory`] for a brand new
//! decoder built from a [`RedecodeRequest`]: just the configuration needed to
//! start over from the first byte.

use crate::error::AnimResult;
use crate::frame::{Frame, SurfaceKey};
use anim_pool::RecycleBin;
use parking_lot::RwLock;
use std::sync::Arc;

/// How a decode run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalState {
    /// Every frame was decoded.
    Success,
    /// The source was malformed or truncated.
    Failure,
}

/// Result of one [`AnimationDecoder::decode`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStatus {
    /// The source has no more bytes yet.
    NeedMoreData,
    /// A new frame is ready.
    OutputAvailable,
    /// The animation ended. A last frame may still be waiting.
    Terminal(TerminalState),
}

/// Step-wise animation decoder.
pub trait AnimationDecoder: Send {
    /// Decode until a frame is ready, input runs out, or the animation ends.
    fn decode(&mut self) -> DecodeStatus;

    /// Take the most recently produced frame, if it has not been taken yet.
    fn take_current_frame(&mut self) -> Option<Frame>;

    /// Configuration needed to build an identical decoder from scratch.
    fn redecode_request(&self) -> RedecodeRequest;

    /// Whether the remaining work is small enough to run on the caller's
    /// thread instead of a decode worker.
    fn should_sync_decode(&self, bytes_at_a_time: usize) -> bool;

    /// Draw pixel buffers from `bin` when assembling frames.
    fn attach_recycle_bin(&mut self, _bin: RecycleBin) {}
}

/// Builds fresh decoders to regenerate discarded frames.
pub trait DecoderFactory: Send + Sync {
    /// Create a decoder that starts over from the beginning of the source.
    fn create_for_redecode(&self, request: &RedecodeRequest)
        -> AnimResult<Box<dyn AnimationDecoder>>;
}

/// Everything a factory needs to rebuild a decoder.
#[derive(Debug, Clone)]
pub struct RedecodeRequest {
    /// Encoded bytes shared with the original decoder
    pub source: SourceBuffer,
    /// Rendition being decoded
    pub key: SurfaceKey,
    /// How many decoders were created for this provider before this one
    pub generation: u32,
}

impl RedecodeRequest {
    /// Request for the first decoder of a rendition.
    #[must_use]
    pub fn new(source: SourceBuffer, key: SurfaceKey) -> Self {
        Self {
            source,
            key,
            generation: 0,
        }
    }

    /// Same request, one generation later.
    #[must_use]
    pub fn next_generation(&self) -> Self {
        Self {
            source: self.source.clone(),
            key: self.key,
            generation: self.generation.saturating_add(1),
        }
    }
}

#[derive(Debug, Default)]
struct SourceData {
    bytes: Vec<u8>,
    complete: bool,
}

/// Append-only encoded image data shared between the network side and
/// decoders.
///
/// Clones share the same bytes. Once [`complete`](Self::complete) is called
/// no more data arrives and decoders stop reporting
/// [`DecodeStatus::NeedMoreData`].
#[derive(Debug, Clone, Default)]
pub struct SourceBuffer {
    inner: Arc<RwLock<SourceData>>,
}

impl SourceBuffer {
    /// Empty, still-receiving source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Source holding all of `bytes`, already complete.
    #[must_use]
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(SourceData {
                bytes: bytes.into(),
                complete: true,
            })),
        }
    }

    /// Append newly received bytes. Ignored after completion.
    pub fn append(&self, bytes: &[u8]) {
        let mut data = self.inner.write();
        if !data.complete {
            data.bytes.extend_from_slice(bytes);
        }
    }

    /// Mark the end of the data.
    pub fn complete(&self) {
        self.inner.write().complete = true;
    }

    /// Whether all data has arrived.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.inner.read().complete
    }

    /// Bytes received so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().bytes.len()
    }

    /// Whether nothing has been received yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Byte at `offset`, if received.
    #[must_use]
    pub fn byte_at(&self, offset: usize) -> Option<u8> {
        self.inner.read().bytes.get(offset).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameSize;

    #[test]
    fn test_source_buffer_append_and_complete() {
        let source = SourceBuffer::new();
        assert!(source.is_empty());
        assert!(!source.is_complete());

        source.append(&[1, 2]);
        let shared = source.clone();
        shared.append(&[3]);

        assert_eq!(source.len(), 3);
        assert_eq!(source.byte_at(2), Some(3));
        assert_eq!(source.byte_at(3), None);

        source.complete();
        source.append(&[4]);
        assert!(shared.is_complete());
        assert_eq!(shared.len(), 3);
    }

    #[test]
    fn test_redecode_request_generations() {
        let key = SurfaceKey::new(7, FrameSize::new(2, 2));
        let request = RedecodeRequest::new(SourceBuffer::from_bytes(vec![1, 2]), key);
        let next = request.next_generation();

        assert_eq!(request.generation, 0);
        assert_eq!(next.generation, 1);
        assert_eq!(next.key, key);
        assert_eq!(next.source.len(), 2);
    }
}
