//! Decoded animation frames.
//!
//! A decoder assembles each animation step into a [`RawFrame`], a mutable
//! pixel buffer it owns exclusively. Once the pixels are written the raw frame
//! is frozen into a [`Frame`]: a cheap, clonable, immutable handle that the
//! frame queue stores and the display side borrows.
//!
//! # Memory Flow
//!
//! ```text
//! 1. Decoder gets a buffer (fresh, or from the recycle bin)
//! 2. RawFrame::with_buffer() wraps it, decoder writes pixels
//! 3. finish() freezes it into a Frame (Arc, no copy)
//! 4. Queue slot owns one handle; display clones are short-lived
//! 5. On eviction, try_reclaim() recovers the Vec<u8> if no clone is alive
//! ```
//!
//! Pixels are always 32-bit BGRA, so a frame of `width * height` pixels owns
//! `width * height * 4` bytes.

use std::fmt;
use std::sync::Arc;

/// Bytes per pixel of a decoded frame (BGRA).
pub const BYTES_PER_PIXEL: usize = 4;

/// Dimensions of a decoded frame in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FrameSize {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl FrameSize {
    /// Create a new size.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of pixels, saturating on overflow.
    #[must_use]
    pub fn pixel_count(&self) -> usize {
        (self.width as usize).saturating_mul(self.height as usize)
    }

    /// Number of bytes a BGRA frame of this size occupies.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.pixel_count().saturating_mul(BYTES_PER_PIXEL)
    }

    /// Whether either dimension is zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Identifies one decoded rendition of an image in the surface cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceKey {
    /// Owning image identifier, assigned by the host
    pub image_id: u64,
    /// Decoded size of every frame of this rendition
    pub size: FrameSize,
}

impl SurfaceKey {
    /// Create a new surface key.
    #[must_use]
    pub const fn new(image_id: u64, size: FrameSize) -> Self {
        Self { image_id, size }
    }
}

/// Frame being assembled by a decoder.
///
/// Owned exclusively by the decoder until [`RawFrame::finish`] or
/// [`RawFrame::abort`] turns it into a shareable [`Frame`].
#[derive(Debug)]
pub struct RawFrame {
    index: usize,
    size: FrameSize,
    pixels: Vec<u8>,
    timeout_ms: u32,
}

impl RawFrame {
    /// Allocate a zeroed frame for animation step `index`.
    #[must_use]
    pub fn new(index: usize, size: FrameSize) -> Self {
        Self::with_buffer(index, size, vec![0u8; size.byte_len()])
    }

    /// Wrap an existing (possibly recycled) buffer.
    ///
    /// The buffer is resized to exactly the frame's byte length. Contents of a
    /// reused buffer are left as they were; the decoder overwrites them.
    #[must_use]
    pub fn with_buffer(index: usize, size: FrameSize, mut pixels: Vec<u8>) -> Self {
        pixels.resize(size.byte_len(), 0);
        Self {
            index,
            size,
            pixels,
            timeout_ms: 0,
        }
    }

    /// Animation step this frame belongs to.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Frame dimensions.
    #[must_use]
    pub fn size(&self) -> FrameSize {
        self.size
    }

    /// Mutable access to the BGRA pixel data.
    #[must_use]
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// Set how long this frame stays on screen.
    pub fn set_timeout_ms(&mut self, timeout_ms: u32) {
        self.timeout_ms = timeout_ms;
    }

    /// Freeze a fully decoded frame.
    #[must_use]
    pub fn finish(self) -> Frame {
        self.freeze(true)
    }

    /// Freeze a frame whose decode stopped part-way (truncated or corrupt
    /// data). The frame is still drawable but reports itself unfinished.
    #[must_use]
    pub fn abort(self) -> Frame {
        self.freeze(false)
    }

    fn freeze(self, finished: bool) -> Frame {
        Frame {
            inner: Arc::new(FrameInner {
                index: self.index,
                size: self.size,
                pixels: self.pixels,
                timeout_ms: self.timeout_ms,
                finished,
            }),
        }
    }
}

struct FrameInner {
    index: usize,
    size: FrameSize,
    pixels: Vec<u8>,
    timeout_ms: u32,
    finished: bool,
}

/// Immutable handle to a decoded frame.
///
/// Cloning is an `Arc` increment. Two handles refer to the same frame iff
/// [`Frame::ptr_eq`] holds; the queue relies on that identity rather than on
/// pixel comparison.
#[derive(Clone)]
pub struct Frame {
    inner: Arc<FrameInner>,
}

impl Frame {
    /// Animation step this frame belongs to.
    #[must_use]
    pub fn index(&self) -> usize {
        self.inner.index
    }

    /// Frame dimensions.
    #[must_use]
    pub fn size(&self) -> FrameSize {
        self.inner.size
    }

    /// BGRA pixel data.
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.inner.pixels
    }

    /// Display duration in milliseconds.
    #[must_use]
    pub fn timeout_ms(&self) -> u32 {
        self.inner.timeout_ms
    }

    /// Whether the decoder wrote the whole frame.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.inner.finished
    }

    /// Whether both handles point at the same decoded frame.
    #[must_use]
    pub fn ptr_eq(&self, other: &Frame) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Heap bytes held by this frame (pixel allocation plus bookkeeping).
    #[must_use]
    pub fn size_in_bytes(&self) -> usize {
        self.inner.pixels.capacity() + std::mem::size_of::<FrameInner>()
    }

    /// Number of live handles to this frame, including `self`.
    #[must_use]
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Recover the pixel buffer if this is the last handle.
    ///
    /// Returns the frame unchanged when some other handle (typically the
    /// display side still drawing it) keeps it alive.
    pub fn try_reclaim(self) -> Result<Vec<u8>, Frame> {
        match Arc::try_unwrap(self.inner) {
            Ok(inner) => Ok(inner.pixels),
            Err(inner) => Err(Frame { inner }),
        }
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("index", &self.inner.index)
            .field("size", &self.inner.size)
            .field("timeout_ms", &self.inner.timeout_ms)
            .field("finished", &self.inner.finished)
            .finish()
    }
}
