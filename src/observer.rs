//! Callbacks from the provider to its owners.
//!
//! [`ImageObserver`] is the image that requested the decode; it hears about
//! progress only during the first pass and is released once that pass ends.
//! [`SurfaceCache`] learns when the first frame exists so it can stop treating
//! the rendition as a placeholder.
//!
//! Both are called without the provider's frames lock held.

use crate::decoder::TerminalState;
use crate::frame::SurfaceKey;

/// Owner of the image being decoded.
pub trait ImageObserver: Send + Sync {
    /// More of the first pass is decoded; `frames` slots exist so far.
    fn notify_progress(&self, key: SurfaceKey, frames: usize);

    /// The first pass ended.
    fn notify_decode_complete(&self, key: SurfaceKey, frames: usize, state: TerminalState);
}

/// Registry of decoded renditions.
pub trait SurfaceCache: Send + Sync {
    /// The first frame of `key` can now be drawn.
    fn surface_available(&self, key: SurfaceKey);
}
