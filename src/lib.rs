//! # Adaptive Animation Frame Buffer
//!
//! This crate keeps decoded frames of animated images in memory only while it
//! pays off. Short animations are decoded once and kept; long ones keep a
//! sliding window around the displayed frame and are redecoded from the start
//! on every loop. A decoder on a worker thread is throttled so that it stays a
//! bounded number of frames ahead of playback.
//!
//! ## Crate Structure
//!
//! - **`frame`**: Decoded frames (`Frame`, `RawFrame`), sizes and surface keys.
//! - **`buffer`**: `FrameSlots`, the indexed storage of optional frames.
//! - **`queue`**: `AnimationFrameQueue`, the cursor bookkeeping and
//!   retain/discard policy, with eviction strategies in `queue::eviction`.
//! - **`decoder`**: The decoder contract, redecode requests and the shared
//!   `SourceBuffer`.
//! - **`synthetic`**: A deterministic decoder used by tests, benchmarks and the
//!   simulator binary.
//! - **`decode_pool`**: Decode task scheduling on tokio's blocking pool, plus a
//!   deferred scheduler for deterministic hosts.
//! - **`provider`**: `AnimationSurfaceProvider`, the two-lock driver gluing
//!   decoder, queue and display together.
//! - **`observer`**: Callbacks to the owning image and the surface cache.
//! - **`memory`**: Per-frame memory reports.
//! - **`config`**: Figment-based configuration.
//! - **`error`**: The `AnimError` enum.
//! - **`tracing_init`**: Subscriber setup for hosts and the binary.
//!
//! Frame recycling buffers live in the `anim-pool` workspace crate.

pub mod buffer;
pub mod config;
pub mod decode_pool;
pub mod decoder;
pub mod error;
pub mod frame;
pub mod memory;
pub mod observer;
pub mod provider;
pub mod queue;
pub mod synthetic;
pub mod tracing_init;

pub use error::{AnimError, AnimResult};
pub use frame::{Frame, FrameSize, SurfaceKey};
pub use provider::{AnimationSurfaceProvider, ProviderCollaborators};
pub use queue::{AnimationFrameQueue, QueueMode};
