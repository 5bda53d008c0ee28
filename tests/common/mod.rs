//! Shared harness for provider integration tests.

#![allow(dead_code)]

use anim_frames::config::AnimationConfig;
use anim_frames::decode_pool::{DecodeScheduler, DeferredScheduler};
use anim_frames::decoder::{SourceBuffer, TerminalState};
use anim_frames::observer::{ImageObserver, SurfaceCache};
use anim_frames::synthetic::{SyntheticDecoder, SyntheticDecoderFactory};
use anim_frames::{AnimationSurfaceProvider, FrameSize, ProviderCollaborators, SurfaceKey};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// 16x16 frames: 1 KiB of budget is 4 frames before the queue raises it.
pub const FRAME_SIZE: FrameSize = FrameSize::new(16, 16);

/// Records every callback the provider makes.
#[derive(Default)]
pub struct RecordingObserver {
    pub available: AtomicUsize,
    pub progress: AtomicUsize,
    pub completions: Mutex<Vec<(usize, TerminalState)>>,
}

impl RecordingObserver {
    pub fn available_count(&self) -> usize {
        self.available.load(Ordering::SeqCst)
    }

    pub fn completions(&self) -> Vec<(usize, TerminalState)> {
        self.completions.lock().clone()
    }
}

impl SurfaceCache for RecordingObserver {
    fn surface_available(&self, _key: SurfaceKey) {
        self.available.fetch_add(1, Ordering::SeqCst);
    }
}

impl ImageObserver for RecordingObserver {
    fn notify_progress(&self, _key: SurfaceKey, _frames: usize) {
        self.progress.fetch_add(1, Ordering::SeqCst);
    }

    fn notify_decode_complete(&self, _key: SurfaceKey, frames: usize, state: TerminalState) {
        self.completions.lock().push((frames, state));
    }
}

/// Config whose threshold is the queue minimum for `batch`.
pub fn discarding_config(batch: usize) -> AnimationConfig {
    AnimationConfig {
        frames_on_demand_threshold_kb: 1,
        frames_on_demand_min_frames: batch,
        ..AnimationConfig::default()
    }
}

/// Config that keeps every frame of a short animation.
pub fn retaining_config(batch: usize) -> AnimationConfig {
    AnimationConfig {
        frames_on_demand_min_frames: batch,
        ..AnimationConfig::default()
    }
}

/// Source bytes for `count` valid frames: frame `i` is filled with `i + 1`.
pub fn frame_bytes(count: usize) -> Vec<u8> {
    (0..count).map(|i| (i % 255) as u8 + 1).collect()
}

pub struct Harness<S> {
    pub provider: Arc<AnimationSurfaceProvider>,
    pub scheduler: Arc<S>,
    pub factory: Arc<SyntheticDecoderFactory>,
    pub observer: Arc<RecordingObserver>,
    pub source: SourceBuffer,
}

pub fn build<S: DecodeScheduler + 'static>(
    source: SourceBuffer,
    config: &AnimationConfig,
    factory: SyntheticDecoderFactory,
    scheduler: Arc<S>,
) -> Harness<S> {
    let key = SurfaceKey::new(42, FRAME_SIZE);
    let factory = Arc::new(factory);
    let observer = Arc::new(RecordingObserver::default());
    let provider = AnimationSurfaceProvider::new(
        key,
        Box::new(SyntheticDecoder::new(source.clone(), key)),
        config,
        ProviderCollaborators {
            factory: factory.clone(),
            scheduler: scheduler.clone(),
            surface_cache: observer.clone(),
            image: observer.clone(),
        },
    );

    Harness {
        provider,
        scheduler,
        factory,
        observer,
        source,
    }
}

pub fn deferred(bytes: Vec<u8>, config: &AnimationConfig) -> Harness<DeferredScheduler> {
    deferred_with_factory(bytes, config, SyntheticDecoderFactory::new())
}

pub fn deferred_with_factory(
    bytes: Vec<u8>,
    config: &AnimationConfig,
    factory: SyntheticDecoderFactory,
) -> Harness<DeferredScheduler> {
    build(
        SourceBuffer::from_bytes(bytes),
        config,
        factory,
        Arc::new(DeferredScheduler::new()),
    )
}

impl Harness<DeferredScheduler> {
    /// Start decoding and drain the scheduler.
    pub fn start(&self) {
        self.provider.start();
        self.scheduler.run_pending();
    }

    /// One display tick followed by all decode work it caused.
    pub fn tick(&self) {
        self.provider.advance(false);
        self.scheduler.run_pending();
    }
}
