//! CLI entry point for anim_frames
//!
//! Plays a synthetic animation through the frame provider on the decode pool
//! and reports how many frames stayed resident. Useful for seeing how the
//! frame threshold and batch size trade memory for redecoding.
//!
//! # Usage
//!
//! ```bash
//! anim_frames --frames 120 --width 256 --height 256 --loops 3
//! anim_frames --threshold-kb 512 --batch 4 --recycle --json
//! ```

use anim_frames::config::AnimConfig;
use anim_frames::decode_pool::DecodePool;
use anim_frames::decoder::{SourceBuffer, TerminalState};
use anim_frames::observer::{ImageObserver, SurfaceCache};
use anim_frames::synthetic::{SyntheticDecoder, SyntheticDecoderFactory};
use anim_frames::{
    tracing_init, AnimationSurfaceProvider, FrameSize, ProviderCollaborators, SurfaceKey,
};
use anyhow::{bail, Result};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// How long a tick waits for outstanding decode work.
const DECODE_WAIT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "anim_frames")]
#[command(about = "Simulate adaptive frame buffering for an animated image", long_about = None)]
struct Cli {
    /// Number of frames in the animation
    #[arg(long, default_value = "60")]
    frames: usize,

    /// Frame width in pixels
    #[arg(long, default_value = "128")]
    width: u32,

    /// Frame height in pixels
    #[arg(long, default_value = "128")]
    height: u32,

    /// Times to play the animation through
    #[arg(long, default_value = "2")]
    loops: usize,

    /// Override the on-demand threshold (KiB)
    #[arg(long)]
    threshold_kb: Option<usize>,

    /// Override the decode batch size
    #[arg(long)]
    batch: Option<usize>,

    /// Recycle evicted frame buffers
    #[arg(long)]
    recycle: bool,

    /// Configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Default)]
struct SimulationObserver {
    announced: AtomicUsize,
    completed: AtomicUsize,
}

impl SurfaceCache for SimulationObserver {
    fn surface_available(&self, _key: SurfaceKey) {
        self.announced.fetch_add(1, Ordering::Relaxed);
    }
}

impl ImageObserver for SimulationObserver {
    fn notify_progress(&self, _key: SurfaceKey, _frames: usize) {}

    fn notify_decode_complete(&self, _key: SurfaceKey, frames: usize, state: TerminalState) {
        info!(frames, ?state, "First pass finished");
        self.completed.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Default, Serialize)]
struct SimulationReport {
    frames: usize,
    threshold: usize,
    batch: usize,
    mode: String,
    ticks: usize,
    stalls: usize,
    missing_frames: usize,
    peak_resident_frames: usize,
    peak_resident_bytes: usize,
    decoders_created: usize,
    buffers_reused: u64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AnimConfig::load_from(path)?,
        None => AnimConfig::load()?,
    };
    if let Some(kb) = cli.threshold_kb {
        config.animation.frames_on_demand_threshold_kb = kb;
    }
    if let Some(batch) = cli.batch {
        config.animation.frames_on_demand_min_frames = batch;
    }
    config.animation.recycle_frames |= cli.recycle;
    config.validate()?;
    tracing_init::init_from_config(&config)?;

    if cli.frames == 0 {
        bail!("--frames must be at least 1");
    }

    if cli.json {
        let report = simulate(&cli, &config)?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("🎞️  anim_frames - adaptive frame buffer simulator");
    println!(
        "   {} frames of {}x{}, {} loop(s)",
        cli.frames, cli.width, cli.height, cli.loops
    );
    println!();

    let report = simulate(&cli, &config)?;

    println!("📊 Frame queue");
    println!("   Threshold: {} frames", report.threshold);
    println!("   Batch: {} frames", report.batch);
    println!("   Mode: {}", report.mode);
    println!();
    println!("▶️  Playback");
    println!("   Ticks: {}", report.ticks);
    println!("   Stalls: {}", report.stalls);
    println!("   Missing frames: {}", report.missing_frames);
    println!();
    println!("💾 Memory");
    println!(
        "   Peak resident: {} frames ({} KiB)",
        report.peak_resident_frames,
        report.peak_resident_bytes / 1024
    );
    println!("   Decoders created for redecode: {}", report.decoders_created);
    println!("   Recycled buffers reused: {}", report.buffers_reused);
    println!();
    println!("✅ Simulation complete");
    Ok(())
}

fn simulate(cli: &Cli, config: &AnimConfig) -> Result<SimulationReport> {
    let key = SurfaceKey::new(1, FrameSize::new(cli.width, cli.height));
    // Never emit the corrupt byte.
    let bytes: Vec<u8> = (0..cli.frames).map(|i| (i % 255) as u8 + 1).collect();
    let source = SourceBuffer::from_bytes(bytes);

    let pool = Arc::new(DecodePool::from_config(&config.decode_pool)?);
    let factory = Arc::new(SyntheticDecoderFactory::new());
    let observer = Arc::new(SimulationObserver::default());

    let provider = AnimationSurfaceProvider::new(
        key,
        Box::new(SyntheticDecoder::new(source, key)),
        &config.animation,
        ProviderCollaborators {
            factory: factory.clone(),
            scheduler: pool.clone(),
            surface_cache: observer.clone(),
            image: observer.clone(),
        },
    );
    provider.start();

    let mut report = SimulationReport {
        frames: cli.frames,
        threshold: provider.threshold(),
        batch: provider.batch(),
        ticks: cli.frames.saturating_mul(cli.loops),
        ..SimulationReport::default()
    };

    for _ in 0..report.ticks {
        if !pool.block_until_idle(DECODE_WAIT) {
            bail!("decode did not settle within {:?}", DECODE_WAIT);
        }
        if provider.has_redecode_error() {
            bail!("redecode failed");
        }

        let displayed = provider.displayed();
        if provider.drawable_ref(displayed).is_none() {
            report.missing_frames += 1;
        }

        let memory = provider.memory_report();
        report.peak_resident_frames = report.peak_resident_frames.max(memory.resident_frames());
        report.peak_resident_bytes = report.peak_resident_bytes.max(memory.total_bytes());

        provider.advance(false);
        if provider.displayed() == displayed {
            report.stalls += 1;
        }
    }

    pool.block_until_idle(DECODE_WAIT);
    report.mode = format!("{:?}", provider.mode());
    report.decoders_created = factory.created();
    report.buffers_reused = provider.recycle_bin().map_or(0, |bin| bin.total_reused());

    info!(
        ticks = report.ticks,
        stalls = report.stalls,
        peak_frames = report.peak_resident_frames,
        announced = observer.announced.load(Ordering::Relaxed),
        completed = observer.completed.load(Ordering::Relaxed),
        "Simulation finished"
    );
    Ok(report)
}
