//! Configuration loading using Figment.
//!
//! Configuration is layered from:
//! 1. `config/anim_frames.toml` (base configuration, optional)
//! 2. Environment variables prefixed with `ANIM_FRAMES_`, with `__` separating
//!    nested keys
//!
//! Every section has defaults, so a missing file yields a usable configuration.
//!
//! # Example
//! ```no_run
//! use anim_frames::config::AnimConfig;
//!
//! # fn main() -> Result<(), anim_frames::error::AnimError> {
//! // ANIM_FRAMES_ANIMATION__FRAMES_ON_DEMAND_MIN_FRAMES=4 overrides the file
//! let config = AnimConfig::load()?;
//! config.validate()?;
//! println!("batch size: {}", config.animation.frames_on_demand_min_frames);
//! # Ok(())
//! # }
//! ```

use crate::error::{AnimError, AnimResult};
use crate::frame::FrameSize;
use crate::tracing_init::OutputFormat;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/anim_frames.toml";

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "ANIM_FRAMES_";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnimConfig {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Frame buffer and decode throttling settings
    #[serde(default)]
    pub animation: AnimationConfig,
    /// Decode worker pool settings
    #[serde(default)]
    pub decode_pool: DecodePoolConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    #[serde(default = "default_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log line format (compact, pretty, json)
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

/// Frame buffer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationConfig {
    /// Memory budget in KiB an animation may use before it starts discarding
    /// displayed frames and redecoding them on demand.
    #[serde(default = "default_threshold_kb")]
    pub frames_on_demand_threshold_kb: usize,
    /// Number of frames requested from the decoder per burst.
    #[serde(default = "default_min_frames")]
    pub frames_on_demand_min_frames: usize,
    /// Byte budget under which a decode may run synchronously on the caller.
    #[serde(default = "default_bytes_at_a_time")]
    pub decode_bytes_at_a_time: usize,
    /// Hand evicted frame buffers back to the decoder instead of freeing them.
    #[serde(default)]
    pub recycle_frames: bool,
    /// Free already displayed frames as soon as the first pass crosses the
    /// threshold, rather than only as the display advances.
    #[serde(default = "default_true")]
    pub eager_first_pass_discard: bool,
}

/// Decode worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodePoolConfig {
    /// Number of blocking worker threads used for decode runs
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
}

// Default value functions
fn default_name() -> String {
    "anim_frames".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "compact".to_string()
}

fn default_threshold_kb() -> usize {
    20 * 1024
}

fn default_min_frames() -> usize {
    10
}

fn default_bytes_at_a_time() -> usize {
    16 * 1024
}

fn default_true() -> bool {
    true
}

fn default_worker_threads() -> usize {
    2
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            frames_on_demand_threshold_kb: default_threshold_kb(),
            frames_on_demand_min_frames: default_min_frames(),
            decode_bytes_at_a_time: default_bytes_at_a_time(),
            recycle_frames: false,
            eager_first_pass_discard: true,
        }
    }
}

impl Default for DecodePoolConfig {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
        }
    }
}

impl AnimationConfig {
    /// Number of frames of the given size that fit in the on-demand budget.
    ///
    /// The budget is divided by the pixel count of a frame. The frame queue
    /// raises the result to its own minimum, so small or zero values are fine.
    #[must_use]
    pub fn frames_threshold(&self, size: FrameSize) -> usize {
        let pixels = size.pixel_count().max(1);
        self.frames_on_demand_threshold_kb.saturating_mul(1024) / pixels
    }
}

impl AnimConfig {
    /// Load configuration from the default file and environment variables.
    ///
    /// Environment variables override the file, e.g.
    /// `ANIM_FRAMES_APPLICATION__LOG_LEVEL=debug`.
    pub fn load() -> AnimResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path.
    pub fn load_from<P: AsRef<Path>>(path: P) -> AnimResult<Self> {
        let config: AnimConfig = Figment::from(Serialized::defaults(AnimConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AnimResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(AnimError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        self.application
            .log_format
            .parse::<OutputFormat>()
            .map_err(AnimError::Configuration)?;

        if self.decode_pool.worker_threads == 0 {
            return Err(AnimError::Configuration(
                "decode_pool.worker_threads must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
