//! Subscriber setup for hosts without a tracing stack of their own.
//!
//! The library itself only emits `tracing` events: decode runs are wrapped in
//! a `decode_run` span carrying the image id and frame size, queue mode
//! changes log at `debug`, resets at `info` and redecode failures at `error`.
//! Per-frame inserts and evictions log at `trace`.
//!
//! `RUST_LOG` takes precedence over the configured level, so a single module
//! can be turned up without editing the configuration:
//!
//! ```text
//! RUST_LOG=anim_frames::queue=trace anim_frames --frames 40
//! ```
//!
//! # Example
//! ```no_run
//! use anim_frames::{config::AnimConfig, tracing_init};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AnimConfig::load()?;
//! tracing_init::init_from_config(&config)?;
//! # Ok(())
//! # }
//! ```

use crate::config::AnimConfig;
use crate::error::{AnimError, AnimResult};
use std::str::FromStr;
use tracing::{Level, Subscriber};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, registry::LookupSpan,
    util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

/// Log line layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// One line per event, no colors
    #[default]
    Compact,
    /// Multi-line, colored; for reading decode runs by eye
    Pretty,
    /// One JSON object per event
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!(
                "Invalid log_format '{}'. Must be one of: compact, pretty, json",
                other
            )),
        }
    }
}

/// Subscriber options.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Default level when `RUST_LOG` is unset
    pub level: Level,
    /// Line layout
    pub format: OutputFormat,
    /// Log span open/close, which times every decode run
    pub with_span_events: bool,
    /// Include worker thread names (`anim-decode-*`)
    pub with_thread_names: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: OutputFormat::default(),
            with_span_events: false,
            with_thread_names: true,
        }
    }
}

impl TracingConfig {
    /// Options for `level` with defaults otherwise.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// Options from the `[application]` section.
    pub fn from_config(config: &AnimConfig) -> AnimResult<Self> {
        let level = parse_log_level(&config.application.log_level)?;
        let format = config
            .application
            .log_format
            .parse()
            .map_err(AnimError::Configuration)?;

        Ok(Self {
            level,
            format,
            ..Default::default()
        })
    }

    /// Set the line layout.
    #[must_use]
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Enable or disable span open/close events.
    #[must_use]
    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.with_span_events = enabled;
        self
    }

    fn fmt_layer<S>(&self) -> Box<dyn Layer<S> + Send + Sync>
    where
        S: Subscriber + for<'a> LookupSpan<'a> + 'static,
    {
        let span_events = if self.with_span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };
        let layer = tracing_subscriber::fmt::layer()
            .with_span_events(span_events)
            .with_thread_names(self.with_thread_names);

        match self.format {
            OutputFormat::Compact => layer.compact().with_ansi(false).boxed(),
            OutputFormat::Pretty => layer.pretty().boxed(),
            OutputFormat::Json => layer.json().boxed(),
        }
    }
}

/// Install the global subscriber described by the configuration.
pub fn init_from_config(config: &AnimConfig) -> AnimResult<()> {
    init(TracingConfig::from_config(config)?)
}

/// Install the global subscriber.
///
/// Returns `Ok(())` without changes if a subscriber is already installed, so
/// hosts and tests may call it more than once.
pub fn init(config: TracingConfig) -> AnimResult<()> {
    if tracing::dispatcher::has_been_set() {
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str().to_lowercase()));

    tracing_subscriber::registry()
        .with(config.fmt_layer::<Registry>().with_filter(filter))
        .try_init()
        .or_else(|err| {
            // Lost a race with another initializer.
            if tracing::dispatcher::has_been_set() {
                Ok(())
            } else {
                Err(AnimError::Tracing(format!(
                    "Failed to initialize tracing: {}",
                    err
                )))
            }
        })
}

fn parse_log_level(level: &str) -> AnimResult<Level> {
    Level::from_str(level).map_err(|_| {
        AnimError::Configuration(format!(
            "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
            level
        ))
    })
}
