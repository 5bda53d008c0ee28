//! Custom error types for the crate.
//!
//! This module defines `AnimError`, the single error type returned by the
//! fallible parts of the library. Using the `thiserror` crate, it gives a
//! consistent way to report configuration, decoder and scheduling problems.
//!
//! ## Error Hierarchy
//!
//! - **`Config`**: Wraps errors from `figment` while loading or extracting the
//!   configuration (missing keys, wrong types, unreadable TOML).
//! - **`Configuration`**: Semantic errors found by `AnimConfig::validate`, such as an
//!   unknown log level.
//! - **`Decode`**: A decoder could not be constructed or failed outright.
//! - **`Redecode`**: A decoder could not be recreated to regenerate frames that were
//!   discarded. The provider records this as a sticky condition.
//! - **`Scheduler`**: The decode worker pool could not be built.
//! - **`Tracing`**: The tracing subscriber could not be installed.
//!
//! Note that the per-frame path (insert, advance, get) never returns
//! `AnimError`: it reports through `bool` and `Option` so the display loop
//! can always fall back to waiting for the decoder.

use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type AnimResult<T> = std::result::Result<T, AnimError>;

/// Errors raised by configuration, decoder management and setup code.
#[derive(Error, Debug)]
pub enum AnimError {
    /// Figment failed to load or extract configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Configuration parsed but holds an invalid value.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// Decoder construction or decoding failed.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Decoder recreation for a new pass failed.
    #[error("Redecode error: {0}")]
    Redecode(String),

    /// Decode worker pool could not be created.
    #[error("Decode scheduler error: {0}")]
    Scheduler(String),

    /// Tracing subscriber could not be installed.
    #[error("Tracing initialization error: {0}")]
    Tracing(String),
}

impl From<figment::Error> for AnimError {
    fn from(value: figment::Error) -> Self {
        AnimError::Config(Box::new(value))
    }
}

impl AnimError {
    /// Whether the caller can keep the animation running after this error.
    ///
    /// Decode and redecode failures leave the already buffered frames usable,
    /// so playback degrades instead of stopping.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, AnimError::Decode(_) | AnimError::Redecode(_))
    }
}
