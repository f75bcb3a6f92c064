//! Errors raised while building the engine and its modes

use larus_launchpad::LaunchpadError;
use thiserror::Error;

/// Construction-time errors; nothing in the per-block path returns these
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("output queue capacity must be at least 1")]
    InvalidCapacity,
    #[error("initial level {0} is outside 0..=1")]
    InvalidLevel(f32),
    #[error("meter scale must be a positive number, got {0}")]
    InvalidScale(f32),
    #[error("mode {index} does not exist ({count} modes)")]
    NoSuchMode { index: usize, count: usize },
    #[error(transparent)]
    Launchpad(#[from] LaunchpadError),
}
