//! Errors raised while building controller objects

use thiserror::Error;

/// Errors that can occur while setting up buttons, targets and color tables
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LaunchpadError {
    #[error("invalid button spec {0:?}")]
    InvalidButton(String),
    #[error("no button matches frame ({status}, {data1}, {data2})")]
    NoMatch { status: u8, data1: u8, data2: u8 },
    #[error("color thresholds must be strictly increasing within 0..=1")]
    InvalidThresholds,
}
