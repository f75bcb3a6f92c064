//! Real-time engine for Larus - modes, mixer, and controller output
//!
//! This crate provides the per-block pipeline run inside the audio callback:
//! - Engine: routes controller frames to the active mode, runs its audio
//! - Mode: per-instance dispatch tables and the mode trait
//! - Mixer: 4 stereo inputs to 1 stereo output with gain, mute and meters
//! - Queue: bounded drop-oldest queue of controller messages

mod engine;
mod error;
mod meter;
mod mixer;
mod mode;
mod queue;

pub use engine::{ActiveMode, Engine, EngineConfig, EngineStats, StatsSnapshot};
pub use error::EngineError;
pub use meter::{Meter, Rms, METER_STEPS};
pub use mixer::{DownmixMode, Mixer, MixerConfig, MixerState};
pub use mode::{DispatchTable, Handler, Mode};
pub use queue::{ControllerSink, OutputQueue};

/// Interleaved input channels per frame (4 stereo pairs)
pub const INPUT_CHANNELS: usize = 8;

/// Interleaved output channels per frame
pub const OUTPUT_CHANNELS: usize = 2;

/// Gain/mute slots; one per grid column
pub const TRACKS: usize = 8;
