//! Launchpad Mini protocol for Larus
//!
//! - Protocol: 3-byte frame codec and pitch math
//! - Buttons: physical buttons, textual specs, composite targets
//! - Events: press/release matching over raw frames
//! - Color / Lighting: palette, brightness quantization, rapid LED updates

mod button;
mod color;
mod error;
mod event;
mod lighting;
pub mod protocol;

pub use button::{Button, ButtonKind, Buttons, BUTTON_COUNT, SENTINEL};
pub use color::{Color, ColorTable};
pub use error::LaunchpadError;
pub use event::{Event, Press};
pub use lighting::{rapid_index, LedColors, LedMessage, Surface, RAPID_UPDATE_LEN};
pub use protocol::MidiFrame;
