//! Launchpad Mini LED palette and brightness quantization
//!
//! The Mini encodes a color as `16 * green + red + 12`, with each component
//! in 0..=3. The `+ 12` sets the "clear" and "copy" flags so a code written
//! while in double-buffer mode lands in both buffers.

use crate::error::LaunchpadError;

/// A palette color, stored as its wire code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color(u8);

impl Color {
    pub const OFF: Color = Color(12);
    pub const LOW_RED: Color = Color(13);
    pub const FULL_RED: Color = Color(15);
    pub const LOW_AMBER: Color = Color(29);
    pub const FULL_AMBER: Color = Color(63);
    pub const LOW_YELLOW: Color = Color(45);
    pub const FULL_YELLOW: Color = Color(62);
    pub const LOW_GREEN: Color = Color(28);
    pub const FULL_GREEN: Color = Color(60);

    /// Shown on the mute cell of a muted track; never produced by the meter
    pub const MUTED: Color = Color::LOW_YELLOW;

    /// Build a color from red and green brightness (each clamped to 0..=3)
    pub fn from_components(red: u8, green: u8) -> Self {
        Color(16 * green.min(3) + red.min(3) + 12)
    }

    pub fn code(&self) -> u8 {
        self.0
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::OFF
    }
}

/// Ordered `(threshold, color)` pairs used to quantize a brightness in 0..=1
#[derive(Debug, Clone, PartialEq)]
pub struct ColorTable {
    steps: Vec<(f32, Color)>,
}

impl ColorTable {
    /// Build a table; thresholds must be strictly increasing within 0..=1
    pub fn new(steps: Vec<(f32, Color)>) -> Result<Self, LaunchpadError> {
        let in_range = steps.iter().all(|(t, _)| (0.0..=1.0).contains(t));
        let increasing = steps.windows(2).all(|w| w[0].0 < w[1].0);
        if steps.is_empty() || !in_range || !increasing {
            return Err(LaunchpadError::InvalidThresholds);
        }
        Ok(Self { steps })
    }

    /// Green at the bottom through amber to red at the top, one step per
    /// eighth of the range
    pub fn meter() -> Self {
        Self {
            steps: vec![
                (1.0 / 8.0, Color::LOW_GREEN),
                (2.0 / 8.0, Color::FULL_GREEN),
                (3.0 / 8.0, Color::FULL_YELLOW),
                (4.0 / 8.0, Color::LOW_AMBER),
                (5.0 / 8.0, Color::FULL_AMBER),
                (6.0 / 8.0, Color::LOW_RED),
                (7.0 / 8.0, Color::FULL_RED),
            ],
        }
    }

    /// Color of the highest step whose threshold is <= `value`
    ///
    /// Values below the first threshold (and NaN) are off.
    pub fn quantize(&self, value: f32) -> Color {
        self.steps
            .iter()
            .take_while(|(threshold, _)| *threshold <= value)
            .last()
            .map(|(_, color)| *color)
            .unwrap_or(Color::OFF)
    }

    pub fn steps(&self) -> &[(f32, Color)] {
        &self.steps
    }
}

impl Default for ColorTable {
    fn default() -> Self {
        Self::meter()
    }
}
