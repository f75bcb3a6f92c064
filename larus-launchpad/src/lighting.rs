//! LED surface and the rapid update protocol
//!
//! In rapid update mode the Mini takes two LED codes per message, so all 80
//! LEDs are refreshed with 40 messages. The order is fixed by the firmware:
//! the 64 grid pads from the top-left corner row by row, then the right
//! column from A to H, then the top row from 1 to 8.
//!
//! The controller stays in rapid update mode until it sees a message with a
//! regular status; until then every single-LED write is misread. Each refresh
//! therefore ends with one plain grid LED write.

use crate::button::{Button, ButtonKind, BUTTON_COUNT};
use crate::color::{Color, ColorTable};
use crate::protocol::{MidiFrame, RAPID_LED_UPDATE, SET_CONTROL, SET_GRID_LED};

/// Messages per full refresh: 40 pairs plus the exit frame
pub const RAPID_UPDATE_LEN: usize = BUTTON_COUNT / 2 + 1;

/// A message bound for the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedMessage {
    /// Pre-encoded frame, sent as is
    Raw(MidiFrame),
    /// Light a single button with the regular (non rapid) status
    SetLed { button: Button, color: Color },
    /// Turn every LED off and reset the controller
    Reset,
}

impl LedMessage {
    pub fn encode(&self) -> MidiFrame {
        match *self {
            LedMessage::Raw(frame) => frame,
            LedMessage::SetLed { button, color } => {
                let status = match button.kind() {
                    ButtonKind::TopRow => SET_CONTROL,
                    ButtonKind::Grid | ButtonKind::Column => SET_GRID_LED,
                };
                MidiFrame::new(status, button.pitch(), color.code())
            }
            LedMessage::Reset => MidiFrame::reset(),
        }
    }
}

/// Brightness of every LED, each value kept within 0..=1
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    /// `grid[y][x]`, row 0 at the bottom
    grid: [[f32; 8]; 8],
    /// Right column by `y`, 0 at the bottom (H)
    column: [f32; 8],
    /// Top row by `x`
    row: [f32; 8],
}

impl Default for Surface {
    fn default() -> Self {
        Self {
            grid: [[0.0; 8]; 8],
            column: [0.0; 8],
            row: [0.0; 8],
        }
    }
}

/// Clamp to 0..=1, NaN becomes 0
#[inline]
fn unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

impl Surface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn grid(&self, x: usize, y: usize) -> f32 {
        self.grid[y][x]
    }

    pub fn set_grid(&mut self, x: usize, y: usize, value: f32) {
        self.grid[y][x] = unit(value);
    }

    pub fn column(&self, y: usize) -> f32 {
        self.column[y]
    }

    pub fn set_column(&mut self, y: usize, value: f32) {
        self.column[y] = unit(value);
    }

    pub fn row(&self, x: usize) -> f32 {
        self.row[x]
    }

    pub fn set_row(&mut self, x: usize, value: f32) {
        self.row[x] = unit(value);
    }

    /// Every stored value, in no particular order
    pub fn values(&self) -> impl Iterator<Item = f32> + '_ {
        self.grid
            .iter()
            .flatten()
            .chain(self.column.iter())
            .chain(self.row.iter())
            .copied()
    }

    /// Quantize the whole surface into rapid update order
    pub fn colors(&self, table: &ColorTable) -> LedColors {
        let mut colors = LedColors::default();
        for y in (0..8).rev() {
            for x in 0..8 {
                colors.codes[rapid_index_grid(x, y)] = table.quantize(self.grid[y][x]);
            }
        }
        for y in 0..8 {
            colors.codes[64 + (7 - y)] = table.quantize(self.column[y]);
        }
        for x in 0..8 {
            colors.codes[72 + x] = table.quantize(self.row[x]);
        }
        colors
    }
}

#[inline]
fn rapid_index_grid(x: usize, y: usize) -> usize {
    (7 - y) * 8 + x
}

/// Position of a button in rapid update order
pub fn rapid_index(button: &Button) -> usize {
    let (x, y) = (button.x() as usize, button.y() as usize);
    match button.kind() {
        ButtonKind::Grid => rapid_index_grid(x, y),
        ButtonKind::Column => 64 + (7 - y),
        ButtonKind::TopRow => 72 + x,
    }
}

/// Quantized colors for all 80 LEDs in rapid update order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedColors {
    codes: [Color; BUTTON_COUNT],
}

impl Default for LedColors {
    fn default() -> Self {
        Self {
            codes: [Color::OFF; BUTTON_COUNT],
        }
    }
}

impl LedColors {
    pub fn get(&self, button: &Button) -> Color {
        self.codes[rapid_index(button)]
    }

    /// Override one LED after quantization
    pub fn set(&mut self, button: &Button, color: Color) {
        self.codes[rapid_index(button)] = color;
    }

    pub fn as_slice(&self) -> &[Color] {
        &self.codes
    }

    /// Messages for a full refresh: 40 paired frames and the exit frame
    pub fn rapid_update(&self) -> impl Iterator<Item = LedMessage> + '_ {
        let pairs = self.codes.chunks_exact(2).map(|pair| {
            LedMessage::Raw(MidiFrame::new(
                RAPID_LED_UPDATE,
                pair[0].code(),
                pair[1].code(),
            ))
        });

        // Re-send the top-left pad with the regular status to leave rapid mode
        let top_left = Button::grid(0, 7).map(|button| LedMessage::SetLed {
            button,
            color: self.codes[0],
        });

        pairs.chain(top_left)
    }
}
