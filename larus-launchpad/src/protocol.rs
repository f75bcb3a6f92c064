//! Byte-level codec for Launchpad Mini MIDI messages

/// Note-on status (grid and right-column buttons, channel 1)
pub const NOTE_ON: u8 = 144;
/// Note-off status (grid and right-column buttons, channel 1)
pub const NOTE_OFF: u8 = 128;
/// Control change status (top row buttons, channel 1)
pub const CONTROL_CHANGE: u8 = 176;

/// Single LED update (note-on, channel 1)
pub const SET_GRID_LED: u8 = 0x90;
/// Two LEDs per message while in rapid update mode (note-on, channel 3)
pub const RAPID_LED_UPDATE: u8 = 0x92;
/// Control change used for top row LEDs and controller reset
pub const SET_CONTROL: u8 = 0xB0;

/// First top row controller number
pub const TOP_ROW_BASE: u8 = 104;

/// Number of bytes in every controller message
pub const FRAME_LEN: usize = 3;

/// A decoded 3-byte controller message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MidiFrame {
    pub status: u8,
    pub data1: u8,
    pub data2: u8,
}

impl MidiFrame {
    pub const fn new(status: u8, data1: u8, data2: u8) -> Self {
        Self {
            status,
            data1,
            data2,
        }
    }

    /// Decode a raw message
    ///
    /// Anything that is not exactly 3 bytes long is rejected. Callers treat
    /// `None` as "no match", never as a fatal error.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        match *bytes {
            [status, data1, data2] => Some(Self::new(status, data1, data2)),
            _ => None,
        }
    }

    /// Pack back into wire order
    pub fn encode(&self) -> [u8; FRAME_LEN] {
        [self.status, self.data1, self.data2]
    }

    /// Controller reset: all LEDs off, layout back to defaults
    pub const fn reset() -> Self {
        Self::new(SET_CONTROL, 0, 0)
    }

    /// Note-on or note-off carrying a key press (grid or right column)
    pub fn is_note(&self) -> bool {
        self.status == NOTE_ON || self.status == NOTE_OFF
    }

    pub fn is_control_change(&self) -> bool {
        self.status == CONTROL_CHANGE
    }

    /// Button went down
    ///
    /// The controller reports note-on with velocity 127 and CC value 127.
    /// Zero velocity is treated as a release.
    pub fn is_on(&self) -> bool {
        (self.status == NOTE_ON || self.status == CONTROL_CHANGE) && self.data2 > 0
    }

    /// Button went up
    pub fn is_off(&self) -> bool {
        self.status == NOTE_OFF
            || ((self.status == NOTE_ON || self.status == CONTROL_CHANGE) && self.data2 == 0)
    }
}

impl From<[u8; FRAME_LEN]> for MidiFrame {
    fn from(bytes: [u8; FRAME_LEN]) -> Self {
        Self::new(bytes[0], bytes[1], bytes[2])
    }
}

/// Pitch of a grid or right-column button
///
/// `x` is 0..=8 (8 = right column) and `y` is 0..8 with 0 at the bottom.
#[inline]
pub const fn grid_pitch(x: u8, y: u8) -> u8 {
    (7 - y) * 16 + x
}

/// Controller number of a top row button
#[inline]
pub const fn top_row_pitch(x: u8) -> u8 {
    TOP_ROW_BASE + x
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_exact_length() {
        let frame = MidiFrame::decode(&[144, 112, 127]).unwrap();
        assert_eq!(frame, MidiFrame::new(NOTE_ON, 112, 127));
        assert_eq!(frame.encode(), [144, 112, 127]);
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        assert!(MidiFrame::decode(&[]).is_none());
        assert!(MidiFrame::decode(&[144, 112]).is_none());
        assert!(MidiFrame::decode(&[0xF0, 0x00, 0x20, 0x29, 0xF7]).is_none());
    }

    #[test]
    fn test_on_off_classification() {
        assert!(MidiFrame::new(NOTE_ON, 0, 127).is_on());
        assert!(MidiFrame::new(NOTE_OFF, 0, 64).is_off());
        assert!(MidiFrame::new(NOTE_ON, 0, 0).is_off());
        assert!(MidiFrame::new(CONTROL_CHANGE, 108, 127).is_on());
        assert!(MidiFrame::new(CONTROL_CHANGE, 108, 0).is_off());

        // Rapid update frames are output only and never count as presses
        let rapid = MidiFrame::new(RAPID_LED_UPDATE, 12, 12);
        assert!(!rapid.is_on());
        assert!(!rapid.is_off());
    }

    #[test]
    fn test_pitch_formula() {
        // Top-left pad, bottom-left pad, bottom of right column
        assert_eq!(grid_pitch(0, 7), 0);
        assert_eq!(grid_pitch(0, 0), 112);
        assert_eq!(grid_pitch(8, 0), 120);
        assert_eq!(grid_pitch(7, 3), 71);
        assert_eq!(top_row_pitch(0), 104);
        assert_eq!(top_row_pitch(7), 111);
    }
}
