//! Buttons on the Launchpad Mini and composite button targets
//!
//! Coordinates follow the physical layout:
//! - `x` 0..8 is the grid column (or top row index), 8 marks the right column
//! - `y` 0..8 is the grid row with 0 at the bottom, 8 marks the top row
//!
//! Buttons are written the way they are labelled on the hardware:
//! `"3H"` is grid column 3, row H; `"5"` is top row button 5;
//! `"B"` is right-column button B. Row A is at the top, row H at the bottom.

use std::fmt;
use std::str::FromStr;

use crate::error::LaunchpadError;
use crate::protocol::{grid_pitch, top_row_pitch, MidiFrame, NOTE_OFF, TOP_ROW_BASE};

/// Coordinate value meaning "not applicable"
pub const SENTINEL: u8 = 8;

/// Number of addressable buttons (64 grid + 8 column + 8 top row)
pub const BUTTON_COUNT: usize = 80;

/// Which part of the controller a button lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonKind {
    Grid,
    Column,
    TopRow,
}

/// A single physical button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Button {
    x: u8,
    y: u8,
}

impl Button {
    const fn at(x: u8, y: u8) -> Self {
        Self { x, y }
    }

    /// Build a button from raw coordinates, rejecting out-of-range values
    pub fn new(x: u8, y: u8) -> Option<Self> {
        if x > SENTINEL || y > SENTINEL || (x == SENTINEL && y == SENTINEL) {
            return None;
        }
        Some(Self::at(x, y))
    }

    /// Grid pad, `x` and `y` in 0..8
    pub fn grid(x: u8, y: u8) -> Option<Self> {
        (x < SENTINEL && y < SENTINEL).then(|| Self::at(x, y))
    }

    /// Right-column button, `y` in 0..8 (0 = H, bottom)
    pub fn column(y: u8) -> Option<Self> {
        (y < SENTINEL).then(|| Self::at(SENTINEL, y))
    }

    /// Top row button, `x` in 0..8 (0 = button 1)
    pub fn top(x: u8) -> Option<Self> {
        (x < SENTINEL).then(|| Self::at(x, SENTINEL))
    }

    pub fn x(&self) -> u8 {
        self.x
    }

    pub fn y(&self) -> u8 {
        self.y
    }

    pub fn kind(&self) -> ButtonKind {
        if self.y == SENTINEL {
            ButtonKind::TopRow
        } else if self.x == SENTINEL {
            ButtonKind::Column
        } else {
            ButtonKind::Grid
        }
    }

    /// Wire code used to match this button
    pub fn pitch(&self) -> u8 {
        match self.kind() {
            ButtonKind::TopRow => top_row_pitch(self.x),
            ButtonKind::Grid | ButtonKind::Column => grid_pitch(self.x, self.y),
        }
    }

    /// Dense index in 0..BUTTON_COUNT
    ///
    /// Grid pads come first (row-major from the bottom), then the right
    /// column, then the top row.
    pub fn index(&self) -> usize {
        match self.kind() {
            ButtonKind::Grid => self.y as usize * 8 + self.x as usize,
            ButtonKind::Column => 64 + self.y as usize,
            ButtonKind::TopRow => 72 + self.x as usize,
        }
    }

    /// Resolve the button a frame refers to
    ///
    /// Control changes address the top row, notes address the grid and the
    /// right column. Frames outside both ranges resolve to nothing.
    pub fn from_frame(frame: &MidiFrame) -> Option<Self> {
        let pitch = frame.data1;
        if frame.is_control_change() {
            return pitch
                .checked_sub(TOP_ROW_BASE)
                .and_then(Self::top);
        }
        if frame.is_note() && pitch < 128 {
            let x = pitch % 16;
            let row = pitch / 16;
            if x <= SENTINEL {
                return Self::new(x, 7 - row);
            }
        }
        None
    }

    /// Status family the controller uses for this button
    fn in_family(&self, frame: &MidiFrame) -> bool {
        match self.kind() {
            ButtonKind::TopRow => frame.is_control_change(),
            ButtonKind::Grid | ButtonKind::Column => frame.is_note(),
        }
    }

    /// Frame is a press aimed at this button
    ///
    /// True iff the pitch matches and the status is the button's on-status
    /// (note-on for grid/column, control change for the top row).
    pub fn matches(&self, frame: &MidiFrame) -> bool {
        self.in_family(frame) && frame.status != NOTE_OFF && frame.data1 == self.pitch()
    }

    /// Frame switches this button on
    pub fn note_on(&self, frame: &MidiFrame) -> bool {
        self.matches(frame) && frame.is_on()
    }

    /// Frame switches this button off
    pub fn note_off(&self, frame: &MidiFrame) -> bool {
        self.in_family(frame) && frame.data1 == self.pitch() && frame.is_off()
    }
}

impl FromStr for Button {
    type Err = LaunchpadError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let invalid = || LaunchpadError::InvalidButton(spec.to_string());

        let mut chars = spec.trim().chars();
        let button = match (chars.next(), chars.next(), chars.next()) {
            (Some(digit), None, None) if digit.is_ascii_digit() => {
                Self::top(digit_index(digit).ok_or_else(invalid)?)
            }
            (Some(letter), None, None) => Self::column(letter_row(letter).ok_or_else(invalid)?),
            (Some(digit), Some(letter), None) => Self::grid(
                digit_index(digit).ok_or_else(invalid)?,
                letter_row(letter).ok_or_else(invalid)?,
            ),
            _ => None,
        };
        button.ok_or_else(invalid)
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digit = |x: u8| char::from(b'1' + x);
        let letter = |y: u8| char::from(b'A' + (7 - y));
        match self.kind() {
            ButtonKind::TopRow => write!(f, "{}", digit(self.x)),
            ButtonKind::Column => write!(f, "{}", letter(self.y)),
            ButtonKind::Grid => write!(f, "{}{}", digit(self.x), letter(self.y)),
        }
    }
}

/// Map '1'..='8' to 0..8
fn digit_index(c: char) -> Option<u8> {
    match c {
        '1'..='8' => Some(c as u8 - b'1'),
        _ => None,
    }
}

/// Map 'A'..='H' to rows 7..=0
fn letter_row(c: char) -> Option<u8> {
    match c.to_ascii_uppercase() {
        l @ 'A'..='H' => Some(7 - (l as u8 - b'A')),
        _ => None,
    }
}

/// A composite target: any of a fixed set of buttons
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buttons {
    buttons: Vec<Button>,
}

impl Buttons {
    pub fn from_buttons(buttons: impl IntoIterator<Item = Button>) -> Self {
        Self {
            buttons: buttons.into_iter().collect(),
        }
    }

    /// All 64 grid pads
    pub fn grid() -> Self {
        Self::from_buttons((0..8).flat_map(|y| (0..8).map(move |x| Button::at(x, y))))
    }

    /// The 8 right-column buttons
    pub fn column() -> Self {
        Self::from_buttons((0..8).map(|y| Button::at(SENTINEL, y)))
    }

    /// The 8 top row buttons
    pub fn row() -> Self {
        Self::from_buttons((0..8).map(|x| Button::at(x, SENTINEL)))
    }

    /// Parse a list of button specs separated by whitespace or commas
    pub fn parse(list: &str) -> Result<Self, LaunchpadError> {
        let buttons = list
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|spec| !spec.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<Button>, _>>()?;
        if buttons.is_empty() {
            return Err(LaunchpadError::InvalidButton(list.to_string()));
        }
        Ok(Self { buttons })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Button> {
        self.buttons.iter()
    }

    pub fn len(&self) -> usize {
        self.buttons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buttons.is_empty()
    }

    pub fn contains(&self, button: &Button) -> bool {
        self.buttons.contains(button)
    }

    /// Any constituent button matches the frame
    pub fn matches(&self, frame: &MidiFrame) -> bool {
        self.buttons.iter().any(|b| b.matches(frame))
    }

    /// The specific button a frame matched
    ///
    /// Callers are expected to check [`Buttons::matches`] first.
    pub fn get_event(&self, frame: &MidiFrame) -> Result<Button, LaunchpadError> {
        self.buttons
            .iter()
            .copied()
            .find(|b| b.matches(frame))
            .ok_or(LaunchpadError::NoMatch {
                status: frame.status,
                data1: frame.data1,
                data2: frame.data2,
            })
    }

    /// Button switched on by this frame, if it belongs to the target
    pub fn note_on(&self, frame: &MidiFrame) -> Option<Button> {
        self.buttons.iter().copied().find(|b| b.note_on(frame))
    }

    /// Button switched off by this frame, if it belongs to the target
    pub fn note_off(&self, frame: &MidiFrame) -> Option<Button> {
        self.buttons.iter().copied().find(|b| b.note_off(frame))
    }
}

impl From<Button> for Buttons {
    fn from(button: Button) -> Self {
        Self {
            buttons: vec![button],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{CONTROL_CHANGE, NOTE_ON};

    fn all_buttons() -> impl Iterator<Item = Button> {
        Buttons::grid()
            .buttons
            .into_iter()
            .chain(Buttons::column().buttons)
            .chain(Buttons::row().buttons)
    }

    #[test]
    fn test_parse_specs() {
        let grid: Button = "3H".parse().unwrap();
        assert_eq!((grid.x(), grid.y()), (2, 0));
        assert_eq!(grid.kind(), ButtonKind::Grid);

        let top: Button = "5".parse().unwrap();
        assert_eq!((top.x(), top.y()), (4, SENTINEL));
        assert_eq!(top.kind(), ButtonKind::TopRow);

        let column: Button = "B".parse().unwrap();
        assert_eq!((column.x(), column.y()), (SENTINEL, 6));
        assert_eq!(column.kind(), ButtonKind::Column);

        let lower: Button = "1a".parse().unwrap();
        assert_eq!((lower.x(), lower.y()), (0, 7));
    }

    #[test]
    fn test_parse_rejects_invalid_specs() {
        for spec in ["", "0", "9", "I", "9A", "1I", "A1", "1AA", "?"] {
            assert_eq!(
                spec.parse::<Button>(),
                Err(LaunchpadError::InvalidButton(spec.to_string())),
                "spec {:?} should be rejected",
                spec
            );
        }
    }

    #[test]
    fn test_display_round_trip() {
        for button in all_buttons() {
            let spec = button.to_string();
            assert_eq!(spec.parse::<Button>().unwrap(), button, "spec {}", spec);
        }
    }

    #[test]
    fn test_pitch_round_trip() {
        for button in all_buttons() {
            let status = match button.kind() {
                ButtonKind::TopRow => CONTROL_CHANGE,
                _ => NOTE_ON,
            };
            let frame = MidiFrame::decode(&MidiFrame::new(status, button.pitch(), 127).encode())
                .unwrap();
            assert_eq!(Button::from_frame(&frame), Some(button));
        }
    }

    #[test]
    fn test_indices_are_unique() {
        let mut seen = [false; BUTTON_COUNT];
        for button in all_buttons() {
            assert!(!seen[button.index()], "duplicate index for {}", button);
            seen[button.index()] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn test_from_frame_out_of_range() {
        assert_eq!(Button::from_frame(&MidiFrame::new(CONTROL_CHANGE, 103, 127)), None);
        assert_eq!(Button::from_frame(&MidiFrame::new(CONTROL_CHANGE, 112, 127)), None);
        // Column index 9..15 does not exist on the Mini
        assert_eq!(Button::from_frame(&MidiFrame::new(NOTE_ON, 9, 127)), None);
        assert_eq!(Button::from_frame(&MidiFrame::new(NOTE_ON, 200, 127)), None);
        assert_eq!(Button::from_frame(&MidiFrame::new(0x92, 0, 127)), None);
    }

    #[test]
    fn test_column_g_does_not_alias_top_row_one() {
        let column_g: Button = "G".parse().unwrap();
        let top_one: Button = "1".parse().unwrap();
        assert_eq!(column_g.pitch(), top_one.pitch());

        let note = MidiFrame::new(NOTE_ON, 104, 127);
        let cc = MidiFrame::new(CONTROL_CHANGE, 104, 127);
        assert!(column_g.matches(&note));
        assert!(!column_g.matches(&cc));
        assert!(top_one.matches(&cc));
        assert!(!top_one.matches(&note));
    }

    #[test]
    fn test_on_off_membership() {
        let pad: Button = "1H".parse().unwrap();
        assert!(pad.note_on(&MidiFrame::new(NOTE_ON, 112, 127)));
        assert!(pad.note_off(&MidiFrame::new(NOTE_OFF, 112, 64)));
        assert!(pad.note_off(&MidiFrame::new(NOTE_ON, 112, 0)));
        assert!(!pad.note_on(&MidiFrame::new(NOTE_OFF, 112, 64)));
        assert!(!pad.matches(&MidiFrame::new(NOTE_OFF, 112, 64)));
    }

    #[test]
    fn test_buttons_get_event() {
        let column = Buttons::column();
        let frame = MidiFrame::new(NOTE_ON, 120, 127);
        assert!(column.matches(&frame));
        assert_eq!(column.get_event(&frame).unwrap(), "H".parse().unwrap());

        let miss = MidiFrame::new(NOTE_ON, 0, 127);
        assert!(!column.matches(&miss));
        assert_eq!(
            column.get_event(&miss),
            Err(LaunchpadError::NoMatch {
                status: NOTE_ON,
                data1: 0,
                data2: 127,
            })
        );
    }

    #[test]
    fn test_buttons_parse_list() {
        let buttons = Buttons::parse("1A, 2A 5 H").unwrap();
        assert_eq!(buttons.len(), 4);
        assert!(buttons.contains(&"5".parse().unwrap()));
        assert!(Buttons::parse("1A, Z9").is_err());
        assert!(Buttons::parse("  ").is_err());
    }

    #[test]
    fn test_composite_sizes() {
        assert_eq!(Buttons::grid().len(), 64);
        assert_eq!(Buttons::column().len(), 8);
        assert_eq!(Buttons::row().len(), 8);
    }
}
