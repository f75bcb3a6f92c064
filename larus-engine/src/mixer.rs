//! 8-track mixer mode
//!
//! Mixes 4 stereo inputs down to one stereo pair and shows a level meter per
//! track on the grid. Pressing a pad in column `x` sets the gain of track `x`
//! (row A = full, row B..G in sevenths); the bottom pad (row H) toggles mute.
//! The right column does the same for every track at once.

use larus_launchpad::{
    Button, ButtonKind, Buttons, Color, ColorTable, Event, LaunchpadError, MidiFrame, Surface,
};
use tracing::debug;

use crate::error::EngineError;
use crate::meter::{Meter, Rms};
use crate::mode::{DispatchTable, Mode};
use crate::queue::OutputQueue;
use crate::{INPUT_CHANNELS, OUTPUT_CHANNELS, TRACKS};

/// How the four inputs per side are combined into one output channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DownmixMode {
    /// Mean of the inputs; output level does not depend on the input count
    #[default]
    Average,
    /// Plain sum; louder, may exceed full scale
    Sum,
}

impl DownmixMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "average" | "avg" | "mean" => Some(DownmixMode::Average),
            "sum" => Some(DownmixMode::Sum),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            DownmixMode::Average => "average",
            DownmixMode::Sum => "sum",
        }
    }

    /// Divisor applied to the per-side sum
    fn divisor(&self) -> f32 {
        match self {
            DownmixMode::Average => (INPUT_CHANNELS / OUTPUT_CHANNELS) as f32,
            DownmixMode::Sum => 1.0,
        }
    }
}

/// Mixer settings
#[derive(Debug, Clone, PartialEq)]
pub struct MixerConfig {
    /// Top row button that selects the mixer, e.g. `"5"`
    pub select: String,
    /// Gain of every track at start-up
    pub initial_level: f32,
    pub downmix: DownmixMode,
    pub meter_scale: f32,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            select: "5".to_string(),
            initial_level: 0.66,
            downmix: DownmixMode::Average,
            meter_scale: Meter::DEFAULT_SCALE,
        }
    }
}

/// Gain and mute state of every track
#[derive(Debug, Clone, PartialEq)]
pub struct MixerState {
    levels: [f32; TRACKS],
    muted: [bool; TRACKS],
}

impl MixerState {
    pub fn new(initial_level: f32) -> Self {
        Self {
            levels: [initial_level.clamp(0.0, 1.0); TRACKS],
            muted: [false; TRACKS],
        }
    }

    pub fn levels(&self) -> &[f32; TRACKS] {
        &self.levels
    }

    pub fn muted(&self) -> &[bool; TRACKS] {
        &self.muted
    }

    /// Effective gain of a track: level times 0 or 1 for mute
    #[inline]
    pub fn gain(&self, track: usize) -> f32 {
        let audible = if self.muted[track] { 0.0 } else { 1.0 };
        self.levels[track] * audible
    }

    /// Level selected by a pad in row `y`: 0 at the bottom, 1 at the top
    fn level_for_row(y: u8) -> f32 {
        (y as f32 / 7.0).clamp(0.0, 1.0)
    }

    /// Grid press: bottom row toggles mute, other rows set the level
    pub fn adjust_level(&mut self, button: Button) {
        let track = button.x() as usize;
        if track >= TRACKS {
            return;
        }
        if button.y() == 0 {
            self.muted[track] = !self.muted[track];
        } else {
            self.levels[track] = Self::level_for_row(button.y());
        }
    }

    /// Right column press: same rule applied to every track
    pub fn adjust_levels(&mut self, button: Button) {
        if button.y() == 0 {
            for muted in &mut self.muted {
                *muted = !*muted;
            }
        } else {
            self.levels.fill(Self::level_for_row(button.y()));
        }
    }
}

/// The mixer mode
pub struct Mixer {
    state: MixerState,
    dispatch: DispatchTable<MixerState>,
    select: Button,
    downmix: DownmixMode,
    meter: Meter,
    colors: ColorTable,
    surface: Surface,
}

impl Mixer {
    /// Shown on the select button while the mixer is active
    pub const ACTIVE_COLOR: Color = Color::FULL_GREEN;

    pub fn new(config: &MixerConfig) -> Result<Self, EngineError> {
        let select: Button = config.select.parse()?;
        if select.kind() != ButtonKind::TopRow {
            return Err(LaunchpadError::InvalidButton(config.select.clone()).into());
        }
        if !(0.0..=1.0).contains(&config.initial_level) {
            return Err(EngineError::InvalidLevel(config.initial_level));
        }
        if !(config.meter_scale > 0.0 && config.meter_scale.is_finite()) {
            return Err(EngineError::InvalidScale(config.meter_scale));
        }

        let dispatch = DispatchTable::new()
            .bind(Event::press(Buttons::grid()), MixerState::adjust_level)
            .bind(Event::press(Buttons::column()), MixerState::adjust_levels);

        debug!(
            select = %select,
            initial_level = config.initial_level,
            downmix = config.downmix.display_name(),
            meter_scale = config.meter_scale,
            "mixer mode created"
        );

        Ok(Self {
            state: MixerState::new(config.initial_level),
            dispatch,
            select,
            downmix: config.downmix,
            meter: Meter::new(config.meter_scale),
            colors: ColorTable::meter(),
            surface: Surface::new(),
        })
    }

    pub fn state(&self) -> &MixerState {
        &self.state
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn downmix(&self) -> DownmixMode {
        self.downmix
    }

    /// Mix one block and update the surface; returns per-track and master RMS
    fn mix(&mut self, input: &[f32], output: &mut [f32]) -> ([f32; TRACKS], f32) {
        let frames = (input.len() / INPUT_CHANNELS).min(output.len() / OUTPUT_CHANNELS);
        let gains: [f32; INPUT_CHANNELS] = std::array::from_fn(|ch| self.state.gain(ch / 2));
        let divisor = self.downmix.divisor();

        let mut tracks = [Rms::default(); TRACKS];
        let mut master = Rms::default();

        for (frame_in, frame_out) in input
            .chunks_exact(INPUT_CHANNELS)
            .zip(output.chunks_exact_mut(OUTPUT_CHANNELS))
        {
            let mut left = 0.0;
            let mut right = 0.0;
            for (ch, sample) in frame_in.iter().enumerate() {
                let adjusted = sample * gains[ch];
                tracks[ch / 2].add(adjusted);
                if ch % 2 == 0 {
                    left += adjusted;
                } else {
                    right += adjusted;
                }
            }
            frame_out[0] = left / divisor;
            frame_out[1] = right / divisor;
            master.add(frame_out[0]);
            master.add(frame_out[1]);
        }
        output[frames * OUTPUT_CHANNELS..].fill(0.0);

        (std::array::from_fn(|t| tracks[t].value()), master.value())
    }

    fn update_surface(&mut self, tracks: &[f32; TRACKS], master: f32) {
        for (x, amplitude) in tracks.iter().enumerate() {
            for (y, value) in self.meter.bar(*amplitude).into_iter().enumerate() {
                self.surface.set_grid(x, y, value);
            }
        }
        for (y, value) in self.meter.bar(master).into_iter().enumerate() {
            self.surface.set_column(y, value);
        }
    }

    fn queue_lighting(&self, queue: &mut OutputQueue) {
        let mut colors = self.surface.colors(&self.colors);
        for (track, muted) in self.state.muted.iter().enumerate() {
            if *muted {
                if let Some(cell) = Button::grid(track as u8, 0) {
                    colors.set(&cell, Color::MUTED);
                }
            }
        }
        colors.set(&self.select, Self::ACTIVE_COLOR);
        queue.extend(colors.rapid_update());
    }
}

impl Mode for Mixer {
    fn name(&self) -> &'static str {
        "mixer"
    }

    fn select(&self) -> Button {
        self.select
    }

    fn handle_frame(&mut self, frame: &MidiFrame) -> usize {
        self.dispatch.dispatch(frame, &mut self.state)
    }

    fn process_audio(&mut self, input: &[f32], output: &mut [f32], queue: &mut OutputQueue) {
        let (tracks, master) = self.mix(input, output);
        self.update_surface(&tracks, master);
        self.queue_lighting(queue);
    }

    fn on_activate(&mut self, _queue: &mut OutputQueue) {
        self.dispatch.reset();
        self.surface.clear();
    }
}
