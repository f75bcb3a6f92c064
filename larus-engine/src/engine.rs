//! Per-block dispatch loop - routes controller frames and audio to the active mode

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use larus_launchpad::{LedMessage, MidiFrame, Press};
use tracing::info;

use crate::error::EngineError;
use crate::mode::Mode;
use crate::queue::{ControllerSink, OutputQueue};

/// Which mode receives frames and audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActiveMode {
    #[default]
    Inactive,
    Active(usize),
}

/// Engine settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub queue_capacity: usize,
    /// Activate the first mode at construction
    pub start_active: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: OutputQueue::DEFAULT_CAPACITY,
            start_active: false,
        }
    }
}

/// Counters shared with the control thread
#[derive(Debug, Default)]
pub struct EngineStats {
    blocks: AtomicU64,
    handled: AtomicU64,
    activations: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time copy of [`EngineStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub blocks: u64,
    pub handled: u64,
    pub activations: u64,
    pub dropped: u64,
}

impl EngineStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            blocks: self.blocks.load(Ordering::Relaxed),
            handled: self.handled.load(Ordering::Relaxed),
            activations: self.activations.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Owns the modes, their select buttons and the controller output queue
///
/// Everything reachable from [`Engine::process`] is sized in [`Engine::new`],
/// so the engine can live inside an audio callback.
pub struct Engine {
    modes: Vec<Box<dyn Mode>>,
    selectors: Vec<Press>,
    active: ActiveMode,
    queue: OutputQueue,
    stats: Arc<EngineStats>,
}

impl Engine {
    pub fn new(config: &EngineConfig, modes: Vec<Box<dyn Mode>>) -> Result<Self, EngineError> {
        let queue = OutputQueue::new(config.queue_capacity)?;
        let selectors = modes.iter().map(|mode| Press::new(mode.select())).collect();

        info!(
            modes = modes.len(),
            queue_capacity = queue.capacity(),
            "engine created"
        );
        for mode in &modes {
            info!(mode = mode.name(), select = %mode.select(), "mode registered");
        }

        let mut engine = Self {
            modes,
            selectors,
            active: ActiveMode::Inactive,
            queue,
            stats: Arc::new(EngineStats::default()),
        };
        if config.start_active && !engine.modes.is_empty() {
            engine.activate(0)?;
        }
        Ok(engine)
    }

    pub fn active(&self) -> ActiveMode {
        self.active
    }

    pub fn active_mode(&self) -> Option<&dyn Mode> {
        match self.active {
            ActiveMode::Active(index) => self.modes.get(index).map(|mode| mode.as_ref()),
            ActiveMode::Inactive => None,
        }
    }

    pub fn modes(&self) -> impl Iterator<Item = &dyn Mode> {
        self.modes.iter().map(|mode| mode.as_ref())
    }

    pub fn stats(&self) -> Arc<EngineStats> {
        Arc::clone(&self.stats)
    }

    pub fn queue(&self) -> &OutputQueue {
        &self.queue
    }

    /// Make mode `index` active; returns `false` if it already was
    pub fn activate(&mut self, index: usize) -> Result<bool, EngineError> {
        if index >= self.modes.len() {
            return Err(EngineError::NoSuchMode {
                index,
                count: self.modes.len(),
            });
        }
        let changed = self.switch_to(index);
        if changed {
            info!(mode = self.modes[index].name(), "mode activated");
        }
        Ok(changed)
    }

    /// Stop routing frames and audio to any mode
    pub fn deactivate(&mut self) {
        if self.active != ActiveMode::Inactive {
            self.active = ActiveMode::Inactive;
            self.queue.push(LedMessage::Reset);
            info!("engine deactivated");
        }
    }

    fn switch_to(&mut self, index: usize) -> bool {
        if self.active == ActiveMode::Active(index) {
            return false;
        }
        self.active = ActiveMode::Active(index);
        self.queue.push(LedMessage::Reset);
        self.modes[index].on_activate(&mut self.queue);
        self.stats.activations.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Route one raw frame; returns the handlers called in the active mode
    ///
    /// Malformed frames are ignored.
    pub fn handle_bytes(&mut self, bytes: &[u8]) -> usize {
        let Some(frame) = MidiFrame::decode(bytes) else {
            return 0;
        };
        self.handle_frame(&frame)
    }

    fn handle_frame(&mut self, frame: &MidiFrame) -> usize {
        // Every selector sees every frame so its pressed flags stay in step
        let mut selected = None;
        for (index, selector) in self.selectors.iter_mut().enumerate() {
            if selector.process(frame).is_some() {
                selected = Some(index);
            }
        }
        if let Some(index) = selected {
            self.switch_to(index);
        }

        let handled = match self.active {
            ActiveMode::Active(index) => self.modes[index].handle_frame(frame),
            ActiveMode::Inactive => 0,
        };
        self.stats.handled.fetch_add(handled as u64, Ordering::Relaxed);
        handled
    }

    /// Run one block
    ///
    /// Dispatches every frame received since the previous block, lets the
    /// active mode mix `input` into `output` and queue its lighting, then
    /// drains the queue into `sink`. With no active mode the output is
    /// silent. Returns the number of controller frames sent.
    pub fn process<B, I>(
        &mut self,
        frames: I,
        input: &[f32],
        output: &mut [f32],
        sink: &mut impl ControllerSink,
    ) -> usize
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        for bytes in frames {
            self.handle_bytes(bytes.as_ref());
        }

        match self.active {
            ActiveMode::Active(index) => {
                self.modes[index].process_audio(input, output, &mut self.queue)
            }
            ActiveMode::Inactive => output.fill(0.0),
        }

        let sent = self.queue.drain(sink);
        self.stats.blocks.fetch_add(1, Ordering::Relaxed);
        self.stats.dropped.store(self.queue.dropped(), Ordering::Relaxed);
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;

    use larus_launchpad::protocol::{CONTROL_CHANGE, NOTE_OFF, NOTE_ON};
    use larus_launchpad::{Button, Buttons, Event, RAPID_UPDATE_LEN};

    use crate::mixer::{Mixer, MixerConfig};
    use crate::mode::DispatchTable;

    /// Records the frames it was sent together with their offsets
    #[derive(Default)]
    struct VecSink {
        frames: Vec<(u32, MidiFrame)>,
    }

    impl ControllerSink for VecSink {
        fn send(&mut self, offset: u32, frame: MidiFrame) {
            self.frames.push((offset, frame));
        }
    }

    #[derive(Default)]
    struct Presses(Vec<Button>);

    fn record(presses: &mut Presses, button: Button) {
        presses.0.push(button);
    }

    /// Mode that records presses and writes a constant to the output
    struct Recorder {
        select: Button,
        level: f32,
        table: DispatchTable<Presses>,
        presses: Presses,
        activations: Arc<AtomicUsize>,
    }

    impl Recorder {
        fn new(select: &str, level: f32) -> (Self, Arc<AtomicUsize>) {
            let activations = Arc::new(AtomicUsize::new(0));
            let mode = Self {
                select: select.parse().unwrap(),
                level,
                table: DispatchTable::new().bind(Event::press(Buttons::grid()), record),
                presses: Presses::default(),
                activations: Arc::clone(&activations),
            };
            (mode, activations)
        }
    }

    impl Mode for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn select(&self) -> Button {
            self.select
        }

        fn handle_frame(&mut self, frame: &MidiFrame) -> usize {
            self.table.dispatch(frame, &mut self.presses)
        }

        fn process_audio(&mut self, _input: &[f32], output: &mut [f32], _queue: &mut OutputQueue) {
            output.fill(self.level);
        }

        fn on_activate(&mut self, _queue: &mut OutputQueue) {
            self.activations.fetch_add(1, Ordering::Relaxed);
        }
    }

    const NO_FRAMES: [[u8; 3]; 0] = [];

    fn engine_with(modes: Vec<Box<dyn Mode>>) -> Engine {
        Engine::new(&EngineConfig::default(), modes).unwrap()
    }

    #[test]
    fn test_starts_inactive_and_silent() {
        let (mode, _) = Recorder::new("1", 0.5);
        let mut engine = engine_with(vec![Box::new(mode)]);
        assert_eq!(engine.active(), ActiveMode::Inactive);

        let mut output = vec![1.0; 8];
        let mut sink = VecSink::default();
        let sent = engine.process(NO_FRAMES, &[0.0; 32], &mut output, &mut sink);
        assert_eq!(sent, 0);
        assert!(output.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_inactive_engine_ignores_frames() {
        let (mode, _) = Recorder::new("1", 0.5);
        let mut engine = engine_with(vec![Box::new(mode)]);
        assert_eq!(engine.handle_bytes(&[NOTE_ON, 0, 127]), 0);
        assert_eq!(engine.handle_bytes(&[NOTE_OFF, 0, 64]), 0);
    }

    #[test]
    fn test_select_button_activates_once() {
        let (mode, activations) = Recorder::new("5", 0.5);
        let mut engine = engine_with(vec![Box::new(mode)]);
        let mut sink = VecSink::default();
        let mut output = vec![0.0; 8];

        let frames = [[CONTROL_CHANGE, 108, 127], [CONTROL_CHANGE, 108, 0]];
        engine.process(frames, &[0.0; 32], &mut output, &mut sink);
        assert_eq!(engine.active(), ActiveMode::Active(0));
        assert_eq!(activations.load(Ordering::Relaxed), 1);
        assert!(output.iter().all(|s| *s == 0.5));
        // Activation resets the controller
        assert_eq!(sink.frames, vec![(0, MidiFrame::reset())]);

        // Selecting the active mode again changes nothing
        sink.frames.clear();
        engine.process(frames, &[0.0; 32], &mut output, &mut sink);
        assert_eq!(activations.load(Ordering::Relaxed), 1);
        assert!(sink.frames.is_empty());
        assert_eq!(engine.stats().snapshot().activations, 1);
    }

    #[test]
    fn test_select_needs_release() {
        let (mode, _) = Recorder::new("5", 0.5);
        let mut engine = engine_with(vec![Box::new(mode)]);
        engine.handle_bytes(&[CONTROL_CHANGE, 108, 127]);
        assert_eq!(engine.active(), ActiveMode::Inactive);
        // A note-off on the same pitch is not a top row release
        engine.handle_bytes(&[NOTE_OFF, 108, 0]);
        assert_eq!(engine.active(), ActiveMode::Inactive);
        engine.handle_bytes(&[CONTROL_CHANGE, 108, 0]);
        assert_eq!(engine.active(), ActiveMode::Active(0));
    }

    #[test]
    fn test_switching_between_modes() {
        let (first, first_activations) = Recorder::new("1", 0.25);
        let (second, second_activations) = Recorder::new("2", 0.75);
        let mut engine = engine_with(vec![Box::new(first), Box::new(second)]);

        engine.handle_bytes(&[CONTROL_CHANGE, 105, 127]);
        engine.handle_bytes(&[CONTROL_CHANGE, 105, 0]);
        assert_eq!(engine.active(), ActiveMode::Active(1));
        assert_eq!(engine.active_mode().map(|m| m.select()), "2".parse().ok());

        assert_eq!(engine.activate(0), Ok(true));
        assert_eq!(engine.activate(0), Ok(false));
        assert_eq!(first_activations.load(Ordering::Relaxed), 1);
        assert_eq!(second_activations.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_frames_reach_only_active_mode() {
        let (mode, _) = Recorder::new("1", 0.0);
        let mut engine = engine_with(vec![Box::new(mode)]);
        engine.activate(0).unwrap();
        assert_eq!(engine.handle_bytes(&[NOTE_ON, 0, 127]), 0);
        assert_eq!(engine.handle_bytes(&[NOTE_OFF, 0, 64]), 1);
        assert_eq!(engine.stats().snapshot().handled, 1);

        engine.deactivate();
        assert_eq!(engine.handle_bytes(&[NOTE_ON, 0, 127]), 0);
        assert_eq!(engine.handle_bytes(&[NOTE_OFF, 0, 64]), 0);
    }

    #[test]
    fn test_malformed_frames_are_ignored() {
        let (mode, _) = Recorder::new("1", 0.0);
        let mut engine = engine_with(vec![Box::new(mode)]);
        engine.activate(0).unwrap();
        let frames: [&[u8]; 4] = [&[], &[NOTE_ON], &[NOTE_ON, 0], &[NOTE_ON, 0, 127, 0]];
        let mut sink = VecSink::default();
        let mut output = vec![0.0; 2];
        engine.process(frames, &[], &mut output, &mut sink);
        assert_eq!(engine.stats().snapshot().handled, 0);
    }

    #[test]
    fn test_bad_mode_index() {
        let mut engine = engine_with(Vec::new());
        assert_eq!(
            engine.activate(3),
            Err(EngineError::NoSuchMode {
                index: 3,
                count: 0,
            })
        );
    }

    #[test]
    fn test_deactivate_resets_controller() {
        let (mode, _) = Recorder::new("1", 0.0);
        let config = EngineConfig {
            start_active: true,
            ..EngineConfig::default()
        };
        let mut engine = Engine::new(&config, vec![Box::new(mode)]).unwrap();
        assert_eq!(engine.active(), ActiveMode::Active(0));

        let mut sink: Vec<MidiFrame> = Vec::new();
        engine.process(NO_FRAMES, &[], &mut [], &mut sink);
        sink.clear();

        engine.deactivate();
        engine.deactivate();
        engine.process(NO_FRAMES, &[], &mut [], &mut sink);
        assert_eq!(sink, vec![MidiFrame::reset()]);
    }

    #[test]
    fn test_mixer_block_drains_queue() {
        let mixer = Mixer::new(&MixerConfig::default()).unwrap();
        let mut engine = engine_with(vec![Box::new(mixer)]);
        let mut sink = VecSink::default();
        let input = vec![0.1; 64 * 8];
        let mut output = vec![0.0; 64 * 2];

        let select = [[CONTROL_CHANGE, 108, 127], [CONTROL_CHANGE, 108, 0]];
        let sent = engine.process(select, &input, &mut output, &mut sink);
        assert_eq!(sent, 1 + RAPID_UPDATE_LEN);
        assert!(engine.queue().is_empty());

        let offsets: Vec<u32> = sink.frames.iter().map(|(offset, _)| *offset).collect();
        assert_eq!(offsets, (0..sent as u32).collect::<Vec<_>>());

        sink.frames.clear();
        let sent = engine.process(NO_FRAMES, &input, &mut output, &mut sink);
        assert_eq!(sent, RAPID_UPDATE_LEN);
        assert!(engine.queue().is_empty());
        assert_eq!(engine.stats().snapshot().blocks, 2);
        assert_eq!(engine.stats().snapshot().dropped, 0);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = EngineConfig {
            queue_capacity: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            Engine::new(&config, Vec::new()),
            Err(EngineError::InvalidCapacity)
        ));
    }
}
