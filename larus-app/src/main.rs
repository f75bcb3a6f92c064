//! Larus - Launchpad Mini mixer
//!
//! Mixes 4 stereo inputs into one stereo output, controlled and metered on
//! a Launchpad Mini grid.

mod config;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, Context};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use midir::{MidiIO, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use config::Config;
use larus_engine::{
    ControllerSink, Engine, EngineStats, Mixer, StatsSnapshot, INPUT_CHANNELS, OUTPUT_CHANNELS,
};
use larus_launchpad::protocol::FRAME_LEN;
use larus_launchpad::MidiFrame;

/// Largest block processed in one engine call; longer device buffers are split
const MAX_BLOCK_FRAMES: usize = 8192;

/// Controller frames buffered in each direction
const MIDI_BUFFER: usize = 1024;

/// Idle wait of the MIDI output thread
const MIDI_POLL: Duration = Duration::from_millis(1);

type RawFrame = [u8; FRAME_LEN];

/// Why the control loop stopped
#[derive(Debug, Clone, PartialEq, Eq)]
enum Shutdown {
    /// Ctrl+C
    Interrupted,
    /// An audio stream failed
    StreamError(String),
}

impl fmt::Display for Shutdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shutdown::Interrupted => write!(f, "interrupted"),
            Shutdown::StreamError(reason) => write!(f, "{}", reason),
        }
    }
}

/// Ask the control loop to stop; never blocks, the first request wins
fn request_shutdown(shutdown: &Sender<Shutdown>, reason: Shutdown) {
    let _ = shutdown.try_send(reason);
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::load();
    info!(path = %Config::config_path().display(), "configuration loaded");
    debug!(?config, "effective configuration");

    let mixer = Mixer::new(&config.mixer_config()).context("invalid mixer configuration")?;
    let engine = Engine::new(&config.engine_config(), vec![Box::new(mixer)])
        .context("invalid engine configuration")?;
    let stats = engine.stats();

    // Controller frames: MIDI input -> audio callback -> MIDI output
    let (midi_in_tx, midi_in_rx) = HeapRb::<RawFrame>::new(MIDI_BUFFER).split();
    let (midi_out_tx, midi_out_rx) = HeapRb::<RawFrame>::new(MIDI_BUFFER).split();

    let _input_connection = connect_midi_input(&config, midi_in_tx)?;
    let output_connection = connect_midi_output(&config)?;

    let running = Arc::new(AtomicBool::new(true));
    let midi_thread = spawn_midi_output(output_connection, midi_out_rx, running.clone())?;

    // Ctrl+C and stream errors both end the control loop
    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<Shutdown>(1);
    let interrupt_tx = shutdown_tx.clone();
    ctrlc::set_handler(move || request_shutdown(&interrupt_tx, Shutdown::Interrupted))
        .context("failed to install Ctrl+C handler")?;

    let streams = start_audio(engine, midi_in_rx, midi_out_tx, shutdown_tx)?;

    info!("larus running; press the mixer select button to start, Ctrl+C to quit");

    match run_control_loop(&shutdown_rx, &stats, config.stats_interval()) {
        Some(reason) => info!(%reason, "shutting down"),
        None => info!("shutdown channel closed, shutting down"),
    }

    // Stop the callbacks before the final controller reset
    drop(streams);
    running.store(false, Ordering::Relaxed);
    let _ = midi_thread.join();
    Ok(())
}

/// Wait for a shutdown request, logging engine stats every `interval`
fn run_control_loop(
    shutdown: &Receiver<Shutdown>,
    stats: &EngineStats,
    interval: Duration,
) -> Option<Shutdown> {
    let mut last = StatsSnapshot::default();
    loop {
        match shutdown.recv_timeout(interval) {
            Ok(reason) => return Some(reason),
            Err(RecvTimeoutError::Timeout) => {
                let snapshot = stats.snapshot();
                debug!(
                    blocks = snapshot.blocks - last.blocks,
                    handled = snapshot.handled - last.handled,
                    activations = snapshot.activations,
                    dropped = snapshot.dropped,
                    "engine stats"
                );
                if snapshot.dropped > last.dropped {
                    warn!(
                        dropped = snapshot.dropped - last.dropped,
                        "controller messages dropped"
                    );
                }
                last = snapshot;
            }
            Err(RecvTimeoutError::Disconnected) => return None,
        }
    }
}

/// Log filter comes from `RUST_LOG`, `info` when unset
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

/// First port whose name contains `pattern`
fn find_port<T: MidiIO>(io: &T, pattern: &str) -> Option<(T::Port, String)> {
    io.ports().into_iter().find_map(|port| {
        let name = io.port_name(&port).ok()?;
        debug!(port = %name, "found MIDI port");
        name.contains(pattern).then_some((port, name))
    })
}

fn connect_midi_input(
    config: &Config,
    mut frames: HeapProd<RawFrame>,
) -> anyhow::Result<MidiInputConnection<()>> {
    let input = MidiInput::new(&format!("{} In", config.client_name))
        .context("failed to open MIDI input")?;
    let (port, name) = find_port(&input, &config.midi_input)
        .ok_or_else(|| anyhow!("no MIDI input port matching '{}'", config.midi_input))?;

    let connection = input
        .connect(
            &port,
            "larus-in",
            move |_timestamp, message, _| {
                // Anything that isn't a 3-byte frame means nothing to the engine
                if let Ok(frame) = RawFrame::try_from(message) {
                    let _ = frames.try_push(frame);
                }
            },
            (),
        )
        .map_err(|e| anyhow!("failed to connect to MIDI input '{}': {}", name, e))?;

    info!(port = %name, "MIDI input connected");
    Ok(connection)
}

fn connect_midi_output(config: &Config) -> anyhow::Result<MidiOutputConnection> {
    let output = MidiOutput::new(&format!("{} Out", config.client_name))
        .context("failed to open MIDI output")?;
    let (port, name) = find_port(&output, &config.midi_output)
        .ok_or_else(|| anyhow!("no MIDI output port matching '{}'", config.midi_output))?;

    let connection = output
        .connect(&port, "larus-out")
        .map_err(|e| anyhow!("failed to connect to MIDI output '{}': {}", name, e))?;

    info!(port = %name, "MIDI output connected");
    Ok(connection)
}

/// Forward frames queued by the audio callback to the controller
fn spawn_midi_output(
    mut connection: MidiOutputConnection,
    mut frames: HeapCons<RawFrame>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("larus-midi-out".into())
        .spawn(move || {
            // Leave the controller dark on start
            if let Err(e) = connection.send(&MidiFrame::reset().encode()) {
                warn!("failed to reset controller: {}", e);
            }

            while running.load(Ordering::Relaxed) {
                let mut sent = false;
                while let Some(frame) = frames.try_pop() {
                    if let Err(e) = connection.send(&frame) {
                        warn!("MIDI send failed: {}", e);
                    }
                    sent = true;
                }
                if !sent {
                    thread::sleep(MIDI_POLL);
                }
            }

            let _ = connection.send(&MidiFrame::reset().encode());
            connection.close();
        })
        .context("failed to spawn MIDI output thread")
}

/// Controller sink that hands frames to the MIDI output thread
struct MidiSink(HeapProd<RawFrame>);

impl ControllerSink for MidiSink {
    fn send(&mut self, _offset: u32, frame: MidiFrame) {
        // Full buffer means the output thread is behind; the next block
        // carries a complete refresh anyway
        let _ = self.0.try_push(frame.encode());
    }
}

/// Open the input and output streams and run the engine in the output callback
fn start_audio(
    mut engine: Engine,
    mut midi_in: HeapCons<RawFrame>,
    midi_out: HeapProd<RawFrame>,
    shutdown: Sender<Shutdown>,
) -> anyhow::Result<(Stream, Stream)> {
    let host = cpal::default_host();
    let input_device = host
        .default_input_device()
        .context("no audio input device found")?;
    let output_device = host
        .default_output_device()
        .context("no audio output device found")?;

    let output_config: StreamConfig = output_device
        .default_output_config()
        .context("failed to get audio output config")?
        .into();
    let input_config = StreamConfig {
        channels: INPUT_CHANNELS as u16,
        sample_rate: output_config.sample_rate,
        buffer_size: cpal::BufferSize::Default,
    };
    let channels = output_config.channels as usize;

    info!(
        input = %input_device.name().unwrap_or_default(),
        output = %output_device.name().unwrap_or_default(),
        sample_rate = output_config.sample_rate.0,
        output_channels = channels,
        "opening audio streams"
    );

    // Input samples cross to the output callback here; two blocks of slack
    let (mut samples_tx, mut samples_rx) =
        HeapRb::<f32>::new(MAX_BLOCK_FRAMES * INPUT_CHANNELS * 2).split();

    let input_shutdown = shutdown.clone();
    let input_stream = input_device
        .build_input_stream(
            &input_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                samples_tx.push_slice(data);
            },
            move |err| {
                error!("audio input error: {}", err);
                let reason = Shutdown::StreamError(format!("input stream: {}", err));
                request_shutdown(&input_shutdown, reason);
            },
            None,
        )
        .context("failed to create audio input stream")?;

    // Pre-allocated so the callback never allocates
    let mut input_block = vec![0.0f32; MAX_BLOCK_FRAMES * INPUT_CHANNELS];
    let mut stereo_block = vec![0.0f32; MAX_BLOCK_FRAMES * OUTPUT_CHANNELS];
    let mut sink = MidiSink(midi_out);

    let output_stream = output_device
        .build_output_stream(
            &output_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for chunk in data.chunks_mut(MAX_BLOCK_FRAMES * channels) {
                    let frames = chunk.len() / channels;

                    let input = &mut input_block[..frames * INPUT_CHANNELS];
                    let received = samples_rx.pop_slice(input);
                    input[received..].fill(0.0);

                    let stereo = &mut stereo_block[..frames * OUTPUT_CHANNELS];
                    engine.process(midi_in.pop_iter(), input, stereo, &mut sink);

                    for (device_frame, pair) in chunk
                        .chunks_mut(channels)
                        .zip(stereo.chunks_exact(OUTPUT_CHANNELS))
                    {
                        if channels == 1 {
                            device_frame[0] = (pair[0] + pair[1]) * 0.5;
                            continue;
                        }
                        for (i, sample) in device_frame.iter_mut().enumerate() {
                            *sample = match i {
                                0 => pair[0],
                                1 => pair[1],
                                _ => 0.0,
                            };
                        }
                    }
                }
            },
            move |err| {
                error!("audio output error: {}", err);
                let reason = Shutdown::StreamError(format!("output stream: {}", err));
                request_shutdown(&shutdown, reason);
            },
            None,
        )
        .context("failed to create audio output stream")?;

    input_stream.play().context("failed to start audio input")?;
    output_stream.play().context("failed to start audio output")?;

    Ok((input_stream, output_stream))
}
