//! Configuration persistence for Larus
//!
//! Stores device selection and engine tuning in a key=value file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use larus_engine::{DownmixMode, EngineConfig, Meter, MixerConfig, OutputQueue};
use tracing::{info, warn};

/// Application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Name the MIDI connections are registered under
    pub client_name: String,
    /// Substring of the controller's MIDI input port name
    pub midi_input: String,
    /// Substring of the controller's MIDI output port name
    pub midi_output: String,
    pub queue_capacity: usize,
    pub downmix: DownmixMode,
    pub meter_scale: f32,
    pub initial_level: f32,
    /// Start with the mixer active instead of waiting for its select button
    pub start_active: bool,
    /// How often the control thread logs engine stats
    pub stats_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_name: "larus".to_string(),
            midi_input: "Launchpad".to_string(),
            midi_output: "Launchpad".to_string(),
            queue_capacity: OutputQueue::DEFAULT_CAPACITY,
            downmix: DownmixMode::Average,
            meter_scale: Meter::DEFAULT_SCALE,
            initial_level: 0.66,
            start_active: false,
            stats_interval_ms: 5000,
        }
    }
}

impl Config {
    /// Load config from the default location
    ///
    /// Writes the defaults there on first run.
    pub fn load() -> Self {
        Self::load_or_init(&Self::config_path())
    }

    /// Load config from `path`, creating it with defaults if it doesn't exist
    ///
    /// Any other read error falls back to the defaults without touching the file.
    pub fn load_or_init(path: &Path) -> Self {
        match Self::load_from(path) {
            Ok(config) => config,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let config = Self::default();
                match config.save_to(path) {
                    Ok(()) => info!(path = %path.display(), "wrote default configuration"),
                    Err(e) => {
                        warn!(path = %path.display(), "failed to write default config: {}", e)
                    }
                }
                config
            }
            Err(e) => {
                warn!(path = %path.display(), "failed to read config, using defaults: {}", e);
                Self::default()
            }
        }
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.serialize())
    }

    /// Get the default config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("larus")
            .join("config.txt")
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            queue_capacity: self.queue_capacity,
            start_active: self.start_active,
        }
    }

    pub fn mixer_config(&self) -> MixerConfig {
        MixerConfig {
            initial_level: self.initial_level,
            downmix: self.downmix,
            meter_scale: self.meter_scale,
            ..MixerConfig::default()
        }
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_millis(self.stats_interval_ms)
    }

    /// Parse config from simple key=value format
    ///
    /// Unknown keys are ignored; invalid values keep their default.
    fn parse(content: &str) -> Self {
        let mut config = Self::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                warn!(line = line, "ignoring config line without '='");
                continue;
            };
            let key = key.trim();
            let value = value.trim();

            match key {
                "client_name" => {
                    if !value.is_empty() {
                        config.client_name = value.to_string();
                    }
                }
                "midi_input" => config.midi_input = value.to_string(),
                "midi_output" => config.midi_output = value.to_string(),
                "queue_capacity" => {
                    if let Some(capacity) = parse_value(key, value, |c: &usize| *c > 0) {
                        config.queue_capacity = capacity;
                    }
                }
                "downmix" => match DownmixMode::from_name(value) {
                    Some(mode) => config.downmix = mode,
                    None => warn!(key = key, value = value, "unknown downmix mode"),
                },
                "meter_scale" => {
                    if let Some(scale) =
                        parse_value(key, value, |s: &f32| *s > 0.0 && s.is_finite())
                    {
                        config.meter_scale = scale;
                    }
                }
                "initial_level" => {
                    if let Some(level) =
                        parse_value(key, value, |l: &f32| (0.0..=1.0).contains(l))
                    {
                        config.initial_level = level;
                    }
                }
                "start_active" => {
                    if let Some(active) = parse_value(key, value, |_: &bool| true) {
                        config.start_active = active;
                    }
                }
                "stats_interval_ms" => {
                    if let Some(interval) = parse_value(key, value, |i: &u64| *i > 0) {
                        config.stats_interval_ms = interval;
                    }
                }
                _ => {} // Ignore unknown keys
            }
        }

        config
    }

    /// Serialize config to simple key=value format
    fn serialize(&self) -> String {
        let lines = [
            "# Larus Configuration".to_string(),
            format!("client_name={}", self.client_name),
            format!("midi_input={}", self.midi_input),
            format!("midi_output={}", self.midi_output),
            format!("queue_capacity={}", self.queue_capacity),
            format!("downmix={}", self.downmix.display_name()),
            format!("meter_scale={}", self.meter_scale),
            format!("initial_level={}", self.initial_level),
            format!("start_active={}", self.start_active),
            format!("stats_interval_ms={}", self.stats_interval_ms),
        ];
        lines.join("\n")
    }
}

/// Parse a value and check it, logging and returning `None` when either fails
fn parse_value<T: FromStr>(key: &str, value: &str, valid: impl Fn(&T) -> bool) -> Option<T> {
    match value.parse() {
        Ok(parsed) if valid(&parsed) => Some(parsed),
        _ => {
            warn!(key = key, value = value, "invalid config value, keeping default");
            None
        }
    }
}
