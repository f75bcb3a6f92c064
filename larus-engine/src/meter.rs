//! Bar meter: block amplitude to a column of lit LEDs

/// LEDs in one bar
pub const METER_STEPS: usize = 8;

/// Maps an amplitude onto a bottom-up bar of brightness values
///
/// `power = log10(amplitude * scale + 1)`. Row `y` lights with brightness
/// `(y + 1) / 8` when that threshold is at most `power`; rows above stay
/// dark. With the default scale of 9 a full-scale signal reaches the top.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Meter {
    scale: f32,
}

impl Meter {
    pub const DEFAULT_SCALE: f32 = 9.0;

    pub fn new(scale: f32) -> Self {
        Self { scale }
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Threshold of row `y` (0 = bottom)
    #[inline]
    pub fn threshold(y: usize) -> f32 {
        (y + 1) as f32 / METER_STEPS as f32
    }

    pub fn power(&self, amplitude: f32) -> f32 {
        (amplitude * self.scale + 1.0).log10()
    }

    /// Brightness per row, bottom first
    pub fn bar(&self, amplitude: f32) -> [f32; METER_STEPS] {
        let power = self.power(amplitude);
        std::array::from_fn(|y| {
            let threshold = Self::threshold(y);
            if threshold <= power {
                threshold
            } else {
                0.0
            }
        })
    }
}

impl Default for Meter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SCALE)
    }
}

/// Accumulates squared samples over a block
#[derive(Debug, Clone, Copy, Default)]
pub struct Rms {
    sum: f32,
    count: u32,
}

impl Rms {
    #[inline]
    pub fn add(&mut self, sample: f32) {
        self.sum += sample * sample;
        self.count += 1;
    }

    pub fn value(&self) -> f32 {
        if self.count == 0 {
            0.0
        } else {
            (self.sum / self.count as f32).sqrt()
        }
    }
}
