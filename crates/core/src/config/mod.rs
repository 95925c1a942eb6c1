use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{NeonVizError, Result};

/// Top-level configuration structure for the visualiser.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualiserConfig {
    pub audio: AudioConfig,
    pub beat: BeatConfig,
    pub smoothing: SmoothingConfig,
    pub particles: ParticleConfig,
    pub render: RenderConfig,
}

impl VisualiserConfig {
    /// Reads a JSON configuration file. Missing fields keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parses and validates a JSON document; missing fields keep defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the pipeline cannot operate with.
    pub fn validate(&self) -> Result<()> {
        let fft = self.audio.fft_size;
        if !fft.is_power_of_two() || fft < 256 {
            return Err(NeonVizError::InvalidConfig(
                "audio.fft_size must be a power of two of at least 256",
            ));
        }
        if !(0.0..1.0).contains(&self.audio.smoothing_time_constant) {
            return Err(NeonVizError::InvalidConfig(
                "audio.smoothing_time_constant must lie in [0, 1)",
            ));
        }
        if self.audio.min_decibels >= self.audio.max_decibels {
            return Err(NeonVizError::InvalidConfig(
                "audio.min_decibels must be below audio.max_decibels",
            ));
        }
        if !(self.beat.alpha > 0.0 && self.beat.alpha <= 1.0) {
            return Err(NeonVizError::InvalidConfig("beat.alpha must lie in (0, 1]"));
        }
        if self.smoothing.bar_max_delta <= 0.0 || self.smoothing.wave_max_delta <= 0.0 {
            return Err(NeonVizError::InvalidConfig(
                "smoothing deltas must be positive",
            ));
        }
        if self.particles.min_life >= self.particles.max_life {
            return Err(NeonVizError::InvalidConfig(
                "particles.min_life must be below particles.max_life",
            ));
        }
        if !(0.0..=1.0).contains(&self.particles.drag) {
            return Err(NeonVizError::InvalidConfig("particles.drag must lie in [0, 1]"));
        }
        if self.particles.intensity < 0.0 {
            return Err(NeonVizError::InvalidConfig(
                "particles.intensity must not be negative",
            ));
        }
        Ok(())
    }
}

/// Analysis resolution and analyser-node style byte scaling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub fft_size: usize,
    pub smoothing_time_constant: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
}

impl AudioConfig {
    /// Number of frequency bins (and waveform samples) per snapshot.
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            fft_size: 256,
            smoothing_time_constant: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
        }
    }
}

/// Bass-onset detection parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeatConfig {
    /// EMA decay factor applied to the bass level.
    pub alpha: f32,
    /// Margin above the average, in byte units, that counts as a beat.
    pub threshold: f32,
    pub cooldown_ms: u64,
}

impl Default for BeatConfig {
    fn default() -> Self {
        Self {
            alpha: 0.2,
            threshold: 35.0,
            cooldown_ms: 180,
        }
    }
}

/// Per-tick rate limits and target scaling for bars and waveform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    pub bar_max_delta: f32,
    pub wave_max_delta: f32,
    /// Fraction of the surface height a full-scale bar reaches.
    pub bar_height_ratio: f32,
    pub wave_offset: f32,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            bar_max_delta: 8.0,
            wave_max_delta: 3.0,
            bar_height_ratio: 0.7,
            wave_offset: 0.0,
        }
    }
}

/// Beat burst size, velocity spread, lifetime and drag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleConfig {
    /// Particles spawned per detected beat.
    pub burst_count: usize,
    pub intensity: f32,
    /// Lifetime range in ticks, upper bound exclusive.
    pub min_life: u32,
    pub max_life: u32,
    pub drag: f32,
    pub radius: f32,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            burst_count: 6,
            intensity: 0.8,
            min_life: 60,
            max_life: 120,
            drag: 0.98,
            radius: 2.0,
        }
    }
}

/// Colours and thresholds used when painting a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Opacity of the black wash painted at the start of every frame.
    pub trail_alpha: f32,
    /// Raw magnitude above which a bar receives a glow pass.
    pub glow_threshold: u8,
    pub bar_gap: f32,
    pub waveform_color: [u8; 3],
    pub waveform_width: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            trail_alpha: 0.25,
            glow_threshold: 200,
            bar_gap: 1.0,
            waveform_color: [0x00, 0xff, 0xff],
            waveform_width: 2.0,
        }
    }
}
