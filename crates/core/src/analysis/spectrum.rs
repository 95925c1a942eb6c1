use std::{f32::consts::PI, fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};

use super::{FrameSnapshot, FrequencySnapshot, WaveformSnapshot};
use crate::{AudioConfig, NeonVizError, Result};

/// Turns raw PCM into byte snapshots the way a browser analyser node does:
/// Blackman window, magnitude spectrum smoothed over time, decibel range
/// mapped onto 0-255.
pub struct ByteAnalyser {
    fft_size: usize,
    smoothing: f32,
    min_decibels: f32,
    max_decibels: f32,
    window: Vec<f32>,
    smoothed: Vec<f32>,
    plan: Arc<dyn RealToComplex<f32>>,
    input: Vec<f32>,
    spectrum: Vec<Complex32>,
    scratch: Vec<Complex32>,
}

impl ByteAnalyser {
    /// Plans the FFT and allocates buffers for `config.fft_size` samples.
    pub fn new(config: &AudioConfig) -> Self {
        let fft_size = config.fft_size;
        let mut planner = RealFftPlanner::<f32>::new();
        let plan = planner.plan_fft_forward(fft_size);
        let input = plan.make_input_vec();
        let spectrum = plan.make_output_vec();
        let scratch = plan.make_scratch_vec();

        Self {
            fft_size,
            smoothing: config.smoothing_time_constant,
            min_decibels: config.min_decibels,
            max_decibels: config.max_decibels,
            window: (0..fft_size).map(|i| blackman_value(i, fft_size)).collect(),
            smoothed: vec![0.0; fft_size / 2],
            plan,
            input,
            spectrum,
            scratch,
        }
    }

    /// Number of bins in each produced snapshot.
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Analyses the most recent `fft_size` samples (oldest first). Shorter
    /// inputs are treated as preceded by silence.
    pub fn analyse(&mut self, samples: &[f32]) -> Result<FrameSnapshot> {
        let take = samples.len().min(self.fft_size);
        let recent = &samples[samples.len() - take..];
        let offset = self.fft_size - take;

        self.input[..offset].iter_mut().for_each(|v| *v = 0.0);
        for (i, sample) in recent.iter().enumerate() {
            self.input[offset + i] = sample * self.window[offset + i];
        }

        self.plan
            .process_with_scratch(&mut self.input, &mut self.spectrum, &mut self.scratch)
            .map_err(|err| NeonVizError::Backend(err.to_string()))?;

        let scale = 1.0 / self.fft_size as f32;
        let range = self.max_decibels - self.min_decibels;
        let mut bins = Vec::with_capacity(self.bin_count());
        for (bin, smoothed) in self.spectrum.iter().zip(self.smoothed.iter_mut()) {
            let magnitude = bin.norm() * scale;
            *smoothed = self.smoothing * *smoothed + (1.0 - self.smoothing) * magnitude;
            let decibels = if *smoothed > 0.0 {
                20.0 * smoothed.log10()
            } else {
                f32::NEG_INFINITY
            };
            let scaled = 255.0 / range * (decibels - self.min_decibels);
            bins.push(scaled.clamp(0.0, 255.0) as u8);
        }

        let bin_count = self.bin_count();
        let mut waveform = vec![0u8; bin_count];
        let tail = &recent[recent.len().saturating_sub(bin_count)..];
        let pad = bin_count - tail.len();
        waveform[..pad].fill(128);
        for (slot, sample) in waveform[pad..].iter_mut().zip(tail) {
            *slot = (128.0 * (1.0 + sample)).clamp(0.0, 255.0) as u8;
        }

        Ok(FrameSnapshot::new(
            FrequencySnapshot::new(bins),
            WaveformSnapshot::new(waveform),
        ))
    }
}

impl fmt::Debug for ByteAnalyser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteAnalyser")
            .field("fft_size", &self.fft_size)
            .field("smoothing", &self.smoothing)
            .field("min_decibels", &self.min_decibels)
            .field("max_decibels", &self.max_decibels)
            .finish()
    }
}

fn blackman_value(index: usize, len: usize) -> f32 {
    const A0: f32 = 0.42;
    const A1: f32 = 0.5;
    const A2: f32 = 0.08;

    let phase = 2.0 * PI * index as f32 / len as f32;
    A0 - A1 * phase.cos() + A2 * (2.0 * phase).cos()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyser() -> ByteAnalyser {
        ByteAnalyser::new(&AudioConfig::default())
    }

    #[test]
    fn silence_maps_to_floor_and_midline() {
        let mut analyser = analyser();
        let frame = analyser.analyse(&[0.0; 256]).unwrap();

        assert_eq!(frame.frequency.len(), 128);
        assert_eq!(frame.waveform.len(), 128);
        assert!(frame.frequency.bins().iter().all(|&b| b == 0));
        assert!(frame.waveform.samples().iter().all(|&s| s == 128));
    }

    #[test]
    fn short_input_is_padded_with_silence() {
        let mut analyser = analyser();
        let frame = analyser.analyse(&[0.5; 16]).unwrap();

        let samples = frame.waveform.samples();
        assert_eq!(samples[0], 128);
        assert_eq!(samples[127], 192);
    }

    #[test]
    fn tone_lights_up_its_bin() {
        let mut analyser = analyser();
        let samples: Vec<f32> = (0..256)
            .map(|i| (2.0 * PI * 8.0 * i as f32 / 256.0).sin())
            .collect();

        // Let the temporal smoothing settle.
        let mut frame = analyser.analyse(&samples).unwrap();
        for _ in 0..20 {
            frame = analyser.analyse(&samples).unwrap();
        }

        let bins = frame.frequency.bins();
        assert!(bins[8] > 200);
        assert!(bins[60] < 50);
        assert!(bins[100] < 50);
    }

    #[test]
    fn waveform_clamps_out_of_range_samples() {
        let mut analyser = analyser();
        let frame = analyser.analyse(&[2.0; 256]).unwrap();
        assert!(frame.waveform.samples().iter().all(|&s| s == 255));

        let frame = analyser.analyse(&[-2.0; 256]).unwrap();
        assert!(frame.waveform.samples().iter().all(|&s| s == 0));
    }
}
