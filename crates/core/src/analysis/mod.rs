//! Per-tick analysis data: captured snapshots and the coarse band levels
//! derived from them.

use std::{ops::Range, sync::Arc};

use crate::audio::CaptureBackend;

mod spectrum;

pub use spectrum::ByteAnalyser;

/// Absolute bin ranges of the three bands. They do not scale with the
/// snapshot length, so snapshots shorter than 100 bins leave treble partial.
pub const BASS_BINS: Range<usize> = 0..10;
/// Bins averaged into the mid level.
pub const MID_BINS: Range<usize> = 10..50;
/// Bins averaged into the treble level.
pub const TREBLE_BINS: Range<usize> = 50..100;

/// Byte value that marks the zero crossing of a waveform sample.
pub const WAVEFORM_MIDPOINT: u8 = 128;

/// Spectral magnitudes (0-255) for one tick, one byte per frequency bin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencySnapshot {
    bins: Arc<[u8]>,
}

impl FrequencySnapshot {
    /// Wraps per-bin magnitudes in `0..=255`.
    pub fn new(bins: impl Into<Arc<[u8]>>) -> Self {
        Self { bins: bins.into() }
    }

    pub fn bins(&self) -> &[u8] {
        &self.bins
    }

    /// Number of frequency bins.
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }
}

/// Time-domain amplitudes (0-255) for one tick; 128 is silence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaveformSnapshot {
    samples: Arc<[u8]>,
}

impl WaveformSnapshot {
    /// Wraps time-domain samples centred on 128.
    pub fn new(samples: impl Into<Arc<[u8]>>) -> Self {
        Self {
            samples: samples.into(),
        }
    }

    /// A flat line at the midpoint.
    pub fn silent(len: usize) -> Self {
        Self::new(vec![WAVEFORM_MIDPOINT; len])
    }

    pub fn samples(&self) -> &[u8] {
        &self.samples
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Both snapshots captured for a single tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSnapshot {
    pub frequency: FrequencySnapshot,
    pub waveform: WaveformSnapshot,
}

impl FrameSnapshot {
    /// Pairs the two views of the same capture instant.
    pub fn new(frequency: FrequencySnapshot, waveform: WaveformSnapshot) -> Self {
        Self {
            frequency,
            waveform,
        }
    }

    /// Convenience constructor from raw byte buffers.
    pub fn from_bytes(frequency: Vec<u8>, waveform: Vec<u8>) -> Self {
        Self::new(
            FrequencySnapshot::new(frequency),
            WaveformSnapshot::new(waveform),
        )
    }
}

/// Pulls the current snapshot from the active capture handle. A missing
/// handle, or a backend with nothing to report yet, yields `None` and the
/// caller skips the tick.
pub fn sample_frame<B: CaptureBackend>(
    backend: &mut B,
    handle: Option<&mut B::Handle>,
) -> Option<FrameSnapshot> {
    let handle = handle?;
    backend.poll_snapshot(handle)
}

/// Mean magnitude of the bass, mid and treble bands, in byte units.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BandLevels {
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
}

impl BandLevels {
    /// Averages the bass, mid and treble ranges. Ranges past the end of the
    /// snapshot contribute only the bins that exist; an empty range is 0.
    pub fn from_snapshot(snapshot: &FrequencySnapshot) -> Self {
        let bins = snapshot.bins();
        Self {
            bass: band_mean(bins, BASS_BINS),
            mid: band_mean(bins, MID_BINS),
            treble: band_mean(bins, TREBLE_BINS),
        }
    }
}

fn band_mean(bins: &[u8], range: Range<usize>) -> f32 {
    let end = range.end.min(bins.len());
    let start = range.start.min(end);
    let slice = &bins[start..end];
    if slice.is_empty() {
        return 0.0;
    }
    let sum: u32 = slice.iter().map(|&b| u32::from(b)).sum();
    sum as f32 / slice.len() as f32
}
