use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    BackendSpecificError, BuildStreamError, DefaultStreamConfigError, Device, FromSample, Host,
    PlayStreamError, Sample, SampleFormat, SizedSample, StreamConfig,
};

use super::{CaptureBackend, SourceKind};
use crate::{AudioConfig, ByteAnalyser, FrameSnapshot, NeonVizError, Result};

/// Device name fragments that identify a loopback of the system output.
const LOOPBACK_HINTS: [&str; 3] = ["monitor", "loopback", "stereo mix"];

/// Capture backend on top of the host's default `cpal` audio API.
pub struct DeviceCapture {
    host: Host,
    config: AudioConfig,
}

impl DeviceCapture {
    /// Uses the host's default audio API.
    pub fn new(config: AudioConfig) -> Self {
        Self {
            host: cpal::default_host(),
            config,
        }
    }

    fn select_device(&self, source: SourceKind) -> Result<Device> {
        match source {
            SourceKind::Microphone => self
                .host
                .default_input_device()
                .ok_or(NeonVizError::DeviceUnavailable),
            SourceKind::SharedDisplay => {
                let devices = self
                    .host
                    .input_devices()
                    .map_err(|err| NeonVizError::Backend(err.to_string()))?;
                for device in devices {
                    let name = device.name().unwrap_or_default();
                    if is_loopback_name(&name) {
                        return Ok(device);
                    }
                }
                // A display selection without an audio loopback carries no track.
                Err(NeonVizError::NoAudioTrack)
            }
        }
    }
}

impl std::fmt::Debug for DeviceCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceCapture")
            .field("host", &self.host.id())
            .field("config", &self.config)
            .finish()
    }
}

/// An open input stream plus the analyser that turns it into snapshots.
pub struct LiveCapture {
    stream: cpal::Stream,
    ring: Arc<Mutex<SampleRing>>,
    analyser: ByteAnalyser,
    samples: Vec<f32>,
    device_name: String,
    source: SourceKind,
}

impl LiveCapture {
    /// Name of the device the stream was opened on.
    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

impl std::fmt::Debug for LiveCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveCapture")
            .field("device_name", &self.device_name)
            .field("source", &self.source)
            .finish()
    }
}

impl CaptureBackend for DeviceCapture {
    type Handle = LiveCapture;

    fn acquire(&mut self, source: SourceKind) -> Result<LiveCapture> {
        let device = self.select_device(source)?;
        let device_name = device.name().unwrap_or_else(|_| "<unknown>".into());

        let supported = device.default_input_config().map_err(map_config_error)?;
        if supported.channels() == 0 {
            return Err(NeonVizError::NoAudioTrack);
        }
        let sample_format = supported.sample_format();
        let stream_config = supported.config();

        let ring = Arc::new(Mutex::new(SampleRing::new(self.config.fft_size)));
        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, ring.clone()),
            SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, ring.clone()),
            SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, ring.clone()),
            SampleFormat::I32 => build_stream::<i32>(&device, &stream_config, ring.clone()),
            other => Err(NeonVizError::NotSupported(format!(
                "sample format {other:?}"
            ))),
        }?;
        stream.play().map_err(map_play_error)?;

        tracing::info!(
            device = %device_name,
            %source,
            sample_rate = stream_config.sample_rate.0,
            channels = stream_config.channels,
            "capture stream started"
        );

        Ok(LiveCapture {
            stream,
            ring,
            analyser: ByteAnalyser::new(&self.config),
            samples: Vec::with_capacity(self.config.fft_size),
            device_name,
            source,
        })
    }

    fn release(&mut self, handle: LiveCapture) {
        if let Err(err) = handle.stream.pause() {
            tracing::debug!(%err, "pausing capture stream failed");
        }
        tracing::info!(device = %handle.device_name, "capture stream released");
        drop(handle);
    }

    fn poll_snapshot(&mut self, handle: &mut LiveCapture) -> Option<FrameSnapshot> {
        {
            let ring = match handle.ring.lock() {
                Ok(ring) => ring,
                Err(_) => {
                    tracing::warn!("capture buffer has been poisoned");
                    return None;
                }
            };
            if ring.is_empty() {
                return None;
            }
            ring.copy_into(&mut handle.samples);
        }

        match handle.analyser.analyse(&handle.samples) {
            Ok(frame) => Some(frame),
            Err(err) => {
                tracing::warn!(%err, "analysis of captured block failed");
                None
            }
        }
    }
}

/// Describes an input device for the `devices` listing.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub channels: u16,
    pub sample_rate: u32,
    pub loopback: bool,
}

/// Enumerates the host's capture devices with their default configuration.
pub fn list_input_devices() -> Result<Vec<DeviceInfo>> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|err| NeonVizError::Backend(err.to_string()))?;

    let mut infos = Vec::new();
    for device in devices {
        let name = device.name().unwrap_or_else(|_| "<unknown>".into());
        let Ok(config) = device.default_input_config() else {
            tracing::debug!(device = %name, "skipping device without input config");
            continue;
        };
        infos.push(DeviceInfo {
            loopback: is_loopback_name(&name),
            name,
            channels: config.channels(),
            sample_rate: config.sample_rate().0,
        });
    }
    Ok(infos)
}

fn is_loopback_name(name: &str) -> bool {
    let name = name.to_lowercase();
    LOOPBACK_HINTS.iter().any(|hint| name.contains(hint))
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    ring: Arc<Mutex<SampleRing>>,
) -> Result<cpal::Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let channels = usize::from(config.channels);
    let stream = device
        .build_input_stream(
            config,
            move |data: &[T], _| {
                let Ok(mut ring) = ring.lock() else {
                    return;
                };
                for frame in data.chunks_exact(channels) {
                    let sum: f32 = frame.iter().map(|&s| s.to_sample::<f32>()).sum();
                    ring.push(sum / channels as f32);
                }
            },
            |err| tracing::warn!(%err, "capture stream error"),
            None,
        )
        .map_err(map_build_error)?;
    Ok(stream)
}

fn classify_backend(err: BackendSpecificError) -> NeonVizError {
    let lower = err.description.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not authorized")
    {
        NeonVizError::PermissionDenied
    } else {
        NeonVizError::Backend(err.description)
    }
}

fn map_config_error(err: DefaultStreamConfigError) -> NeonVizError {
    match err {
        DefaultStreamConfigError::DeviceNotAvailable => NeonVizError::DeviceUnavailable,
        DefaultStreamConfigError::StreamTypeNotSupported => {
            NeonVizError::NotSupported("device does not support audio input".into())
        }
        DefaultStreamConfigError::BackendSpecific { err } => classify_backend(err),
    }
}

fn map_build_error(err: BuildStreamError) -> NeonVizError {
    match err {
        BuildStreamError::DeviceNotAvailable => NeonVizError::DeviceUnavailable,
        BuildStreamError::StreamConfigNotSupported | BuildStreamError::InvalidArgument => {
            NeonVizError::NotSupported(err.to_string())
        }
        BuildStreamError::BackendSpecific { err } => classify_backend(err),
        other => NeonVizError::Backend(other.to_string()),
    }
}

fn map_play_error(err: PlayStreamError) -> NeonVizError {
    match err {
        PlayStreamError::DeviceNotAvailable => NeonVizError::DeviceUnavailable,
        PlayStreamError::BackendSpecific { err } => classify_backend(err),
    }
}

/// Mono ring buffer shared between the capture callback and the sampler.
#[derive(Debug)]
struct SampleRing {
    data: Vec<f32>,
    write_idx: usize,
    filled: bool,
}

impl SampleRing {
    fn new(capacity: usize) -> Self {
        Self {
            data: vec![0.0; capacity.max(1)],
            write_idx: 0,
            filled: false,
        }
    }

    fn push(&mut self, sample: f32) {
        self.data[self.write_idx] = sample;
        self.write_idx = (self.write_idx + 1) % self.data.len();
        if self.write_idx == 0 {
            self.filled = true;
        }
    }

    fn is_empty(&self) -> bool {
        !self.filled && self.write_idx == 0
    }

    /// Copies the buffered samples, oldest first.
    fn copy_into(&self, out: &mut Vec<f32>) {
        out.clear();
        if self.filled {
            out.extend_from_slice(&self.data[self.write_idx..]);
        }
        out.extend_from_slice(&self.data[..self.write_idx]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_reports_samples_oldest_first() {
        let mut ring = SampleRing::new(4);
        assert!(ring.is_empty());

        let mut out = Vec::new();
        ring.push(1.0);
        ring.push(2.0);
        ring.copy_into(&mut out);
        assert_eq!(out, vec![1.0, 2.0]);

        for value in 3..=6 {
            ring.push(value as f32);
        }
        ring.copy_into(&mut out);
        assert_eq!(out, vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn recognises_loopback_devices() {
        assert!(is_loopback_name(
            "Monitor of Built-in Audio Analog Stereo"
        ));
        assert!(is_loopback_name("alsa_output.pci.analog-stereo.monitor"));
        assert!(!is_loopback_name("USB Microphone"));
    }

    #[test]
    fn permission_errors_are_classified() {
        let err = classify_backend(BackendSpecificError {
            description: "Permission denied by the system".into(),
        });
        assert!(matches!(err, NeonVizError::PermissionDenied));

        let err = classify_backend(BackendSpecificError {
            description: "device busy".into(),
        });
        assert!(matches!(err, NeonVizError::Backend(_)));
    }
}
