//! Core library for the Neon Visualiser.
//!
//! Each module owns one stage of the per-tick pipeline: capture
//! (`audio`), snapshot analysis (`analysis`), beat detection (`beat`),
//! temporal smoothing (`smoothing`), the particle simulation (`particles`)
//! and raster output (`render`). `timeline` paces the loop and `session`
//! ties everything to the lifetime of one capture handle.

pub mod analysis;
pub mod audio;
pub mod beat;
pub mod config;
pub mod error;
pub mod particles;
pub mod render;
pub mod session;
pub mod smoothing;
pub mod timeline;

pub use analysis::{
    sample_frame, BandLevels, ByteAnalyser, FrameSnapshot, FrequencySnapshot, WaveformSnapshot,
};
pub use audio::{
    list_input_devices, CaptureBackend, DeviceCapture, DeviceInfo, LiveCapture, ReplayCapture,
    ReplayFailure, ReplayHandle, SourceKind,
};
pub use beat::BeatDetector;
pub use config::{
    AudioConfig, BeatConfig, ParticleConfig, RenderConfig, SmoothingConfig, VisualiserConfig,
};
pub use error::{NeonVizError, Result};
pub use particles::{Particle, ParticleSystem, NEON_PALETTE};
pub use render::{hsl_to_rgb, RenderFrame, Renderer};
pub use session::{Pipeline, Session, TickReport};
pub use smoothing::SmoothingFilter;
pub use timeline::{FrameClock, FrameHost, FrameId, PacedHost, Scheduler, MAX_REFRESH_HZ};
