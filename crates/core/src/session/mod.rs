//! Session lifecycle and the per-tick pipeline it drives.

use std::{fmt, time::Duration};

use rand::{rngs::StdRng, Rng, SeedableRng};
use tiny_skia::Pixmap;

use crate::{
    analysis::sample_frame,
    smoothing::{bar_target, wave_target},
    BandLevels, BeatDetector, CaptureBackend, FrameClock, FrameHost, FrameId, FrameSnapshot,
    Particle, ParticleSystem, RenderFrame, Renderer, Result, Scheduler, SmoothingFilter,
    SourceKind, VisualiserConfig,
};

/// Summary of the last completed tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickReport {
    pub levels: BandLevels,
    pub beat: bool,
    pub particles: usize,
}

/// All state that persists between ticks, owned in one place and threaded
/// through each stage.
#[derive(Debug)]
pub struct Pipeline<R> {
    config: VisualiserConfig,
    beat: BeatDetector,
    bars: SmoothingFilter,
    wave: SmoothingFilter,
    particles: ParticleSystem<R>,
    renderer: Renderer,
    last: Option<TickReport>,
}

impl<R: Rng> Pipeline<R> {
    pub fn new(config: VisualiserConfig, rng: R) -> Self {
        Self {
            beat: BeatDetector::new(&config.beat),
            bars: SmoothingFilter::new(config.smoothing.bar_max_delta),
            wave: SmoothingFilter::new(config.smoothing.wave_max_delta),
            particles: ParticleSystem::new(&config.particles, rng),
            renderer: Renderer::new(config.render.clone(), config.particles.radius),
            last: None,
            config,
        }
    }

    /// Smoothed bar heights, one per frequency bin.
    pub fn bars(&self) -> &[f32] {
        self.bars.values()
    }

    /// Smoothed waveform y-coordinates, one per sample.
    pub fn waveform(&self) -> &[f32] {
        self.wave.values()
    }

    pub fn particles(&self) -> &[Particle] {
        self.particles.particles()
    }

    pub fn beat_detector(&self) -> &BeatDetector {
        &self.beat
    }

    /// Summary of the most recent tick.
    pub fn last_report(&self) -> Option<TickReport> {
        self.last
    }

    /// Drops everything learned from a previous session.
    pub fn reset(&mut self) {
        self.beat.reset();
        self.bars.clear();
        self.wave.clear();
        self.particles.clear();
        self.last = None;
    }

    /// Runs one tick over `frame` observed at `now` and paints the result.
    pub fn tick(&mut self, frame: &FrameSnapshot, now: Duration, surface: &mut Pixmap) -> TickReport {
        let width = surface.width() as f32;
        let height = surface.height() as f32;

        let levels = BandLevels::from_snapshot(&frame.frequency);
        let beat = self.beat.update(levels.bass, now);
        if beat {
            let particles = &self.config.particles;
            self.particles.burst(
                (width / 2.0, height / 2.0),
                particles.intensity,
                particles.burst_count,
            );
        }
        self.particles.advance();
        self.particles.cull();

        let smoothing = &self.config.smoothing;
        self.bars.follow(
            frame
                .frequency
                .bins()
                .iter()
                .map(|&m| bar_target(m, height, smoothing.bar_height_ratio)),
            0.0,
        );
        self.wave.follow(
            frame
                .waveform
                .samples()
                .iter()
                .map(|&s| wave_target(s, height, smoothing.wave_offset)),
            height / 2.0,
        );

        self.renderer.draw(
            surface,
            &RenderFrame {
                bars: self.bars.values(),
                magnitudes: frame.frequency.bins(),
                waveform: self.wave.values(),
                particles: self.particles.particles(),
            },
        );

        let report = TickReport {
            levels,
            beat,
            particles: self.particles.len(),
        };
        tracing::trace!(
            bass = levels.bass,
            mid = levels.mid,
            treble = levels.treble,
            beat,
            particles = report.particles,
            "tick"
        );
        self.last = Some(report);
        report
    }
}

/// One visualisation session: the capture handle, the frame loop and the
/// pipeline state.
///
/// Dropping the session releases a still-held capture handle.
pub struct Session<B: CaptureBackend, R = StdRng> {
    backend: B,
    handle: Option<B::Handle>,
    source: Option<SourceKind>,
    error_message: Option<String>,
    scheduler: Scheduler,
    pipeline: Pipeline<R>,
    clock: FrameClock,
}

impl<B: CaptureBackend> Session<B, StdRng> {
    /// Creates a stopped session seeding its particles from OS entropy.
    pub fn new(backend: B, config: VisualiserConfig) -> Self {
        Self::with_rng(backend, config, StdRng::from_entropy())
    }
}

impl<B: CaptureBackend, R: Rng> Session<B, R> {
    /// Creates a session drawing particle randomness from `rng`.
    pub fn with_rng(backend: B, config: VisualiserConfig, rng: R) -> Self {
        Self {
            backend,
            handle: None,
            source: None,
            error_message: None,
            scheduler: Scheduler::new(),
            pipeline: Pipeline::new(config, rng),
            clock: FrameClock::start(),
        }
    }

    /// True while a handle is held and the frame loop is active.
    pub fn is_playing(&self) -> bool {
        self.handle.is_some() && self.scheduler.is_active()
    }

    pub fn source(&self) -> Option<SourceKind> {
        self.source
    }

    /// Message describing the last failed start, if any.
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn has_handle(&self) -> bool {
        self.handle.is_some()
    }

    /// The capture handle held while playing.
    pub fn handle(&self) -> Option<&B::Handle> {
        self.handle.as_ref()
    }

    pub fn pipeline(&self) -> &Pipeline<R> {
        &self.pipeline
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Acquires `source` and arms the frame loop. A running session is
    /// stopped first. On failure all session state is reset and the error's
    /// message is kept for display.
    pub fn start(&mut self, source: SourceKind, host: &mut impl FrameHost) -> Result<()> {
        if self.handle.is_some() || self.scheduler.is_active() {
            self.stop(host);
        }

        match self.backend.acquire(source) {
            Ok(handle) => {
                self.handle = Some(handle);
                self.source = Some(source);
                self.error_message = None;
                self.pipeline.reset();
                self.clock.reset();
                self.scheduler.arm(host);
                tracing::info!(%source, "session started");
                Ok(())
            }
            Err(err) => {
                self.scheduler.disarm(host);
                self.handle = None;
                self.source = None;
                self.error_message = Some(err.to_string());
                tracing::warn!(%source, %err, "could not start session");
                Err(err)
            }
        }
    }

    /// Releases the capture handle, cancels the pending frame and clears the
    /// source and error state. Safe to call when already stopped.
    pub fn stop(&mut self, host: &mut impl FrameHost) {
        if let Some(handle) = self.handle.take() {
            self.backend.release(handle);
            tracing::info!(source = ?self.source, "session stopped");
        }
        self.scheduler.disarm(host);
        self.source = None;
        self.error_message = None;
    }

    /// Host callback using the session clock for `now`.
    pub fn on_frame<H: FrameHost>(&mut self, id: FrameId, host: &mut H, surface: &mut Pixmap) -> bool {
        let now = self.clock.elapsed();
        self.on_frame_at(id, host, surface, now)
    }

    /// Host callback at an explicit session time. Returns whether the
    /// callback was the pending frame of an active session.
    pub fn on_frame_at<H: FrameHost>(
        &mut self,
        id: FrameId,
        host: &mut H,
        surface: &mut Pixmap,
        now: Duration,
    ) -> bool {
        let Self {
            backend,
            handle,
            scheduler,
            pipeline,
            ..
        } = self;
        scheduler.on_frame(id, host, || {
            if let Some(frame) = sample_frame(backend, handle.as_mut()) {
                pipeline.tick(&frame, now, surface);
            }
        })
    }
}

impl<B: CaptureBackend, R> Drop for Session<B, R> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            tracing::debug!("releasing capture handle on drop");
            self.backend.release(handle);
        }
    }
}

impl<B: CaptureBackend, R> fmt::Debug for Session<B, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("source", &self.source)
            .field("has_handle", &self.handle.is_some())
            .field("error_message", &self.error_message)
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ReplayCapture, ReplayFailure};

    #[derive(Debug, Default)]
    struct ManualHost {
        next: FrameId,
        cancelled: Vec<FrameId>,
    }

    impl FrameHost for ManualHost {
        fn request_frame(&mut self) -> FrameId {
            self.next += 1;
            self.next
        }

        fn cancel_frame(&mut self, id: FrameId) {
            self.cancelled.push(id);
        }
    }

    fn silent() -> FrameSnapshot {
        FrameSnapshot::from_bytes(vec![0; 128], vec![128; 128])
    }

    fn session(frames: Vec<FrameSnapshot>) -> Session<ReplayCapture, StdRng> {
        Session::with_rng(
            ReplayCapture::new(frames),
            VisualiserConfig::default(),
            StdRng::seed_from_u64(9),
        )
    }

    #[test]
    fn start_arms_and_stop_releases() {
        let mut host = ManualHost::default();
        let mut session = session(vec![silent()]);

        session.start(SourceKind::Microphone, &mut host).unwrap();
        assert!(session.is_playing());
        assert_eq!(session.source(), Some(SourceKind::Microphone));
        assert_eq!(
            session.handle().map(|handle| handle.source()),
            Some(SourceKind::Microphone)
        );
        assert_eq!(session.scheduler().pending(), Some(1));

        session.stop(&mut host);
        assert!(!session.is_playing());
        assert_eq!(session.source(), None);
        assert!(session.handle().is_none());
        assert_eq!(host.cancelled, vec![1]);
        assert_eq!(session.backend().live_handles(), 0);
        assert_eq!(session.backend().released_handles(), 1);
    }

    #[test]
    fn frames_after_stop_do_not_tick() {
        let mut host = ManualHost::default();
        let mut surface = Pixmap::new(64, 32).unwrap();
        let mut session = session(vec![silent()]);

        session.start(SourceKind::Microphone, &mut host).unwrap();
        assert!(session.on_frame_at(1, &mut host, &mut surface, Duration::ZERO));
        session.stop(&mut host);

        assert!(!session.on_frame_at(2, &mut host, &mut surface, Duration::from_millis(16)));
        assert_eq!(host.next, 2);
    }

    #[test]
    fn restarting_replaces_the_handle() {
        let mut host = ManualHost::default();
        let mut session = session(vec![silent()]);

        session.start(SourceKind::Microphone, &mut host).unwrap();
        session.start(SourceKind::SharedDisplay, &mut host).unwrap();

        assert_eq!(session.source(), Some(SourceKind::SharedDisplay));
        assert_eq!(session.backend().live_handles(), 1);
        assert_eq!(session.backend().released_handles(), 1);
        assert_eq!(session.scheduler().pending(), Some(2));
    }

    #[test]
    fn failed_start_resets_state() {
        let mut host = ManualHost::default();
        let mut session = Session::with_rng(
            ReplayCapture::new([silent()]).failing_with(ReplayFailure::PermissionDenied),
            VisualiserConfig::default(),
            StdRng::seed_from_u64(1),
        );

        let err = session.start(SourceKind::Microphone, &mut host).unwrap_err();
        assert!(err.is_acquisition());
        assert!(!session.is_playing());
        assert!(!session.has_handle());
        assert_eq!(session.source(), None);
        assert!(session.error_message().unwrap().contains("permission"));
        assert_eq!(session.scheduler().pending(), None);

        session.stop(&mut host);
        assert_eq!(session.error_message(), None);
    }

    #[test]
    fn missing_snapshot_skips_the_tick_but_keeps_looping() {
        let mut host = ManualHost::default();
        let mut surface = Pixmap::new(64, 32).unwrap();
        let mut session = session(Vec::new());

        session.start(SourceKind::Microphone, &mut host).unwrap();
        assert!(session.on_frame_at(1, &mut host, &mut surface, Duration::ZERO));
        assert!(session.pipeline().last_report().is_none());
        assert_eq!(session.scheduler().pending(), Some(2));
    }

    #[test]
    fn drop_releases_held_handle() {
        use std::{cell::Cell, rc::Rc};

        struct CountingBackend {
            released: Rc<Cell<usize>>,
        }

        impl CaptureBackend for CountingBackend {
            type Handle = ();

            fn acquire(&mut self, _source: SourceKind) -> Result<()> {
                Ok(())
            }

            fn release(&mut self, _handle: ()) {
                self.released.set(self.released.get() + 1);
            }

            fn poll_snapshot(&mut self, _handle: &mut ()) -> Option<FrameSnapshot> {
                None
            }
        }

        let released = Rc::new(Cell::new(0));
        let mut host = ManualHost::default();
        {
            let mut session = Session::with_rng(
                CountingBackend {
                    released: released.clone(),
                },
                VisualiserConfig::default(),
                StdRng::seed_from_u64(2),
            );
            session.start(SourceKind::Microphone, &mut host).unwrap();
        }
        assert_eq!(released.get(), 1);
    }
}
