use std::time::{Duration, Instant};

/// Fastest refresh rate a [`PacedHost`] will pace at.
pub const MAX_REFRESH_HZ: u32 = 1000;

/// Identifier of a frame callback requested from a [`FrameHost`].
pub type FrameId = u64;

/// Display-refresh scheduling primitive provided by the host.
pub trait FrameHost {
    /// Asks for a callback on the next refresh.
    fn request_frame(&mut self) -> FrameId;

    /// Withdraws a previously requested callback.
    fn cancel_frame(&mut self, id: FrameId);
}

/// Monotonic clock measuring time since the session started.
#[derive(Debug, Clone, Copy)]
pub struct FrameClock {
    started: Instant,
}

impl FrameClock {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Restarts measuring from now.
    pub fn reset(&mut self) {
        self.started = Instant::now();
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::start()
    }
}

/// Drives the per-frame tick while a session is active.
///
/// At most one callback is pending at any time. Callbacks that are not the
/// pending one (cancelled or superseded) are ignored.
#[derive(Debug, Default)]
pub struct Scheduler {
    pending: Option<FrameId>,
    active: bool,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the loop will keep rescheduling.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// The callback currently awaited, if any.
    pub fn pending(&self) -> Option<FrameId> {
        self.pending
    }

    /// Activates the loop and requests the first frame if none is pending.
    pub fn arm(&mut self, host: &mut impl FrameHost) {
        self.active = true;
        if self.pending.is_none() {
            self.pending = Some(host.request_frame());
        }
    }

    /// Deactivates the loop and cancels the pending frame.
    pub fn disarm(&mut self, host: &mut impl FrameHost) {
        self.active = false;
        if let Some(id) = self.pending.take() {
            host.cancel_frame(id);
        }
    }

    /// Handles a host callback. Runs `tick` and reschedules when the callback
    /// is the pending one and the loop is active; returns whether it ran.
    pub fn on_frame<H: FrameHost>(
        &mut self,
        id: FrameId,
        host: &mut H,
        tick: impl FnOnce(),
    ) -> bool {
        if self.pending != Some(id) {
            tracing::trace!(id, "ignoring stale frame callback");
            return false;
        }
        self.pending = None;
        if !self.active {
            return false;
        }
        tick();
        self.pending = Some(host.request_frame());
        true
    }
}

/// [`FrameHost`] for a desktop loop: releases one requested frame per
/// refresh interval.
#[derive(Debug)]
pub struct PacedHost {
    interval: Duration,
    next_id: FrameId,
    requested: Option<FrameId>,
    next_due: Instant,
}

impl PacedHost {
    /// Creates a host releasing frames at `refresh_hz`, clamped to
    /// `1..=MAX_REFRESH_HZ`.
    pub fn new(refresh_hz: u32) -> Self {
        let hz = refresh_hz.clamp(1, MAX_REFRESH_HZ);
        let interval = Duration::from_secs(1) / hz;
        Self {
            interval,
            next_id: 0,
            requested: None,
            next_due: Instant::now(),
        }
    }

    /// Time between two released frames.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns the requested frame and the instant it is due at.
    pub fn due(&self) -> Option<(FrameId, Instant)> {
        self.requested.map(|id| (id, self.next_due))
    }

    /// Hands out the requested frame if it is due at `now`.
    pub fn take_due(&mut self, now: Instant) -> Option<FrameId> {
        match self.requested {
            Some(id) if now >= self.next_due => {
                self.requested = None;
                // Skip missed refreshes instead of bursting to catch up.
                self.next_due += self.interval;
                if self.next_due <= now {
                    self.next_due = now + self.interval;
                }
                Some(id)
            }
            _ => None,
        }
    }
}

impl FrameHost for PacedHost {
    fn request_frame(&mut self) -> FrameId {
        self.next_id += 1;
        self.requested = Some(self.next_id);
        self.next_id
    }

    fn cancel_frame(&mut self, id: FrameId) {
        if self.requested == Some(id) {
            self.requested = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct RecordingHost {
        next: FrameId,
        requested: Vec<FrameId>,
        cancelled: Vec<FrameId>,
    }

    impl FrameHost for RecordingHost {
        fn request_frame(&mut self) -> FrameId {
            self.next += 1;
            self.requested.push(self.next);
            self.next
        }

        fn cancel_frame(&mut self, id: FrameId) {
            self.cancelled.push(id);
        }
    }

    #[test]
    fn keeps_a_single_pending_frame() {
        let mut host = RecordingHost::default();
        let mut scheduler = Scheduler::new();

        scheduler.arm(&mut host);
        scheduler.arm(&mut host);
        assert_eq!(host.requested, vec![1]);

        let mut ticks = 0;
        assert!(scheduler.on_frame(1, &mut host, || ticks += 1));
        assert_eq!(ticks, 1);
        assert_eq!(scheduler.pending(), Some(2));
        assert_eq!(host.requested, vec![1, 2]);
    }

    #[test]
    fn disarm_cancels_and_stops_rescheduling() {
        let mut host = RecordingHost::default();
        let mut scheduler = Scheduler::new();
        scheduler.arm(&mut host);

        scheduler.disarm(&mut host);
        assert_eq!(host.cancelled, vec![1]);
        assert_eq!(scheduler.pending(), None);

        // A callback already in flight must not tick.
        let mut ticked = false;
        assert!(!scheduler.on_frame(1, &mut host, || ticked = true));
        assert!(!ticked);
        assert_eq!(host.requested, vec![1]);
    }

    #[test]
    fn stale_callbacks_are_ignored() {
        let mut host = RecordingHost::default();
        let mut scheduler = Scheduler::new();
        scheduler.arm(&mut host);

        let mut ticked = false;
        assert!(!scheduler.on_frame(42, &mut host, || ticked = true));
        assert!(!ticked);
        assert_eq!(scheduler.pending(), Some(1));
    }

    #[test]
    fn paced_host_releases_frames_on_interval() {
        let mut host = PacedHost::new(50);
        let start = Instant::now();
        let id = host.request_frame();

        assert_eq!(host.take_due(start + Duration::from_millis(1)), Some(id));
        assert_eq!(host.take_due(start + Duration::from_millis(2)), None);

        let next = host.request_frame();
        let (due_id, due_at) = host.due().unwrap();
        assert_eq!(due_id, next);
        assert!(host.take_due(due_at - Duration::from_millis(1)).is_none());
        assert_eq!(host.take_due(due_at), Some(next));
    }

    #[test]
    fn paced_host_clamps_extreme_rates() {
        let mut host = PacedHost::new(u32::MAX);
        assert_eq!(host.interval(), Duration::from_millis(1));
        assert_eq!(PacedHost::new(0).interval(), Duration::from_secs(1));

        let start = Instant::now();
        let id = host.request_frame();
        assert_eq!(host.take_due(start + Duration::from_secs(3600)), Some(id));
        let next = host.request_frame();
        let (_, due_at) = host.due().unwrap();
        assert!(due_at > start + Duration::from_secs(3600));
        assert_eq!(host.take_due(due_at), Some(next));
    }

    #[test]
    fn paced_host_drops_cancelled_frames() {
        let mut host = PacedHost::new(60);
        let id = host.request_frame();
        host.cancel_frame(id);
        assert!(host.due().is_none());
        assert!(host.take_due(Instant::now() + Duration::from_secs(1)).is_none());
    }

    #[test]
    fn clock_is_monotonic() {
        let clock = FrameClock::start();
        let first = clock.elapsed();
        assert!(clock.elapsed() >= first);
    }
}
