use std::{collections::VecDeque, fmt};

use serde::{Deserialize, Serialize};

use crate::{FrameSnapshot, NeonVizError, Result};

mod device;

pub use device::{list_input_devices, DeviceCapture, DeviceInfo, LiveCapture};

/// Which audio the user asked to visualise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// The default capture device.
    Microphone,
    /// A loopback of what the system is currently playing.
    SharedDisplay,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Microphone => f.write_str("microphone"),
            Self::SharedDisplay => f.write_str("shared display audio"),
        }
    }
}

/// Capability interface over the platform capture API.
///
/// `acquire` either yields a usable handle or fails with one of the
/// acquisition errors; the caller hands the handle back through `release`.
pub trait CaptureBackend {
    type Handle;

    fn acquire(&mut self, source: SourceKind) -> Result<Self::Handle>;

    fn release(&mut self, handle: Self::Handle);

    /// Latest analysis snapshot, or `None` when nothing is available yet.
    fn poll_snapshot(&mut self, handle: &mut Self::Handle) -> Option<FrameSnapshot>;
}

/// Synthetic backend that replays a fixed snapshot sequence.
///
/// After the sequence is exhausted the last snapshot keeps repeating. It can
/// be told to fail acquisition to exercise the error paths.
#[derive(Debug, Default)]
pub struct ReplayCapture {
    frames: VecDeque<FrameSnapshot>,
    last: Option<FrameSnapshot>,
    failure: Option<ReplayFailure>,
    next_id: u64,
    live: usize,
    released: usize,
}

/// Acquisition outcome a [`ReplayCapture`] can be forced into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayFailure {
    PermissionDenied,
    DeviceUnavailable,
    NotSupported,
    NoAudioTrack,
}

impl ReplayFailure {
    fn to_error(self) -> NeonVizError {
        match self {
            Self::PermissionDenied => NeonVizError::PermissionDenied,
            Self::DeviceUnavailable => NeonVizError::DeviceUnavailable,
            Self::NotSupported => {
                NeonVizError::NotSupported("replay backend configured to refuse".into())
            }
            Self::NoAudioTrack => NeonVizError::NoAudioTrack,
        }
    }
}

/// Handle issued by [`ReplayCapture`].
#[derive(Debug, PartialEq, Eq)]
pub struct ReplayHandle {
    id: u64,
    source: SourceKind,
}

impl ReplayHandle {
    /// Source the handle was acquired for.
    pub fn source(&self) -> SourceKind {
        self.source
    }
}

impl ReplayCapture {
    /// Replays `frames` in order, then keeps repeating the last one.
    pub fn new(frames: impl IntoIterator<Item = FrameSnapshot>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Makes every subsequent acquisition fail.
    pub fn failing_with(mut self, failure: ReplayFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    /// Handles acquired and not yet released.
    pub fn live_handles(&self) -> usize {
        self.live
    }

    /// Handles released so far.
    pub fn released_handles(&self) -> usize {
        self.released
    }
}

impl CaptureBackend for ReplayCapture {
    type Handle = ReplayHandle;

    fn acquire(&mut self, source: SourceKind) -> Result<ReplayHandle> {
        if let Some(failure) = self.failure {
            return Err(failure.to_error());
        }
        self.next_id += 1;
        self.live += 1;
        Ok(ReplayHandle {
            id: self.next_id,
            source,
        })
    }

    fn release(&mut self, handle: ReplayHandle) {
        tracing::trace!(id = handle.id, "releasing replay handle");
        self.live = self.live.saturating_sub(1);
        self.released += 1;
    }

    fn poll_snapshot(&mut self, _handle: &mut ReplayHandle) -> Option<FrameSnapshot> {
        if let Some(frame) = self.frames.pop_front() {
            self.last = Some(frame);
        }
        self.last.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(value: u8) -> FrameSnapshot {
        FrameSnapshot::from_bytes(vec![value; 128], vec![128; 128])
    }

    #[test]
    fn replays_then_repeats_last_frame() {
        let mut capture = ReplayCapture::new([frame(1), frame(2)]);
        let mut handle = capture.acquire(SourceKind::Microphone).unwrap();

        let values: Vec<u8> = (0..4)
            .map(|_| capture.poll_snapshot(&mut handle).unwrap().frequency.bins()[0])
            .collect();
        assert_eq!(values, vec![1, 2, 2, 2]);
    }

    #[test]
    fn empty_replay_has_nothing_to_report() {
        let mut capture = ReplayCapture::default();
        let mut handle = capture.acquire(SourceKind::SharedDisplay).unwrap();
        assert_eq!(handle.source(), SourceKind::SharedDisplay);
        assert!(capture.poll_snapshot(&mut handle).is_none());
    }

    #[test]
    fn tracks_handle_lifetimes() {
        let mut capture = ReplayCapture::new([frame(0)]);
        let handle = capture.acquire(SourceKind::Microphone).unwrap();
        assert_eq!(capture.live_handles(), 1);

        capture.release(handle);
        assert_eq!(capture.live_handles(), 0);
        assert_eq!(capture.released_handles(), 1);
    }

    #[test]
    fn forced_failure_issues_no_handle() {
        let mut capture = ReplayCapture::new([frame(0)]).failing_with(ReplayFailure::NoAudioTrack);
        let err = capture.acquire(SourceKind::SharedDisplay).unwrap_err();
        assert!(matches!(err, NeonVizError::NoAudioTrack));
        assert_eq!(capture.live_handles(), 0);
    }
}
