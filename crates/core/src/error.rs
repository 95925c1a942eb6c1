/// Result alias that carries the custom [`NeonVizError`] type.
pub type Result<T> = std::result::Result<T, NeonVizError>;

/// Common error type for the core crate.
///
/// The acquisition variants render as the message shown to the user when a
/// session cannot be started.
#[derive(Debug, thiserror::Error)]
pub enum NeonVizError {
    /// The platform refused access to the capture device.
    #[error("permission to capture audio was denied; allow access to the audio device and try again")]
    PermissionDenied,
    /// No capture device was available for the requested source.
    #[error("no audio device is available for the selected source")]
    DeviceUnavailable,
    /// The requested capture mode is not supported on this host.
    #[error("audio capture is not supported on this system: {0}")]
    NotSupported(String),
    /// The selected source exposes no audio track.
    #[error("no audio available: the selected source does not carry any audio track")]
    NoAudioTrack,
    /// Capture backend failure that fits none of the categories above.
    #[error("audio backend error: {0}")]
    Backend(String),
    /// The configuration file could not be parsed.
    #[error("invalid configuration file: {0}")]
    Config(#[from] serde_json::Error),
    /// A configuration value is outside its supported range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// Free-form message for failures outside the capture path.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl NeonVizError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Returns true for the failures that abort a capture acquisition.
    pub fn is_acquisition(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied
                | Self::DeviceUnavailable
                | Self::NotSupported(_)
                | Self::NoAudioTrack
                | Self::Backend(_)
        )
    }
}

impl From<&str> for NeonVizError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for NeonVizError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_acquisition_failures() {
        assert!(NeonVizError::NoAudioTrack.is_acquisition());
        assert!(NeonVizError::PermissionDenied.is_acquisition());
        assert!(!NeonVizError::msg("other").is_acquisition());
        assert!(!NeonVizError::InvalidConfig("fft").is_acquisition());
    }

    #[test]
    fn missing_track_message_mentions_audio() {
        let text = NeonVizError::NoAudioTrack.to_string();
        assert!(text.starts_with("no audio available"));
    }
}
