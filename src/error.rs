//! Error taxonomy for the synchronization engine
//!
//! Resolver and renderer errors are logged and swallowed. Controller errors
//! (load, playback) become user-visible state. `severity()` tells the two apart.

use thiserror::Error;

/// How an error affects the current chapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The chapter cannot be played; the controller enters `Error`
    Fatal,
    /// Playback continues without (some) highlighting
    Degraded,
}

/// What a failed fetch was trying to load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    Chapters,
    Audio,
    Timings,
}

impl std::fmt::Display for DataKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataKind::Chapters => write!(f, "chapter metadata"),
            DataKind::Audio => write!(f, "audio source"),
            DataKind::Timings => write!(f, "timing table"),
        }
    }
}

/// Playback engine refused or could not play
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybackError {
    #[error("no audio source is loaded")]
    NotLoaded,

    #[error("playback rejected: {reason}")]
    Rejected { reason: String },

    #[error("audio could not be decoded: {reason}")]
    Decode { reason: String },
}

/// Errors surfaced to `on_error` subscribers
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlayerError {
    #[error("{what} unavailable: {reason}")]
    DataUnavailable { what: DataKind, reason: String },

    #[error(transparent)]
    Playback(#[from] PlaybackError),

    #[error("highlight target unavailable: {reason}")]
    RenderTargetUnavailable { reason: String },

    #[error("malformed timing data: {reason}")]
    MalformedTimingData { reason: String },
}

impl PlayerError {
    pub fn unavailable(what: DataKind, reason: impl std::fmt::Display) -> Self {
        PlayerError::DataUnavailable {
            what,
            reason: reason.to_string(),
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            PlayerError::DataUnavailable {
                what: DataKind::Timings,
                ..
            } => Severity::Degraded,
            PlayerError::DataUnavailable { .. } | PlayerError::Playback(_) => Severity::Fatal,
            PlayerError::RenderTargetUnavailable { .. }
            | PlayerError::MalformedTimingData { .. } => Severity::Degraded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timing_unavailable_only_degrades() {
        let err = PlayerError::unavailable(DataKind::Timings, "404");
        assert_eq!(err.severity(), Severity::Degraded);
        assert_eq!(err.to_string(), "timing table unavailable: 404");
    }

    #[test]
    fn test_audio_and_playback_are_fatal() {
        assert_eq!(
            PlayerError::unavailable(DataKind::Audio, "timeout").severity(),
            Severity::Fatal
        );
        let err: PlayerError = PlaybackError::NotLoaded.into();
        assert_eq!(err.severity(), Severity::Fatal);
        assert_eq!(err.to_string(), "no audio source is loaded");
    }
}
