//! Playback events
//!
//! - `EngineEvent` - reported by a `MediaEngine`, tagged with a `LoadTicket`
//! - `ClockEvent` - what `PlaybackClock` makes of them after dropping stale ones
//!
//! ## Flow
//! ```text
//! MediaEngine --[EngineEvent]--> PlaybackClock --[ClockEvent]--> PlayerController
//! ```

use std::time::Duration;

use super::engine::LoadTicket;
use crate::error::PlayerError;

/// Events emitted by a playback engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Source is decoded and ready; `duration_ms` is 0 when unknown
    Loaded { ticket: LoadTicket, duration_ms: u64 },
    /// Source could not be fetched or decoded
    LoadFailed { ticket: LoadTicket, error: PlayerError },
    /// Position report at the engine's natural cadence
    TimeUpdate { ticket: LoadTicket, position_ms: u64 },
    /// A seek has been applied; reports after this one are from the new position
    Seeked { ticket: LoadTicket, position_ms: u64 },
    /// Output reached the end of the source
    Ended { ticket: LoadTicket },
}

impl EngineEvent {
    pub fn ticket(&self) -> LoadTicket {
        match self {
            EngineEvent::Loaded { ticket, .. }
            | EngineEvent::LoadFailed { ticket, .. }
            | EngineEvent::TimeUpdate { ticket, .. }
            | EngineEvent::Seeked { ticket, .. }
            | EngineEvent::Ended { ticket } => *ticket,
        }
    }
}

/// Events produced by `PlaybackClock`
#[derive(Debug, Clone, PartialEq)]
pub enum ClockEvent {
    Loaded { duration_ms: u64 },
    LoadFailed(PlayerError),
    Position { position_ms: u64 },
    Ended,
}

/// Commands sent from `RodioEngine` to its audio thread
pub(crate) enum AudioCommand {
    Source { ticket: LoadTicket, bytes: Vec<u8> },
    Failed { ticket: LoadTicket, reason: String },
    Play,
    Pause,
    Seek { position: Duration },
    SetVolume { volume: f32 },
    Unload,
    Shutdown,
}

impl std::fmt::Debug for AudioCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Source { ticket, bytes } => f
                .debug_struct("Source")
                .field("ticket", ticket)
                .field("bytes", &bytes.len())
                .finish(),
            Self::Failed { ticket, reason } => f
                .debug_struct("Failed")
                .field("ticket", ticket)
                .field("reason", reason)
                .finish(),
            Self::Play => write!(f, "Play"),
            Self::Pause => write!(f, "Pause"),
            Self::Seek { position } => f.debug_struct("Seek").field("position", position).finish(),
            Self::SetVolume { volume } => {
                f.debug_struct("SetVolume").field("volume", volume).finish()
            }
            Self::Unload => write!(f, "Unload"),
            Self::Shutdown => write!(f, "Shutdown"),
        }
    }
}

// ============ Channel Types ============

/// Sender for audio commands (held by `RodioEngine` and its download tasks)
pub(crate) type AudioCommandSender = tokio::sync::mpsc::UnboundedSender<AudioCommand>;

/// Receiver for audio commands (held by the audio thread)
pub(crate) type AudioCommandReceiver = tokio::sync::mpsc::UnboundedReceiver<AudioCommand>;

/// Create a new audio command channel
pub(crate) fn audio_command_channel() -> (AudioCommandSender, AudioCommandReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}

/// Sender for engine events (held by the engine)
pub type EngineEventSender = tokio::sync::mpsc::UnboundedSender<EngineEvent>;

/// Receiver for engine events (held by the driver)
pub type EngineEventReceiver = tokio::sync::mpsc::UnboundedReceiver<EngineEvent>;

/// Create a new engine event channel
pub fn engine_event_channel() -> (EngineEventSender, EngineEventReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}
