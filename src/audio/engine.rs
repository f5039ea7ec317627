//! Playback device seam
//!
//! A `MediaEngine` is the thing that actually makes sound. Commands are
//! synchronous and return immediately; results (load completion, time
//! updates, end of track) come back later as `EngineEvent`s tagged with the
//! `LoadTicket` they belong to.

use super::events::{EngineEvent, EngineEventSender};
use crate::error::PlaybackError;

/// Identifies one `load` request. Later tickets supersede earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoadTicket(pub u64);

impl std::fmt::Display for LoadTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An audio output that can load, play, pause and seek one source at a time
pub trait MediaEngine {
    /// Start loading `url`. Completion is reported as `EngineEvent::Loaded`
    /// or `EngineEvent::LoadFailed` carrying `ticket`.
    fn load(&mut self, ticket: LoadTicket, url: &str);

    /// Start or resume output. Errors when the device refuses.
    fn play(&mut self) -> Result<(), PlaybackError>;

    fn pause(&mut self);

    /// Move the position. Once applied, reported as `EngineEvent::Seeked`;
    /// time updates before that still describe the old position.
    fn seek(&mut self, position_ms: u64);

    /// Output volume, 0.0 - 1.0
    fn set_volume(&mut self, volume: f32);

    /// Drop the current source and ignore any load still in flight
    fn unload(&mut self);
}

impl<E: MediaEngine + ?Sized> MediaEngine for Box<E> {
    fn load(&mut self, ticket: LoadTicket, url: &str) {
        (**self).load(ticket, url)
    }

    fn play(&mut self) -> Result<(), PlaybackError> {
        (**self).play()
    }

    fn pause(&mut self) {
        (**self).pause()
    }

    fn seek(&mut self, position_ms: u64) {
        (**self).seek(position_ms)
    }

    fn set_volume(&mut self, volume: f32) {
        (**self).set_volume(volume)
    }

    fn unload(&mut self) {
        (**self).unload()
    }
}

/// A call received by `RecordingEngine`
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Load { ticket: LoadTicket, url: String },
    Play,
    Pause,
    Seek(u64),
    SetVolume(f32),
    Unload,
}

/// Engine that plays nothing and records every command.
///
/// Useful for headless hosts and tests. `reject_play` makes `play` fail the
/// way a browser autoplay policy would.
#[derive(Debug, Default)]
pub struct RecordingEngine {
    calls: Vec<EngineCall>,
    reject_play: Option<String>,
    /// When set, every `load` immediately reports `Loaded` with this
    /// duration and every `seek` reports `Seeked`
    complete_loads: Option<(EngineEventSender, u64)>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[EngineCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<EngineCall> {
        std::mem::take(&mut self.calls)
    }

    /// Report every load as finished on `events`, with `duration_ms`
    pub fn complete_loads(mut self, events: EngineEventSender, duration_ms: u64) -> Self {
        self.complete_loads = Some((events, duration_ms));
        self
    }

    /// URLs passed to `load`, oldest first
    pub fn loaded_urls(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                EngineCall::Load { url, .. } => Some(url.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn reject_play(&mut self, reason: Option<&str>) {
        self.reject_play = reason.map(str::to_string);
    }

    /// Ticket of the most recent `load`
    pub fn last_ticket(&self) -> Option<LoadTicket> {
        self.calls.iter().rev().find_map(|call| match call {
            EngineCall::Load { ticket, .. } => Some(*ticket),
            _ => None,
        })
    }

    pub fn last_volume(&self) -> Option<f32> {
        self.calls.iter().rev().find_map(|call| match call {
            EngineCall::SetVolume(v) => Some(*v),
            _ => None,
        })
    }
}

impl MediaEngine for RecordingEngine {
    fn load(&mut self, ticket: LoadTicket, url: &str) {
        self.calls.push(EngineCall::Load {
            ticket,
            url: url.to_string(),
        });
        if let Some((events, duration_ms)) = &self.complete_loads {
            let _ = events.send(EngineEvent::Loaded {
                ticket,
                duration_ms: *duration_ms,
            });
        }
    }

    fn play(&mut self) -> Result<(), PlaybackError> {
        if let Some(reason) = &self.reject_play {
            return Err(PlaybackError::Rejected {
                reason: reason.clone(),
            });
        }
        self.calls.push(EngineCall::Play);
        Ok(())
    }

    fn pause(&mut self) {
        self.calls.push(EngineCall::Pause);
    }

    fn seek(&mut self, position_ms: u64) {
        self.calls.push(EngineCall::Seek(position_ms));
        if let (Some((events, _)), Some(ticket)) = (&self.complete_loads, self.last_ticket()) {
            let _ = events.send(EngineEvent::Seeked {
                ticket,
                position_ms,
            });
        }
    }

    fn set_volume(&mut self, volume: f32) {
        self.calls.push(EngineCall::SetVolume(volume));
    }

    fn unload(&mut self) {
        self.calls.push(EngineCall::Unload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::events::engine_event_channel;

    #[test]
    fn test_recording_engine_rejects_play_on_request() {
        let mut engine = RecordingEngine::new();
        engine.reject_play(Some("autoplay blocked"));
        assert!(matches!(engine.play(), Err(PlaybackError::Rejected { .. })));

        engine.reject_play(None);
        assert!(engine.play().is_ok());
        assert_eq!(engine.calls(), &[EngineCall::Play]);
    }

    #[test]
    fn test_completed_loads_report_loaded() {
        let (tx, mut rx) = engine_event_channel();
        let mut engine = RecordingEngine::new().complete_loads(tx, 4000);
        engine.load(LoadTicket(3), "mem://a.mp3");

        assert_eq!(
            rx.try_recv().unwrap(),
            EngineEvent::Loaded {
                ticket: LoadTicket(3),
                duration_ms: 4000
            }
        );
        assert_eq!(engine.loaded_urls(), vec!["mem://a.mp3"]);
        assert_eq!(engine.last_ticket(), Some(LoadTicket(3)));

        engine.seek(1500);
        assert_eq!(
            rx.try_recv().unwrap(),
            EngineEvent::Seeked {
                ticket: LoadTicket(3),
                position_ms: 1500
            }
        );
    }
}
