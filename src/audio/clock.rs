//! Playback clock
//!
//! Wraps one `MediaEngine` and owns the authoritative `PlaybackState`.
//! Every `load` gets a fresh `LoadTicket`; engine events carrying any other
//! ticket are stale and dropped, so a superseded load can never be applied.
//! Likewise a position report queued before a seek took effect is dropped
//! until the engine confirms the seek with `Seeked`.

use super::engine::{LoadTicket, MediaEngine};
use super::events::{ClockEvent, EngineEvent};
use crate::error::PlaybackError;

/// Snapshot of the playback state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackState {
    pub position_ms: u64,
    /// 0 while nothing is loaded or the engine cannot tell
    pub duration_ms: u64,
    pub is_playing: bool,
    /// 0.0 - 1.0, independent of `is_muted`
    pub volume: f32,
    pub is_muted: bool,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            position_ms: 0,
            duration_ms: 0,
            is_playing: false,
            volume: 1.0,
            is_muted: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Empty,
    Loading(LoadTicket),
    Loaded(LoadTicket),
}

/// Position clock over a single audio source
#[derive(Debug)]
pub struct PlaybackClock<E> {
    engine: E,
    state: PlaybackState,
    source: Source,
    last_ticket: u64,
    /// Seeks sent to the engine and not yet confirmed
    pending_seeks: u32,
    /// Last non-zero volume, restored on unmute
    restore_volume: f32,
}

impl<E: MediaEngine> PlaybackClock<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            state: PlaybackState::default(),
            source: Source::Empty,
            last_ticket: 0,
            pending_seeks: 0,
            restore_volume: 1.0,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn snapshot(&self) -> PlaybackState {
        self.state
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.source, Source::Loaded(_))
    }

    /// Ticket whose events are currently accepted
    pub fn current_ticket(&self) -> Option<LoadTicket> {
        match self.source {
            Source::Empty => None,
            Source::Loading(t) | Source::Loaded(t) => Some(t),
        }
    }

    /// Replace the source. Position resets to 0 and playback does not start.
    pub fn load(&mut self, url: &str) -> LoadTicket {
        if self.state.is_playing {
            self.engine.pause();
        }

        self.last_ticket += 1;
        let ticket = LoadTicket(self.last_ticket);

        if let Source::Loading(old) = self.source {
            tracing::debug!("Load {} superseded by {}", old, ticket);
        }

        self.source = Source::Loading(ticket);
        self.pending_seeks = 0;
        self.state.position_ms = 0;
        self.state.duration_ms = 0;
        self.state.is_playing = false;

        self.engine.load(ticket, url);
        ticket
    }

    /// Drop the source and stop listening to its events
    pub fn detach(&mut self) {
        if self.source != Source::Empty {
            self.engine.unload();
        }
        self.source = Source::Empty;
        self.pending_seeks = 0;
        self.state.position_ms = 0;
        self.state.duration_ms = 0;
        self.state.is_playing = false;
    }

    /// Apply an engine event. Returns `None` for stale or irrelevant events.
    pub fn handle_engine_event(&mut self, event: EngineEvent) -> Option<ClockEvent> {
        let ticket = event.ticket();
        if self.current_ticket() != Some(ticket) {
            tracing::debug!(
                "Dropping engine event for {} (current {:?})",
                ticket,
                self.current_ticket()
            );
            return None;
        }

        match event {
            EngineEvent::Loaded { duration_ms, .. } => {
                if self.source == Source::Loaded(ticket) {
                    return None;
                }
                self.source = Source::Loaded(ticket);
                self.state.duration_ms = duration_ms;
                self.state.position_ms = 0;
                self.engine.set_volume(self.effective_volume());
                tracing::debug!("Source {} loaded, duration {}ms", ticket, duration_ms);
                Some(ClockEvent::Loaded { duration_ms })
            }
            EngineEvent::LoadFailed { error, .. } => {
                self.source = Source::Empty;
                self.state.is_playing = false;
                Some(ClockEvent::LoadFailed(error))
            }
            EngineEvent::TimeUpdate { position_ms, .. } => {
                if !self.is_loaded() {
                    return None;
                }
                if self.pending_seeks > 0 {
                    tracing::trace!(
                        "Dropping position {}ms reported before {} pending seek(s)",
                        position_ms,
                        self.pending_seeks
                    );
                    return None;
                }
                self.state.position_ms = self.clamp(position_ms);
                Some(ClockEvent::Position {
                    position_ms: self.state.position_ms,
                })
            }
            EngineEvent::Seeked { .. } => {
                self.pending_seeks = self.pending_seeks.saturating_sub(1);
                None
            }
            EngineEvent::Ended { .. } => {
                if !self.is_loaded() {
                    return None;
                }
                self.state.is_playing = false;
                if self.state.duration_ms > 0 {
                    self.state.position_ms = self.state.duration_ms;
                }
                Some(ClockEvent::Ended)
            }
        }
    }

    pub fn play(&mut self) -> Result<(), PlaybackError> {
        if !self.is_loaded() {
            return Err(PlaybackError::NotLoaded);
        }
        self.engine.play()?;
        self.state.is_playing = true;
        Ok(())
    }

    pub fn pause(&mut self) {
        if self.state.is_playing {
            self.engine.pause();
        }
        self.state.is_playing = false;
    }

    /// Seek, clamped to `[0, duration]`. Returns the applied position.
    ///
    /// Ignored while nothing is loaded. With an unknown duration only the
    /// lower bound applies.
    pub fn seek(&mut self, position_ms: u64) -> Option<u64> {
        if !self.is_loaded() {
            tracing::debug!("Seek to {}ms ignored, no source loaded", position_ms);
            return None;
        }
        let position_ms = self.clamp(position_ms);
        self.state.position_ms = position_ms;
        self.pending_seeks += 1;
        self.engine.seek(position_ms);
        Some(position_ms)
    }

    pub fn set_volume(&mut self, volume: f32) {
        if !volume.is_finite() {
            return;
        }
        let volume = volume.clamp(0.0, 1.0);
        self.state.volume = volume;
        if volume > 0.0 {
            self.restore_volume = volume;
        }
        if !self.state.is_muted {
            self.engine.set_volume(volume);
        }
    }

    pub fn set_muted(&mut self, muted: bool) {
        if self.state.is_muted == muted {
            return;
        }
        self.state.is_muted = muted;
        if !muted && self.state.volume == 0.0 {
            self.state.volume = self.restore_volume;
        }
        self.engine.set_volume(self.effective_volume());
    }

    pub fn toggle_mute(&mut self) {
        self.set_muted(!self.state.is_muted);
    }

    fn effective_volume(&self) -> f32 {
        if self.state.is_muted {
            0.0
        } else {
            self.state.volume
        }
    }

    fn clamp(&self, position_ms: u64) -> u64 {
        if self.state.duration_ms > 0 {
            position_ms.min(self.state.duration_ms)
        } else {
            position_ms
        }
    }
}
