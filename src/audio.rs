//! Audio playback module
//!
//! - `PlaybackClock`: authoritative position/duration/volume over one source
//! - `MediaEngine`: the device seam the clock drives
//! - `RodioEngine`: rodio output on a dedicated audio thread
//! - `events`: engine and clock events (event-driven, no polling by callers)

mod clock;
mod engine;
pub mod events;
mod player;

pub use clock::{PlaybackClock, PlaybackState};
pub use engine::{EngineCall, LoadTicket, MediaEngine, RecordingEngine};
pub use events::{ClockEvent, EngineEvent, EngineEventReceiver, EngineEventSender, engine_event_channel};
pub use player::RodioEngine;
