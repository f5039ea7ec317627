//! Controller messages and commands

use crate::api::ChapterMeta;
use crate::audio::EngineEvent;
use crate::error::PlayerError;
use crate::features::timing::RawTimingRecord;

/// Everything that can change the controller
#[derive(Debug, Clone)]
pub enum Message {
    // ============ Selection ============
    /// Load a chapter for a reciter, superseding whatever is loaded
    SelectChapter { chapter: u16, reciter: String },
    Next,
    Previous,
    /// Re-select the chapter that ended in `Error`
    Retry,

    // ============ Transport ============
    Play,
    Pause,
    Seek(u64),
    SeekToAyah(u32),
    SetVolume(f32),
    ToggleMute,
    SetRepeat(bool),
    SetAutoAdvance(bool),

    // ============ Highlight ============
    /// The highlight target finished loading
    TargetReady,

    // ============ Completions ============
    /// Fetches for a selection finished
    Loaded {
        selection_id: u64,
        outcome: LoadOutcome,
    },
    /// Report from the playback engine
    Engine(EngineEvent),

    /// Release everything and stop the driver
    Shutdown,
}

/// Results of the three concurrent fetches for one selection
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub chapters: Result<Vec<ChapterMeta>, PlayerError>,
    pub audio_url: Result<String, PlayerError>,
    pub timings: Result<Vec<RawTimingRecord>, PlayerError>,
}

/// What to fetch for a selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub selection_id: u64,
    pub chapter: u16,
    pub reciter: String,
}

/// Effects the driver performs on behalf of the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Fetch(LoadRequest),
}
