//! Player state definitions

use crate::features::timing::RecitationKey;

/// Controller state machine
///
/// ```text
/// Idle -> Loading -> Ready -> Playing <-> Paused
///            |                  |
///            v                  v
///          Error              Ended -> Playing (repeat) | Loading (auto-advance)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerState {
    #[default]
    Idle,
    Loading,
    Ready,
    Playing,
    Paused,
    Ended,
    Error,
}

impl std::fmt::Display for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PlayerState::Idle => "idle",
            PlayerState::Loading => "loading",
            PlayerState::Ready => "ready",
            PlayerState::Playing => "playing",
            PlayerState::Paused => "paused",
            PlayerState::Ended => "ended",
            PlayerState::Error => "error",
        };
        write!(f, "{}", name)
    }
}

/// The (chapter, reciter) the controller is working on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Monotonic id; results tagged with any other id are stale
    pub id: u64,
    pub key: RecitationKey,
    /// Start playing as soon as the source is ready
    pub autoplay: bool,
}
