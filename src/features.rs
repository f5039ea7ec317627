//! Feature modules - core logic with no device or network dependencies
//!
//! - `timing`: timing tables and current-ayah resolution
//! - `settings`: persisted preferences

pub mod settings;
pub mod timing;

pub use settings::{HighlightSettings, PlaybackSettings, Settings, SourceSettings, TargetKind};
pub use timing::{AyahChange, AyahResolver, RecitationKey, ResolvedAyah, TimingTable};
