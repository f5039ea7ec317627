//! Ayah Sync - recitation playback with a synchronized verse highlight
//!
//! A playback clock drives a timing table lookup; the resolved ayah is
//! painted on a vector page or a text surface. Chapter selection, transport
//! and supersession of in-flight loads are handled by `app::PlayerController`.

pub mod api;
pub mod app;
pub mod audio;
pub mod error;
pub mod features;
pub mod highlight;

pub use app::{Player, PlayerController, PlayerHandle, PlayerState};
pub use error::{PlayerError, PlaybackError, Severity};
