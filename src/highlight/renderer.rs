//! Highlight renderer
//!
//! Owns at most one painted highlight. Every render disposes the previous
//! highlight before painting the next one, and a missing or broken target
//! only costs the highlight, never playback.

use super::target::{HighlightHandle, HighlightTarget, RenderError};
use crate::error::PlayerError;
use crate::features::timing::{AyahChange, RecitationKey, ResolvedAyah};

#[derive(Debug, Default)]
pub struct HighlightRenderer {
    target: Option<HighlightTarget>,
    painted: Option<HighlightHandle>,
    /// Last ayah asked for, kept so a late-loading target can be repainted
    wanted: Option<(RecitationKey, ResolvedAyah)>,
}

impl HighlightRenderer {
    pub fn new(target: Option<HighlightTarget>) -> Self {
        Self {
            target,
            painted: None,
            wanted: None,
        }
    }

    pub fn target(&self) -> Option<&HighlightTarget> {
        self.target.as_ref()
    }

    /// Ayah currently painted on the target
    pub fn painted_ayah(&self) -> Option<u32> {
        self.painted.as_ref().map(HighlightHandle::ayah)
    }

    pub fn render(&mut self, change: &AyahChange) {
        self.dispose();
        self.wanted = change
            .current
            .as_ref()
            .map(|ayah| (change.key.clone(), ayah.clone()));
        self.paint();
    }

    /// Remove the highlight and forget what was wanted
    pub fn clear(&mut self) {
        self.dispose();
        self.wanted = None;
    }

    /// Repaint the wanted ayah, e.g. after the target finished loading
    pub fn refresh(&mut self) {
        self.dispose();
        self.paint();
    }

    /// Swap targets. The old target is cleaned before it is handed back and
    /// the wanted ayah is repainted on the new one.
    pub fn set_target(&mut self, target: Option<HighlightTarget>) -> Option<HighlightTarget> {
        self.dispose();
        if let Some(stuck) = self.painted.take() {
            tracing::warn!("Ayah {} highlight left on the replaced target", stuck.ayah());
        }
        let old = std::mem::replace(&mut self.target, target);
        self.paint();
        old
    }

    /// Remove the painted highlight, if any. When the target refuses, the
    /// handle is kept and the next dispose tries again.
    pub fn dispose(&mut self) {
        let Some(handle) = self.painted.take() else {
            return;
        };
        let Some(target) = self.target.as_mut() else {
            return;
        };
        match target.remove_highlight(&handle) {
            Ok(()) => {}
            Err(RenderError::StaleHandle) => {
                tracing::debug!("Highlight for ayah {} was already gone", handle.ayah());
            }
            Err(e) => {
                report(&e, handle.ayah());
                self.painted = Some(handle);
            }
        }
    }

    fn paint(&mut self) {
        if let Some(stuck) = &self.painted {
            tracing::debug!("Ayah {} still highlighted, not painting over it", stuck.ayah());
            return;
        }
        let (Some(target), Some((key, ayah))) = (self.target.as_mut(), self.wanted.as_ref()) else {
            return;
        };
        match target.add_highlight(key, ayah) {
            Ok(Some(handle)) => {
                tracing::trace!("Highlighted {} ayah {}", key, ayah.ayah);
                self.painted = Some(handle);
            }
            Ok(None) => {
                tracing::trace!("Nothing to highlight for {} ayah {}", key, ayah.ayah);
            }
            Err(e) => report(&e, ayah.ayah),
        }
    }
}

impl Drop for HighlightRenderer {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn report(error: &RenderError, ayah: u32) {
    // Still loading: the host sends `target_ready` and we repaint then
    if *error == RenderError::NotLoaded {
        tracing::debug!("Ayah {} not highlighted yet: {}", ayah, error);
        return;
    }
    let error = PlayerError::RenderTargetUnavailable {
        reason: error.to_string(),
    };
    tracing::warn!("Ayah {} not highlighted: {}", ayah, error);
}
