//! Settings persistence
//!
//! Handles saving and loading user preferences.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Which surface the highlight is painted on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// Vector page graphic (SVG)
    #[default]
    Vector,
    /// Tagged text nodes
    Text,
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetKind::Vector => write!(f, "vector"),
            TargetKind::Text => write!(f, "text"),
        }
    }
}

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Where chapters, audio and timings come from
    #[serde(default)]
    pub source: SourceSettings,
    /// Playback defaults
    #[serde(default)]
    pub playback: PlaybackSettings,
    /// Highlight appearance
    #[serde(default)]
    pub highlight: HighlightSettings,
}

/// Remote data endpoints
///
/// Path templates accept `{chapter}`, `{chapter:03}` and `{reciter}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    pub base_url: String,
    pub chapters_path: String,
    pub audio_path: String,
    pub timings_path: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl SourceSettings {
    /// Expand a path template and join it onto `base_url`
    pub fn url_for(&self, template: &str, chapter: u16, reciter: &str) -> String {
        let path = template
            .replace("{chapter:03}", &format!("{:03}", chapter))
            .replace("{chapter}", &chapter.to_string())
            .replace("{reciter}", reciter);

        if path.starts_with("http://") || path.starts_with("https://") {
            return path;
        }

        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn chapters_url(&self) -> String {
        self.url_for(&self.chapters_path, 0, "")
    }

    pub fn audio_url(&self, chapter: u16, reciter: &str) -> String {
        self.url_for(&self.audio_path, chapter, reciter)
    }

    pub fn timings_url(&self, chapter: u16, reciter: &str) -> String {
        self.url_for(&self.timings_path, chapter, reciter)
    }
}

/// Playback-related settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Volume level (0.0 to 1.0)
    pub volume: f32,
    /// Replay the chapter when it ends
    pub repeat: bool,
    /// Continue with the next chapter when one ends
    pub auto_advance: bool,
    /// Reciter used when none is given
    pub default_reciter: String,
}

/// Highlight appearance
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightSettings {
    pub target: TargetKind,
    /// Class toggled on the active text node
    pub active_class: String,
    /// Fill colour of the injected polygon
    pub fill: String,
    /// Period of the opacity pulse
    pub pulse_period_ms: u32,
    /// Smooth-scroll the active text node into view
    pub smooth_scroll: bool,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            base_url: "https://static.example.org/quran".to_string(),
            chapters_path: "chapters.json".to_string(),
            audio_path: "audio/{reciter}/{chapter:03}.mp3".to_string(),
            timings_path: "timings/{reciter}/{chapter}.json".to_string(),
            timeout_secs: 15,
        }
    }
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            volume: 1.0,
            repeat: false,
            auto_advance: true,
            default_reciter: "alafasy".to_string(),
        }
    }
}

impl Default for HighlightSettings {
    fn default() -> Self {
        Self {
            target: TargetKind::Vector,
            active_class: "ayah-active".to_string(),
            fill: "#f5c542".to_string(),
            pulse_period_ms: 1600,
            smooth_scroll: true,
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("org", "ayah-sync", "AyahSync")
            .map(|dirs| dirs.config_dir().join("settings.json"))
    }

    /// Load settings from file, or return defaults if not found
    pub fn load() -> Self {
        Self::file_path()
            .and_then(|path| match Self::load_from_file(&path) {
                Ok(settings) => Some(settings),
                Err(e) => {
                    tracing::debug!("Using default settings ({}): {}", path.display(), e);
                    None
                }
            })
            .unwrap_or_default()
    }

    /// Load settings from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self, SettingsError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| SettingsError::Io(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| SettingsError::Parse(e.to_string()))
    }

    /// Save settings to the default file
    pub fn save(&self) -> Result<(), SettingsError> {
        if let Some(path) = Self::file_path() {
            self.save_to_file(&path)
        } else {
            Err(SettingsError::Io(
                "Could not determine config directory".to_string(),
            ))
        }
    }

    /// Save settings to a specific file
    pub fn save_to_file(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SettingsError::Io(e.to_string()))?;
        }

        let content =
            serde_json::to_string_pretty(self).map_err(|e| SettingsError::Parse(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| SettingsError::Io(e.to_string()))?;
        Ok(())
    }
}

/// Errors that can occur with settings
#[derive(Debug, Clone)]
pub enum SettingsError {
    Io(String),
    Parse(String),
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsError::Io(e) => write!(f, "IO error: {}", e),
            SettingsError::Parse(e) => write!(f, "Parse error: {}", e),
        }
    }
}

impl std::error::Error for SettingsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_templates() {
        let source = SourceSettings {
            base_url: "https://cdn.test/q/".to_string(),
            ..Default::default()
        };
        assert_eq!(
            source.audio_url(2, "husary"),
            "https://cdn.test/q/audio/husary/002.mp3"
        );
        assert_eq!(
            source.timings_url(114, "husary"),
            "https://cdn.test/q/timings/husary/114.json"
        );
        assert_eq!(source.chapters_url(), "https://cdn.test/q/chapters.json");
    }

    #[test]
    fn test_absolute_template_bypasses_base() {
        let source = SourceSettings {
            audio_path: "https://audio.test/{reciter}/{chapter}.mp3".to_string(),
            ..Default::default()
        };
        assert_eq!(source.audio_url(7, "r"), "https://audio.test/r/7.mp3");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"playback":{"repeat":true}}"#).unwrap();
        assert!(settings.playback.repeat);
        assert!(settings.playback.auto_advance);
        assert_eq!(settings.highlight.active_class, "ayah-active");
        assert_eq!(settings.highlight.target, TargetKind::Vector);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let mut settings = Settings::default();
        settings.playback.volume = 0.4;
        settings.highlight.target = TargetKind::Text;
        settings.save_to_file(&path).unwrap();

        let loaded = Settings::load_from_file(&path).unwrap();
        assert_eq!(loaded.playback.volume, 0.4);
        assert_eq!(loaded.highlight.target, TargetKind::Text);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = Settings::load_from_file(Path::new("/nonexistent/settings.json")).unwrap_err();
        assert!(matches!(err, SettingsError::Io(_)));
    }
}
