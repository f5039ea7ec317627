//! Content source abstraction
//!
//! Chapter metadata, audio URLs and raw timing records come from one
//! `ContentSource`. The driver clones the source into spawned fetch tasks,
//! so implementations are cheap to clone and their futures are `Send`.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::features::timing::RawTimingRecord;

/// One chapter (surah) as listed by the metadata source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterMeta {
    #[serde(alias = "id")]
    pub number: u16,
    #[serde(alias = "name_simple")]
    pub name: String,
    #[serde(default, alias = "translatedName")]
    pub translated_name: Option<String>,
    #[serde(default, alias = "versesCount", alias = "ayahs")]
    pub verses_count: u32,
    /// First page of the chapter in the printed mushaf
    #[serde(default)]
    pub page: Option<u32>,
}

impl ChapterMeta {
    pub fn new(number: u16, name: impl Into<String>) -> Self {
        Self {
            number,
            name: name.into(),
            translated_name: None,
            verses_count: 0,
            page: None,
        }
    }
}

/// Where the player gets its data
pub trait ContentSource: Clone + Send + Sync + 'static {
    /// Ordered chapter list
    fn chapters(&self) -> impl Future<Output = Result<Vec<ChapterMeta>>> + Send;

    /// Playable audio URL for one recitation
    fn audio_url(&self, chapter: u16, reciter: &str) -> impl Future<Output = Result<String>> + Send;

    /// Raw timing records for one recitation. May be empty.
    fn timings(
        &self,
        chapter: u16,
        reciter: &str,
    ) -> impl Future<Output = Result<Vec<RawTimingRecord>>> + Send;
}

#[derive(Debug, Clone, Default)]
struct StaticData {
    chapters: Vec<ChapterMeta>,
    audio: HashMap<(u16, String), String>,
    timings: HashMap<(u16, String), Vec<RawTimingRecord>>,
    delays: HashMap<u16, Duration>,
}

/// In-memory source. Missing audio is an error, missing timings too.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    data: Arc<StaticData>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn data_mut(&mut self) -> &mut StaticData {
        Arc::make_mut(&mut self.data)
    }

    pub fn with_chapters(mut self, chapters: Vec<ChapterMeta>) -> Self {
        self.data_mut().chapters = chapters;
        self
    }

    /// Numbered chapters `1..=count` with placeholder names
    pub fn with_chapter_count(self, count: u16) -> Self {
        let chapters = (1..=count)
            .map(|n| ChapterMeta::new(n, format!("Chapter {}", n)))
            .collect();
        self.with_chapters(chapters)
    }

    pub fn with_audio(mut self, chapter: u16, reciter: &str, url: impl Into<String>) -> Self {
        self.data_mut()
            .audio
            .insert((chapter, reciter.to_string()), url.into());
        self
    }

    pub fn with_timings(
        mut self,
        chapter: u16,
        reciter: &str,
        records: Vec<RawTimingRecord>,
    ) -> Self {
        self.data_mut()
            .timings
            .insert((chapter, reciter.to_string()), records);
        self
    }

    /// Delay every response for `chapter`
    pub fn with_delay(mut self, chapter: u16, delay: Duration) -> Self {
        self.data_mut().delays.insert(chapter, delay);
        self
    }

    async fn wait(&self, chapter: u16) {
        if let Some(delay) = self.data.delays.get(&chapter) {
            tokio::time::sleep(*delay).await;
        }
    }
}

impl ContentSource for StaticSource {
    async fn chapters(&self) -> Result<Vec<ChapterMeta>> {
        Ok(self.data.chapters.clone())
    }

    async fn audio_url(&self, chapter: u16, reciter: &str) -> Result<String> {
        self.wait(chapter).await;
        self.data
            .audio
            .get(&(chapter, reciter.to_string()))
            .cloned()
            .ok_or_else(|| anyhow!("no audio for chapter {} by {}", chapter, reciter))
    }

    async fn timings(&self, chapter: u16, reciter: &str) -> Result<Vec<RawTimingRecord>> {
        self.wait(chapter).await;
        self.data
            .timings
            .get(&(chapter, reciter.to_string()))
            .cloned()
            .ok_or_else(|| anyhow!("no timings for chapter {} by {}", chapter, reciter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_source_lookup() {
        let source = StaticSource::new()
            .with_chapter_count(3)
            .with_audio(2, "r", "mem://2.mp3")
            .with_timings(2, "r", vec![RawTimingRecord::new(1, 0)]);

        assert_eq!(source.chapters().await.unwrap().len(), 3);
        assert_eq!(source.audio_url(2, "r").await.unwrap(), "mem://2.mp3");
        assert_eq!(source.timings(2, "r").await.unwrap().len(), 1);
        assert!(source.audio_url(3, "r").await.is_err());
        assert!(source.timings(2, "other").await.is_err());
    }

    #[test]
    fn test_builder_does_not_touch_clones() {
        let first = StaticSource::new().with_audio(1, "r", "a");
        let second = first.clone().with_audio(1, "r", "b");
        assert_eq!(first.data.audio[&(1, "r".to_string())], "a");
        assert_eq!(second.data.audio[&(1, "r".to_string())], "b");
    }

    #[test]
    fn test_chapter_meta_aliases() {
        let meta: ChapterMeta =
            serde_json::from_str(r#"{"id":2,"name_simple":"Al-Baqarah","versesCount":286}"#)
                .unwrap();
        assert_eq!(meta.number, 2);
        assert_eq!(meta.name, "Al-Baqarah");
        assert_eq!(meta.verses_count, 286);
    }
}
