//! HTTP/JSON content source
//!
//! Endpoints come from `SourceSettings` path templates. Audio is addressed
//! directly, so `audio_url` only expands the template; the engine downloads it.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, header};
use serde::Deserialize;

use super::source::{ChapterMeta, ContentSource};
use crate::features::settings::SourceSettings;
use crate::features::timing::{RawTimingRecord, parse_timing_json};

const USER_AGENT: &str = concat!("ayah-sync/", env!("CARGO_PKG_VERSION"));

#[derive(Deserialize)]
#[serde(untagged)]
enum ChapterDocument {
    List(Vec<ChapterMeta>),
    Wrapped { chapters: Vec<ChapterMeta> },
}

#[derive(Clone)]
pub struct HttpSource {
    client: Client,
    settings: SourceSettings,
}

impl std::fmt::Debug for HttpSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSource")
            .field("client", &"<HttpClient>")
            .field("base_url", &self.settings.base_url)
            .finish()
    }
}

impl HttpSource {
    pub fn new(settings: SourceSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self::with_client(client, settings))
    }

    pub fn with_client(client: Client, settings: SourceSettings) -> Self {
        Self { client, settings }
    }

    /// The underlying client, shared with the audio engine for downloads
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn settings(&self) -> &SourceSettings {
        &self.settings
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        tracing::debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .with_context(|| format!("request to {} failed", url))?
            .error_for_status()
            .with_context(|| format!("{} returned an error status", url))?;
        response
            .text()
            .await
            .with_context(|| format!("failed to read response from {}", url))
    }
}

impl ContentSource for HttpSource {
    async fn chapters(&self) -> Result<Vec<ChapterMeta>> {
        let url = self.settings.chapters_url();
        let body = self.get_text(&url).await?;
        parse_chapters(&body).with_context(|| format!("invalid chapter list from {}", url))
    }

    async fn audio_url(&self, chapter: u16, reciter: &str) -> Result<String> {
        Ok(self.settings.audio_url(chapter, reciter))
    }

    async fn timings(&self, chapter: u16, reciter: &str) -> Result<Vec<RawTimingRecord>> {
        let url = self.settings.timings_url(chapter, reciter);
        let body = self.get_text(&url).await?;
        parse_timing_json(&body).with_context(|| format!("invalid timing data from {}", url))
    }
}

fn parse_chapters(body: &str) -> Result<Vec<ChapterMeta>> {
    let doc: ChapterDocument = serde_json::from_str(body)?;
    let mut chapters = match doc {
        ChapterDocument::List(chapters) | ChapterDocument::Wrapped { chapters } => chapters,
    };
    chapters.sort_by_key(|c| c.number);
    Ok(chapters)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wrapped_chapters_sorted() {
        let body = r#"{"chapters":[{"id":2,"name":"Al-Baqarah"},{"id":1,"name":"Al-Fatihah"}]}"#;
        let chapters = parse_chapters(body).unwrap();
        assert_eq!(
            chapters.iter().map(|c| c.number).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[test]
    fn test_parse_chapters_rejects_garbage() {
        assert!(parse_chapters("{\"oops\":true}").is_err());
    }

    #[tokio::test]
    async fn test_audio_url_from_template() {
        let source = HttpSource::new(SourceSettings {
            base_url: "https://cdn.test/".to_string(),
            ..SourceSettings::default()
        })
        .unwrap();
        assert_eq!(
            source.audio_url(2, "alafasy").await.unwrap(),
            "https://cdn.test/audio/alafasy/002.mp3"
        );
    }
}
