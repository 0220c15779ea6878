//! Defines the `Track` struct, the unified representation of a resolved playable item,
//! and the conversion logic from `yt-dlp` JSON output.

use serde::Deserialize;
use std::fmt;

use crate::commands::music::utils::music_manager::{MusicError, MusicResult};

use super::Resolution;

/// Fallback title when the extractor does not report one.
pub const UNKNOWN_TITLE: &str = "Unknown Title";
/// Fallback uploader when the extractor reports neither an uploader nor a channel.
pub const UNKNOWN_UPLOADER: &str = "Unknown Uploader";

/// A resolved, playable item. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Track {
    title: String,
    source_url: String,
    uploader: String,
}

impl Track {
    pub fn new(
        title: impl Into<String>,
        source_url: impl Into<String>,
        uploader: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            source_url: source_url.into(),
            uploader: uploader.into(),
        }
    }

    /// The title of the track.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// The canonical page URL (or identifier) of the track.
    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    /// The name of the uploader or channel.
    pub fn uploader(&self) -> &str {
        &self.uploader
    }
}

/// `"<title> - <uploader>"`, the form used for the bot presence.
impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.title, self.uploader)
    }
}

/// The subset of a `yt-dlp` info dict the bot cares about.
///
/// Works for full video dicts, flat playlist entries (`_type: "url"`) and
/// playlist dicts (`_type: "playlist"`), including `ytsearchN:` results.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct YtDlpInfo {
    #[serde(rename = "_type")]
    pub kind: Option<String>,
    pub title: Option<String>,
    pub webpage_url: Option<String>,
    pub url: Option<String>,
    pub uploader: Option<String>,
    pub channel: Option<String>,
    pub entries: Option<Vec<YtDlpInfo>>,
}

impl YtDlpInfo {
    /// Parses the JSON printed by `yt-dlp -J` / `yt-dlp -j`.
    pub fn parse(raw: &str) -> MusicResult<Self> {
        serde_json::from_str(raw.trim()).map_err(|e| {
            MusicError::Resolution(format!("Failed to parse video metadata: {}", e))
        })
    }

    pub fn is_playlist(&self) -> bool {
        self.kind.as_deref() == Some("playlist")
    }

    /// Flat playlist entries often carry only an id and a URL.
    pub fn has_title(&self) -> bool {
        self.title.as_deref().is_some_and(|t| !t.trim().is_empty())
    }

    /// The canonical page URL, falling back to the entry URL.
    pub fn page_url(&self) -> Option<&str> {
        self.webpage_url.as_deref().or(self.url.as_deref())
    }

    /// Converts into a `Track`, filling gaps with defaults. `fallback_url` is
    /// used when the dict reports no URL at all (e.g. the original query).
    pub fn into_track(self, fallback_url: &str) -> Track {
        let source_url = self
            .webpage_url
            .or(self.url)
            .unwrap_or_else(|| fallback_url.to_string());
        let title = self
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_TITLE.to_string());
        let uploader = self
            .uploader
            .or(self.channel)
            .unwrap_or_else(|| UNKNOWN_UPLOADER.to_string());

        Track::new(title, source_url, uploader)
    }

    /// Interprets the output of a `ytsearch1:` lookup: the first entry wins.
    pub fn into_search_result(self, query: &str) -> MusicResult<Resolution> {
        if !self.is_playlist() {
            return Ok(Resolution::Track(self.into_track(query)));
        }

        self.entries
            .unwrap_or_default()
            .into_iter()
            .next()
            .map(|entry| Resolution::Track(entry.into_track(query)))
            .ok_or_else(|| MusicError::Resolution(format!("No results found for '{}'", query)))
    }
}
