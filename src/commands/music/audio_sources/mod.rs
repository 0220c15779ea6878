//! This module defines the contract for resolving user queries into playable tracks.
//! The playback engine only talks to the `TrackResolver` trait; the `yt-dlp` backed
//! implementation lives in [`youtube`].

/// Submodule defining the `Track` struct and `yt-dlp` JSON conversion.
pub mod track_metadata;
/// Submodule implementing `TrackResolver` on top of the `yt-dlp` command-line tool.
pub mod youtube;

use crate::commands::music::utils::music_manager::MusicResult;
use serenity::async_trait;
use track_metadata::Track;
use url::Url;

/// What a query resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A single track (direct URL or first search hit).
    Track(Track),
    /// A playlist, with its tracks in the order the extractor returned them.
    Playlist {
        title: String,
        url: Option<String>,
        tracks: Vec<Track>,
    },
}

impl Resolution {
    /// The resolved tracks in play order.
    pub fn tracks(&self) -> &[Track] {
        match self {
            Resolution::Track(track) => std::slice::from_ref(track),
            Resolution::Playlist { tracks, .. } => tracks,
        }
    }
}

/// External collaborator that turns queries into tracks and tracks into streams.
///
/// Failures are reported as `MusicError::Resolution`; implementations may retry
/// internally but must eventually give up.
#[async_trait]
pub trait TrackResolver: Send + Sync {
    /// Resolves a search query or URL into one track or a playlist.
    async fn resolve(&self, query: &str) -> MusicResult<Resolution>;

    /// Fetches a time-limited streamable URL for `track`. Called lazily right
    /// before each playback attempt; the result is never cached.
    async fn stream_url(&self, track: &Track) -> MusicResult<String>;
}

/// A utility struct providing general helper functions related to audio sources.
pub struct AudioSource;

impl AudioSource {
    /// Whether the input should be treated as a link rather than a search term.
    /// Only `http`/`https` URLs count, so `artist: song` stays a search.
    pub fn is_url(input: &str) -> bool {
        Url::parse(input.trim())
            .map(|url| matches!(url.scheme(), "http" | "https"))
            .unwrap_or(false)
    }
}
