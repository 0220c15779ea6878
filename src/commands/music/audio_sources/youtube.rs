//! Implements the `TrackResolver` trait using the `yt-dlp` command-line tool.

use serenity::async_trait;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::commands::music::utils::music_manager::{MusicError, MusicResult};

use super::track_metadata::{Track, YtDlpInfo};
use super::{AudioSource, Resolution, TrackResolver};

/// Back-off unit between retries; attempt `n` waits `n * RETRY_BACKOFF`.
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Resolves queries by shelling out to `yt-dlp`.
#[derive(Debug, Clone)]
pub struct YtDlpResolver {
    program: String,
    attempts: u32,
}

impl YtDlpResolver {
    /// Creates a resolver running `program`, trying each invocation up to `attempts` times.
    pub fn new(program: impl Into<String>, attempts: u32) -> Self {
        Self {
            program: program.into(),
            attempts: attempts.max(1),
        }
    }

    /// Runs `yt-dlp` with retries and returns its stdout.
    async fn run(&self, args: &[&str]) -> MusicResult<String> {
        let mut last_error = None;

        for attempt in 1..=self.attempts {
            match self.run_once(args).await {
                Ok(stdout) => return Ok(stdout),
                Err(err) => {
                    warn!(
                        "yt-dlp attempt {}/{} failed: {}",
                        attempt, self.attempts, err
                    );
                    last_error = Some(err);
                    if attempt < self.attempts {
                        tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                    }
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| MusicError::Resolution("yt-dlp was never invoked".to_string())))
    }

    async fn run_once(&self, args: &[&str]) -> MusicResult<String> {
        debug!("Running {} {:?}", self.program, args);

        let output = Command::new(&self.program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| MusicError::Resolution(format!("Failed to execute yt-dlp: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MusicError::Resolution(format!(
                "yt-dlp exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Dumps the info dict for `target` as a single JSON document.
    async fn dump_json(&self, target: &str, flat_playlist: bool) -> MusicResult<YtDlpInfo> {
        let mut args = vec!["-J", "--no-warnings"];
        if flat_playlist {
            args.push("--flat-playlist");
        }
        args.push(target);

        let stdout = self.run(&args).await?;
        YtDlpInfo::parse(&stdout)
    }

    /// Turns a playlist dict into tracks. Flat entries without a title are
    /// resolved one by one; entries that fail are logged and skipped.
    async fn resolve_playlist(&self, info: YtDlpInfo, query: &str) -> MusicResult<Resolution> {
        let title = info
            .title
            .clone()
            .unwrap_or_else(|| "Unknown Playlist".to_string());
        let url = info.page_url().map(str::to_string);
        let entries = info.entries.unwrap_or_default();

        let mut tracks = Vec::with_capacity(entries.len());
        for entry in entries {
            if entry.has_title() {
                tracks.push(entry.into_track(query));
                continue;
            }

            let Some(entry_url) = entry.page_url().map(str::to_string) else {
                warn!("Skipping playlist entry without a URL in '{}'", title);
                continue;
            };

            match self.dump_json(&entry_url, false).await {
                Ok(full) => tracks.push(full.into_track(&entry_url)),
                Err(err) => warn!("Error adding song to queue: {}: {}", entry_url, err),
            }
        }

        if tracks.is_empty() {
            return Err(MusicError::Resolution(format!(
                "Playlist '{}' has no playable entries",
                title
            )));
        }

        info!("Resolved playlist '{}' with {} tracks", title, tracks.len());
        Ok(Resolution::Playlist { title, url, tracks })
    }
}

#[async_trait]
impl TrackResolver for YtDlpResolver {
    async fn resolve(&self, query: &str) -> MusicResult<Resolution> {
        let query = query.trim();
        if query.is_empty() {
            return Err(MusicError::Resolution("Empty query".to_string()));
        }

        if AudioSource::is_url(query) {
            info!("Resolving URL: {}", query);
            let info = self.dump_json(query, true).await?;
            if info.is_playlist() {
                self.resolve_playlist(info, query).await
            } else {
                Ok(Resolution::Track(info.into_track(query)))
            }
        } else {
            info!("Searching for: {}", query);
            self.dump_json(&format!("ytsearch1:{}", query), false)
                .await?
                .into_search_result(query)
        }
    }

    async fn stream_url(&self, track: &Track) -> MusicResult<String> {
        let stdout = self
            .run(&[
                "-g",
                "-f",
                "bestaudio/best",
                "--no-warnings",
                track.source_url(),
            ])
            .await?;

        first_stream_url(&stdout).ok_or_else(|| {
            MusicError::Resolution(format!("No stream URL found for '{}'", track.title()))
        })
    }
}

/// `yt-dlp -g` prints one URL per selected format; the first one is the stream.
fn first_stream_url(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_first_stream_url_skips_blank_lines() {
        let stdout = "\n  https://rr1.googlevideo.com/videoplayback?id=1\nhttps://second\n";
        assert_eq!(
            first_stream_url(stdout).as_deref(),
            Some("https://rr1.googlevideo.com/videoplayback?id=1")
        );
    }

    #[test]
    fn test_first_stream_url_empty_output() {
        assert_eq!(first_stream_url("\n \n"), None);
    }

    #[test]
    fn test_attempts_are_at_least_one() {
        assert_eq!(YtDlpResolver::new("yt-dlp", 0).attempts, 1);
    }

    #[test]
    fn test_missing_binary_is_a_resolution_error() {
        let resolver = YtDlpResolver::new("/nonexistent/yt-dlp", 1);
        let track = Track::new("Song", "https://example.com/watch?v=1", "Band");

        let result = tokio_test::block_on(resolver.stream_url(&track));

        assert_matches!(result, Err(MusicError::Resolution(msg)) if msg.contains("Failed to execute"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_then_gives_up() {
        let resolver = YtDlpResolver::new("/nonexistent/yt-dlp", 3);

        let result = resolver.resolve("some song").await;

        assert_matches!(result, Err(MusicError::Resolution(_)));
    }

    #[tokio::test]
    async fn test_empty_query_is_rejected() {
        let resolver = YtDlpResolver::new("/nonexistent/yt-dlp", 1);

        assert_matches!(
            resolver.resolve("   ").await,
            Err(MusicError::Resolution(msg)) if msg == "Empty query"
        );
    }
}
