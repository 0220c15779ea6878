//! Sample tracks and a tiny fake catalog for the resolver mock

use poise::serenity_prelude::{ChannelId, GuildId};
use rubi::{MusicError, MusicResult, Resolution, Track};

pub fn guild() -> GuildId {
    GuildId::new(1)
}

pub fn other_guild() -> GuildId {
    GuildId::new(2)
}

pub fn voice_channel() -> ChannelId {
    ChannelId::new(10)
}

pub fn other_voice_channel() -> ChannelId {
    ChannelId::new(11)
}

pub fn track(title: &str) -> Track {
    Track::new(
        title,
        format!("https://example.com/{}", title.replace(' ', "-")),
        "Band",
    )
}

/// Stream URL the fake catalog hands out for a track
pub fn stream_of(title: &str) -> String {
    format!("stream://{}", title)
}

/// `nothing` has no results, `playlist:A,B` is a playlist, anything else is one track.
pub fn resolve(query: &str) -> MusicResult<Resolution> {
    if query == "nothing" {
        return Err(MusicError::Resolution(format!(
            "No results found for '{}'",
            query
        )));
    }

    if let Some(titles) = query.strip_prefix("playlist:") {
        return Ok(Resolution::Playlist {
            title: "Mix".to_string(),
            url: Some("https://example.com/playlist".to_string()),
            tracks: titles.split(',').map(track).collect(),
        });
    }

    Ok(Resolution::Track(track(query)))
}

/// Titles starting with `broken` have no stream.
pub fn stream_url(track: &Track) -> MusicResult<String> {
    if track.title().starts_with("broken") {
        return Err(MusicError::Resolution("Video unavailable".to_string()));
    }
    Ok(stream_of(track.title()))
}

/// `playlist:T1,T2,...,Tn`
pub fn numbered_playlist(n: usize) -> String {
    let titles: Vec<String> = (1..=n).map(|i| format!("T{}", i)).collect();
    format!("playlist:{}", titles.join(","))
}
