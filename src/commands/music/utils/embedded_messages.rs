use poise::CreateReply;
use poise::serenity_prelude::{ChannelId, CreateEmbed, CreateEmbedFooter, Mentionable, UserId};

use super::music_manager::MusicError;
use super::playback_engine::{QUEUE_VIEW_LIMIT, QueueSnapshot};
use crate::commands::music::audio_sources::track_metadata::Track;

const GREEN: u32 = 0x00ff00;
const RED: u32 = 0xff0000;
const BLUE: u32 = 0x0000ff;

fn track_link(track: &Track) -> String {
    format!("[{}]({})", track.title(), track.source_url())
}

/// Create an embed for when a song starts playing
pub fn now_playing(track: &Track) -> CreateEmbed {
    CreateEmbed::new()
        .title("🎶 Now Playing")
        .description(format!("{}\n👤 {}", track_link(track), track.uploader()))
        .color(GREEN)
}

/// Create an embed for when the queue runs out
pub fn queue_finished() -> CreateEmbed {
    CreateEmbed::new()
        .title("✅ Queue Finished")
        .description(
            "No more songs in the queue. I'll leave the channel in 5 minutes if nothing is added.",
        )
        .color(RED)
}

/// Reply for a `/play` that started playback right away
pub fn playing(track: &Track) -> CreateReply {
    CreateReply::default().embed(
        CreateEmbed::new()
            .title("🎶 Playing")
            .description(track_link(track))
            .color(GREEN),
    )
}

/// Create an embed for when a song is added to the queue
pub fn added_to_queue(track: &Track, position: usize) -> CreateReply {
    CreateReply::default().embed(
        CreateEmbed::new()
            .title("➕ Added to Queue")
            .description(track_link(track))
            .field("Position", format!("`#{}`", position), true)
            .color(BLUE),
    )
}

/// Create an embed for when a whole playlist is queued
pub fn playlist_added(title: &str, url: Option<&str>, added: usize) -> CreateReply {
    let playlist = match url {
        Some(url) => format!("[{}]({})", title, url),
        None => title.to_string(),
    };

    CreateReply::default().embed(
        CreateEmbed::new()
            .title("📂 Playlist Added")
            .description(format!("Added {} songs from {}", added, playlist))
            .color(BLUE),
    )
}

/// Create an embed for when the bot stops playing music
pub fn stopped() -> CreateReply {
    CreateReply::default().embed(
        CreateEmbed::new()
            .title("⏹️ Stopped")
            .description("Stopped playing music and cleared the queue.")
            .color(GREEN),
    )
}

/// Create an embed for when a track is skipped
pub fn skipped(track: &Track) -> CreateReply {
    CreateReply::default().embed(
        CreateEmbed::new()
            .title("⏭️ Skipped")
            .description(format!("Skipped {}", track_link(track)))
            .color(GREEN),
    )
}

/// Create an embed for when the pending queue is dropped
pub fn skipped_all(count: usize) -> CreateReply {
    CreateReply::default().embed(
        CreateEmbed::new()
            .title("⏭️ Skipped All")
            .description(format!("Skipped {} songs from the queue.", count))
            .color(GREEN),
    )
}

/// Create an embed for when the queue is empty
pub fn queue_empty() -> CreateReply {
    CreateReply::default().embed(
        CreateEmbed::new()
            .title("📭 Queue")
            .description("The queue is currently empty.")
            .color(RED),
    )
}

/// Create an embed for the music queue
pub fn music_queue(snapshot: &QueueSnapshot) -> CreateReply {
    let mut embed = CreateEmbed::new()
        .title("Music Queue")
        .description(queue_description(snapshot))
        .color(GREEN);

    if let Some(footer) = queue_footer(snapshot.total) {
        embed = embed.footer(CreateEmbedFooter::new(footer));
    }

    CreateReply::default().embed(embed)
}

/// Create an embed for when the bot joins a voice channel
pub fn connected(channel_id: ChannelId) -> CreateReply {
    CreateReply::default().embed(
        CreateEmbed::new()
            .title("🔊 Connected")
            .description(format!("Connected to {}", channel_id.mention()))
            .color(GREEN),
    )
}

/// Create an error embed; user-state errors are only shown to the caller
pub fn error(err: &MusicError) -> CreateReply {
    CreateReply::default()
        .embed(
            CreateEmbed::new()
                .title("❌ Error")
                .description(err.to_string())
                .color(RED),
        )
        .ephemeral(err.is_user_state())
}

/// Create an embed for a command that failed unexpectedly
pub fn unexpected_error(message: &str) -> CreateReply {
    CreateReply::default()
        .embed(
            CreateEmbed::new()
                .title("❌ Error")
                .description(format!("Something went wrong: {}", message))
                .color(RED),
        )
        .ephemeral(true)
}

/// Voice channel membership change of a (non-bot) user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceChange {
    Joined(ChannelId),
    Left(ChannelId),
    Moved {
        from: ChannelId,
        to: ChannelId,
    },
}

/// Create an embed announcing a voice channel join, leave or move
pub fn voice_change(user_id: UserId, change: VoiceChange) -> CreateEmbed {
    let (title, description, color) = match change {
        VoiceChange::Joined(channel) => (
            "🔊 Voice Channel Joined",
            format!("{} joined {}", user_id.mention(), channel.mention()),
            GREEN,
        ),
        VoiceChange::Left(channel) => (
            "🔇 Voice Channel Left",
            format!("{} left {}", user_id.mention(), channel.mention()),
            RED,
        ),
        VoiceChange::Moved { from, to } => (
            "🔄 Voice Channel Moved",
            format!(
                "{} moved from {} to {}",
                user_id.mention(),
                from.mention(),
                to.mention()
            ),
            BLUE,
        ),
    };

    CreateEmbed::new()
        .title(title)
        .description(description)
        .color(color)
        .footer(CreateEmbedFooter::new(format!("User ID: {}", user_id)))
}

/// Now-playing line followed by the numbered upcoming tracks
pub fn queue_description(snapshot: &QueueSnapshot) -> String {
    let mut description = String::new();

    if let Some(track) = &snapshot.now_playing {
        description.push_str(&format!("**🎵 Now Playing**\n{}\n\n", track_link(track)));
    }

    if snapshot.upcoming.is_empty() {
        description.push_str("**📭 Queue is empty**");
    } else {
        for (index, track) in snapshot.upcoming.iter().enumerate() {
            description.push_str(&format!("{}. {}\n", index + 1, track_link(track)));
        }
    }

    description
}

/// "And N more songs..." once the queue is longer than what is shown
pub fn queue_footer(total: usize) -> Option<String> {
    (total > QUEUE_VIEW_LIMIT).then(|| format!("And {} more songs...", total - QUEUE_VIEW_LIMIT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn track(n: usize) -> Track {
        Track::new(
            format!("Song {}", n),
            format!("https://example.com/{}", n),
            "Band",
        )
    }

    #[test]
    fn test_queue_description_lists_numbered_tracks() {
        let snapshot = QueueSnapshot {
            now_playing: Some(track(0)),
            upcoming: vec![track(1), track(2)],
            total: 2,
        };

        assert_eq!(
            queue_description(&snapshot),
            "**🎵 Now Playing**\n[Song 0](https://example.com/0)\n\n\
             1. [Song 1](https://example.com/1)\n\
             2. [Song 2](https://example.com/2)\n"
        );
    }

    #[test]
    fn test_queue_description_empty_queue() {
        let snapshot = QueueSnapshot {
            now_playing: None,
            upcoming: Vec::new(),
            total: 0,
        };

        assert_eq!(queue_description(&snapshot), "**📭 Queue is empty**");
    }

    #[test_case(0, None)]
    #[test_case(10, None)]
    #[test_case(11, Some("And 1 more songs..."))]
    #[test_case(25, Some("And 15 more songs..."))]
    fn test_queue_footer(total: usize, expected: Option<&str>) {
        assert_eq!(queue_footer(total).as_deref(), expected);
    }
}
