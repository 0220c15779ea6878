use super::*;
use crate::commands::music::utils::playback_engine::PlayOutcome;

/// Play a song or playlist from a URL, or the first search result for a query
#[poise::command(slash_command, category = "Music")]
pub async fn play(
    ctx: Context<'_>,
    #[description = "URL or search query"] query: String,
) -> CommandResult {
    info!("Received play command with query: {}", query);

    let (guild_id, channel_id) = match caller_voice_channel(ctx) {
        Ok(target) => target,
        Err(err) => return reply_error(ctx, &err).await,
    };

    // Resolving through yt-dlp can take a few seconds
    ctx.defer().await?;

    let outcome = match ctx
        .data()
        .engine
        .handle_play(guild_id, channel_id, &query)
        .await
    {
        Ok(outcome) => outcome,
        Err(err) => return reply_error(ctx, &err).await,
    };

    let reply = match &outcome {
        PlayOutcome::Started(track) => embedded_messages::playing(track),
        PlayOutcome::Queued { track, position } => {
            embedded_messages::added_to_queue(track, *position)
        }
        PlayOutcome::PlaylistQueued {
            title, url, added, ..
        } => embedded_messages::playlist_added(title, url.as_deref(), *added),
    };

    ctx.send(reply).await?;
    Ok(())
}
