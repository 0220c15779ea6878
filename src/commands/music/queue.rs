use super::*;

/// Show the current song and the upcoming queue
#[poise::command(slash_command, category = "Music")]
pub async fn queue(ctx: Context<'_>) -> CommandResult {
    let guild_id = match guild_id(ctx) {
        Ok(guild_id) => guild_id,
        Err(err) => return reply_error(ctx, &err).await,
    };

    let snapshot = ctx.data().engine.handle_queue_view(guild_id).await;

    let reply = if snapshot.now_playing.is_none() && snapshot.total == 0 {
        embedded_messages::queue_empty()
    } else {
        embedded_messages::music_queue(&snapshot)
    };

    ctx.send(reply).await?;
    Ok(())
}
