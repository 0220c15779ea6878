use super::*;

/// Stop the music, clear the queue, and leave the voice channel
#[poise::command(slash_command, category = "Music")]
pub async fn stop(ctx: Context<'_>) -> CommandResult {
    let guild_id = match guild_id(ctx) {
        Ok(guild_id) => guild_id,
        Err(err) => return reply_error(ctx, &err).await,
    };

    match ctx.data().engine.handle_stop(guild_id).await {
        Ok(cleared) => {
            info!("Stop dropped {} queued tracks in guild {}", cleared, guild_id);
            ctx.send(embedded_messages::stopped()).await?;
            Ok(())
        }
        Err(err) => reply_error(ctx, &err).await,
    }
}
