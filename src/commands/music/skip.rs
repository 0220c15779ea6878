use super::*;

/// Skip the currently playing song
#[poise::command(slash_command, category = "Music")]
pub async fn skip(ctx: Context<'_>) -> CommandResult {
    let guild_id = match guild_id(ctx) {
        Ok(guild_id) => guild_id,
        Err(err) => return reply_error(ctx, &err).await,
    };

    match ctx.data().engine.handle_skip(guild_id).await {
        Ok(track) => {
            ctx.send(embedded_messages::skipped(&track)).await?;
            Ok(())
        }
        Err(err) => reply_error(ctx, &err).await,
    }
}
