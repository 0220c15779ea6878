use super::*;

/// Skip every queued song; the current one keeps playing
#[poise::command(slash_command, rename = "skipall", category = "Music")]
pub async fn skip_all(ctx: Context<'_>) -> CommandResult {
    let guild_id = match guild_id(ctx) {
        Ok(guild_id) => guild_id,
        Err(err) => return reply_error(ctx, &err).await,
    };

    let reply = match ctx.data().engine.handle_skip_all(guild_id).await {
        0 => embedded_messages::queue_empty(),
        cleared => embedded_messages::skipped_all(cleared),
    };

    ctx.send(reply).await?;
    Ok(())
}
