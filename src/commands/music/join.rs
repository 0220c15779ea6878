use super::*;

/// Join your voice channel without playing anything
#[poise::command(slash_command, rename = "entrar_no_rubi", category = "Music")]
pub async fn join(ctx: Context<'_>) -> CommandResult {
    let (guild_id, channel_id) = match caller_voice_channel(ctx) {
        Ok(target) => target,
        Err(err) => return reply_error(ctx, &err).await,
    };

    match ctx.data().engine.handle_join(guild_id, channel_id).await {
        Ok(()) => {
            ctx.send(embedded_messages::connected(channel_id)).await?;
            Ok(())
        }
        Err(err) => reply_error(ctx, &err).await,
    }
}
