use poise::CreateReply;
use poise::serenity_prelude::{CreateEmbed, ShardId};
use std::time::Duration;

use crate::{CommandResult, Context};

/// Ping the bot to check its latency
#[poise::command(slash_command, category = "General")]
pub async fn ping(ctx: Context<'_>) -> CommandResult {
    let mut embed = CreateEmbed::new().title("Pong!");

    if let Some(latency) = get_shard_latency(ctx).await {
        embed = embed.field(
            "API Latency",
            format!("{} ms", latency.as_millis()),
            false,
        );
    }

    ctx.send(CreateReply::default().embed(embed)).await?;

    Ok(())
}

async fn get_shard_latency(ctx: Context<'_>) -> Option<Duration> {
    let shard_manager = ctx.framework().shard_manager();
    let runners = shard_manager.runners.lock().await;

    // The runner for the shard this command came in on holds the heartbeat latency
    let runner = runners.get(&ShardId(ctx.serenity_context().shard_id.0))?;

    runner.latency
}
