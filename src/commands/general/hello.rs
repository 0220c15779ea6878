use poise::serenity_prelude::Mentionable;

use crate::{CommandResult, Context};

/// Say hello
#[poise::command(slash_command, category = "General")]
pub async fn hello(ctx: Context<'_>) -> CommandResult {
    ctx.say(greeting(ctx.author().mention())).await?;
    Ok(())
}

fn greeting(who: impl std::fmt::Display) -> String {
    format!("Hello {}!", who)
}
