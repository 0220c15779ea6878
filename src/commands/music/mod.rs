pub mod join;
pub mod play;
pub mod queue;
pub mod skip;
pub mod skip_all;
pub mod stop;

pub mod audio_sources;
pub mod utils;

use crate::{CommandResult, Context};
use poise::serenity_prelude::{ChannelId, GuildId};
use tracing::{error, info, warn};

use utils::embedded_messages;
use utils::music_manager::{MusicError, MusicManager, MusicResult};

/// Guild the command was invoked in
fn guild_id(ctx: Context<'_>) -> MusicResult<GuildId> {
    ctx.guild_id().ok_or(MusicError::NotInGuild)
}

/// Guild plus the voice channel the invoking user sits in
fn caller_voice_channel(ctx: Context<'_>) -> MusicResult<(GuildId, ChannelId)> {
    let guild_id = guild_id(ctx)?;
    let channel_id =
        MusicManager::get_user_voice_channel(ctx.serenity_context(), guild_id, ctx.author().id)?;
    Ok((guild_id, channel_id))
}

/// Reply with an error embed. User-state errors are a rejection, anything
/// else is a failed command and gets logged as such.
async fn reply_error(ctx: Context<'_>, err: &MusicError) -> CommandResult {
    if err.is_user_state() {
        info!(
            "Rejected /{} from {}: {}",
            ctx.command().name,
            ctx.author().name,
            err
        );
    } else {
        error!("/{} failed: {}", ctx.command().name, err);
    }

    if let Err(e) = ctx.send(embedded_messages::error(err)).await {
        warn!("Failed to send error reply: {}", e);
    }
    Ok(())
}
