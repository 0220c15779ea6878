use std::sync::Arc;

use serenity::all::{ActivityData, ChannelId, Context, EventHandler, Ready, VoiceState};
use serenity::prelude::TypeMapKey;
use serenity::async_trait;
use tracing::{debug, info};

use crate::commands::music::utils::embedded_messages::{self, VoiceChange};
use crate::commands::music::utils::notifier::{DiscordNotifier, IDLE_PRESENCE};
use crate::commands::music::utils::playback_engine::PlaybackEngine;

/// Gives gateway event handlers access to the playback engine.
pub struct PlaybackEngineKey;

impl TypeMapKey for PlaybackEngineKey {
    type Value = Arc<PlaybackEngine>;
}

/// Gives gateway event handlers access to the notification channel poster.
pub struct NotifierKey;

impl TypeMapKey for NotifierKey {
    type Value = DiscordNotifier;
}

pub struct Handler;

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("{} is connected!", ready.user.name);
        ctx.set_activity(Some(ActivityData::playing(IDLE_PRESENCE)));
    }

    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let Some(guild_id) = new.guild_id else {
            return;
        };

        // The bot itself was disconnected, by us or by someone else
        if new.user_id == ctx.cache.current_user().id {
            if new.channel_id.is_none() {
                let engine = ctx.data.read().await.get::<PlaybackEngineKey>().cloned();
                if let Some(engine) = engine {
                    engine.handle_voice_disconnected(guild_id).await;
                }
            }
            return;
        }

        if new.member.as_ref().is_some_and(|member| member.user.bot) {
            return;
        }

        let old_channel = old.as_ref().and_then(|state| state.channel_id);
        let Some(change) = classify_voice_change(old_channel, new.channel_id) else {
            return;
        };

        debug!("Voice change in guild {}: {:?}", guild_id, change);
        if let Some(notifier) = ctx.data.read().await.get::<NotifierKey>() {
            notifier.post(
                guild_id,
                embedded_messages::voice_change(new.user_id, change),
            );
        }
    }
}

/// Mute, deafen and other updates that keep the channel are not a change.
pub fn classify_voice_change(old: Option<ChannelId>, new: Option<ChannelId>) -> Option<VoiceChange> {
    match (old, new) {
        (None, Some(to)) => Some(VoiceChange::Joined(to)),
        (Some(from), None) => Some(VoiceChange::Left(from)),
        (Some(from), Some(to)) if from != to => Some(VoiceChange::Moved { from, to }),
        _ => None,
    }
}
