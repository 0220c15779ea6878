use ::serenity::all::ClientBuilder;
use dotenv::dotenv;
use poise::serenity_prelude as serenity;
use songbird::SerenityInit;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use rubi::commands::general::{hello::*, ping::*};
use rubi::commands::music::audio_sources::youtube::YtDlpResolver;
use rubi::commands::music::utils::embedded_messages;
use rubi::commands::music::utils::music_manager::MusicManager;
use rubi::commands::music::utils::notifier::DiscordNotifier;
use rubi::commands::music::{join::*, play::*, queue::*, skip::*, skip_all::*, stop::*};
use rubi::events::{Handler, NotifierKey, PlaybackEngineKey};
use rubi::{BotConfig, CommandResult, Context, Data, Error, PlaybackEngine};

#[poise::command(slash_command, category = "General")]
async fn help(
    ctx: Context<'_>,
    #[description = "Specific command to show help about"]
    #[autocomplete = "poise::builtins::autocomplete_command"]
    command: Option<String>,
) -> CommandResult {
    poise::builtins::help(
        ctx,
        command.as_deref(),
        poise::builtins::HelpConfiguration {
            show_context_menu_commands: true,
            ..Default::default()
        },
    )
    .await
    .map_err(|e| e.into())
}

#[poise::command(prefix_command, hide_in_help)]
async fn register(ctx: Context<'_>) -> Result<(), Error> {
    poise::builtins::register_application_commands_buttons(ctx)
        .await
        .map_err(|e| e.into())
}

async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            error!("Command /{} failed: {}", ctx.command().name, error);
            if let Err(e) = ctx
                .send(embedded_messages::unexpected_error(&error.to_string()))
                .await
            {
                error!("Error while sending error embed: {}", e);
            }
        }
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                error!("Error while handling error: {}", e);
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize logging with debug level for our crate
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rubi=debug,warn")),
        )
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .with_target(true)
        .with_ansi(true)
        .pretty()
        .init();

    dotenv().ok();

    let config = Arc::new(BotConfig::from_env()?);
    info!("Starting with {}", config.summary());

    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::MESSAGE_CONTENT
        | serenity::GatewayIntents::GUILD_VOICE_STATES;

    let commands = vec![
        // Default commands
        register(),
        help(),
        // General commands
        ping(),
        hello(),
        // Music commands
        play(),
        stop(),
        skip(),
        skip_all(),
        queue(),
        join(),
    ];

    let setup_config = Arc::clone(&config);
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands,
            on_error: |error| Box::pin(on_error(error)),
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some("!".into()),
                ..Default::default()
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                let config = setup_config;
                match config.dev_guild_id {
                    Some(guild_id) => {
                        poise::builtins::register_in_guild(
                            ctx,
                            &framework.options().commands,
                            guild_id,
                        )
                        .await?
                    }
                    None => {
                        poise::builtins::register_globally(ctx, &framework.options().commands)
                            .await?
                    }
                }

                let songbird = MusicManager::get_songbird(ctx).await?;
                let notifier =
                    DiscordNotifier::new(ctx.clone(), config.notification_channel_hints.clone());
                let engine = PlaybackEngine::new(
                    Arc::new(YtDlpResolver::new(
                        config.ytdlp_path.clone(),
                        config.resolver_attempts,
                    )),
                    Arc::new(MusicManager::new(songbird)),
                    Arc::new(notifier.clone()),
                );

                {
                    let mut data = ctx.data.write().await;
                    data.insert::<PlaybackEngineKey>(Arc::clone(&engine));
                    data.insert::<NotifierKey>(notifier);
                }

                info!("{} is ready to play music", ready.user.name);
                Ok(Data { engine })
            })
        })
        .build();

    let mut client = ClientBuilder::new(&config.discord_token, intents)
        .framework(framework)
        .event_handler(Handler)
        .register_songbird()
        .await?;

    let shard_manager = Arc::clone(&client.shard_manager);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received, closing shards");
                shard_manager.shutdown_all().await;
            }
            Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    client.start().await.map_err(Into::into)
}

