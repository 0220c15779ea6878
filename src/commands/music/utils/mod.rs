// Export music utilities
pub mod embedded_messages;
pub mod event_handlers;
pub mod idle_timer;
pub mod music_manager;
pub mod notifier;
pub mod playback_engine;
pub mod queue_manager;
