//! Common test utilities, fixtures, and mocks

#![allow(dead_code)]

pub mod fixtures;
pub mod mocks;

use std::sync::{Arc, Once};
use std::time::Duration;

use rubi::PlaybackEngine;

use mocks::{FakeVoice, MockResolver, RecordingObserver, catalog_resolver};

static INIT: Once = Once::new();

/// Initialize tracing for tests
pub fn init() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("rubi=debug")
            .with_test_writer()
            .init();
    });
}

/// Lets every spawned task run to completion. Under a paused clock the
/// runtime only advances time once nothing else is runnable.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// A playback engine wired to recording fakes
pub struct Harness {
    pub engine: Arc<PlaybackEngine>,
    pub voice: Arc<FakeVoice>,
    pub observer: Arc<RecordingObserver>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_resolver(catalog_resolver())
    }

    pub fn with_resolver(resolver: MockResolver) -> Self {
        init();
        let voice = Arc::new(FakeVoice::default());
        let observer = Arc::new(RecordingObserver::default());
        let engine = PlaybackEngine::new(Arc::new(resolver), voice.clone(), observer.clone());

        Self {
            engine,
            voice,
            observer,
        }
    }
}
