//! Native audio elements backed by `rodio`.
//!
//! Each element owns one paused [`rodio::Sink`]. Loading fetches the whole
//! resource over HTTP, decodes it and appends it to the sink; a blocking
//! watcher then waits for the sink to drain and reports `Ended`.

mod output;

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rodio::{Decoder, Sink};
use tokio::task::JoinHandle;
use url::Url;

use narrator_core::AudioSettings;

use crate::element::{
    AudioElement, AudioElementFactory, ElementEvent, ElementEventKind, ElementEventSender,
    ElementToken,
};
use crate::error::PlaybackError;

pub use output::AudioOutput;

/// Creates [`RodioElement`]s on the default output device.
pub struct RodioElementFactory {
    output: Arc<AudioOutput>,
    client: reqwest::Client,
}

impl RodioElementFactory {
    /// Open the default output device.
    pub fn new() -> Result<Self, PlaybackError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| PlaybackError::Network(e.to_string()))?;
        Ok(Self {
            output: Arc::new(AudioOutput::spawn()?),
            client,
        })
    }
}

impl AudioElementFactory for RodioElementFactory {
    fn create(
        &self,
        url: &Url,
        token: ElementToken,
        events: ElementEventSender,
    ) -> Result<Box<dyn AudioElement>, PlaybackError> {
        let mut element = RodioElement {
            _output: Arc::clone(&self.output),
            client: self.client.clone(),
            sink: Arc::new(self.output.sink()?),
            events,
            load: None,
            loader: None,
        };
        element.load(url, token)?;
        Ok(Box::new(element))
    }
}

#[derive(Default)]
struct LoadState {
    buffered: AtomicBool,
    cancelled: AtomicBool,
}

/// One sink playing one source at a time.
pub struct RodioElement {
    // Keeps the output stream open while the sink exists.
    _output: Arc<AudioOutput>,
    client: reqwest::Client,
    sink: Arc<Sink>,
    events: ElementEventSender,
    load: Option<Arc<LoadState>>,
    loader: Option<JoinHandle<()>>,
}

impl RodioElement {
    fn cancel_load(&mut self) {
        if let Some(load) = self.load.take() {
            load.cancelled.store(true, Ordering::Release);
        }
        if let Some(loader) = self.loader.take() {
            loader.abort();
        }
    }
}

impl AudioElement for RodioElement {
    fn play(&mut self) -> Result<(), PlaybackError> {
        self.sink.play();
        Ok(())
    }

    fn pause(&mut self) {
        self.sink.pause();
    }

    fn stop(&mut self) {
        self.cancel_load();
        // `clear` empties the queue without latching the sink as stopped,
        // so the element can be loaded again.
        self.sink.clear();
    }

    fn load(&mut self, url: &Url, token: ElementToken) -> Result<(), PlaybackError> {
        self.stop();

        let load = Arc::new(LoadState::default());
        self.loader = Some(tokio::spawn(load_source(
            self.client.clone(),
            url.clone(),
            token,
            Arc::clone(&self.sink),
            self.events.clone(),
            Arc::clone(&load),
        )));
        self.load = Some(load);
        Ok(())
    }

    fn apply_settings(&mut self, settings: &AudioSettings) {
        self.sink.set_speed(settings.speed);
        if settings.preserves_pitch && (settings.speed - 1.0).abs() > f32::EPSILON {
            tracing::debug!(
                target: "narrator.playback",
                speed = settings.speed,
                "Native output shifts pitch with speed"
            );
        }
    }

    fn is_buffered(&self) -> bool {
        self.load
            .as_ref()
            .is_some_and(|l| l.buffered.load(Ordering::Acquire))
    }
}

impl Drop for RodioElement {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn load_source(
    client: reqwest::Client,
    url: Url,
    token: ElementToken,
    sink: Arc<Sink>,
    events: ElementEventSender,
    load: Arc<LoadState>,
) {
    let report = |kind: ElementEventKind| {
        if !load.cancelled.load(Ordering::Acquire) {
            let _ = events.send(ElementEvent::new(token, kind));
        }
    };

    let bytes = match fetch(&client, &url).await {
        Ok(bytes) => bytes,
        Err(e) => {
            report(ElementEventKind::Error(e));
            return;
        }
    };
    let source = match Decoder::new(Cursor::new(bytes)) {
        Ok(source) => source,
        Err(e) => {
            report(ElementEventKind::Error(PlaybackError::Decode(e.to_string())));
            return;
        }
    };
    if load.cancelled.load(Ordering::Acquire) {
        return;
    }

    sink.append(source);
    load.buffered.store(true, Ordering::Release);
    report(ElementEventKind::CanPlayThrough);

    // Returns once the queue drains, or immediately after `clear`.
    let watcher = Arc::clone(&sink);
    if tokio::task::spawn_blocking(move || watcher.sleep_until_end())
        .await
        .is_err()
    {
        return;
    }
    report(ElementEventKind::Ended);
}

async fn fetch(client: &reqwest::Client, url: &Url) -> Result<Vec<u8>, PlaybackError> {
    let network = |e: reqwest::Error| PlaybackError::Network(e.to_string());
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(network)?
        .error_for_status()
        .map_err(network)?;
    let bytes = response.bytes().await.map_err(network)?;
    tracing::trace!(target: "narrator.playback", %url, bytes = bytes.len(), "Fetched audio");
    Ok(bytes.to_vec())
}
