//! Scripted generation backend, audio elements and stores for coordinator
//! tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use url::Url;

use narrator_core::{
    Bookmark, BufferedPlaybackConfig, BufferedPlaybackState, GenerationBackend, GenerationError,
    GenerationParams, ParagraphIndex, Paragraphs, PlaybackEvent, PlaybackStatus,
    PreferencesStore, ResourceLocator, SessionStore, StoreError,
};
use narrator_generation::GenerationController;
use narrator_playback::{
    AudioElement, AudioElementFactory, Coordinator, CoordinatorDeps, DesktopPlatform,
    ElementEvent, ElementEventKind, ElementEventSender, ElementToken, PlatformAdapter,
    PlaybackError,
};

pub const BASE_URL: &str = "http://tts.test/";

// ── Generation ─────────────────────────────────────────────────────

/// Backend that answers after a fixed latency, with scriptable failures.
pub struct FakeBackend {
    latency: Duration,
    failures: Mutex<HashMap<String, u32>>,
    calls: Mutex<Vec<String>>,
    reachable: Mutex<bool>,
}

impl FakeBackend {
    pub fn new(latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            latency,
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            reachable: Mutex::new(true),
        })
    }

    /// Fail every request for `text`.
    pub fn fail_always(&self, text: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(text.to_string(), u32::MAX);
    }

    /// Make the connectivity probe fail.
    pub fn set_reachable(&self, reachable: bool) {
        *self.reachable.lock().unwrap() = reachable;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, text: &str) -> usize {
        self.calls().iter().filter(|c| *c == text).count()
    }
}

#[async_trait]
impl GenerationBackend for FakeBackend {
    async fn generate(
        &self,
        text: &str,
        _params: &GenerationParams,
    ) -> Result<ResourceLocator, GenerationError> {
        self.calls.lock().unwrap().push(text.to_string());
        tokio::time::sleep(self.latency).await;

        if self.failures.lock().unwrap().contains_key(text) {
            return Err(GenerationError::Server {
                status: 500,
                message: format!("cannot synthesize {text}"),
            });
        }
        Ok(ResourceLocator::new(format!("/audio/{text}.wav")))
    }

    async fn check_connection(&self) -> Result<(), GenerationError> {
        if *self.reachable.lock().unwrap() {
            Ok(())
        } else {
            Err(GenerationError::unreachable("connection refused"))
        }
    }
}

/// `count` paragraphs named `p0`, `p1`, ...
pub fn paragraphs(count: usize) -> Paragraphs {
    Paragraphs::new((0..count).map(|i| format!("p{i}")))
}

// ── Audio elements ─────────────────────────────────────────────────

struct ElementRecord {
    url: Url,
    token: ElementToken,
    events: ElementEventSender,
    stopped: bool,
}

#[derive(Default)]
struct Script {
    elements: Vec<ElementRecord>,
    played: Vec<ParagraphIndex>,
    paused: usize,
    blocked_plays: usize,
}

/// Element factory whose elements buffer instantly and only end when the
/// test says so.
#[derive(Default)]
pub struct ScriptedElements {
    script: Arc<Mutex<Script>>,
}

impl ScriptedElements {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Reject the next `count` `play` calls as autoplay-blocked.
    pub fn block_next_plays(&self, count: usize) {
        self.script.lock().unwrap().blocked_plays = count;
    }

    /// Paragraphs passed to a successful `play`, in order.
    pub fn played(&self) -> Vec<ParagraphIndex> {
        self.script.lock().unwrap().played.clone()
    }

    /// Number of elements the factory created.
    pub fn created(&self) -> usize {
        self.script.lock().unwrap().elements.len()
    }

    pub fn pause_count(&self) -> usize {
        self.script.lock().unwrap().paused
    }

    /// Report the end of the live element holding `index`.
    pub fn finish(&self, index: ParagraphIndex) {
        self.report(index, ElementEventKind::Ended);
    }

    /// Report a playback failure on the live element holding `index`.
    pub fn fail(&self, index: ParagraphIndex, error: PlaybackError) {
        self.report(index, ElementEventKind::Error(error));
    }

    fn report(&self, index: ParagraphIndex, kind: ElementEventKind) {
        let script = self.script.lock().unwrap();
        let record = script
            .elements
            .iter()
            .rev()
            .find(|r| !r.stopped && paragraph_of(&r.url) == index)
            .unwrap_or_else(|| panic!("no live element for paragraph {index}"));
        record
            .events
            .send(ElementEvent::new(record.token, kind))
            .unwrap();
    }
}

impl AudioElementFactory for ScriptedElements {
    fn create(
        &self,
        url: &Url,
        token: ElementToken,
        events: ElementEventSender,
    ) -> Result<Box<dyn AudioElement>, PlaybackError> {
        let mut script = self.script.lock().unwrap();
        let _ = events.send(ElementEvent::new(token, ElementEventKind::CanPlayThrough));
        script.elements.push(ElementRecord {
            url: url.clone(),
            token,
            events,
            stopped: false,
        });
        Ok(Box::new(ScriptedElement {
            id: script.elements.len() - 1,
            script: Arc::clone(&self.script),
        }))
    }
}

struct ScriptedElement {
    id: usize,
    script: Arc<Mutex<Script>>,
}

impl AudioElement for ScriptedElement {
    fn play(&mut self) -> Result<(), PlaybackError> {
        let mut script = self.script.lock().unwrap();
        if script.blocked_plays > 0 {
            script.blocked_plays -= 1;
            return Err(PlaybackError::AutoplayBlocked);
        }
        let index = paragraph_of(&script.elements[self.id].url);
        script.played.push(index);
        Ok(())
    }

    fn pause(&mut self) {
        self.script.lock().unwrap().paused += 1;
    }

    fn stop(&mut self) {
        self.script.lock().unwrap().elements[self.id].stopped = true;
    }

    fn load(&mut self, url: &Url, token: ElementToken) -> Result<(), PlaybackError> {
        let mut script = self.script.lock().unwrap();
        let record = &mut script.elements[self.id];
        record.url = url.clone();
        record.token = token;
        record.stopped = false;
        let _ = record
            .events
            .send(ElementEvent::new(token, ElementEventKind::CanPlayThrough));
        Ok(())
    }

    fn apply_settings(&mut self, _settings: &narrator_core::AudioSettings) {}

    fn is_buffered(&self) -> bool {
        true
    }
}

/// `http://tts.test/audio/p3.wav` -> 3
fn paragraph_of(url: &Url) -> ParagraphIndex {
    url.path()
        .trim_start_matches("/audio/p")
        .trim_end_matches(".wav")
        .parse()
        .unwrap()
}

// ── Stores ─────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemorySessionStore {
    saved: Mutex<Vec<Bookmark>>,
}

impl MemorySessionStore {
    /// Paragraphs of every bookmark written, in order.
    pub fn saved(&self) -> Vec<ParagraphIndex> {
        self.saved
            .lock()
            .unwrap()
            .iter()
            .map(|b| b.paragraph)
            .collect()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load_bookmark(&self) -> Result<Option<Bookmark>, StoreError> {
        Ok(self.saved.lock().unwrap().last().cloned())
    }

    async fn save_bookmark(&self, bookmark: &Bookmark) -> Result<(), StoreError> {
        self.saved.lock().unwrap().push(bookmark.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryPreferencesStore {
    config: Mutex<Option<BufferedPlaybackConfig>>,
}

impl MemoryPreferencesStore {
    pub fn stored(&self) -> Option<BufferedPlaybackConfig> {
        *self.config.lock().unwrap()
    }
}

#[async_trait]
impl PreferencesStore for MemoryPreferencesStore {
    async fn load(&self) -> Result<BufferedPlaybackConfig, StoreError> {
        Ok(self.stored().unwrap_or_default())
    }

    async fn save(&self, config: &BufferedPlaybackConfig) -> Result<(), StoreError> {
        *self.config.lock().unwrap() = Some(*config);
        Ok(())
    }
}

// ── Harness ────────────────────────────────────────────────────────

pub const LATENCY: Duration = Duration::from_millis(200);

pub struct Harness {
    pub coordinator: Coordinator,
    pub events: mpsc::UnboundedReceiver<PlaybackEvent>,
    pub backend: Arc<FakeBackend>,
    pub elements: Arc<ScriptedElements>,
    pub sessions: Arc<MemorySessionStore>,
    pub preferences: Arc<MemoryPreferencesStore>,
}

/// Coordinator on a desktop platform with `count` paragraphs loaded.
pub async fn harness(count: usize, config: BufferedPlaybackConfig) -> Harness {
    harness_with(count, config, Arc::new(DesktopPlatform), FakeBackend::new(LATENCY)).await
}

pub async fn harness_with(
    count: usize,
    config: BufferedPlaybackConfig,
    platform: Arc<dyn PlatformAdapter>,
    backend: Arc<FakeBackend>,
) -> Harness {
    let elements = ScriptedElements::new();
    let sessions = Arc::new(MemorySessionStore::default());
    let preferences = Arc::new(MemoryPreferencesStore::default());

    let deps = CoordinatorDeps::new(
        GenerationController::new(backend.clone()),
        elements.clone(),
        Url::parse(BASE_URL).unwrap(),
    )
    .with_platform(platform)
    .with_config(config)
    .with_session_store(sessions.clone())
    .with_preferences_store(preferences.clone());

    let (coordinator, events) = Coordinator::spawn(deps).unwrap();
    coordinator
        .load_session(paragraphs(count), GenerationParams::default())
        .await
        .unwrap();

    Harness {
        coordinator,
        events,
        backend,
        elements,
        sessions,
        preferences,
    }
}

/// Wait until a published state satisfies `f`.
pub async fn wait_until(
    coordinator: &Coordinator,
    f: impl FnMut(&BufferedPlaybackState) -> bool,
) -> BufferedPlaybackState {
    let mut rx = coordinator.subscribe();
    let state = tokio::time::timeout(Duration::from_secs(60), rx.wait_for(f))
        .await
        .expect("timed out waiting for coordinator state")
        .expect("coordinator stopped")
        .clone();
    state
}

pub async fn wait_for_status(
    coordinator: &Coordinator,
    status: PlaybackStatus,
) -> BufferedPlaybackState {
    wait_until(coordinator, |s| s.status == status).await
}

/// Wait until paragraph `index` is playing.
pub async fn wait_playing(coordinator: &Coordinator, index: ParagraphIndex) -> BufferedPlaybackState {
    wait_until(coordinator, |s| {
        s.status == PlaybackStatus::Playing && s.current_paragraph == index
    })
    .await
}

/// Receive events until one matches `f`, returning it.
pub async fn next_matching(
    events: &mut mpsc::UnboundedReceiver<PlaybackEvent>,
    mut f: impl FnMut(&PlaybackEvent) -> bool,
) -> PlaybackEvent {
    tokio::time::timeout(Duration::from_secs(60), async {
        loop {
            let event = events.recv().await.expect("event channel closed");
            if f(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for playback event")
}

/// Statuses from `StateChanged` events currently queued.
pub fn drain_statuses(events: &mut mpsc::UnboundedReceiver<PlaybackEvent>) -> Vec<PlaybackStatus> {
    let mut statuses = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let PlaybackEvent::StateChanged { status } = event {
            statuses.push(status);
        }
    }
    statuses
}
