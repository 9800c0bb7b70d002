//! Buffered playback coordinator.
//!
//! The coordinator decides when to play, when to wait for generation and
//! how far ahead to generate. It runs as a single actor task that owns the
//! state machine, the audio engine and the bookmark throttle; the public
//! [`Coordinator`] is a cheap handle that talks to it over channels.
//!
//! # Concurrency Model
//!
//! - One task, one `select!` over commands, element events, generation
//!   events and the bookmark deadline
//! - Commands reply through `oneshot` so rejections are synchronous to the
//!   caller
//! - State snapshots go out on a `watch` channel, discrete events on an
//!   unbounded `mpsc`

mod machine;

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use url::Url;

use narrator_core::{
    AudioSettings, Bookmark, BufferedPlaybackConfig, BufferedPlaybackState, GenerationEvent,
    GenerationParams, NoopPreferencesStore, NoopSessionStore, ParagraphIndex, Paragraphs,
    PlaybackEvent, PreferencesStore, SessionStore,
};
use narrator_generation::GenerationController;

use crate::element::{AudioElementFactory, ElementEvent};
use crate::engine::AudioPlaybackEngine;
use crate::error::CoordinatorError;
use crate::platform::{DesktopPlatform, PlatformAdapter};

use machine::Machine;

/// Command channel capacity.
const COMMAND_BUFFER: usize = 32;

/// Everything the coordinator needs, injected by the composition root.
pub struct CoordinatorDeps {
    pub controller: GenerationController,
    pub elements: Arc<dyn AudioElementFactory>,
    pub platform: Arc<dyn PlatformAdapter>,
    /// Base address relative locators resolve against.
    pub base_url: Url,
    pub config: BufferedPlaybackConfig,
    pub audio: AudioSettings,
    pub sessions: Arc<dyn SessionStore>,
    pub preferences: Arc<dyn PreferencesStore>,
}

impl CoordinatorDeps {
    /// Desktop platform, default settings and no persistence.
    pub fn new(
        controller: GenerationController,
        elements: Arc<dyn AudioElementFactory>,
        base_url: Url,
    ) -> Self {
        Self {
            controller,
            elements,
            platform: Arc::new(DesktopPlatform),
            base_url,
            config: BufferedPlaybackConfig::default(),
            audio: AudioSettings::default(),
            sessions: Arc::new(NoopSessionStore),
            preferences: Arc::new(NoopPreferencesStore),
        }
    }

    #[must_use]
    pub fn with_platform(mut self, platform: Arc<dyn PlatformAdapter>) -> Self {
        self.platform = platform;
        self
    }

    #[must_use]
    pub const fn with_config(mut self, config: BufferedPlaybackConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub const fn with_audio_settings(mut self, audio: AudioSettings) -> Self {
        self.audio = audio;
        self
    }

    #[must_use]
    pub fn with_session_store(mut self, sessions: Arc<dyn SessionStore>) -> Self {
        self.sessions = sessions;
        self
    }

    #[must_use]
    pub fn with_preferences_store(mut self, preferences: Arc<dyn PreferencesStore>) -> Self {
        self.preferences = preferences;
        self
    }
}

type Reply<T> = oneshot::Sender<Result<T, CoordinatorError>>;

enum Command {
    LoadSession {
        paragraphs: Paragraphs,
        params: GenerationParams,
        reply: Reply<()>,
    },
    Start {
        from: ParagraphIndex,
        reply: Reply<()>,
    },
    Pause {
        reply: oneshot::Sender<()>,
    },
    Resume {
        reply: oneshot::Sender<()>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    SkipTo {
        index: ParagraphIndex,
        reply: Reply<()>,
    },
    RetryPlayback {
        reply: oneshot::Sender<()>,
    },
    SetVisibility {
        hidden: bool,
        reply: oneshot::Sender<()>,
    },
    UpdateConfig {
        config: BufferedPlaybackConfig,
        reply: Reply<()>,
    },
    UpdateAudioSettings {
        settings: AudioSettings,
        reply: oneshot::Sender<()>,
    },
}

/// Handle to a running coordinator.
pub struct Coordinator {
    cmd_tx: mpsc::Sender<Command>,
    state_rx: watch::Receiver<BufferedPlaybackState>,
    controller: GenerationController,
    sessions: Arc<dyn SessionStore>,
    task: JoinHandle<()>,
}

impl Coordinator {
    /// Spawn the coordinator task.
    ///
    /// Returns the handle and the receiver for [`PlaybackEvent`]s.
    pub fn spawn(
        deps: CoordinatorDeps,
    ) -> Result<(Self, mpsc::UnboundedReceiver<PlaybackEvent>), CoordinatorError> {
        deps.config.validate()?;

        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (generation_tx, generation_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) =
            watch::channel(BufferedPlaybackState::idle(deps.config.target_buffer_size));

        let (engine, element_rx) = AudioPlaybackEngine::new(
            deps.elements,
            Arc::clone(&deps.platform),
            deps.base_url,
            deps.audio,
        );
        let machine = Machine::new(
            deps.controller.clone(),
            engine,
            deps.platform,
            deps.config,
            generation_tx,
            events_tx,
            state_tx,
        );

        let actor = Actor {
            machine,
            cmd_rx,
            element_rx,
            generation_rx,
            sessions: Arc::clone(&deps.sessions),
            preferences: deps.preferences,
        };
        let task = tokio::spawn(actor.run());

        Ok((
            Self {
                cmd_tx,
                state_rx,
                controller: deps.controller,
                sessions: deps.sessions,
                task,
            },
            events_rx,
        ))
    }

    /// Load the paragraphs and generation parameters to play.
    ///
    /// Changing either stops playback and discards generated audio.
    pub async fn load_session(
        &self,
        paragraphs: Paragraphs,
        params: GenerationParams,
    ) -> Result<(), CoordinatorError> {
        self.request(|reply| Command::LoadSession {
            paragraphs,
            params,
            reply,
        })
        .await
    }

    /// Start playback at `from`.
    ///
    /// Fails without touching the session when the backend does not answer
    /// its connectivity probe.
    pub async fn start(&self, from: ParagraphIndex) -> Result<(), CoordinatorError> {
        self.controller
            .check_connection()
            .await
            .map_err(|e| CoordinatorError::BackendUnreachable(e.to_string()))?;
        self.request(|reply| Command::Start { from, reply }).await
    }

    pub async fn pause(&self) -> Result<(), CoordinatorError> {
        self.notify(|reply| Command::Pause { reply }).await
    }

    pub async fn resume(&self) -> Result<(), CoordinatorError> {
        self.notify(|reply| Command::Resume { reply }).await
    }

    /// Stop playback and return to idle.
    pub async fn stop(&self) -> Result<(), CoordinatorError> {
        self.notify(|reply| Command::Stop { reply }).await
    }

    /// Jump to a paragraph.
    pub async fn skip_to(&self, index: ParagraphIndex) -> Result<(), CoordinatorError> {
        self.request(|reply| Command::SkipTo { index, reply }).await
    }

    /// Retry the current paragraph after a playback error.
    pub async fn retry_playback(&self) -> Result<(), CoordinatorError> {
        self.notify(|reply| Command::RetryPlayback { reply }).await
    }

    /// Report whether the host is hidden. Generation pauses while hidden.
    pub async fn set_visibility(&self, hidden: bool) -> Result<(), CoordinatorError> {
        self.notify(|reply| Command::SetVisibility { hidden, reply })
            .await
    }

    /// Replace the buffering configuration and persist it.
    ///
    /// Rejected while a session is active.
    pub async fn update_config(
        &self,
        config: BufferedPlaybackConfig,
    ) -> Result<(), CoordinatorError> {
        self.request(|reply| Command::UpdateConfig { config, reply })
            .await
    }

    /// Apply playback speed and pitch settings.
    pub async fn update_audio_settings(
        &self,
        settings: AudioSettings,
    ) -> Result<(), CoordinatorError> {
        self.notify(|reply| Command::UpdateAudioSettings { settings, reply })
            .await
    }

    /// The last saved bookmark, if any.
    pub async fn saved_bookmark(&self) -> Result<Option<Bookmark>, CoordinatorError> {
        Ok(self.sessions.load_bookmark().await?)
    }

    /// Current state snapshot.
    pub fn state(&self) -> BufferedPlaybackState {
        self.state_rx.borrow().clone()
    }

    /// Whether a session is in progress.
    pub fn is_active(&self) -> bool {
        self.state_rx.borrow().status.is_active()
    }

    /// Subscribe to state snapshots.
    pub fn subscribe(&self) -> watch::Receiver<BufferedPlaybackState> {
        self.state_rx.clone()
    }

    /// Stop playback and wait for the coordinator task to exit.
    pub async fn shutdown(self) {
        drop(self.cmd_tx);
        let _ = self.task.await;
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, CoordinatorError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(build(tx))
            .await
            .map_err(|_| CoordinatorError::Closed)?;
        rx.await.map_err(|_| CoordinatorError::Closed)?
    }

    async fn notify(
        &self,
        build: impl FnOnce(oneshot::Sender<()>) -> Command,
    ) -> Result<(), CoordinatorError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(build(tx))
            .await
            .map_err(|_| CoordinatorError::Closed)?;
        rx.await.map_err(|_| CoordinatorError::Closed)
    }
}

struct Actor {
    machine: Machine,
    cmd_rx: mpsc::Receiver<Command>,
    element_rx: mpsc::UnboundedReceiver<ElementEvent>,
    generation_rx: mpsc::UnboundedReceiver<GenerationEvent>,
    sessions: Arc<dyn SessionStore>,
    preferences: Arc<dyn PreferencesStore>,
}

impl Actor {
    async fn run(mut self) {
        tracing::debug!(target: "narrator.coordinator", "Coordinator task started");

        loop {
            let deadline = self.machine.bookmark_deadline();
            tokio::select! {
                biased;

                cmd = self.cmd_rx.recv() => {
                    let Some(cmd) = cmd else { break };
                    self.handle(cmd).await;
                }

                Some(event) = self.element_rx.recv() => {
                    self.machine.on_element_event(event);
                }

                Some(event) = self.generation_rx.recv() => {
                    self.machine.on_generation_event(event);
                }

                () = sleep_until(deadline) => {
                    self.machine.poll_bookmark();
                }
            }
            self.persist_bookmark().await;
        }

        self.machine.stop();
        self.persist_bookmark().await;
        tracing::debug!(target: "narrator.coordinator", "Coordinator task stopped");
    }

    async fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::LoadSession {
                paragraphs,
                params,
                reply,
            } => {
                let _ = reply.send(self.machine.load_session(paragraphs, params));
            }
            Command::Start { from, reply } => {
                let _ = reply.send(self.machine.start(from));
            }
            Command::Pause { reply } => {
                self.machine.pause();
                let _ = reply.send(());
            }
            Command::Resume { reply } => {
                self.machine.resume();
                let _ = reply.send(());
            }
            Command::Stop { reply } => {
                self.machine.stop();
                let _ = reply.send(());
            }
            Command::SkipTo { index, reply } => {
                let _ = reply.send(self.machine.skip_to(index));
            }
            Command::RetryPlayback { reply } => {
                self.machine.retry_playback();
                let _ = reply.send(());
            }
            Command::SetVisibility { hidden, reply } => {
                self.machine.set_visibility(hidden);
                let _ = reply.send(());
            }
            Command::UpdateConfig { config, reply } => {
                let result = match self.machine.update_config(config) {
                    Ok(()) => self
                        .preferences
                        .save(&self.machine.config())
                        .await
                        .map_err(CoordinatorError::from),
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }
            Command::UpdateAudioSettings { settings, reply } => {
                self.machine.update_audio_settings(settings);
                let _ = reply.send(());
            }
        }
    }

    async fn persist_bookmark(&mut self) {
        let Some(paragraph) = self.machine.take_bookmark() else {
            return;
        };
        if let Err(e) = self
            .sessions
            .save_bookmark(&Bookmark::now(paragraph))
            .await
        {
            tracing::warn!(
                target: "narrator.coordinator",
                paragraph,
                error = %e,
                "Failed to save bookmark"
            );
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
