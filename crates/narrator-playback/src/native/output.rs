//! Dedicated audio output thread.
//!
//! `rodio::OutputStream` is `!Send` on some platforms, so it lives on its
//! own OS thread for its whole lifetime. Only the `Send + Sync` stream
//! handle crosses back to the caller; sinks are created from it anywhere.

use std::sync::mpsc;
use std::thread;

use rodio::{OutputStream, OutputStreamHandle, Sink};

use crate::error::PlaybackError;

/// Owns the audio thread that keeps the output stream alive.
pub struct AudioOutput {
    handle: OutputStreamHandle,
    shutdown_tx: Option<mpsc::Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl AudioOutput {
    /// Open the default output device on a new thread.
    pub fn spawn() -> Result<Self, PlaybackError> {
        let (init_tx, init_rx) = mpsc::channel::<Result<OutputStreamHandle, PlaybackError>>();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let thread = thread::Builder::new()
            .name("narrator-audio".into())
            .spawn(move || Self::run(&init_tx, &shutdown_rx))
            .map_err(|e| PlaybackError::Output(format!("failed to spawn audio thread: {e}")))?;

        let handle = init_rx
            .recv()
            .map_err(|_| PlaybackError::AudioThreadDied)??;

        tracing::debug!(target: "narrator.playback", "Audio output opened");
        Ok(Self {
            handle,
            shutdown_tx: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    /// Create a paused sink on the output.
    pub fn sink(&self) -> Result<Sink, PlaybackError> {
        let sink = Sink::try_new(&self.handle).map_err(|e| match e {
            rodio::PlayError::NoDevice => PlaybackError::AudioThreadDied,
            other => PlaybackError::Output(other.to_string()),
        })?;
        sink.pause();
        Ok(sink)
    }

    fn run(
        init_tx: &mpsc::Sender<Result<OutputStreamHandle, PlaybackError>>,
        shutdown_rx: &mpsc::Receiver<()>,
    ) {
        let (stream, handle) = match OutputStream::try_default() {
            Ok(pair) => pair,
            Err(e) => {
                let _ = init_tx.send(Err(PlaybackError::Output(e.to_string())));
                return;
            }
        };
        if init_tx.send(Ok(handle)).is_err() {
            return;
        }

        // Blocks until the owner drops the sender.
        let _ = shutdown_rx.recv();
        drop(stream);
        tracing::debug!(target: "narrator.playback", "Audio output closed");
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        drop(self.shutdown_tx.take());
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
