//! Shared fakes for controller tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use narrator_core::{
    GenerationBackend, GenerationError, GenerationEvent, GenerationListener, GenerationParams,
    Paragraphs, ResourceLocator,
};

/// Scriptable backend that records calls and peak concurrency.
pub struct FakeBackend {
    latency: Duration,
    failures: Mutex<HashMap<String, u32>>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FakeBackend {
    pub fn new(latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            latency,
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    /// Fail the next `times` requests for `text`.
    pub fn fail(&self, text: &str, times: u32) {
        self.failures.lock().unwrap().insert(text.to_string(), times);
    }

    /// Fail every request for `text`.
    pub fn fail_always(&self, text: &str) {
        self.fail(text, u32::MAX);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, text: &str) -> usize {
        self.calls().iter().filter(|c| *c == text).count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
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
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlightGuard(&self.in_flight);

        tokio::time::sleep(self.latency).await;

        let should_fail = {
            let mut failures = self.failures.lock().unwrap();
            match failures.get_mut(text) {
                Some(0) | None => false,
                Some(remaining) => {
                    if *remaining != u32::MAX {
                        *remaining -= 1;
                    }
                    true
                }
            }
        };
        if should_fail {
            return Err(GenerationError::Server {
                status: 500,
                message: format!("cannot synthesize {text}"),
            });
        }
        Ok(ResourceLocator::new(format!("/audio/{text}.wav")))
    }
}

/// `count` paragraphs named `p0`, `p1`, ...
pub fn paragraphs(count: usize) -> Paragraphs {
    Paragraphs::new((0..count).map(|i| format!("p{i}")))
}

pub fn recorder() -> (
    Arc<dyn GenerationListener>,
    mpsc::UnboundedReceiver<GenerationEvent>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(tx), rx)
}

/// Receive the next event, failing the test if none arrives.
pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<GenerationEvent>) -> GenerationEvent {
    tokio::time::timeout(Duration::from_secs(60), rx.recv())
        .await
        .expect("timed out waiting for generation event")
        .expect("listener channel closed")
}

/// Collect events up to and including `RangeComplete`.
pub async fn until_complete(
    rx: &mut mpsc::UnboundedReceiver<GenerationEvent>,
) -> Vec<GenerationEvent> {
    let mut events = Vec::new();
    loop {
        let event = next_event(rx).await;
        let done = event == GenerationEvent::RangeComplete;
        events.push(event);
        if done {
            return events;
        }
    }
}

/// Indices of `Progress` events, in order.
pub fn progressed(events: &[GenerationEvent]) -> Vec<usize> {
    events
        .iter()
        .filter_map(|e| match e {
            GenerationEvent::Progress { index, .. } => Some(*index),
            _ => None,
        })
        .collect()
}

/// Indices of `Failed` events, in order.
pub fn failed(events: &[GenerationEvent]) -> Vec<usize> {
    events
        .iter()
        .filter_map(|e| match e {
            GenerationEvent::Failed { index, .. } => Some(*index),
            _ => None,
        })
        .collect()
}
