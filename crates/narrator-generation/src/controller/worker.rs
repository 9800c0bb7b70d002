//! Single-paragraph generation with retry.
//!
//! The worker operates on a value-type [`GenerationJob`] and cloned `Arc`
//! dependencies. It never touches controller state directly; failed attempts
//! are reported through a callback so the controller can record them under
//! its own lock.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use narrator_core::{
    GenerationBackend, GenerationError, GenerationParams, GenerationRetryPolicy, LocatorCache,
    ParagraphIndex, ResourceLocator,
};

/// Dependencies shared by every job.
#[derive(Clone)]
pub(crate) struct WorkerDeps {
    pub(crate) backend: Arc<dyn GenerationBackend>,
    pub(crate) cache: Arc<dyn LocatorCache>,
    pub(crate) retry: GenerationRetryPolicy,
}

/// One paragraph to generate.
pub(crate) struct GenerationJob {
    pub(crate) index: ParagraphIndex,
    pub(crate) text: String,
    pub(crate) params: GenerationParams,
    pub(crate) cancel: CancellationToken,
}

/// How a job ended.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum JobOutcome {
    /// Audio is available, either freshly generated or from the cache.
    Generated {
        locator: ResourceLocator,
        cached: bool,
    },
    /// Every attempt failed; the paragraph should be skipped.
    Exhausted(GenerationError),
    /// `stop`/`reset` cancelled the job. Nothing is reported.
    Cancelled,
}

/// Generate one paragraph, consulting the cache first and retrying with
/// exponential backoff.
///
/// `on_attempt_failed` is called with the number of failed attempts so far
/// after every failure, including the last.
pub(crate) async fn run_job(
    job: &GenerationJob,
    deps: &WorkerDeps,
    on_attempt_failed: impl Fn(u32),
) -> JobOutcome {
    if let Some(locator) = deps.cache.get(job.index, &job.params).await {
        tracing::debug!(
            target: "narrator.generation",
            index = job.index,
            "Cache hit"
        );
        return JobOutcome::Generated {
            locator,
            cached: true,
        };
    }

    let max_retries = deps.retry.max_retries;
    let mut attempt = 0;

    loop {
        let result = tokio::select! {
            biased;

            () = job.cancel.cancelled() => return JobOutcome::Cancelled,

            result = deps.backend.generate(&job.text, &job.params) => result,
        };

        let error = match result {
            Ok(locator) => {
                deps.cache.put(job.index, &job.params, &locator).await;
                return JobOutcome::Generated {
                    locator,
                    cached: false,
                };
            }
            Err(GenerationError::Cancelled) => return JobOutcome::Cancelled,
            Err(e) => e,
        };

        attempt += 1;
        on_attempt_failed(attempt);

        if attempt > max_retries {
            tracing::warn!(
                target: "narrator.generation",
                index = job.index,
                attempts = attempt,
                error = %error,
                "Giving up on paragraph"
            );
            return JobOutcome::Exhausted(error);
        }

        let delay = deps.retry.delay_for(attempt - 1);
        tracing::debug!(
            target: "narrator.generation",
            index = job.index,
            attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %error,
            "Generation failed, retrying"
        );

        tokio::select! {
            biased;

            () = job.cancel.cancelled() => return JobOutcome::Cancelled,

            () = tokio::time::sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use mockall::mock;
    use narrator_core::NoopLocatorCache;

    use super::*;

    mock! {
        Cache {}

        #[async_trait]
        impl LocatorCache for Cache {
            async fn get(&self, index: ParagraphIndex, params: &GenerationParams) -> Option<ResourceLocator>;
            async fn put(&self, index: ParagraphIndex, params: &GenerationParams, locator: &ResourceLocator);
        }
    }

    /// Fails a fixed number of times, then succeeds.
    struct Flaky {
        failures: AtomicU32,
        calls: AtomicU32,
    }

    impl Flaky {
        fn new(failures: u32) -> Self {
            Self {
                failures: AtomicU32::new(failures),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl GenerationBackend for Flaky {
        async fn generate(
            &self,
            text: &str,
            _params: &GenerationParams,
        ) -> Result<ResourceLocator, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(GenerationError::other("flaky"));
            }
            Ok(ResourceLocator::new(format!("/audio/{text}.wav")))
        }
    }

    fn job(index: ParagraphIndex) -> GenerationJob {
        GenerationJob {
            index,
            text: format!("p{index}"),
            params: GenerationParams::default(),
            cancel: CancellationToken::new(),
        }
    }

    fn deps(backend: Arc<dyn GenerationBackend>, cache: Arc<dyn LocatorCache>) -> WorkerDeps {
        WorkerDeps {
            backend,
            cache,
            retry: GenerationRetryPolicy::default(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let backend = Arc::new(Flaky::new(2));
        let deps = deps(backend.clone(), Arc::new(NoopLocatorCache));
        let failed = Mutex::new(Vec::new());

        let start = tokio::time::Instant::now();
        let outcome = run_job(&job(0), &deps, |n| failed.lock().unwrap().push(n)).await;

        assert_eq!(
            outcome,
            JobOutcome::Generated {
                locator: ResourceLocator::new("/audio/p0.wav"),
                cached: false,
            }
        );
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
        assert_eq!(*failed.lock().unwrap(), vec![1, 2]);
        // 1s after the first failure, 2s after the second
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(3));
        assert!(elapsed < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_three_retries() {
        let backend = Arc::new(Flaky::new(u32::MAX));
        let deps = deps(backend.clone(), Arc::new(NoopLocatorCache));
        let failed = Mutex::new(Vec::new());

        let start = tokio::time::Instant::now();
        let outcome = run_job(&job(1), &deps, |n| failed.lock().unwrap().push(n)).await;

        assert!(matches!(outcome, JobOutcome::Exhausted(_)));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 4);
        assert_eq!(*failed.lock().unwrap(), vec![1, 2, 3, 4]);
        // 1s + 2s + 4s, nothing after the last failure
        assert_eq!(start.elapsed(), Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_backoff() {
        let backend = Arc::new(Flaky::new(u32::MAX));
        let deps = deps(backend.clone(), Arc::new(NoopLocatorCache));
        let job = job(2);
        let cancel = job.cancel.clone();

        let handle = tokio::spawn(async move { run_job(&job, &deps, |_| {}).await });
        tokio::time::sleep(Duration::from_millis(500)).await;
        cancel.cancel();

        assert_eq!(handle.await.unwrap(), JobOutcome::Cancelled);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cache_hit_skips_backend() {
        let backend = Arc::new(Flaky::new(0));
        let mut cache = MockCache::new();
        cache
            .expect_get()
            .returning(|_, _| Some(ResourceLocator::new("/cached.wav")));
        cache.expect_put().never();
        let deps = deps(backend.clone(), Arc::new(cache));

        let outcome = run_job(&job(3), &deps, |_| {}).await;

        assert_eq!(
            outcome,
            JobOutcome::Generated {
                locator: ResourceLocator::new("/cached.wav"),
                cached: true,
            }
        );
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fresh_audio_is_cached() {
        let backend = Arc::new(Flaky::new(0));
        let mut cache = MockCache::new();
        cache.expect_get().returning(|_, _| None);
        cache
            .expect_put()
            .withf(|index, _, locator| *index == 4 && locator.as_str() == "/audio/p4.wav")
            .times(1)
            .returning(|_, _, _| ());
        let deps = deps(backend, Arc::new(cache));

        let outcome = run_job(&job(4), &deps, |_| {}).await;
        assert!(matches!(outcome, JobOutcome::Generated { cached: false, .. }));
    }
}
