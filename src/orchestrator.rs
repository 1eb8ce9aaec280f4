use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{Config, OrchestratorConfig};
use crate::error::{Result, DroidlocError};
use crate::job::{JobOutcome, TranslationJob, TranslationResult};
use crate::language::LanguageTag;
use crate::resource::{DestinationResolver, ResourceEntry, ResourceStore, validate_keys};
use crate::translate::TranslationProvider;

/// Called once per language as soon as its result is known
pub type ProgressFn = Arc<dyn Fn(&TranslationResult) + Send + Sync>;

/// Cooperative cancellation shared between a job and whoever may stop it
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<CancelState>,
}

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once `cancel` has been called
    pub async fn cancelled(&self) {
        loop {
            // Register before checking so a concurrent cancel is not missed
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Bounded retry with exponential backoff for transient provider errors
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, the first call included
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::from(&OrchestratorConfig::default())
    }
}

impl From<&OrchestratorConfig> for RetryPolicy {
    fn from(config: &OrchestratorConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: config.initial_backoff(),
            max_backoff: config.max_backoff(),
        }
    }
}

/// Translates a job into every requested language and writes the results back.
///
/// Languages are independent: each gets its own worker, bounded by
/// `max_concurrency`, and one language failing never affects another.
pub struct BatchTranslationOrchestrator {
    provider: Arc<dyn TranslationProvider>,
    store: Arc<dyn ResourceStore>,
    resolver: Arc<dyn DestinationResolver>,
    source_language: LanguageTag,
    max_concurrency: usize,
    retry: RetryPolicy,
}

impl BatchTranslationOrchestrator {
    pub fn new(
        provider: Arc<dyn TranslationProvider>,
        store: Arc<dyn ResourceStore>,
        resolver: Arc<dyn DestinationResolver>,
        source_language: LanguageTag,
    ) -> Self {
        let defaults = OrchestratorConfig::default();
        Self {
            provider,
            store,
            resolver,
            source_language,
            max_concurrency: defaults.max_concurrency,
            retry: RetryPolicy::from(&defaults),
        }
    }

    pub fn from_config(
        config: &Config,
        provider: Arc<dyn TranslationProvider>,
        store: Arc<dyn ResourceStore>,
        resolver: Arc<dyn DestinationResolver>,
    ) -> Self {
        Self::new(provider, store, resolver, config.translate.source_language)
            .with_max_concurrency(config.orchestrator.max_concurrency)
            .with_retry_policy(RetryPolicy::from(&config.orchestrator))
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn source_language(&self) -> LanguageTag {
        self.source_language
    }

    pub fn destination_for(&self, language: LanguageTag) -> PathBuf {
        self.resolver.destination_for(language)
    }

    /// Ask the provider whether it can serve requests
    pub async fn check_provider(&self) -> Result<()> {
        self.provider.check_availability().await
    }

    /// Run a job to completion.
    ///
    /// Only problems found before any language is dispatched are returned
    /// as `Err`; per-language failures are reported inside the outcome.
    pub async fn run(&self, job: TranslationJob, cancel: &CancellationToken) -> Result<JobOutcome> {
        self.run_observed(job, cancel, Arc::new(|_: &TranslationResult| {})).await
    }

    /// Like `run`, reporting each language's result as soon as it is known
    pub async fn run_observed(
        &self,
        job: TranslationJob,
        cancel: &CancellationToken,
        on_done: ProgressFn,
    ) -> Result<JobOutcome> {
        let (job_id, source_entries, target_languages) = job.into_parts();

        if target_languages.is_empty() {
            return Err(DroidlocError::InvalidJob("no target languages selected".to_string()));
        }
        validate_keys(&source_entries).map_err(DroidlocError::InvalidJob)?;

        let entries: Arc<[ResourceEntry]> = source_entries
            .into_iter()
            .filter(|e| e.translatable)
            .collect();
        if entries.is_empty() {
            warn!("Job {}: no translatable entries", job_id);
            return Err(DroidlocError::NothingToTranslate);
        }
        let texts: Arc<[String]> = entries.iter().map(|e| e.text.clone()).collect();

        let workers = self.max_concurrency.min(target_languages.len());
        let semaphore = Arc::new(Semaphore::new(workers));
        info!(
            "Job {}: translating {} entries from {} into {} languages ({} workers)",
            job_id,
            entries.len(),
            self.source_language,
            target_languages.len(),
            workers
        );

        let mut slots = Vec::with_capacity(target_languages.len());
        for &language in &target_languages {
            let destination = self.resolver.destination_for(language);

            if cancel.is_cancelled() {
                slots.push(self.skip(language, destination, &on_done));
                continue;
            }

            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = semaphore.clone().acquire_owned() => permit.ok(),
            };
            let permit = match permit {
                Some(permit) if !cancel.is_cancelled() => permit,
                _ => {
                    slots.push(self.skip(language, destination, &on_done));
                    continue;
                }
            };

            debug!("Job {}: dispatching {}", job_id, language);
            let worker = LanguageWorker {
                job_id,
                provider: self.provider.clone(),
                store: self.store.clone(),
                entries: entries.clone(),
                texts: texts.clone(),
                source: self.source_language,
                target: language,
                destination,
                retry: self.retry.clone(),
                cancel: cancel.clone(),
            };
            let on_done = on_done.clone();
            let handle = tokio::spawn(async move {
                let _permit = permit;
                let result = worker.run().await;
                on_done(&result);
                result
            });
            slots.push(Slot::Running(language, handle));
        }

        let mut results = Vec::with_capacity(slots.len());
        for slot in slots {
            let result = match slot {
                Slot::Done(result) => result,
                Slot::Running(language, handle) => match handle.await {
                    Ok(result) => result,
                    Err(e) => {
                        error!("Job {}: worker for {} aborted: {}", job_id, language, e);
                        let result = TranslationResult::failed(
                            language,
                            self.resolver.destination_for(language),
                            DroidlocError::Internal(format!("worker for {} aborted: {}", language, e)),
                            0,
                        );
                        on_done(&result);
                        result
                    }
                },
            };
            results.push(result);
        }

        let outcome = JobOutcome { job_id, results };
        info!(
            "Job {}: finished, {} succeeded, {} failed",
            job_id,
            outcome.succeeded().count(),
            outcome.failed().count()
        );
        Ok(outcome)
    }

    fn skip(&self, language: LanguageTag, destination: PathBuf, on_done: &ProgressFn) -> Slot {
        info!("Skipping {}: job cancelled", language);
        let result = TranslationResult::cancelled(language, destination);
        on_done(&result);
        Slot::Done(result)
    }
}

enum Slot {
    Done(TranslationResult),
    Running(LanguageTag, JoinHandle<TranslationResult>),
}

/// Everything one language needs; owned by its task
struct LanguageWorker {
    job_id: Uuid,
    provider: Arc<dyn TranslationProvider>,
    store: Arc<dyn ResourceStore>,
    entries: Arc<[ResourceEntry]>,
    texts: Arc<[String]>,
    source: LanguageTag,
    target: LanguageTag,
    destination: PathBuf,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl LanguageWorker {
    async fn run(self) -> TranslationResult {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.provider.translate_batch(&self.texts, self.source, self.target).await {
                Ok(translated) => return self.finish(translated, attempts).await,
                Err(e) if e.is_retryable() && attempts < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempts);
                    warn!(
                        "Job {}: {} attempt {}/{} failed: {}; retrying in {:?}",
                        self.job_id, self.target, attempts, self.retry.max_attempts, e, delay
                    );
                    let cancelled = tokio::select! {
                        _ = tokio::time::sleep(delay) => false,
                        _ = self.cancel.cancelled() => true,
                    };
                    if cancelled {
                        info!("Job {}: {} cancelled while waiting to retry", self.job_id, self.target);
                        return self.fail(DroidlocError::Cancelled, attempts);
                    }
                }
                Err(e) => {
                    warn!("Job {}: {} failed after {} attempt(s): {}", self.job_id, self.target, attempts, e);
                    return self.fail(e, attempts);
                }
            }
        }
    }

    async fn finish(self, translated: Vec<String>, attempts: u32) -> TranslationResult {
        if translated.len() != self.entries.len() {
            let violation = DroidlocError::ProviderContractViolation {
                expected: self.entries.len(),
                actual: translated.len(),
            };
            warn!("Job {}: {} rejected: {}", self.job_id, self.target, violation);
            return self.fail(violation, attempts);
        }

        let translated: Vec<ResourceEntry> = self.entries
            .iter()
            .zip(translated)
            .map(|(entry, text)| entry.with_text(text))
            .collect();

        match self.store.write(&self.destination, self.target, &translated).await {
            Ok(()) => {
                info!("Job {}: {} done ({} entries)", self.job_id, self.target, translated.len());
                TranslationResult::succeeded(self.target, self.destination, translated, attempts)
            }
            Err(e) => {
                warn!("Job {}: writing {} failed: {}", self.job_id, self.destination.display(), e);
                self.fail(e, attempts)
            }
        }
    }

    fn fail(self, error: DroidlocError, attempts: u32) -> TranslationResult {
        TranslationResult::failed(self.target, self.destination, error, attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::MockTranslationProvider;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    /// Store keeping written files in memory
    #[derive(Default)]
    struct MemoryStore {
        files: Mutex<HashMap<PathBuf, Vec<ResourceEntry>>>,
        broken: Vec<PathBuf>,
    }

    impl MemoryStore {
        fn written(&self, path: &str) -> Option<Vec<ResourceEntry>> {
            self.files.lock().unwrap().get(Path::new(path)).cloned()
        }
    }

    #[async_trait]
    impl ResourceStore for MemoryStore {
        async fn load(&self, source: &Path) -> Result<Vec<ResourceEntry>> {
            self.files
                .lock()
                .unwrap()
                .get(source)
                .cloned()
                .ok_or_else(|| DroidlocError::NotFound(source.display().to_string()))
        }

        async fn write(&self, target: &Path, _language: LanguageTag, entries: &[ResourceEntry]) -> Result<()> {
            if self.broken.iter().any(|p| p == target) {
                return Err(DroidlocError::Io(std::io::Error::other("disk full")));
            }
            self.files.lock().unwrap().insert(target.to_path_buf(), entries.to_vec());
            Ok(())
        }
    }

    struct FlatLayout;

    impl DestinationResolver for FlatLayout {
        fn destination_for(&self, language: LanguageTag) -> PathBuf {
            PathBuf::from(format!("values-{}/strings.xml", language.android_qualifier()))
        }
    }

    fn no_wait() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    fn orchestrator(provider: MockTranslationProvider, store: Arc<MemoryStore>) -> BatchTranslationOrchestrator {
        BatchTranslationOrchestrator::new(Arc::new(provider), store, Arc::new(FlatLayout), LanguageTag::English)
            .with_retry_policy(no_wait())
    }

    fn tag_texts(texts: &[String], target: LanguageTag) -> Vec<String> {
        texts.iter().map(|t| format!("[{}] {}", target, t)).collect()
    }

    fn sample_entries() -> Vec<ResourceEntry> {
        vec![
            ResourceEntry::new("app_name", "MyApp", true),
            ResourceEntry::new("ok", "OK", false),
        ]
    }

    #[tokio::test]
    async fn test_only_translatable_entries_are_sent() {
        let mut provider = MockTranslationProvider::new();
        provider
            .expect_translate_batch()
            .times(2)
            .returning(|texts, source, target| {
                assert_eq!(texts.to_vec(), vec!["MyApp".to_string()]);
                assert_eq!(source, LanguageTag::English);
                Ok(tag_texts(texts, target))
            });
        let store = Arc::new(MemoryStore::default());

        let job = TranslationJob::new(sample_entries(), vec![LanguageTag::Spanish, LanguageTag::French]);
        let outcome = orchestrator(provider, store.clone())
            .run(job, &CancellationToken::new())
            .await
            .unwrap();

        let languages: Vec<_> = outcome.results.iter().map(|r| r.language).collect();
        assert_eq!(languages, vec![LanguageTag::Spanish, LanguageTag::French]);
        assert!(outcome.is_complete_success());
        assert_eq!(
            outcome.results[0].entries,
            vec![ResourceEntry::new("app_name", "[es] MyApp", true)]
        );
        assert_eq!(
            store.written("values-fr/strings.xml").unwrap(),
            vec![ResourceEntry::new("app_name", "[fr] MyApp", true)]
        );
    }

    #[tokio::test]
    async fn test_nothing_to_translate_makes_no_calls() {
        let mut provider = MockTranslationProvider::new();
        provider.expect_translate_batch().times(0);

        let job = TranslationJob::new(
            vec![ResourceEntry::new("ok", "OK", false)],
            vec![LanguageTag::Spanish],
        );
        let err = orchestrator(provider, Arc::new(MemoryStore::default()))
            .run(job, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DroidlocError::NothingToTranslate));
    }

    #[tokio::test]
    async fn test_no_languages_is_invalid() {
        let mut provider = MockTranslationProvider::new();
        provider.expect_translate_batch().times(0);

        let job = TranslationJob::new(sample_entries(), vec![]);
        let err = orchestrator(provider, Arc::new(MemoryStore::default()))
            .run(job, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DroidlocError::InvalidJob(_)));
    }

    #[tokio::test]
    async fn test_duplicate_or_empty_keys_are_rejected_before_dispatch() {
        for entries in [
            vec![ResourceEntry::new("a", "A", true), ResourceEntry::new("a", "B", true)],
            vec![ResourceEntry::new("", "A", true)],
        ] {
            let mut provider = MockTranslationProvider::new();
            provider.expect_translate_batch().times(0);
            let store = Arc::new(MemoryStore::default());

            let job = TranslationJob::new(entries, vec![LanguageTag::Spanish]);
            let err = orchestrator(provider, store.clone())
                .run(job, &CancellationToken::new())
                .await
                .unwrap_err();
            assert!(matches!(err, DroidlocError::InvalidJob(_)));
            assert!(store.written("values-es/strings.xml").is_none());
        }
    }

    #[tokio::test]
    async fn test_rate_limit_then_success_uses_three_calls() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut provider = MockTranslationProvider::new();
        provider
            .expect_translate_batch()
            .times(3)
            .returning(move |texts, _, target| {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(DroidlocError::RateLimit("429".into()))
                } else {
                    Ok(tag_texts(texts, target))
                }
            });

        let job = TranslationJob::new(sample_entries(), vec![LanguageTag::German]);
        let outcome = orchestrator(provider, Arc::new(MemoryStore::default()))
            .run(job, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(outcome.results[0].is_success());
        assert_eq!(outcome.results[0].attempts, 3);
    }

    #[tokio::test]
    async fn test_mixed_outcome_keeps_order() {
        let mut provider = MockTranslationProvider::new();
        provider
            .expect_translate_batch()
            .returning(|texts, _, target| match target {
                LanguageTag::French => Err(DroidlocError::Network("connection reset".into())),
                _ => Ok(tag_texts(texts, target)),
            });

        let job = TranslationJob::new(
            sample_entries(),
            vec![LanguageTag::Spanish, LanguageTag::French, LanguageTag::Japanese],
        );
        let outcome = orchestrator(provider, Arc::new(MemoryStore::default()))
            .run(job, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.results.len(), 3);
        let french = &outcome.results[1];
        assert_eq!(french.language, LanguageTag::French);
        assert!(matches!(french.error, Some(DroidlocError::Network(_))));
        assert!(french.entries.is_empty());
        assert_eq!(french.attempts, 3);
        assert!(outcome.results[0].is_success());
        assert!(outcome.results[2].is_success());
        assert!(!outcome.is_total_failure());
    }

    #[tokio::test]
    async fn test_fatal_errors_are_not_retried() {
        let mut provider = MockTranslationProvider::new();
        provider
            .expect_translate_batch()
            .times(2)
            .returning(|_, _, target| match target {
                LanguageTag::Thai => Err(DroidlocError::UnsupportedLanguage("th".into())),
                _ => Err(DroidlocError::Auth("bad key".into())),
            });

        let job = TranslationJob::new(sample_entries(), vec![LanguageTag::Thai, LanguageTag::Korean]);
        let outcome = orchestrator(provider, Arc::new(MemoryStore::default()))
            .run(job, &CancellationToken::new())
            .await
            .unwrap();

        assert!(outcome.is_total_failure());
        assert!(matches!(outcome.results[0].error, Some(DroidlocError::UnsupportedLanguage(_))));
        assert!(matches!(outcome.results[1].error, Some(DroidlocError::Auth(_))));
        assert!(outcome.results.iter().all(|r| r.attempts == 1));
    }

    #[tokio::test]
    async fn test_count_mismatch_is_contract_violation() {
        let mut provider = MockTranslationProvider::new();
        provider
            .expect_translate_batch()
            .times(1)
            .returning(|_, _, _| Ok(vec!["uno".to_string(), "dos".to_string()]));
        let store = Arc::new(MemoryStore::default());

        let job = TranslationJob::new(sample_entries(), vec![LanguageTag::Spanish]);
        let outcome = orchestrator(provider, store.clone())
            .run(job, &CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(
            outcome.results[0].error,
            Some(DroidlocError::ProviderContractViolation { expected: 1, actual: 2 })
        ));
        assert!(store.written("values-es/strings.xml").is_none());
    }

    #[tokio::test]
    async fn test_write_failure_is_isolated() {
        let mut provider = MockTranslationProvider::new();
        provider
            .expect_translate_batch()
            .times(2)
            .returning(|texts, _, target| Ok(tag_texts(texts, target)));
        let store = Arc::new(MemoryStore {
            broken: vec![PathBuf::from("values-it/strings.xml")],
            ..MemoryStore::default()
        });

        let job = TranslationJob::new(sample_entries(), vec![LanguageTag::Italian, LanguageTag::Dutch]);
        let outcome = orchestrator(provider, store.clone())
            .run(job, &CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(outcome.results[0].error, Some(DroidlocError::Io(_))));
        assert!(outcome.results[1].is_success());
        assert!(store.written("values-nl/strings.xml").is_some());
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let mut provider = MockTranslationProvider::new();
        provider
            .expect_translate_batch()
            .returning(|texts, _, target| Ok(tag_texts(texts, target)));
        let store = Arc::new(MemoryStore::default());
        let orchestrator = orchestrator(provider, store.clone());

        let languages = vec![LanguageTag::Spanish, LanguageTag::Portuguese];
        let first = orchestrator
            .run(TranslationJob::new(sample_entries(), languages.clone()), &CancellationToken::new())
            .await
            .unwrap();
        let second = orchestrator
            .run(TranslationJob::new(sample_entries(), languages), &CancellationToken::new())
            .await
            .unwrap();

        for (a, b) in first.results.iter().zip(&second.results) {
            assert_eq!(a.entries, b.entries);
        }
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let mut provider = MockTranslationProvider::new();
        provider.expect_translate_batch().times(0);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let job = TranslationJob::new(sample_entries(), vec![LanguageTag::Spanish, LanguageTag::French]);
        let outcome = orchestrator(provider, Arc::new(MemoryStore::default()))
            .run(job, &cancel)
            .await
            .unwrap();

        assert!(outcome.results.iter().all(TranslationResult::is_cancelled));
        assert_eq!(outcome.results[1].language, LanguageTag::French);
    }

    /// Cancels the job from inside its first provider call
    struct CancellingProvider {
        cancel: CancellationToken,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TranslationProvider for CancellingProvider {
        async fn translate_batch(&self, texts: &[String], _: LanguageTag, target: LanguageTag) -> Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.cancel.cancel();
            Ok(tag_texts(texts, target))
        }
    }

    #[tokio::test]
    async fn test_cancel_mid_job_skips_unstarted_languages() {
        let cancel = CancellationToken::new();
        let provider = Arc::new(CancellingProvider { cancel: cancel.clone(), calls: AtomicUsize::new(0) });
        let orchestrator = BatchTranslationOrchestrator::new(
            provider.clone(),
            Arc::new(MemoryStore::default()),
            Arc::new(FlatLayout),
            LanguageTag::English,
        )
        .with_max_concurrency(1);

        let job = TranslationJob::new(
            sample_entries(),
            vec![LanguageTag::Spanish, LanguageTag::French, LanguageTag::German],
        );
        let outcome = orchestrator.run(job, &cancel).await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert!(outcome.results[0].is_success());
        assert!(outcome.results[1].is_cancelled());
        assert!(outcome.results[2].is_cancelled());
        assert!(outcome.was_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_interrupts_backoff() {
        let mut provider = MockTranslationProvider::new();
        provider
            .expect_translate_batch()
            .times(1)
            .returning(|_, _, _| Err(DroidlocError::Network("down".into())));
        let orchestrator = orchestrator(provider, Arc::new(MemoryStore::default()))
            .with_retry_policy(RetryPolicy {
                max_attempts: 3,
                initial_backoff: Duration::from_secs(600),
                max_backoff: Duration::from_secs(600),
            });

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let job = TranslationJob::new(sample_entries(), vec![LanguageTag::Swedish]);
        let outcome = tokio::time::timeout(Duration::from_secs(10), orchestrator.run(job, &cancel))
            .await
            .expect("backoff should be interrupted")
            .unwrap();

        assert!(outcome.results[0].is_cancelled());
        assert_eq!(outcome.results[0].attempts, 1);
    }

    /// Tracks how many calls are in flight at once
    #[derive(Default)]
    struct GaugeProvider {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl TranslationProvider for GaugeProvider {
        async fn translate_batch(&self, texts: &[String], _: LanguageTag, target: LanguageTag) -> Result<Vec<String>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(tag_texts(texts, target))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_is_bounded() {
        let provider = Arc::new(GaugeProvider::default());
        let orchestrator = BatchTranslationOrchestrator::new(
            provider.clone(),
            Arc::new(MemoryStore::default()),
            Arc::new(FlatLayout),
            LanguageTag::English,
        )
        .with_max_concurrency(2);

        let languages = vec![
            LanguageTag::Spanish,
            LanguageTag::French,
            LanguageTag::German,
            LanguageTag::Italian,
            LanguageTag::Japanese,
            LanguageTag::Korean,
        ];
        let job = TranslationJob::new(sample_entries(), languages.clone());
        let outcome = orchestrator.run(job, &CancellationToken::new()).await.unwrap();

        assert!(provider.peak.load(Ordering::SeqCst) <= 2);
        assert!(outcome.is_complete_success());
        let order: Vec<_> = outcome.results.iter().map(|r| r.language).collect();
        assert_eq!(order, languages);
    }

    #[tokio::test]
    async fn test_progress_reported_per_language() {
        let mut provider = MockTranslationProvider::new();
        provider
            .expect_translate_batch()
            .returning(|texts, _, target| Ok(tag_texts(texts, target)));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let job = TranslationJob::new(sample_entries(), vec![LanguageTag::Greek, LanguageTag::Czech]);
        orchestrator(provider, Arc::new(MemoryStore::default()))
            .run_observed(
                job,
                &CancellationToken::new(),
                Arc::new(move |r: &TranslationResult| sink.lock().unwrap().push(r.language)),
            )
            .await
            .unwrap();

        let mut seen = seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec![LanguageTag::Czech, LanguageTag::Greek]);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(3),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2), Duration::from_secs(1));
        assert_eq!(policy.delay_for(3), Duration::from_secs(2));
        assert_eq!(policy.delay_for(4), Duration::from_secs(3));
        assert_eq!(policy.delay_for(40), Duration::from_secs(3));
    }
}
