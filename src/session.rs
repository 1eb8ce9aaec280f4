//! Boundary between a front-end (CLI, IDE plugin, ...) and the translation core.
//!
//! A front-end loads entries, builds a job from the user's language
//! selection and then either awaits a [`JobHandle`] or registers a
//! [`TranslationListener`] for callbacks.

use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::{Result, DroidlocError};
use crate::job::{JobOutcome, TranslationJob, TranslationResult};
use crate::language::LanguageTag;
use crate::orchestrator::{BatchTranslationOrchestrator, CancellationToken};
use crate::resource::{ResourceEntry, ResourceStore, validate_keys};

/// Callbacks a front-end receives for one job
pub trait TranslationListener: Send + Sync {
    /// Called exactly once for every job that got as far as dispatching languages
    fn on_result(&self, outcome: &JobOutcome);

    /// Called instead of `on_result` when the job fails before any language starts
    fn on_fatal_error(&self, error: &DroidlocError);

    /// Progress hook, called as each language finishes
    fn on_language_done(&self, _result: &TranslationResult) {}
}

/// Load the entries of a resource file
pub async fn load_entries(store: &dyn ResourceStore, source: &Path) -> Result<Vec<ResourceEntry>> {
    store.load(source).await
}

/// Build a job from loaded entries and the selected languages
pub fn request_translation(
    entries: Vec<ResourceEntry>,
    target_languages: Vec<LanguageTag>,
) -> Result<TranslationJob> {
    if target_languages.is_empty() {
        return Err(DroidlocError::InvalidJob("no target languages selected".to_string()));
    }
    validate_keys(&entries).map_err(DroidlocError::InvalidJob)?;

    let job = TranslationJob::new(entries, target_languages);
    if !job.has_translatable_entries() {
        return Err(DroidlocError::NothingToTranslate);
    }
    Ok(job)
}

/// A job running in the background
pub struct JobHandle {
    job_id: Uuid,
    cancel: CancellationToken,
    handle: JoinHandle<Result<JobOutcome>>,
}

impl JobHandle {
    pub fn id(&self) -> Uuid {
        self.job_id
    }

    /// Ask the job to stop starting new languages
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the job to finish
    pub async fn wait(self) -> Result<JobOutcome> {
        self.handle
            .await
            .map_err(|e| DroidlocError::Internal(format!("job {} aborted: {}", self.job_id, e)))?
    }
}

/// Front-end facing entry point wrapping an orchestrator and its store
#[derive(Clone)]
pub struct Session {
    orchestrator: Arc<BatchTranslationOrchestrator>,
    store: Arc<dyn ResourceStore>,
    check_availability: bool,
}

impl Session {
    pub fn new(orchestrator: Arc<BatchTranslationOrchestrator>, store: Arc<dyn ResourceStore>) -> Self {
        Self {
            orchestrator,
            store,
            check_availability: false,
        }
    }

    /// Verify the provider in `translate_file` once the job is known to be valid
    pub fn with_availability_check(mut self, enabled: bool) -> Self {
        self.check_availability = enabled;
        self
    }

    pub fn orchestrator(&self) -> &BatchTranslationOrchestrator {
        &self.orchestrator
    }

    pub async fn load_entries(&self, source: &Path) -> Result<Vec<ResourceEntry>> {
        load_entries(self.store.as_ref(), source).await
    }

    /// Start a job in the background
    pub fn spawn(&self, job: TranslationJob, cancel: CancellationToken) -> JobHandle {
        let job_id = job.id();
        let orchestrator = self.orchestrator.clone();
        let token = cancel.clone();
        let handle = tokio::spawn(async move { orchestrator.run(job, &token).await });

        JobHandle { job_id, cancel, handle }
    }

    /// Run a job, reporting through `listener` instead of the return value
    pub async fn run_with_listener(
        &self,
        job: TranslationJob,
        cancel: &CancellationToken,
        listener: Arc<dyn TranslationListener>,
    ) {
        let progress = listener.clone();
        let outcome = self
            .orchestrator
            .run_observed(
                job,
                cancel,
                Arc::new(move |result: &TranslationResult| progress.on_language_done(result)),
            )
            .await;

        match outcome {
            Ok(outcome) => listener.on_result(&outcome),
            Err(e) => {
                error!("Translation job could not start: {}", e);
                listener.on_fatal_error(&e);
            }
        }
    }

    /// Full front-end flow for one resource file: load, build the job, run it.
    ///
    /// The provider is only contacted once the source file has produced a
    /// valid job.
    pub async fn translate_file(
        &self,
        source: &Path,
        target_languages: Vec<LanguageTag>,
        cancel: &CancellationToken,
        listener: Arc<dyn TranslationListener>,
    ) {
        info!("Translating {} into {} languages", source.display(), target_languages.len());

        match self.prepare(source, target_languages).await {
            Ok(job) => self.run_with_listener(job, cancel, listener).await,
            Err(e) => {
                error!("Cannot translate {}: {}", source.display(), e);
                listener.on_fatal_error(&e);
            }
        }
    }

    async fn prepare(&self, source: &Path, target_languages: Vec<LanguageTag>) -> Result<TranslationJob> {
        let entries = self.load_entries(source).await?;
        let job = request_translation(entries, target_languages)?;
        if self.check_availability {
            self.orchestrator.check_provider().await?;
        }
        Ok(job)
    }
}
