use std::path::PathBuf;
use uuid::Uuid;

use crate::error::DroidlocError;
use crate::language::LanguageTag;
use crate::resource::ResourceEntry;

/// One translate request: the entries to translate and where to
#[derive(Debug, Clone)]
pub struct TranslationJob {
    id: Uuid,
    source_entries: Vec<ResourceEntry>,
    target_languages: Vec<LanguageTag>,
}

impl TranslationJob {
    /// Repeated target languages are dropped, first occurrence wins
    pub fn new(source_entries: Vec<ResourceEntry>, target_languages: Vec<LanguageTag>) -> Self {
        let mut unique = Vec::with_capacity(target_languages.len());
        for language in target_languages {
            if !unique.contains(&language) {
                unique.push(language);
            }
        }

        Self {
            id: Uuid::new_v4(),
            source_entries,
            target_languages: unique,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn source_entries(&self) -> &[ResourceEntry] {
        &self.source_entries
    }

    pub fn target_languages(&self) -> &[LanguageTag] {
        &self.target_languages
    }

    pub fn has_translatable_entries(&self) -> bool {
        self.source_entries.iter().any(|e| e.translatable)
    }

    pub(crate) fn into_parts(self) -> (Uuid, Vec<ResourceEntry>, Vec<LanguageTag>) {
        (self.id, self.source_entries, self.target_languages)
    }
}

/// Outcome of translating a job into a single language
#[derive(Debug)]
pub struct TranslationResult {
    pub language: LanguageTag,
    /// Resource file the translation is written to
    pub destination: PathBuf,
    /// Translated entries in source order; empty when `error` is set
    pub entries: Vec<ResourceEntry>,
    pub error: Option<DroidlocError>,
    /// Provider calls made for this language
    pub attempts: u32,
}

impl TranslationResult {
    pub fn succeeded(language: LanguageTag, destination: PathBuf, entries: Vec<ResourceEntry>, attempts: u32) -> Self {
        Self { language, destination, entries, error: None, attempts }
    }

    pub fn failed(language: LanguageTag, destination: PathBuf, error: DroidlocError, attempts: u32) -> Self {
        Self { language, destination, entries: Vec::new(), error: Some(error), attempts }
    }

    pub fn cancelled(language: LanguageTag, destination: PathBuf) -> Self {
        Self::failed(language, destination, DroidlocError::Cancelled, 0)
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.error, Some(DroidlocError::Cancelled))
    }
}

/// Per-language results of a job, in the order the languages were requested
#[derive(Debug)]
pub struct JobOutcome {
    pub job_id: Uuid,
    pub results: Vec<TranslationResult>,
}

impl JobOutcome {
    pub fn succeeded(&self) -> impl Iterator<Item = &TranslationResult> {
        self.results.iter().filter(|r| r.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &TranslationResult> {
        self.results.iter().filter(|r| !r.is_success())
    }

    pub fn is_complete_success(&self) -> bool {
        self.results.iter().all(TranslationResult::is_success)
    }

    /// Every requested language failed
    pub fn is_total_failure(&self) -> bool {
        !self.results.is_empty() && self.results.iter().all(|r| !r.is_success())
    }

    pub fn was_cancelled(&self) -> bool {
        self.results.iter().any(TranslationResult::is_cancelled)
    }

    pub fn get(&self, language: LanguageTag) -> Option<&TranslationResult> {
        self.results.iter().find(|r| r.language == language)
    }
}
