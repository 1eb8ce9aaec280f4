// String resource model and persistence
//
// - ResourceEntry: one `<string>` of a resource file
// - ResourceStore: load/write seam, implemented for Android `strings.xml` in `android`
// - DestinationResolver: maps a target language to the file its translation goes to

pub mod android;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub use android::AndroidXmlStore;
use crate::error::{Result, DroidlocError};
use crate::language::LanguageTag;

/// Name of the resource file Android looks up for string values
pub const STRINGS_FILE_NAME: &str = "strings.xml";

/// A single string resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEntry {
    pub key: String,
    /// Inner XML of the entry as stored on disk, escapes and inline markup included
    pub text: String,
    pub translatable: bool,
    /// Remaining attributes of the element in document order, e.g. `formatted` or `tools:ignore`
    #[serde(default)]
    pub attributes: Vec<(String, String)>,
}

impl ResourceEntry {
    pub fn new(key: impl Into<String>, text: impl Into<String>, translatable: bool) -> Self {
        Self {
            key: key.into(),
            text: text.into(),
            translatable,
            attributes: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Copy of this entry carrying translated text
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self {
            key: self.key.clone(),
            text: text.into(),
            translatable: self.translatable,
            attributes: self.attributes.clone(),
        }
    }
}

/// Check that keys are non-empty and unique within one entry set
pub fn validate_keys(entries: &[ResourceEntry]) -> std::result::Result<(), String> {
    let mut seen = std::collections::HashSet::with_capacity(entries.len());
    for entry in entries {
        if entry.key.trim().is_empty() {
            return Err("resource entry with empty key".to_string());
        }
        if !seen.insert(entry.key.as_str()) {
            return Err(format!("duplicate resource key '{}'", entry.key));
        }
    }
    Ok(())
}

/// Main trait for resource file persistence
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Read every string entry of a resource file in document order
    async fn load(&self, source: &Path) -> Result<Vec<ResourceEntry>>;

    /// Create or merge the resource file for one language
    async fn write(&self, target: &Path, language: LanguageTag, entries: &[ResourceEntry]) -> Result<()>;
}

/// Resolves where the resource file for a language lives
pub trait DestinationResolver: Send + Sync {
    fn destination_for(&self, language: LanguageTag) -> PathBuf;
}

/// Standard Android `res/values-<qualifier>/strings.xml` layout
#[derive(Debug, Clone)]
pub struct AndroidResLayout {
    res_dir: PathBuf,
}

impl AndroidResLayout {
    pub fn new<P: Into<PathBuf>>(res_dir: P) -> Self {
        Self { res_dir: res_dir.into() }
    }

    /// Derive the `res` directory from a `res/values*/strings.xml` source file
    pub fn from_source<P: AsRef<Path>>(source: P) -> Result<Self> {
        let source = source.as_ref();
        let res_dir = source
            .parent()
            .and_then(Path::parent)
            .ok_or_else(|| DroidlocError::Config(format!(
                "Cannot determine res directory for {}", source.display()
            )))?;
        Ok(Self::new(res_dir))
    }

    pub fn res_dir(&self) -> &Path {
        &self.res_dir
    }
}

impl DestinationResolver for AndroidResLayout {
    fn destination_for(&self, language: LanguageTag) -> PathBuf {
        self.res_dir
            .join(format!("values-{}", language.android_qualifier()))
            .join(STRINGS_FILE_NAME)
    }
}

/// Whether `path` is a default-locale `strings.xml` that translations are made from
pub fn is_strings_file<P: AsRef<Path>>(path: P) -> bool {
    let path = path.as_ref();
    if path.file_name().and_then(|n| n.to_str()) != Some(STRINGS_FILE_NAME) {
        return false;
    }
    matches!(
        path.parent().and_then(Path::file_name).and_then(|n| n.to_str()),
        Some("values") | Some("values-en")
    )
}

/// Find every source `strings.xml` below `root`, sorted by path
pub fn find_strings_files<P: AsRef<Path>>(root: P) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_strings_file(e.path()))
        .map(|e| e.path().to_path_buf())
        .collect();
    found.sort();
    found
}
