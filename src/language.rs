use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DroidlocError;

/// Locales a resource file can be translated into.
///
/// Each tag carries the ISO-639 based code used when talking to a
/// translation provider and the qualifier Android expects in the
/// `values-<qualifier>` resource directory name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LanguageTag {
    Arabic,
    ChineseSimplified,
    ChineseTraditional,
    Czech,
    Danish,
    Dutch,
    English,
    Finnish,
    French,
    German,
    Greek,
    Hebrew,
    Hindi,
    Hungarian,
    Indonesian,
    Italian,
    Japanese,
    Korean,
    Malay,
    Norwegian,
    Polish,
    Portuguese,
    Romanian,
    Russian,
    Spanish,
    Swedish,
    Thai,
    Turkish,
    Ukrainian,
    Vietnamese,
}

impl LanguageTag {
    pub const ALL: [LanguageTag; 30] = [
        Self::Arabic,
        Self::ChineseSimplified,
        Self::ChineseTraditional,
        Self::Czech,
        Self::Danish,
        Self::Dutch,
        Self::English,
        Self::Finnish,
        Self::French,
        Self::German,
        Self::Greek,
        Self::Hebrew,
        Self::Hindi,
        Self::Hungarian,
        Self::Indonesian,
        Self::Italian,
        Self::Japanese,
        Self::Korean,
        Self::Malay,
        Self::Norwegian,
        Self::Polish,
        Self::Portuguese,
        Self::Romanian,
        Self::Russian,
        Self::Spanish,
        Self::Swedish,
        Self::Thai,
        Self::Turkish,
        Self::Ukrainian,
        Self::Vietnamese,
    ];

    /// Language code sent to translation providers
    pub fn code(&self) -> &'static str {
        match self {
            Self::Arabic => "ar",
            Self::ChineseSimplified => "zh-CN",
            Self::ChineseTraditional => "zh-TW",
            Self::Czech => "cs",
            Self::Danish => "da",
            Self::Dutch => "nl",
            Self::English => "en",
            Self::Finnish => "fi",
            Self::French => "fr",
            Self::German => "de",
            Self::Greek => "el",
            Self::Hebrew => "he",
            Self::Hindi => "hi",
            Self::Hungarian => "hu",
            Self::Indonesian => "id",
            Self::Italian => "it",
            Self::Japanese => "ja",
            Self::Korean => "ko",
            Self::Malay => "ms",
            Self::Norwegian => "nb",
            Self::Polish => "pl",
            Self::Portuguese => "pt",
            Self::Romanian => "ro",
            Self::Russian => "ru",
            Self::Spanish => "es",
            Self::Swedish => "sv",
            Self::Thai => "th",
            Self::Turkish => "tr",
            Self::Ukrainian => "uk",
            Self::Vietnamese => "vi",
        }
    }

    /// Qualifier used in the Android `values-<qualifier>` directory
    pub fn android_qualifier(&self) -> &'static str {
        match self {
            Self::ChineseSimplified => "zh-rCN",
            Self::ChineseTraditional => "zh-rTW",
            // Android still resolves the pre-ISO-639-2 codes
            Self::Hebrew => "iw",
            Self::Indonesian => "in",
            other => other.code(),
        }
    }

    /// Human readable English name
    pub fn english_name(&self) -> &'static str {
        match self {
            Self::Arabic => "Arabic",
            Self::ChineseSimplified => "Chinese (Simplified)",
            Self::ChineseTraditional => "Chinese (Traditional)",
            Self::Czech => "Czech",
            Self::Danish => "Danish",
            Self::Dutch => "Dutch",
            Self::English => "English",
            Self::Finnish => "Finnish",
            Self::French => "French",
            Self::German => "German",
            Self::Greek => "Greek",
            Self::Hebrew => "Hebrew",
            Self::Hindi => "Hindi",
            Self::Hungarian => "Hungarian",
            Self::Indonesian => "Indonesian",
            Self::Italian => "Italian",
            Self::Japanese => "Japanese",
            Self::Korean => "Korean",
            Self::Malay => "Malay",
            Self::Norwegian => "Norwegian",
            Self::Polish => "Polish",
            Self::Portuguese => "Portuguese",
            Self::Romanian => "Romanian",
            Self::Russian => "Russian",
            Self::Spanish => "Spanish",
            Self::Swedish => "Swedish",
            Self::Thai => "Thai",
            Self::Turkish => "Turkish",
            Self::Ukrainian => "Ukrainian",
            Self::Vietnamese => "Vietnamese",
        }
    }

    /// Parse a comma-separated list such as `"es, fr,zh-CN"`
    pub fn parse_list(list: &str) -> Result<Vec<LanguageTag>, DroidlocError> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(LanguageTag::from_str)
            .collect()
    }
}

impl FromStr for LanguageTag {
    type Err = DroidlocError;

    /// Accepts either the language code or the Android qualifier, ignoring case
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|tag| {
                tag.code().eq_ignore_ascii_case(wanted)
                    || tag.android_qualifier().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| DroidlocError::UnsupportedLanguage(wanted.to_string()))
    }
}

impl fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.code())
    }
}

impl TryFrom<String> for LanguageTag {
    type Error = DroidlocError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LanguageTag> for String {
    fn from(tag: LanguageTag) -> Self {
        tag.code().to_string()
    }
}
