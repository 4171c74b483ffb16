use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::DomainError;

/// A translation / speech target language supported by the pipeline
/// service.
///
/// Deserialized from its string code via `TryFrom<String>`. The impl is
/// written by hand because the `&'static str` fields make serde's
/// `try_from` derive emit `Deserialize<'static>` instead of a generic
/// `'de` impl.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub struct Language {
    code: &'static str,
    name: &'static str,
}

/// Languages the service accepts for `target_lang` / `lang`.
pub const SUPPORTED_LANGUAGES: &[Language] = &[
    Language { code: "en", name: "English" },
    Language { code: "hi", name: "Hindi" },
    Language { code: "te", name: "Telugu" },
    Language { code: "ta", name: "Tamil" },
    Language { code: "fr", name: "French" },
    Language { code: "es", name: "Spanish" },
    Language { code: "de", name: "German" },
    Language { code: "ja", name: "Japanese" },
];

impl Language {
    /// Look up a language by its ISO 639-1 code. Matching is
    /// case-insensitive; the service itself only accepts lowercase.
    pub fn from_code(code: &str) -> Result<Self, DomainError> {
        let needle = code.trim().to_ascii_lowercase();
        SUPPORTED_LANGUAGES
            .iter()
            .find(|l| l.code == needle)
            .copied()
            .ok_or_else(|| DomainError::UnsupportedLanguage(code.to_string()))
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Default for Language {
    fn default() -> Self {
        SUPPORTED_LANGUAGES[0]
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)
    }
}

impl<'de> Deserialize<'de> for Language {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let code = String::deserialize(deserializer)?;
        Language::try_from(code).map_err(serde::de::Error::custom)
    }
}

impl TryFrom<String> for Language {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Language::from_code(&value)
    }
}

impl From<Language> for String {
    fn from(lang: Language) -> Self {
        lang.code.to_string()
    }
}
