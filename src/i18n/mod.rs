// ABOUTME: Localization collaborator for user-visible session strings
// Holds the reactive current language and substitutes `$name$` placeholders in templates

mod lang;

pub use lang::{Strings, DE, EN};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::watch;

/// UI language, used to tag outbound chat messages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    De,
}

impl Language {
    pub fn tag(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::De => "de",
        }
    }

    pub fn strings(self) -> &'static Strings {
        match self {
            Language::En => &EN,
            Language::De => &DE,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Language::En),
            "de" => Ok(Language::De),
            other => Err(format!("unsupported language: {other}")),
        }
    }
}

/// Replace every `$name$` placeholder in `template` with its value from `vars`.
/// Placeholders without a matching var are left untouched.
pub fn translate(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = template.to_string();
    for (name, value) in vars {
        result = result.replace(&format!("${name}$"), value);
    }
    result
}

/// Reactive "current language" value shared between the session and the UI
#[derive(Debug, Clone)]
pub struct Localizer {
    language: Arc<watch::Sender<Language>>,
}

impl Localizer {
    pub fn new(language: Language) -> Self {
        let (language, _) = watch::channel(language);
        Self {
            language: Arc::new(language),
        }
    }

    pub fn language(&self) -> Language {
        *self.language.borrow()
    }

    pub fn set_language(&self, language: Language) {
        self.language.send_replace(language);
    }

    pub fn subscribe(&self) -> watch::Receiver<Language> {
        self.language.subscribe()
    }

    /// String table for the current language
    pub fn strings(&self) -> &'static Strings {
        self.language().strings()
    }
}

impl Default for Localizer {
    fn default() -> Self {
        Self::new(Language::default())
    }
}
