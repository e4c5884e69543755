//! Classifier rule set.
//!
//! The built-in set is tuned for Indian identity documents (Aadhaar numbers,
//! Hindi transliterations in the keyword families). Other locales supply their
//! own `ClassifierConfig`.

use serde::{Deserialize, Serialize};

/// Structural pattern, searched anywhere in the lower-cased text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternRule {
    /// Rule name reported in matches (e.g. `email`)
    pub name: String,
    /// Regular expression (`regex` crate syntax)
    pub regex: String,
}

/// Family of indicator words, matched as substrings of the lower-cased text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordFamily {
    pub family: String,
    pub words: Vec<String>,
}

/// Immutable classifier configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub patterns: Vec<PatternRule>,
    pub keywords: Vec<KeywordFamily>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            patterns: default_patterns(),
            keywords: default_keywords(),
        }
    }
}

impl ClassifierConfig {
    /// Config with no rules at all. Everything classifies as non-PII.
    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
            keywords: Vec::new(),
        }
    }
}

fn pattern(name: &str, regex: &str) -> PatternRule {
    PatternRule {
        name: name.to_string(),
        regex: regex.to_string(),
    }
}

fn family(family: &str, words: &[&str]) -> KeywordFamily {
    KeywordFamily {
        family: family.to_string(),
        words: words.iter().map(|w| w.to_string()).collect(),
    }
}

fn default_patterns() -> Vec<PatternRule> {
    vec![
        // 1234 5678 9012
        pattern("national_id", r"\d{4}\s\d{4}\s\d{4}"),
        pattern("phone", r"\+?\d{10,12}"),
        pattern("email", r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}"),
        // DD/MM/YYYY, DD.MM.YY, DD-MM-YYYY
        pattern("date", r"\d{2}[/.-]\d{2}[/.-]\d{2,4}"),
    ]
}

fn default_keywords() -> Vec<KeywordFamily> {
    vec![
        family("name", &["name", "naam"]),
        family("address", &["address", "addr", "residence", "pata"]),
        family("date_of_birth", &["birth", "dob", "born", "janm"]),
    ]
}
