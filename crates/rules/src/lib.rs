//! PII classification rules.
//!
//! A region of recognized text is PII when any structural pattern (ID number,
//! phone, email, date) or any indicator keyword (name, address, date of birth)
//! matches its lower-cased text. The check is deliberately recall-biased:
//! over-masking is the accepted failure mode.

mod config;

pub use config::{ClassifierConfig, KeywordFamily, PatternRule};

use regex::Regex;
use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, RulesError>;

#[derive(Debug, thiserror::Error)]
pub enum RulesError {
    #[error("invalid pattern `{name}`: {source}")]
    InvalidPattern {
        name: String,
        #[source]
        source: regex::Error,
    },
}

/// Which rule flagged a piece of text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PiiMatch {
    Pattern { name: String },
    Keyword { family: String, keyword: String },
}

impl std::fmt::Display for PiiMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PiiMatch::Pattern { name } => write!(f, "pattern:{}", name),
            PiiMatch::Keyword { family, keyword } => write!(f, "keyword:{}({})", family, keyword),
        }
    }
}

struct CompiledFamily {
    family: String,
    words: Vec<String>,
}

fn compile_families(families: &[KeywordFamily]) -> Vec<CompiledFamily> {
    families
        .iter()
        .map(|f| CompiledFamily {
            family: f.family.clone(),
            words: f
                .words
                .iter()
                .map(|w| w.trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect(),
        })
        .collect()
}

/// Compiled classifier. Cheap to clone; compiled regexes are shared.
#[derive(Clone)]
pub struct Classifier {
    config: ClassifierConfig,
    patterns: std::sync::Arc<Vec<(String, Regex)>>,
    families: std::sync::Arc<Vec<CompiledFamily>>,
}

impl Classifier {
    /// Compile a classifier from `config`.
    ///
    /// Keywords are lower-cased here so matching is case-insensitive;
    /// blank keywords are dropped since they would match every string.
    pub fn new(config: ClassifierConfig) -> Result<Self> {
        let mut patterns = Vec::with_capacity(config.patterns.len());
        for rule in &config.patterns {
            let re = Regex::new(&rule.regex).map_err(|source| RulesError::InvalidPattern {
                name: rule.name.clone(),
                source,
            })?;
            patterns.push((rule.name.clone(), re));
        }

        let families = compile_families(&config.keywords);

        log::debug!(
            "[Rules] classifier ready: {} patterns, {} keyword families",
            patterns.len(),
            config.keywords.len()
        );

        Ok(Self {
            config,
            patterns: std::sync::Arc::new(patterns),
            families: std::sync::Arc::new(families),
        })
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Returns true when `text` contains PII under this rule set.
    pub fn is_pii(&self, text: &str) -> bool {
        self.find_match(text).is_some()
    }

    /// First matching rule: patterns in configured order, then keyword families.
    pub fn find_match(&self, text: &str) -> Option<PiiMatch> {
        if text.trim().is_empty() {
            return None;
        }
        let lowered = text.to_lowercase();

        for (name, re) in self.patterns.iter() {
            if re.is_match(&lowered) {
                return Some(PiiMatch::Pattern { name: name.clone() });
            }
        }

        for family in self.families.iter() {
            if let Some(keyword) = family.words.iter().find(|w| lowered.contains(w.as_str())) {
                return Some(PiiMatch::Keyword {
                    family: family.family.clone(),
                    keyword: keyword.clone(),
                });
            }
        }

        None
    }
}

impl Default for Classifier {
    fn default() -> Self {
        // built-in patterns are checked by test_builtin_patterns_compile
        let config = ClassifierConfig::default();
        let patterns = config
            .patterns
            .iter()
            .filter_map(|rule| Regex::new(&rule.regex).ok().map(|re| (rule.name.clone(), re)))
            .collect();
        let families = compile_families(&config.keywords);
        Self {
            config,
            patterns: std::sync::Arc::new(patterns),
            families: std::sync::Arc::new(families),
        }
    }
}

impl std::fmt::Debug for Classifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classifier")
            .field("patterns", &self.patterns.len())
            .field("keyword_families", &self.families.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> Classifier {
        Classifier::default()
    }

    #[test]
    fn test_builtin_patterns_compile() {
        let built = Classifier::new(ClassifierConfig::default()).unwrap();
        assert_eq!(built.patterns.len(), 4);
        assert_eq!(classifier().patterns.len(), 4);
    }

    #[test]
    fn test_reference_cases() {
        let c = classifier();
        let cases = [
            ("1234 5678 9012", true),
            ("+91 9876543210", true),
            ("user@example.com", true),
            ("01/01/1990", true),
            ("Name: John Doe", true),
            ("Address: 123 Main St", true),
            ("Date of Birth: 01/01/1990", true),
            ("This is a regular text", false),
            ("Hello world", false),
            ("12345", false),
        ];
        for (text, expected) in cases {
            assert_eq!(c.is_pii(text), expected, "text: {:?}", text);
        }
    }

    #[test]
    fn test_email_needs_two_letter_tld() {
        let c = classifier();
        assert!(!c.is_pii("a@b.c"));
        assert!(!c.is_pii("user@localhost"));
        assert!(c.is_pii("a@b.co"));
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        let c = classifier();
        assert!(c.is_pii("NAAM"));
        assert!(c.is_pii("Permanent RESIDENCE"));
        assert!(c.is_pii("xxDoBxx"));
        assert_eq!(
            c.find_match("Place of BIRTH"),
            Some(PiiMatch::Keyword {
                family: "date_of_birth".to_string(),
                keyword: "birth".to_string(),
            })
        );
    }

    #[test]
    fn test_pattern_takes_precedence_in_report() {
        let c = classifier();
        assert_eq!(
            c.find_match("mail: a.b@corp.in"),
            Some(PiiMatch::Pattern {
                name: "email".to_string()
            })
        );
    }

    #[test]
    fn test_date_separators() {
        let c = classifier();
        assert!(c.is_pii("31.12.99"));
        assert!(c.is_pii("31-12-1999"));
        assert!(!c.is_pii("31_12_1999"));
    }

    #[test]
    fn test_short_digit_runs_are_not_pii() {
        let c = classifier();
        assert!(!c.is_pii("123456789"));
        assert!(c.is_pii("1234567890"));
        assert!(!c.is_pii("1234 5678"));
    }

    #[test]
    fn test_total_on_odd_input() {
        let c = classifier();
        assert!(!c.is_pii(""));
        assert!(!c.is_pii("   \t\n"));
        assert!(!c.is_pii("\u{0}\u{7f}\u{fffd}"));
        assert!(!c.is_pii("ẞ ǅ ﬃ 𝔘𝔫𝔦𝔠𝔬𝔡𝔢"));
    }

    #[test]
    fn test_find_match_agrees_with_is_pii() {
        let c = classifier();
        for text in ["", "hello", "dob", "9999 8888 7777", "x@y.zz", "12/12/12"] {
            assert_eq!(c.is_pii(text), c.find_match(text).is_some());
        }
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let config = ClassifierConfig {
            patterns: vec![PatternRule {
                name: "broken".to_string(),
                regex: "(unclosed".to_string(),
            }],
            keywords: Vec::new(),
        };
        match Classifier::new(config) {
            Err(RulesError::InvalidPattern { name, .. }) => assert_eq!(name, "broken"),
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_custom_config_replaces_builtin() {
        let config = ClassifierConfig {
            patterns: Vec::new(),
            keywords: vec![KeywordFamily {
                family: "name".to_string(),
                words: vec!["Nom".to_string(), "  ".to_string()],
            }],
        };
        let c = Classifier::new(config).unwrap();
        assert!(c.is_pii("NOM: Dupont"));
        assert!(!c.is_pii("user@example.com"));
        assert!(!c.is_pii("plain"));
    }

    #[test]
    fn test_empty_config_never_matches() {
        let c = Classifier::new(ClassifierConfig::empty()).unwrap();
        assert!(!c.is_pii("Name: 1234 5678 9012"));
    }

    #[test]
    fn test_config_json_defaults_missing_fields() {
        let config: ClassifierConfig =
            serde_json::from_str(r#"{"keywords":[{"family":"name","words":["naam"]}]}"#).unwrap();
        assert_eq!(config.patterns, ClassifierConfig::default().patterns);
        assert_eq!(config.keywords.len(), 1);
    }
}
