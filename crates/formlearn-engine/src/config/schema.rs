use crate::matching::{humanize, tokens};
use formlearn_common::FieldValue;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormLearnConfig {
    #[serde(default)]
    pub learning: LearningConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningConfig {
    /// Minimum token Jaccard similarity for two labels to name the same field.
    #[serde(default = "default_label_similarity")]
    pub label_similarity: f64,
    /// Minimum normalized Levenshtein similarity used to absorb typos.
    #[serde(default = "default_typo_similarity")]
    pub typo_similarity: f64,
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
    /// Capacity of the recorder service queue.
    #[serde(default = "default_recorder_queue")]
    pub recorder_queue: usize,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            label_similarity: default_label_similarity(),
            typo_similarity: default_typo_similarity(),
            max_candidates: default_max_candidates(),
            recorder_queue: default_recorder_queue(),
        }
    }
}

fn default_label_similarity() -> f64 {
    0.6
}

fn default_typo_similarity() -> f64 {
    0.85
}

fn default_max_candidates() -> usize {
    5
}

fn default_recorder_queue() -> usize {
    256
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Input types that are fingerprinted but never recorded.
    #[serde(default = "default_skipped_input_types")]
    pub skipped_input_types: Vec<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            skipped_input_types: default_skipped_input_types(),
        }
    }
}

impl ExtractionConfig {
    pub fn skips(&self, input_type: &str) -> bool {
        self.skipped_input_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(input_type.trim()))
    }
}

fn default_skipped_input_types() -> Vec<String> {
    ["hidden", "submit", "button", "reset", "image", "password", "file"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".formlearn")
        .join("sessions")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default = "default_sensitive_fields")]
    pub sensitive_fields: Vec<String>,
    #[serde(default = "default_redact_in_logs")]
    pub redact_in_logs: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            sensitive_fields: default_sensitive_fields(),
            redact_in_logs: default_redact_in_logs(),
        }
    }
}

impl SecurityConfig {
    /// Whether a label or attribute names a field whose values must never be learned.
    ///
    /// Entries are compared word-wise, so `card_number` matches "Card number"
    /// and `cardNumber` alike, but `ssn` does not match "classname".
    pub fn is_sensitive(&self, text: &str) -> bool {
        let haystack = tokens(&humanize(text));
        if haystack.is_empty() {
            return false;
        }
        self.sensitive_fields.iter().any(|entry| {
            let needle = tokens(&humanize(entry));
            !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle.as_slice())
        })
    }

    /// Renders a value for log output.
    pub fn loggable(&self, value: &FieldValue) -> String {
        match value {
            FieldValue::Flag(b) => b.to_string(),
            FieldValue::Text(s) if self.redact_in_logs => format!("<{} chars>", s.chars().count()),
            FieldValue::Text(s) => format!("{:?}", s),
        }
    }
}

fn default_sensitive_fields() -> Vec<String> {
    vec![
        "password".to_string(),
        "token".to_string(),
        "card_number".to_string(),
        "cvv".to_string(),
        "ssn".to_string(),
        "secret".to_string(),
    ]
}

fn default_redact_in_logs() -> bool {
    true
}
