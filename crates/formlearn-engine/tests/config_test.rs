use formlearn_engine::config::{ConfigLoader, FormLearnConfig};
use formlearn_engine::protocol::FieldValue;
use std::io::Write;
use tempfile::NamedTempFile;

#[tokio::test]
async fn test_load_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
learning:
  label_similarity: 0.75
  max_candidates: 3
security:
  sensitive_fields:
    - "api_key"
storage:
  data_dir: /tmp/formlearn-sessions
"#
    )
    .unwrap();

    let config = ConfigLoader::load_from(file.path())
        .await
        .expect("Failed to load config from file");

    assert_eq!(config.learning.label_similarity, 0.75);
    assert_eq!(config.learning.max_candidates, 3);
    // Serde replaces vectors rather than merging them
    assert_eq!(config.security.sensitive_fields, vec!["api_key".to_string()]);
    assert_eq!(
        config.storage.data_dir,
        std::path::PathBuf::from("/tmp/formlearn-sessions")
    );
}

#[test]
fn test_default_values() {
    let config = FormLearnConfig::default();
    assert_eq!(config.learning.label_similarity, 0.6);
    assert_eq!(config.learning.typo_similarity, 0.85);
    assert_eq!(config.learning.max_candidates, 5);
    assert_eq!(config.learning.recorder_queue, 256);
    assert!(config.security.redact_in_logs);
    assert!(config.storage.data_dir.ends_with(".formlearn/sessions"));
}

#[tokio::test]
async fn test_load_from_nonexistent_file() {
    let result =
        ConfigLoader::load_from(std::path::Path::new("/nonexistent/path/config.yaml")).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_load_from_invalid_yaml() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{{invalid yaml: [unclosed").unwrap();

    let result = ConfigLoader::load_from(file.path()).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_load_from_empty_file() {
    let file = NamedTempFile::new().unwrap();

    let config = ConfigLoader::load_from(file.path())
        .await
        .expect("Empty file should load defaults");
    assert_eq!(config.learning.max_candidates, 5);
}

#[tokio::test]
async fn test_load_from_partial_config() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
extraction:
  skipped_input_types: ["hidden"]
"#
    )
    .unwrap();

    let config = ConfigLoader::load_from(file.path())
        .await
        .expect("Should load partial config");

    assert!(config.extraction.skips("HIDDEN"));
    assert!(!config.extraction.skips("password"));
    // Other sections keep their defaults
    assert_eq!(config.learning.typo_similarity, 0.85);
    assert!(config.security.sensitive_fields.contains(&"cvv".to_string()));
}

#[tokio::test]
async fn test_load_with_type_mismatch() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
learning:
  max_candidates: "not_a_number"
"#
    )
    .unwrap();

    let result = ConfigLoader::load_from(file.path()).await;
    assert!(result.is_err(), "Should fail on type mismatch");
}

#[test]
fn test_skipped_input_types_defaults() {
    let config = FormLearnConfig::default();
    for t in ["hidden", "submit", "button", "password", "file"] {
        assert!(config.extraction.skips(t), "{} should be skipped", t);
    }
    assert!(!config.extraction.skips("email"));
}

#[test]
fn test_sensitive_matching_is_word_wise() {
    let security = FormLearnConfig::default().security;
    assert!(security.is_sensitive("Card number"));
    assert!(security.is_sensitive("cardNumber"));
    assert!(security.is_sensitive("CVV"));
    assert!(security.is_sensitive("api_token"));
    assert!(!security.is_sensitive("classname"));
    assert!(!security.is_sensitive("Full name"));
    assert!(!security.is_sensitive(""));
}

#[test]
fn test_loggable_redacts_text() {
    let mut security = FormLearnConfig::default().security;
    assert_eq!(security.loggable(&FieldValue::from("Ann")), "<3 chars>");
    assert_eq!(security.loggable(&FieldValue::Flag(true)), "true");

    security.redact_in_logs = false;
    assert_eq!(security.loggable(&FieldValue::from("Ann")), "\"Ann\"");
}
