//! Field identity extraction.
//!
//! Application forms attach text to their controls in many different ways
//! (`<label for>`, wrapping labels, adjacent text, bare placeholders), and no single
//! rule works across sites. The label is therefore resolved through a fallback chain
//! (in priority order):
//! 1. Explicit label: `<label for="x">` text
//! 2. Associated text: wrapping `<label>`, `aria-label`, adjacent text node
//! 3. Placeholder text
//! 4. `name` / `id` attribute, split into words
//! 5. The literal "Unknown field"

use crate::config::FormLearnConfig;
use crate::field::{Constraints, FieldFingerprint, FieldMetadata, FieldType};
use crate::matching::humanize;
use chrono::{DateTime, Utc};
use formlearn_common::{ElementKey, FieldContext};
use std::collections::HashMap;

pub const UNKNOWN_FIELD_LABEL: &str = "Unknown field";

/// Which rung of the fallback chain produced a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelSource {
    Explicit,
    Associated,
    Placeholder,
    Attribute,
    Fallback,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Resolves the human-facing label of a control.
pub fn resolve_label(ctx: &FieldContext) -> (String, LabelSource) {
    if let Some(label) = non_empty(&ctx.label) {
        return (label.to_string(), LabelSource::Explicit);
    }

    let associated = [&ctx.wrapping_label, &ctx.aria_label, &ctx.adjacent_text];
    if let Some(text) = associated.into_iter().find_map(non_empty) {
        return (text.to_string(), LabelSource::Associated);
    }

    if let Some(placeholder) = non_empty(&ctx.placeholder) {
        return (placeholder.to_string(), LabelSource::Placeholder);
    }

    if let Some(attr) = non_empty(&ctx.name).or_else(|| non_empty(&ctx.id)) {
        let words = humanize(attr);
        if !words.is_empty() {
            return (words, LabelSource::Attribute);
        }
    }

    (UNKNOWN_FIELD_LABEL.to_string(), LabelSource::Fallback)
}

/// Derives the semantic type from tag, `type` attribute, then ARIA role.
pub fn declared_type(ctx: &FieldContext) -> FieldType {
    match ctx.tag.trim().to_ascii_lowercase().as_str() {
        "textarea" => FieldType::Textarea,
        "select" => FieldType::Select,
        "input" => FieldType::from_input_type(ctx.input_type.as_deref().unwrap_or("")),
        _ => match non_empty(&ctx.role) {
            Some(role) => FieldType::from_role(role),
            None => ctx
                .input_type
                .as_deref()
                .map(FieldType::from_input_type)
                .unwrap_or(FieldType::Unknown),
        },
    }
}

fn constraints(ctx: &FieldContext) -> Constraints {
    Constraints {
        max_length: ctx.attribute("maxlength").and_then(|v| v.parse().ok()),
        min: ctx.attribute("min").map(str::to_string),
        max: ctx.attribute("max").map(str::to_string),
        pattern: ctx.attribute("pattern").map(str::to_string),
    }
}

/// Produces a best-effort fingerprint and metadata for a control. Never fails:
/// sparse markup only degrades to weaker label signals.
pub fn extract(ctx: &FieldContext, captured_at: DateTime<Utc>) -> (FieldFingerprint, FieldMetadata) {
    let (label, _source) = resolve_label(ctx);
    let name_or_id = non_empty(&ctx.name)
        .or_else(|| non_empty(&ctx.id))
        .unwrap_or_default();

    let fingerprint = FieldFingerprint::new(&label, declared_type(ctx), name_or_id);
    let metadata = FieldMetadata {
        placeholder: non_empty(&ctx.placeholder).map(str::to_string),
        required: ctx.required,
        options: ctx
            .options
            .iter()
            .map(|o| o.trim())
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect(),
        constraints: constraints(ctx),
        section: non_empty(&ctx.section).map(str::to_string),
        page_url: ctx.page_url.clone(),
        page_title: ctx.page_title.clone(),
        captured_at,
    };

    (fingerprint, metadata)
}

/// Whether values typed into this control may be learned at all.
///
/// Hidden, button-like and password controls and anything whose label or name looks
/// sensitive are fingerprinted but never recorded.
pub fn is_recordable(ctx: &FieldContext, fingerprint: &FieldFingerprint, config: &FormLearnConfig) -> bool {
    if let Some(input_type) = non_empty(&ctx.input_type) {
        if config.extraction.skips(input_type) {
            return false;
        }
    }
    !config.security.is_sensitive(&fingerprint.normalized_label)
        && !config.security.is_sensitive(&fingerprint.name_or_id)
}

#[derive(Debug, Clone)]
pub enum Registration {
    /// First sighting of the element in this session.
    New {
        fingerprint: FieldFingerprint,
        metadata: FieldMetadata,
    },
    /// The element was already registered; nothing was re-extracted.
    Known(FieldFingerprint),
}

impl Registration {
    pub fn fingerprint(&self) -> &FieldFingerprint {
        match self {
            Registration::New { fingerprint, .. } => fingerprint,
            Registration::Known(fingerprint) => fingerprint,
        }
    }
}

/// Session-scoped registry of physical elements already fingerprinted.
///
/// Keyed by the observer's element identity, so repeated DOM re-scans of the same
/// control are free and idempotent. Controls without a key are extracted every time;
/// the session still stores their metadata only once per fingerprint.
#[derive(Debug, Default)]
pub struct FieldRegistry {
    seen: HashMap<ElementKey, FieldFingerprint>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, ctx: &FieldContext, captured_at: DateTime<Utc>) -> Registration {
        if !ctx.key.is_empty() {
            if let Some(fingerprint) = self.seen.get(&ctx.key) {
                return Registration::Known(fingerprint.clone());
            }
        }

        let (fingerprint, metadata) = extract(ctx, captured_at);
        if !ctx.key.is_empty() {
            self.seen.insert(ctx.key.clone(), fingerprint.clone());
        }
        Registration::New {
            fingerprint,
            metadata,
        }
    }

    pub fn fingerprint_of(&self, key: &ElementKey) -> Option<&FieldFingerprint> {
        self.seen.get(key)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn input(key: &str) -> FieldContext {
        FieldContext::new(key, "input").on_page("https://jobs.example.com/apply", "Apply")
    }

    #[test]
    fn test_label_fallback_chain() {
        let mut ctx = input("1").with_name("applicant_email");
        ctx.placeholder = Some("you@example.com".into());
        ctx.adjacent_text = Some("E-mail".into());
        ctx.label = Some("Email *".into());
        assert_eq!(resolve_label(&ctx), ("Email *".into(), LabelSource::Explicit));

        ctx.label = Some("   ".into());
        assert_eq!(resolve_label(&ctx), ("E-mail".into(), LabelSource::Associated));

        ctx.adjacent_text = None;
        assert_eq!(
            resolve_label(&ctx),
            ("you@example.com".into(), LabelSource::Placeholder)
        );

        ctx.placeholder = None;
        assert_eq!(
            resolve_label(&ctx),
            ("applicant email".into(), LabelSource::Attribute)
        );

        ctx.name = None;
        assert_eq!(
            resolve_label(&ctx),
            (UNKNOWN_FIELD_LABEL.into(), LabelSource::Fallback)
        );
    }

    #[test]
    fn test_wrapping_label_beats_aria_label() {
        let mut ctx = input("1");
        ctx.aria_label = Some("phone".into());
        ctx.wrapping_label = Some("Mobile phone".into());
        assert_eq!(resolve_label(&ctx).0, "Mobile phone");
    }

    #[test]
    fn test_declared_type() {
        assert_eq!(declared_type(&input("1")), FieldType::Text);
        assert_eq!(declared_type(&input("1").with_type("tel")), FieldType::Phone);
        assert_eq!(declared_type(&input("1").with_type("color")), FieldType::Unknown);
        assert_eq!(declared_type(&FieldContext::new("2", "TEXTAREA")), FieldType::Textarea);
        assert_eq!(declared_type(&FieldContext::new("3", "select")), FieldType::Select);

        let mut div = FieldContext::new("4", "div");
        assert_eq!(declared_type(&div), FieldType::Unknown);
        div.role = Some("combobox".into());
        assert_eq!(declared_type(&div), FieldType::Select);
    }

    #[test]
    fn test_extract_metadata() {
        let mut ctx = input("1").with_type("text").with_label("Zip code");
        ctx.required = true;
        ctx.section = Some("Address".into());
        ctx.attributes = HashMap::from([
            ("maxlength".to_string(), "10".to_string()),
            ("pattern".to_string(), "[0-9]+".to_string()),
            ("min".to_string(), " ".to_string()),
        ]);
        let now = Utc::now();

        let (fp, meta) = extract(&ctx, now);
        assert_eq!(fp.normalized_label, "zip code");
        assert_eq!(fp.declared_type, FieldType::Text);
        assert!(meta.required);
        assert_eq!(meta.section.as_deref(), Some("Address"));
        assert_eq!(meta.constraints.max_length, Some(10));
        assert_eq!(meta.constraints.pattern.as_deref(), Some("[0-9]+"));
        assert_eq!(meta.constraints.min, None);
        assert_eq!(meta.page_title, "Apply");
        assert_eq!(meta.captured_at, now);
    }

    #[test]
    fn test_registry_is_idempotent_per_element() {
        let mut registry = FieldRegistry::new();
        let ctx = input("el-1").with_label("City");

        assert!(matches!(
            registry.register(&ctx, Utc::now()),
            Registration::New { .. }
        ));
        let again = registry.register(&ctx, Utc::now());
        assert!(matches!(again, Registration::Known(_)));
        assert_eq!(again.fingerprint().normalized_label, "city");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_recordable_controls() {
        let config = FormLearnConfig::default();
        let hidden = input("1").with_type("hidden").with_name("csrf");
        let (fp, _) = extract(&hidden, Utc::now());
        assert!(!is_recordable(&hidden, &fp, &config));

        let card = input("2").with_name("cardNumber");
        let (fp, _) = extract(&card, Utc::now());
        assert!(!is_recordable(&card, &fp, &config));

        let name = input("3").with_label("Full name");
        let (fp, _) = extract(&name, Utc::now());
        assert!(is_recordable(&name, &fp, &config));
    }
}
