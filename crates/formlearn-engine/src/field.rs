//! Field identity and descriptive metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of semantic control types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Email,
    Phone,
    Url,
    Textarea,
    Select,
    Checkbox,
    Radio,
    Number,
    Date,
    Unknown,
}

impl FieldType {
    /// Maps an `<input type=...>` value. A missing or empty type is a text input.
    pub fn from_input_type(input_type: &str) -> Self {
        match input_type.trim().to_ascii_lowercase().as_str() {
            "" | "text" | "search" => FieldType::Text,
            "email" => FieldType::Email,
            "tel" => FieldType::Phone,
            "url" => FieldType::Url,
            "number" | "range" => FieldType::Number,
            "date" | "datetime-local" | "month" | "week" | "time" => FieldType::Date,
            "checkbox" => FieldType::Checkbox,
            "radio" => FieldType::Radio,
            "textarea" => FieldType::Textarea,
            "select" | "select-one" | "select-multiple" => FieldType::Select,
            _ => FieldType::Unknown,
        }
    }

    /// Maps an ARIA role, used for controls built from generic elements.
    pub fn from_role(role: &str) -> Self {
        match role.trim().to_ascii_lowercase().as_str() {
            "textbox" | "searchbox" => FieldType::Text,
            "combobox" | "listbox" => FieldType::Select,
            "checkbox" | "switch" => FieldType::Checkbox,
            "radio" | "radiogroup" => FieldType::Radio,
            "spinbutton" => FieldType::Number,
            _ => FieldType::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Email => "email",
            FieldType::Phone => "phone",
            FieldType::Url => "url",
            FieldType::Textarea => "textarea",
            FieldType::Select => "select",
            FieldType::Checkbox => "checkbox",
            FieldType::Radio => "radio",
            FieldType::Number => "number",
            FieldType::Date => "date",
            FieldType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived, comparable identity of a form field, independent of DOM identity.
///
/// Equality is exact and used inside one session. Cross-session identity is the
/// fuzzy [`FieldFingerprint::same_field`] relation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldFingerprint {
    pub normalized_label: String,
    pub declared_type: FieldType,
    #[serde(default)]
    pub name_or_id: String,
}

impl FieldFingerprint {
    pub fn new(label: &str, declared_type: FieldType, name_or_id: impl Into<String>) -> Self {
        Self {
            normalized_label: crate::matching::normalize_label(label),
            declared_type,
            name_or_id: name_or_id.into(),
        }
    }

    /// False when no label signal at all could be found for the field.
    pub fn is_resolved(&self) -> bool {
        self.normalized_label != crate::matching::normalize_label(crate::extractor::UNKNOWN_FIELD_LABEL)
    }
}

impl fmt::Display for FieldFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.normalized_label, self.declared_type)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Constraints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl Constraints {
    pub fn is_empty(&self) -> bool {
        self.max_length.is_none() && self.min.is_none() && self.max.is_none() && self.pattern.is_none()
    }
}

/// Descriptive data captured once per field sighting. Not part of identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Constraints::is_empty")]
    pub constraints: Constraints,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    pub page_url: String,
    pub page_title: String,
    pub captured_at: DateTime<Utc>,
}

impl FieldMetadata {
    /// Metadata for a field known only from where it was seen.
    pub fn on_page(
        page_url: impl Into<String>,
        page_title: impl Into<String>,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self {
            placeholder: None,
            required: false,
            options: Vec::new(),
            constraints: Constraints::default(),
            section: None,
            page_url: page_url.into(),
            page_title: page_title.into(),
            captured_at,
        }
    }
}
