use crate::error::ProtocolError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Observers report missing attributes as `null`; those entries are dropped.
fn deserialize_nullable_string_map<'de, D>(
    deserializer: D,
) -> Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let map: HashMap<String, Option<String>> = HashMap::deserialize(deserializer)?;
    Ok(map
        .into_iter()
        .filter_map(|(k, v)| v.map(|val| (k, val)))
        .collect())
}

/// Opaque identifier of one learning session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s.trim())?))
    }
}

/// Identity of a physical DOM element as assigned by the observer
/// (scanner id, xpath, or any handle stable for the page's lifetime).
///
/// This is NOT the cross-session field identity; it only deduplicates
/// re-scans of the same element inside one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementKey(pub String);

impl ElementKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for ElementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything the observer could read about one form control.
///
/// Label-ish fields mirror the ways real markup attaches text to a control:
/// `label` is the `<label for>` text, `wrapping_label` the text of an enclosing
/// `<label>`, `adjacent_text` the nearest preceding text node ("div soup").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldContext {
    pub key: ElementKey,
    /// Lower-case tag name: "input", "textarea", "select", "div", ...
    pub tag: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wrapping_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aria_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjacent_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,

    pub required: bool,
    pub options: Vec<String>,
    /// Enclosing fieldset legend or section heading.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,

    /// Remaining raw attributes (maxlength, min, max, pattern, ...).
    #[serde(deserialize_with = "deserialize_nullable_string_map")]
    pub attributes: HashMap<String, String>,

    pub page_url: String,
    pub page_title: String,
}

impl FieldContext {
    pub fn new(key: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            key: ElementKey::new(key),
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn with_type(mut self, input_type: impl Into<String>) -> Self {
        self.input_type = Some(input_type.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn on_page(mut self, url: impl Into<String>, title: impl Into<String>) -> Self {
        self.page_url = url.into();
        self.page_title = title.into();
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// A value typed or toggled into a control.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    Text(String),
}

impl FieldValue {
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Flag(_) => false,
            FieldValue::Text(s) => s.trim().is_empty(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Flag(_) => None,
        }
    }

    /// Surrounding whitespace is not part of an answer.
    pub fn trimmed(&self) -> FieldValue {
        match self {
            FieldValue::Flag(b) => FieldValue::Flag(*b),
            FieldValue::Text(s) => FieldValue::Text(s.trim().to_string()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Flag(b) => write!(f, "{}", b),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Flag(b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Input,
    Change,
    Blur,
    Submit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmittedField {
    pub context: FieldContext,
    pub value: FieldValue,
}

/// Notifications pushed by the observing layer, in page order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ObserverMessage {
    /// A control appeared (initial scan or DOM mutation).
    FieldSeen {
        session_id: SessionId,
        context: FieldContext,
    },
    FieldChanged {
        session_id: SessionId,
        context: FieldContext,
        value: FieldValue,
        trigger: Trigger,
        timestamp: DateTime<Utc>,
    },
    FormSubmitted {
        session_id: SessionId,
        fields: Vec<SubmittedField>,
        timestamp: DateTime<Utc>,
    },
}

impl ObserverMessage {
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn session_id(&self) -> &SessionId {
        match self {
            ObserverMessage::FieldSeen { session_id, .. }
            | ObserverMessage::FieldChanged { session_id, .. }
            | ObserverMessage::FormSubmitted { session_id, .. } => session_id,
        }
    }
}
