pub mod engine;

pub use engine::LearningEngine;

use crate::field::{FieldFingerprint, FieldMetadata};
use chrono::{DateTime, Utc};
use formlearn_common::{FieldValue, SessionId, Trigger};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Finished,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Successful,
    Abandoned,
    Cancelled,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Successful => "successful",
            Outcome::Abandoned => "abandoned",
            Outcome::Cancelled => "cancelled",
        }
    }
}

/// One observed change of a field's value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueEvent {
    pub fingerprint: FieldFingerprint,
    pub value: FieldValue,
    pub timestamp: DateTime<Utc>,
    pub trigger: Trigger,
}

/// A field as seen by one session: first-seen metadata plus its value history
/// in arrival order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldObservation {
    pub fingerprint: FieldFingerprint,
    pub metadata: FieldMetadata,
    #[serde(default)]
    pub events: Vec<ValueEvent>,
}

impl FieldObservation {
    pub fn latest(&self) -> Option<&ValueEvent> {
        self.events.last()
    }

    /// Latest event recorded at or before `cutoff`.
    pub fn latest_before(&self, cutoff: DateTime<Utc>) -> Option<&ValueEvent> {
        self.events.iter().rev().find(|e| e.timestamp <= cutoff)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmittedValue {
    pub fingerprint: FieldFingerprint,
    pub value: FieldValue,
}

/// Values of the known fields at the moment a form was submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionSnapshot {
    pub timestamp: DateTime<Utc>,
    pub values: Vec<SubmittedValue>,
}

impl SubmissionSnapshot {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            values: Vec::new(),
        }
    }

    pub fn with_value(mut self, fingerprint: FieldFingerprint, value: impl Into<FieldValue>) -> Self {
        self.values.push(SubmittedValue {
            fingerprint,
            value: value.into(),
        });
        self
    }

    pub fn value_for(&self, fingerprint: &FieldFingerprint) -> Option<&FieldValue> {
        self.values
            .iter()
            .rev()
            .find(|v| &v.fingerprint == fingerprint)
            .map(|v| &v.value)
    }
}

/// Parameters for starting a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StartRequest {
    pub source_url: String,
    pub page_title: String,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub tags: Vec<String>,
}

impl StartRequest {
    pub fn new(source_url: impl Into<String>, page_title: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            page_title: page_title.into(),
            ..Default::default()
        }
    }
}

/// The unit of one observed application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningSession {
    pub id: SessionId,
    pub status: SessionStatus,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    pub source_url: String,
    pub page_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub fields: Vec<FieldObservation>,
    #[serde(default)]
    pub submissions: Vec<SubmissionSnapshot>,
    #[serde(default)]
    pub outcome: Option<Outcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl LearningSession {
    pub(crate) fn open(request: StartRequest, start_time: DateTime<Utc>) -> Self {
        Self {
            id: SessionId::new(),
            status: SessionStatus::Active,
            start_time,
            end_time: None,
            source_url: request.source_url,
            page_title: request.page_title,
            company: request.company,
            job_title: request.job_title,
            tags: request.tags,
            fields: Vec::new(),
            submissions: Vec::new(),
            outcome: None,
            notes: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Host of the source page, when the URL parses.
    pub fn domain(&self) -> Option<String> {
        url::Url::parse(&self.source_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
    }

    pub fn field(&self, fingerprint: &FieldFingerprint) -> Option<&FieldObservation> {
        self.fields.iter().find(|f| &f.fingerprint == fingerprint)
    }

    pub fn event_count(&self) -> usize {
        self.fields.iter().map(|f| f.events.len()).sum()
    }

    /// The value this session settled on for a field.
    ///
    /// A submission snapshot is what was actually sent, so the latest snapshot holding
    /// the field wins. Otherwise the latest event at or before the last submission is
    /// used, or the latest event at all when nothing was submitted.
    pub fn final_value<'a>(&'a self, field: &'a FieldObservation) -> Option<&'a FieldValue> {
        if let Some(value) = self
            .submissions
            .iter()
            .rev()
            .find_map(|s| s.value_for(&field.fingerprint))
        {
            return Some(value);
        }

        let event = match self.submissions.last() {
            Some(last) => field.latest_before(last.timestamp).or_else(|| field.latest()),
            None => field.latest(),
        };
        event.map(|e| &e.value)
    }

    pub(crate) fn field_mut(&mut self, fingerprint: &FieldFingerprint) -> Option<&mut FieldObservation> {
        self.fields.iter_mut().find(|f| &f.fingerprint == fingerprint)
    }

    /// Stores metadata for a fingerprint unless one is already known. First seen wins.
    pub(crate) fn ensure_field(&mut self, fingerprint: &FieldFingerprint, metadata: FieldMetadata) -> bool {
        if self.field(fingerprint).is_some() {
            return false;
        }
        self.fields.push(FieldObservation {
            fingerprint: fingerprint.clone(),
            metadata,
            events: Vec::new(),
        });
        true
    }
}
