//! Event ingestion for the Active session.
//!
//! The recorder only appends: values are opaque and never validated here, quality
//! control belongs to the aggregator. Metadata is first-seen-wins per fingerprint.

use crate::config::{FormLearnConfig, SecurityConfig};
use crate::error::LearnError;
use crate::extractor::{Registration, is_recordable};
use crate::field::{FieldFingerprint, FieldMetadata};
use crate::session::engine::{ActiveSession, active_slot};
use crate::session::{LearningEngine, SubmissionSnapshot, SubmittedValue, ValueEvent};
use chrono::{DateTime, Utc};
use formlearn_common::{FieldContext, FieldValue, ObserverMessage, SessionId, SubmittedField, Trigger};
use tracing::{debug, warn};

impl ActiveSession {
    /// Registers a field sighting. Returns the fingerprint when values for the field
    /// may be recorded.
    pub(crate) fn register(
        &mut self,
        ctx: &FieldContext,
        captured_at: DateTime<Utc>,
        config: &FormLearnConfig,
    ) -> Option<FieldFingerprint> {
        match self.registry.register(ctx, captured_at) {
            Registration::Known(fingerprint) => {
                self.session.field(&fingerprint).is_some().then_some(fingerprint)
            }
            Registration::New {
                fingerprint,
                metadata,
            } => {
                if !is_recordable(ctx, &fingerprint, config) {
                    debug!(
                        "Session {} ignores field {} (not recordable)",
                        self.session.id, fingerprint
                    );
                    return None;
                }
                if self.session.ensure_field(&fingerprint, metadata) {
                    debug!("Session {} registered field {}", self.session.id, fingerprint);
                }
                Some(fingerprint)
            }
        }
    }

    pub(crate) fn append(
        &mut self,
        fingerprint: FieldFingerprint,
        value: FieldValue,
        trigger: Trigger,
        timestamp: DateTime<Utc>,
        security: &SecurityConfig,
    ) {
        debug!(
            "Session {}: {} = {} ({:?})",
            self.session.id,
            fingerprint,
            security.loggable(&value),
            trigger
        );
        match self.session.field_mut(&fingerprint) {
            Some(field) => field.events.push(ValueEvent {
                fingerprint,
                value,
                timestamp,
                trigger,
            }),
            None => warn!(
                "Session {} dropped a value for unregistered field {}",
                self.session.id, fingerprint
            ),
        }
    }
}

impl LearningEngine {
    /// Registers a field sighting without a value (initial scan or DOM mutation).
    /// Re-scans of a known element are no-ops.
    pub fn observe_field(
        &mut self,
        session_id: &SessionId,
        ctx: &FieldContext,
    ) -> Result<Option<FieldFingerprint>, LearnError> {
        let active = active_slot(&mut self.active, session_id)?;
        Ok(active.register(ctx, Utc::now(), &self.config))
    }

    /// Appends a value change for the control described by `ctx`, registering the
    /// control first if this session has not seen it.
    ///
    /// Returns `Ok(None)` when the control is not recordable (hidden, password,
    /// sensitive); the event is dropped in that case.
    pub fn record_event(
        &mut self,
        session_id: &SessionId,
        ctx: &FieldContext,
        value: impl Into<FieldValue>,
        trigger: Trigger,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<FieldFingerprint>, LearnError> {
        let active = active_slot(&mut self.active, session_id)?;
        let Some(fingerprint) = active.register(ctx, timestamp, &self.config) else {
            return Ok(None);
        };
        active.append(
            fingerprint.clone(),
            value.into(),
            trigger,
            timestamp,
            &self.config.security,
        );
        Ok(Some(fingerprint))
    }

    /// Appends a value for an already extracted field. Metadata is stored only if the
    /// fingerprint is new to the session.
    pub fn record(
        &mut self,
        session_id: &SessionId,
        fingerprint: FieldFingerprint,
        metadata: FieldMetadata,
        value: impl Into<FieldValue>,
        trigger: Trigger,
        timestamp: DateTime<Utc>,
    ) -> Result<(), LearnError> {
        let active = active_slot(&mut self.active, session_id)?;
        let security = &self.config.security;
        if security.is_sensitive(&fingerprint.normalized_label)
            || security.is_sensitive(&fingerprint.name_or_id)
        {
            debug!("Session {} ignores sensitive field {}", session_id, fingerprint);
            return Ok(());
        }
        active.session.ensure_field(&fingerprint, metadata);
        active.append(fingerprint, value.into(), trigger, timestamp, security);
        Ok(())
    }

    /// Appends a submission checkpoint. Independent of the event stream.
    pub fn record_submission(
        &mut self,
        session_id: &SessionId,
        mut snapshot: SubmissionSnapshot,
    ) -> Result<(), LearnError> {
        let active = active_slot(&mut self.active, session_id)?;
        let security = &self.config.security;
        snapshot.values.retain(|v| {
            !security.is_sensitive(&v.fingerprint.normalized_label)
                && !security.is_sensitive(&v.fingerprint.name_or_id)
        });

        // Fields only ever seen at submit time still belong to the session.
        let session = &mut active.session;
        for submitted in &snapshot.values {
            if session.field(&submitted.fingerprint).is_some() {
                continue;
            }
            let metadata = FieldMetadata::on_page(
                session.source_url.clone(),
                session.page_title.clone(),
                snapshot.timestamp,
            );
            session.ensure_field(&submitted.fingerprint, metadata);
            debug!(
                "Session {} registered field {} from a submission",
                session_id, submitted.fingerprint
            );
        }

        debug!(
            "Session {} recorded a submission of {} fields",
            session_id,
            snapshot.values.len()
        );
        active.session.submissions.push(snapshot);
        Ok(())
    }

    /// Builds a submission snapshot from raw controls, registering unseen ones.
    pub fn submit_fields(
        &mut self,
        session_id: &SessionId,
        fields: &[SubmittedField],
        timestamp: DateTime<Utc>,
    ) -> Result<(), LearnError> {
        let active = active_slot(&mut self.active, session_id)?;
        let values = fields
            .iter()
            .filter_map(|field| {
                active
                    .register(&field.context, timestamp, &self.config)
                    .map(|fingerprint| SubmittedValue {
                        fingerprint,
                        value: field.value.clone(),
                    })
            })
            .collect();

        self.record_submission(session_id, SubmissionSnapshot { timestamp, values })
    }

    /// Applies one observer notification.
    pub fn apply(&mut self, message: ObserverMessage) -> Result<(), LearnError> {
        match message {
            ObserverMessage::FieldSeen {
                session_id,
                context,
            } => self.observe_field(&session_id, &context).map(|_| ()),
            ObserverMessage::FieldChanged {
                session_id,
                context,
                value,
                trigger,
                timestamp,
            } => self
                .record_event(&session_id, &context, value, trigger, timestamp)
                .map(|_| ()),
            ObserverMessage::FormSubmitted {
                session_id,
                fields,
                timestamp,
            } => self.submit_fields(&session_id, &fields, timestamp),
        }
    }
}
