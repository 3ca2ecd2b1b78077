use super::{LearningSession, Outcome, SessionStatus, StartRequest};
use crate::config::FormLearnConfig;
use crate::error::LearnError;
use crate::extractor::FieldRegistry;
use chrono::Utc;
use formlearn_common::SessionId;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// The in-progress session together with the element registry that lives exactly
/// as long as it does.
#[derive(Debug)]
pub(crate) struct ActiveSession {
    pub(crate) session: LearningSession,
    pub(crate) registry: FieldRegistry,
}

/// Owner of the single Active-session slot.
///
/// Every mutating call takes `&mut self`, so one engine value admits one mutator at a
/// time; independent engines share nothing. Lifecycle:
/// `start` → Active → `finish` (Finished) | `cancel` (Cancelled).
#[derive(Debug)]
pub struct LearningEngine {
    pub(crate) config: FormLearnConfig,
    pub(crate) active: Option<ActiveSession>,
    outbox: Option<mpsc::UnboundedSender<LearningSession>>,
}

impl Default for LearningEngine {
    fn default() -> Self {
        Self::new(FormLearnConfig::default())
    }
}

/// Resolves the Active session for `session_id`.
pub(crate) fn active_slot<'a>(
    slot: &'a mut Option<ActiveSession>,
    session_id: &SessionId,
) -> Result<&'a mut ActiveSession, LearnError> {
    match slot.as_mut() {
        Some(active) if active.session.id == *session_id => Ok(active),
        _ => Err(LearnError::NotActive {
            session_id: *session_id,
        }),
    }
}

impl LearningEngine {
    pub fn new(config: FormLearnConfig) -> Self {
        Self {
            config,
            active: None,
            outbox: None,
        }
    }

    /// Attaches the transport outbox that receives every finalized session.
    pub fn with_outbox(mut self, outbox: mpsc::UnboundedSender<LearningSession>) -> Self {
        self.outbox = Some(outbox);
        self
    }

    pub fn config(&self) -> &FormLearnConfig {
        &self.config
    }

    pub fn active_session(&self) -> Option<&LearningSession> {
        self.active.as_ref().map(|a| &a.session)
    }

    pub fn active_id(&self) -> Option<SessionId> {
        self.active.as_ref().map(|a| a.session.id)
    }

    pub fn start(
        &mut self,
        source_url: impl Into<String>,
        page_title: impl Into<String>,
    ) -> Result<SessionId, LearnError> {
        self.start_with(StartRequest::new(source_url, page_title))
    }

    /// Opens a new Active session. A second start while one is Active is a conflict,
    /// never a replacement.
    pub fn start_with(&mut self, request: StartRequest) -> Result<SessionId, LearnError> {
        if let Some(active) = &self.active {
            warn!(
                "Refusing to start a session while {} is active",
                active.session.id
            );
            return Err(LearnError::Conflict {
                active: active.session.id,
            });
        }

        let session = LearningSession::open(request, Utc::now());
        let id = session.id;
        info!(
            "Started learning session {} on {}",
            id,
            session.domain().unwrap_or_else(|| session.source_url.clone())
        );
        self.active = Some(ActiveSession {
            session,
            registry: FieldRegistry::new(),
        });
        Ok(id)
    }

    /// Freezes the Active session as Finished and hands a snapshot to the transport.
    pub fn finish(
        &mut self,
        session_id: &SessionId,
        notes: Option<String>,
        successful: bool,
    ) -> Result<LearningSession, LearnError> {
        let mut session = self.take_active(session_id)?;

        session.end_time = Some(Utc::now());
        session.status = SessionStatus::Finished;
        let outcome = if successful {
            Outcome::Successful
        } else {
            Outcome::Abandoned
        };
        session.outcome = Some(outcome);
        session.notes = notes.filter(|n| !n.trim().is_empty());

        info!(
            "Finished session {} ({}): {} fields, {} events, {} submissions",
            session.id,
            outcome.as_str(),
            session.fields.len(),
            session.event_count(),
            session.submissions.len()
        );
        self.emit(&session);
        Ok(session)
    }

    /// Ends the Active session as Cancelled. Value histories and submissions are
    /// discarded; field metadata and the id stay for audit.
    pub fn cancel(&mut self, session_id: &SessionId) -> Result<LearningSession, LearnError> {
        let mut session = self.take_active(session_id)?;

        session.end_time = Some(Utc::now());
        session.status = SessionStatus::Cancelled;
        session.outcome = Some(Outcome::Cancelled);
        for field in &mut session.fields {
            field.events.clear();
        }
        session.submissions.clear();

        info!("Cancelled session {}", session.id);
        self.emit(&session);
        Ok(session)
    }

    fn take_active(&mut self, session_id: &SessionId) -> Result<LearningSession, LearnError> {
        match self.active.take() {
            Some(active) if active.session.id == *session_id => Ok(active.session),
            other => {
                self.active = other;
                Err(LearnError::NotActive {
                    session_id: *session_id,
                })
            }
        }
    }

    /// Transport is best effort: a missing or closed outbox never affects the session.
    fn emit(&self, session: &LearningSession) {
        let Some(outbox) = &self.outbox else {
            debug!("No transport attached, session {} stays local", session.id);
            return;
        };
        if outbox.send(session.clone()).is_err() {
            warn!("Transport closed, session {} was not handed off", session.id);
        }
    }
}
