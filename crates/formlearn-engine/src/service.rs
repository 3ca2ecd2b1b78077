//! Channel-fed recorder.
//!
//! The observing layer pushes notifications in page order; a single task owns the
//! [`LearningEngine`] and applies every command in arrival order. The queue is
//! bounded, so a burst of events waits for capacity instead of being dropped.
//! Every command, observations included, replies with its result.

use crate::error::LearnError;
use crate::session::{LearningEngine, LearningSession, StartRequest};
use formlearn_common::{ObserverMessage, SessionId};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Learn(#[from] LearnError),
    #[error("Recorder service has stopped")]
    Closed,
}

enum Command {
    Start {
        request: StartRequest,
        reply: oneshot::Sender<Result<SessionId, LearnError>>,
    },
    Observe {
        message: ObserverMessage,
        reply: oneshot::Sender<Result<(), LearnError>>,
    },
    Finish {
        session_id: SessionId,
        notes: Option<String>,
        successful: bool,
        reply: oneshot::Sender<Result<LearningSession, LearnError>>,
    },
    Cancel {
        session_id: SessionId,
        reply: oneshot::Sender<Result<LearningSession, LearnError>>,
    },
    Snapshot {
        reply: oneshot::Sender<Option<LearningSession>>,
    },
}

/// Cloneable sender side of the recorder service.
#[derive(Clone)]
pub struct RecorderHandle {
    tx: mpsc::Sender<Command>,
}

pub struct RecorderService;

impl RecorderService {
    /// Moves `engine` onto its own task. The task ends when every handle is dropped
    /// and returns the engine.
    pub fn spawn(engine: LearningEngine) -> (RecorderHandle, JoinHandle<LearningEngine>) {
        let capacity = engine.config().learning.recorder_queue.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let task = tokio::spawn(run(engine, rx));
        (RecorderHandle { tx }, task)
    }
}

async fn run(mut engine: LearningEngine, mut rx: mpsc::Receiver<Command>) -> LearningEngine {
    info!("Recorder service started");
    while let Some(command) = rx.recv().await {
        match command {
            Command::Start { request, reply } => {
                let _ = reply.send(engine.start_with(request));
            }
            Command::Observe { message, reply } => {
                let session_id = *message.session_id();
                let result = engine.apply(message);
                if let Err(e) = &result {
                    warn!("Rejected observation for session {}: {}", session_id, e);
                }
                let _ = reply.send(result);
            }
            Command::Finish {
                session_id,
                notes,
                successful,
                reply,
            } => {
                let _ = reply.send(engine.finish(&session_id, notes, successful));
            }
            Command::Cancel { session_id, reply } => {
                let _ = reply.send(engine.cancel(&session_id));
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(engine.active_session().cloned());
            }
        }
    }
    info!("Recorder service stopped");
    engine
}

impl RecorderHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| ServiceError::Closed)?;
        rx.await.map_err(|_| ServiceError::Closed)
    }

    pub async fn start(&self, request: StartRequest) -> Result<SessionId, ServiceError> {
        Ok(self
            .request(|reply| Command::Start { request, reply })
            .await??)
    }

    /// Queues one observer notification and waits until it is applied. Waits while
    /// the queue is full. A stale or unknown session id comes back as
    /// [`ServiceError::Learn`].
    pub async fn observe(&self, message: ObserverMessage) -> Result<(), ServiceError> {
        Ok(self
            .request(|reply| Command::Observe { message, reply })
            .await??)
    }

    pub async fn finish(
        &self,
        session_id: SessionId,
        notes: Option<String>,
        successful: bool,
    ) -> Result<LearningSession, ServiceError> {
        Ok(self
            .request(|reply| Command::Finish {
                session_id,
                notes,
                successful,
                reply,
            })
            .await??)
    }

    pub async fn cancel(&self, session_id: SessionId) -> Result<LearningSession, ServiceError> {
        Ok(self
            .request(|reply| Command::Cancel { session_id, reply })
            .await??)
    }

    /// A copy of the Active session as of every command queued before this call.
    pub async fn active_session(&self) -> Result<Option<LearningSession>, ServiceError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }
}
