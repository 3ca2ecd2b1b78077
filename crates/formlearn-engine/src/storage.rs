use crate::config::StorageConfig;
use crate::session::{LearningSession, Outcome};
use chrono::{DateTime, Utc};
use formlearn_common::SessionId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Listing entry for a stored session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub source_url: String,
    pub domain: Option<String>,
    pub outcome: Option<Outcome>,
    pub tags: Vec<String>,
    pub start_time: DateTime<Utc>,
    pub field_count: usize,
}

impl From<&LearningSession> for SessionSummary {
    fn from(session: &LearningSession) -> Self {
        Self {
            id: session.id,
            company: session.company.clone(),
            job_title: session.job_title.clone(),
            source_url: session.source_url.clone(),
            domain: session.domain(),
            outcome: session.outcome,
            tags: session.tags.clone(),
            start_time: session.start_time,
            field_count: session.fields.len(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub outcome: Option<Outcome>,
    pub tag: Option<String>,
}

impl SessionFilter {
    fn matches(&self, session: &LearningSession) -> bool {
        if let Some(outcome) = self.outcome {
            if session.outcome != Some(outcome) {
                return false;
            }
        }
        if let Some(tag) = &self.tag {
            if !session.tags.iter().any(|t| t == tag) {
                return false;
            }
        }
        true
    }
}

/// File-backed reference transport: one pretty-printed JSON document per session.
#[derive(Debug, Clone)]
pub struct SessionStore {
    base_path: PathBuf,
}

impl SessionStore {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.data_dir.clone())
    }

    pub fn base_path(&self) -> &PathBuf {
        &self.base_path
    }

    fn path_for(&self, id: &SessionId) -> PathBuf {
        self.base_path.join(format!("{}.json", id))
    }

    pub async fn save(&self, session: &LearningSession) -> Result<PathBuf, StoreError> {
        if !self.base_path.exists() {
            fs::create_dir_all(&self.base_path).await?;
        }

        let file_path = self.path_for(&session.id);
        let json = serde_json::to_string_pretty(session)?;
        fs::write(&file_path, json).await?;
        info!("Saved session {} to {}", session.id, file_path.display());

        Ok(file_path)
    }

    pub async fn load(&self, id: &SessionId) -> Result<Option<LearningSession>, StoreError> {
        let file_path = self.path_for(id);
        if !file_path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&file_path).await?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Every readable session, oldest first. Unreadable or malformed files are skipped.
    pub async fn load_all(&self) -> Result<Vec<LearningSession>, StoreError> {
        if !self.base_path.exists() {
            return Ok(Vec::new());
        }

        let mut sessions = Vec::new();
        let mut entries = fs::read_dir(&self.base_path).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = match fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(e) => {
                    warn!("Skipping unreadable session file {}: {}", path.display(), e);
                    continue;
                }
            };
            match serde_json::from_str::<LearningSession>(&content) {
                Ok(session) => sessions.push(session),
                Err(e) => warn!("Skipping malformed session file {}: {}", path.display(), e),
            }
        }

        sessions.sort_by_key(|s| s.start_time);
        Ok(sessions)
    }

    /// Summaries of stored sessions matching `filter`, newest first.
    pub async fn list(&self, filter: &SessionFilter) -> Result<Vec<SessionSummary>, StoreError> {
        let mut summaries: Vec<SessionSummary> = self
            .load_all()
            .await?
            .iter()
            .filter(|s| filter.matches(s))
            .map(SessionSummary::from)
            .collect();
        summaries.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(summaries)
    }

    pub async fn delete(&self, id: &SessionId) -> Result<bool, StoreError> {
        let file_path = self.path_for(id);
        if !file_path.exists() {
            return Ok(false);
        }
        fs::remove_file(file_path).await?;
        Ok(true)
    }

    /// Drains an engine outbox into this store until every sender is dropped.
    /// Write failures are logged; they never reach the engine.
    pub fn spawn_writer(self, mut outbox: mpsc::UnboundedReceiver<LearningSession>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(session) = outbox.recv().await {
                if let Err(e) = self.save(&session).await {
                    warn!("Failed to persist session {}: {}", session.id, e);
                }
            }
            info!("Session writer stopped");
        })
    }
}
