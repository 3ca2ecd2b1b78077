//! Cross-session pattern aggregation.
//!
//! Detailed algorithm:
//! 1. Keep only sessions whose outcome is successful.
//! 2. Cluster field observations across sessions by fuzzy label and compatible type.
//!    The first fingerprint of a cluster is its representative.
//! 3. Each session contributes at most one value per cluster (see
//!    [`LearningSession::final_value`]).
//! 4. Rank distinct values by support; ties keep first-seen order.
//! 5. The top value is canonical only with a strict majority of the cluster's sessions.

use crate::config::{FormLearnConfig, LearningConfig, SecurityConfig};
use crate::error::LearnError;
use crate::field::{FieldFingerprint, FieldType};
use crate::session::{LearningSession, Outcome};
use formlearn_common::FieldValue;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Learned answer pattern for one logical field category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedPattern {
    pub category: String,
    pub field_type: FieldType,
    pub canonical_value: Option<FieldValue>,
    /// Distinct values with their support, most supported first.
    pub candidate_values: Vec<(FieldValue, usize)>,
    pub confidence: f64,
    pub session_count: usize,
}

struct Cluster {
    representative: FieldFingerprint,
    /// One answer per contributing session, in session order.
    answers: Vec<FieldValue>,
    last_session: usize,
}

pub struct Aggregator {
    learning: LearningConfig,
    security: SecurityConfig,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(&FormLearnConfig::default())
    }
}

impl Aggregator {
    pub fn new(config: &FormLearnConfig) -> Self {
        Self {
            learning: config.learning.clone(),
            security: config.security.clone(),
        }
    }

    /// Reduces finished sessions to patterns. Read-only over its input; zero
    /// successful sessions yield an empty result ("nothing trained yet").
    pub fn aggregate(&self, sessions: &[LearningSession]) -> Vec<AggregatedPattern> {
        let successful: Vec<&LearningSession> = sessions
            .iter()
            .filter(|s| s.outcome == Some(Outcome::Successful))
            .collect();

        if successful.is_empty() {
            debug!("No successful sessions among {} to aggregate", sessions.len());
            return Vec::new();
        }

        let clusters = self.cluster(&successful);
        let patterns: Vec<AggregatedPattern> = clusters
            .into_iter()
            .map(|cluster| self.summarize(cluster))
            .collect();

        info!(
            "Aggregated {} successful sessions into {} patterns",
            successful.len(),
            patterns.len()
        );
        patterns
    }

    /// Like [`Aggregator::aggregate`], but reports the empty case as
    /// [`LearnError::NoData`].
    pub fn aggregate_checked(
        &self,
        sessions: &[LearningSession],
    ) -> Result<Vec<AggregatedPattern>, LearnError> {
        if !sessions
            .iter()
            .any(|s| s.outcome == Some(Outcome::Successful))
        {
            return Err(LearnError::NoData);
        }
        Ok(self.aggregate(sessions))
    }

    fn cluster(&self, sessions: &[&LearningSession]) -> Vec<Cluster> {
        let mut clusters: Vec<Cluster> = Vec::new();

        for (session_idx, session) in sessions.iter().enumerate() {
            for field in &session.fields {
                let fingerprint = &field.fingerprint;
                if !fingerprint.is_resolved()
                    || self.security.is_sensitive(&fingerprint.normalized_label)
                {
                    continue;
                }

                let Some(value) = session
                    .final_value(field)
                    .filter(|v| !v.is_blank())
                    .map(FieldValue::trimmed)
                else {
                    continue;
                };

                match clusters
                    .iter_mut()
                    .find(|c| c.representative.same_field(fingerprint, &self.learning))
                {
                    // A second field of the same session in one cluster: first one wins.
                    Some(cluster) if cluster.last_session == session_idx => {}
                    Some(cluster) => {
                        cluster.answers.push(value);
                        cluster.last_session = session_idx;
                    }
                    None => clusters.push(Cluster {
                        representative: fingerprint.clone(),
                        answers: vec![value],
                        last_session: session_idx,
                    }),
                }
            }
        }

        clusters
    }

    fn summarize(&self, cluster: Cluster) -> AggregatedPattern {
        let session_count = cluster.answers.len();

        let mut candidates: Vec<(FieldValue, usize)> = Vec::new();
        for answer in cluster.answers {
            match candidates.iter_mut().find(|(v, _)| *v == answer) {
                Some((_, support)) => *support += 1,
                None => candidates.push((answer, 1)),
            }
        }
        // Stable sort keeps first-seen order among equal support.
        candidates.sort_by(|a, b| b.1.cmp(&a.1));

        let top_support = candidates.first().map(|(_, n)| *n).unwrap_or(0);
        let confidence = if session_count == 0 {
            0.0
        } else {
            top_support as f64 / session_count as f64
        };
        let canonical_value = candidates
            .first()
            .filter(|(_, support)| support * 2 > session_count)
            .map(|(value, _)| value.clone());

        candidates.truncate(self.learning.max_candidates.max(1));

        AggregatedPattern {
            category: cluster.representative.normalized_label,
            field_type: cluster.representative.declared_type,
            canonical_value,
            candidate_values: candidates,
            confidence,
            session_count,
        }
    }
}

/// Convenience wrapper over [`Aggregator::aggregate`] with default settings.
pub fn aggregate(sessions: &[LearningSession]) -> Vec<AggregatedPattern> {
    Aggregator::default().aggregate(sessions)
}
