pub mod aggregator;
pub mod config;
pub mod error;
pub mod extractor;
pub mod field;
pub mod matching;
mod recorder;
pub mod service;
pub mod session;
pub mod storage;

pub use aggregator::{AggregatedPattern, Aggregator, aggregate};
pub use error::LearnError;
pub use field::{FieldFingerprint, FieldMetadata, FieldType};
pub use formlearn_common::protocol;
pub use service::{RecorderHandle, RecorderService, ServiceError};
pub use session::{LearningEngine, LearningSession, Outcome, SessionStatus, StartRequest};
pub use storage::{SessionFilter, SessionStore, SessionSummary, StoreError};
