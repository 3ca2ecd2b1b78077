pub mod loader;
pub mod schema;

pub use loader::{ConfigError, ConfigLoader};
pub use schema::{ExtractionConfig, FormLearnConfig, LearningConfig, SecurityConfig, StorageConfig};
