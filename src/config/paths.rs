use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Path configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Directory holding one sub-directory of weights per model variant
    pub models_dir: String,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            models_dir: "/workspace/models".to_string(),
        }
    }
}

impl PathConfig {
    pub fn models_dir(&self) -> PathBuf {
        PathBuf::from(&self.models_dir)
    }

    pub fn model_dir(&self, local_dir: &str) -> PathBuf {
        self.models_dir().join(local_dir)
    }
}
