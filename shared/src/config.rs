use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{validate_key, ValidationError};

pub const DEFAULT_COLLECTION: &str = "cities";

/// How taps and the delete control act on the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Tapping arms a city for delete and opens it for editing.
    #[default]
    SingleSelect,
    /// A toggle arms delete-mode; while armed a tap deletes immediately.
    DeleteMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub collection: String,
    pub policy: SelectionPolicy,
    /// Send renames as one batched commit instead of delete + set.
    pub atomic_rename: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            collection: DEFAULT_COLLECTION.to_string(),
            policy: SelectionPolicy::default(),
            atomic_rename: true,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Parse(String),
    #[error("invalid collection name: {0}")]
    Collection(#[source] ValidationError),
}

impl SyncConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_key(&self.collection).map_err(ConfigError::Collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let config = SyncConfig::from_json("{}").unwrap();
        assert_eq!(config, SyncConfig::default());
        assert_eq!(config.collection, "cities");
        assert!(config.atomic_rename);
    }

    #[test]
    fn reads_policy() {
        let config =
            SyncConfig::from_json(r#"{"policy":"delete_mode","atomic_rename":false}"#).unwrap();
        assert_eq!(config.policy, SelectionPolicy::DeleteMode);
        assert!(!config.atomic_rename);
    }

    #[test]
    fn rejects_bad_collection() {
        let err = SyncConfig::from_json(r#"{"collection":"a/b"}"#).unwrap_err();
        assert_eq!(err, ConfigError::Collection(ValidationError::ContainsSlash));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            SyncConfig::from_json("{policy"),
            Err(ConfigError::Parse(_))
        ));
    }
}
