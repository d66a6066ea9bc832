/// Generation settings, loadable from RON.
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::core::grammar::ROOT_RULE;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Structural limits for one generated quest tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Constraints {
    /// Minimum flattened task count.
    pub min_length: usize,
    /// Maximum flattened task count, unbounded if `None`.
    pub max_length: Option<usize>,
    pub min_quests: usize,
    pub max_quests: Option<usize>,
    pub max_tries: u32,
    /// Rule expansions nested deeper than this abort the attempt.
    pub max_depth: usize,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            min_length: 1,
            max_length: None,
            min_quests: 1,
            max_quests: None,
            max_tries: 20,
            max_depth: 64,
        }
    }
}

impl Constraints {
    pub fn length(mut self, min: usize, max: usize) -> Self {
        self.min_length = min;
        self.max_length = Some(max);
        self
    }

    pub fn quests(mut self, min: usize, max: usize) -> Self {
        self.min_quests = min;
        self.max_quests = Some(max);
        self
    }

    pub fn max_tries(mut self, tries: u32) -> Self {
        self.max_tries = tries;
        self
    }

    pub fn accepts_length(&self, length: usize) -> bool {
        length >= self.min_length && self.max_length.map_or(true, |max| length <= max)
    }

    pub fn accepts_quests(&self, quests: usize) -> bool {
        quests >= self.min_quests && self.max_quests.map_or(true, |max| quests <= max)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if matches!(self.max_length, Some(max) if max < self.min_length) {
            return Err(ConfigError::Invalid(
                "max_length is below min_length".to_string(),
            ));
        }
        if matches!(self.max_quests, Some(max) if max < self.min_quests) {
            return Err(ConfigError::Invalid(
                "max_quests is below min_quests".to_string(),
            ));
        }
        if self.max_tries == 0 {
            return Err(ConfigError::Invalid("max_tries must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Settings for quest generation in one zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestConfig {
    pub start_rule: String,
    pub constraints: Constraints,
    pub quests_per_zone: usize,
    pub max_tries_per_zone: u32,
}

impl Default for QuestConfig {
    fn default() -> Self {
        Self {
            start_rule: ROOT_RULE.to_string(),
            constraints: Constraints::default(),
            quests_per_zone: 1,
            max_tries_per_zone: 5,
        }
    }
}

impl QuestConfig {
    pub fn load_from_ron(path: &Path) -> Result<QuestConfig, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    pub fn parse_ron(input: &str) -> Result<QuestConfig, ConfigError> {
        let config: QuestConfig = ron::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.start_rule.is_empty() {
            return Err(ConfigError::Invalid("start_rule is empty".to_string()));
        }
        self.constraints.validate()
    }
}
