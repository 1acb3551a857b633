//! Engine configuration
//!
//! Loaded from TOML; every field has a default so an empty file is valid.
//!
//! ```toml
//! velocity_window = 3
//! history_limit = 52
//! effort_policy = "snap"
//! starting_iteration = 1
//! seed_velocity = [23, 18, 31, 15, 28, 22]
//! ```

use crate::error::{BacklogError, BacklogResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How off-scale effort is treated at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffortPolicy {
    /// Reject with `InvalidEffort`
    #[default]
    Strict,
    /// Replace with the nearest scale member
    Snap,
}

/// Backlog engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Iterations averaged when no window is given
    pub velocity_window: usize,
    /// Maximum retained velocity entries
    pub history_limit: usize,
    /// Effort handling at creation
    pub effort_policy: EffortPolicy,
    /// Number of the first iteration planned
    pub starting_iteration: u32,
    /// Delivered totals of iterations that predate this engine, oldest first
    pub seed_velocity: Vec<u32>,
    /// Capacity used when a planning call does not name one
    pub default_capacity: Option<i64>,
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With effort policy
    #[inline]
    #[must_use]
    pub fn with_effort_policy(mut self, policy: EffortPolicy) -> Self {
        self.effort_policy = policy;
        self
    }

    /// With seeded velocity history
    #[inline]
    #[must_use]
    pub fn with_seed_velocity(mut self, history: Vec<u32>) -> Self {
        self.seed_velocity = history;
        self
    }

    /// With default velocity window
    #[inline]
    #[must_use]
    pub fn with_velocity_window(mut self, window: usize) -> Self {
        self.velocity_window = window;
        self
    }

    /// With history limit
    #[inline]
    #[must_use]
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// With first iteration number
    #[inline]
    #[must_use]
    pub fn with_starting_iteration(mut self, iteration: u32) -> Self {
        self.starting_iteration = iteration;
        self
    }

    /// With default planning capacity
    #[inline]
    #[must_use]
    pub fn with_default_capacity(mut self, capacity: i64) -> Self {
        self.default_capacity = Some(capacity);
        self
    }

    /// Parse and validate a TOML document
    ///
    /// # Errors
    /// Returns [`BacklogError::Config`] on malformed TOML or invalid values
    pub fn from_toml_str(source: &str) -> BacklogResult<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML file from disk
    ///
    /// # Errors
    /// Returns [`BacklogError::Io`] if the file cannot be read, otherwise as
    /// [`EngineConfig::from_toml_str`]
    pub fn load(path: impl AsRef<Path>) -> BacklogResult<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Reject settings the engine cannot run with
    ///
    /// # Errors
    /// Returns [`BacklogError::Config`] naming the offending field
    pub fn validate(&self) -> BacklogResult<()> {
        if self.velocity_window == 0 {
            return Err(BacklogError::Config("velocity_window must be at least 1".into()));
        }
        if self.history_limit == 0 {
            return Err(BacklogError::Config("history_limit must be at least 1".into()));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            velocity_window: 3,
            history_limit: 52,
            effort_policy: EffortPolicy::Strict,
            starting_iteration: 1,
            seed_velocity: Vec::new(),
            default_capacity: None,
        }
    }
}
