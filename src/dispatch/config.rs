//! Dispatcher configuration

use super::error::{DispatchError, DispatchResult};
use super::queue;
use serde::{Deserialize, Serialize};

/// Default number of tasks a drain runs before yielding to the host
pub const DEFAULT_BATCH_SIZE: usize = 1024;

/// Dispatcher configuration
///
/// Missing fields take their defaults when deserialized, so `{}` is a valid
/// config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Maximum tasks per drain cycle
    pub batch_size: usize,
    /// Initial task queue capacity
    pub initial_capacity: usize,
}

impl DispatchConfig {
    pub fn new() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            initial_capacity: queue::DEFAULT_CAPACITY,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_initial_capacity(mut self, initial_capacity: usize) -> Self {
        self.initial_capacity = initial_capacity;
        self
    }

    /// Check the config can drive a dispatcher
    pub fn validate(&self) -> DispatchResult<()> {
        if self.batch_size == 0 {
            return Err(DispatchError::InvalidConfig(
                "batch_size must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a JSON config
    pub fn from_json(json: &str) -> DispatchResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| DispatchError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self::new()
    }
}
