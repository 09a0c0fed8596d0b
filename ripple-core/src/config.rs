//! Runtime Configuration
//!
//! Settings that bound the behavior of a [`Runtime`](crate::Runtime).
//! Configuration can be built in code or parsed from JSON; missing fields
//! take their defaults.
//!
//! ```rust
//! use ripple_core::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_json(r#"{ "max_cascade_depth": 16 }"#).unwrap();
//! assert_eq!(config.max_cascade_depth, 16);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{ReactiveError, Result};

/// Default bound on nested effect runs.
pub const DEFAULT_MAX_CASCADE_DEPTH: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Maximum number of effects that may be running at once on the call
    /// stack, counting the effect that started the cascade.
    pub max_cascade_depth: usize,
}

impl RuntimeConfig {
    /// Parse and validate a configuration from JSON.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the cascade depth limit.
    pub fn with_max_cascade_depth(mut self, depth: usize) -> Self {
        self.max_cascade_depth = depth;
        self
    }

    /// Check the configuration for values the runtime cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.max_cascade_depth == 0 {
            return Err(ReactiveError::InvalidConfig(
                "max_cascade_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_cascade_depth: DEFAULT_MAX_CASCADE_DEPTH,
        }
    }
}
