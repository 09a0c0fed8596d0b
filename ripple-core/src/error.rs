//! Error types for the reactive runtime.

use thiserror::Error;

use crate::graph::NodeId;

/// Boxed error returned by a failing effect body.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the crate.
pub type Result<T, E = ReactiveError> = std::result::Result<T, E>;

/// Errors raised by signal writes, effect runs and runtime setup.
#[derive(Debug, Error)]
pub enum ReactiveError {
    /// The tracking stack was not restored to its depth after an effect
    /// run. This is a bug in the runtime, not in user code.
    #[error("tracking context is stale: expected depth {expected}, found {found}")]
    StaleContext { expected: usize, found: usize },

    /// A write cascade tried to re-run an effect that is already running.
    #[error("effect {effect} was re-triggered while already running (cyclic dependency)")]
    CyclicDependency { effect: NodeId },

    /// Nested effect runs exceeded the configured depth limit.
    #[error("notification cascade exceeded the depth limit of {limit}")]
    CascadeTooDeep { limit: usize },

    /// An effect body returned an error.
    #[error("effect {effect} failed: {source}")]
    EffectFailed {
        effect: NodeId,
        #[source]
        source: BoxError,
    },

    #[error("invalid runtime configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to parse runtime configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

impl ReactiveError {
    /// The effect this error is attributed to, if any.
    pub fn effect(&self) -> Option<NodeId> {
        match self {
            Self::CyclicDependency { effect } | Self::EffectFailed { effect, .. } => Some(*effect),
            _ => None,
        }
    }

    /// Map a failure returned by an effect body into a runtime error.
    ///
    /// Reactive errors raised by writes inside the body pass through
    /// unchanged, so a cycle detected three effects deep still surfaces
    /// as a cycle at the outermost write.
    pub(crate) fn from_body(effect: NodeId, error: BoxError) -> Self {
        match error.downcast::<ReactiveError>() {
            Ok(inner) => *inner,
            Err(source) => Self::EffectFailed { effect, source },
        }
    }
}
