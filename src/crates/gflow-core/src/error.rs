//! Unified error taxonomy for the gflow workflow engine
//!
//! Every core crate (graph, budget, planner, executor, state, reasoner) returns
//! `gflow_core::Result<T>` rather than inventing its own error type.

use thiserror::Error;

/// Result type alias used throughout the gflow workspace
pub type Result<T> = std::result::Result<T, GflowError>;

/// Unified error type for gflow operations
#[derive(Debug, Error)]
pub enum GflowError {
    /// Node/edge/task type is outside its closed enumeration
    #[error("invalid type: {0}")]
    InvalidType(String),

    /// Edge references a node that does not exist
    #[error("missing node: {0}")]
    MissingNode(String),

    /// Plan failed validation (cycle, dangling dependency, budget overflow after clamp)
    #[error("validation failure: {0}")]
    ValidationFailure(String),

    /// Plan remains non-compliant with its role envelope after optimization
    #[error("budget exceeded: {0}")]
    BudgetExceeded(String),

    /// A task tool raised after exhausting its retry policy
    #[error("task execution failed: {0}")]
    TaskExecutionFailure(String),

    /// Synthetic status applied to tasks whose dependency transitively failed
    #[error("dependency blocked: {0}")]
    DependencyBlocked(String),

    /// I/O failure in GraphStore or WorkflowStateStore persistence
    #[error("storage failure: {0}")]
    StorageFailure(String),

    /// Unknown workflow, artifact or checkpoint at a lookup boundary
    #[error("not found: {0}")]
    NotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl GflowError {
    pub fn invalid_type(what: impl Into<String>) -> Self {
        Self::InvalidType(what.into())
    }

    pub fn missing_node(id: impl Into<String>) -> Self {
        Self::MissingNode(id.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationFailure(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }
}

// io::Error and serde_json::Error both naturally represent storage problems once they
// cross a persistence boundary; callers that want the StorageFailure framing wrap
// explicitly rather than relying on the bare From impls above.
impl GflowError {
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::StorageFailure(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages_match_taxonomy_names() {
        assert_eq!(
            GflowError::invalid_type("Kind::Bogus").to_string(),
            "invalid type: Kind::Bogus"
        );
        assert_eq!(
            GflowError::missing_node("node:1").to_string(),
            "missing node: node:1"
        );
        assert_eq!(
            GflowError::not_found("workflow:abc").to_string(),
            "not found: workflow:abc"
        );
    }

    #[test]
    fn test_io_error_converts_via_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing file");
        let err: GflowError = io_err.into();
        assert!(matches!(err, GflowError::Io(_)));
    }
}
