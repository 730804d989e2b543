//! Task processing status and error taxonomy.

use crate::diagnostics::DiagnosticKind;
use thiserror::Error;

/// Result of processing a single change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// Task completed successfully
    Success,
    /// Task failed due to invalid input and was dropped
    InvalidEntry,
    /// Task failed (generic)
    Failed,
    /// Task should be retried later
    NeedRetry,
    /// Task was ignored (hardware-origin echo, etc.)
    Ignore,
    /// Task matched existing state exactly
    Duplicated,
    /// Task is parked until a prerequisite appears
    WaitingForDependency,
}

impl TaskStatus {
    /// Returns true if the task completed successfully.
    pub fn is_success(&self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Ignore | TaskStatus::Duplicated)
    }

    /// Returns true if the task should be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TaskStatus::NeedRetry | TaskStatus::WaitingForDependency)
    }

    /// Returns true if the task failed permanently.
    pub fn is_failure(&self) -> bool {
        matches!(self, TaskStatus::InvalidEntry | TaskStatus::Failed)
    }
}

/// Error type for task processing failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// Missing or unparsable key or field; retrying cannot help.
    #[error("malformed entry: {message}")]
    Malformed { message: String },

    /// Removal refused because a dependent object still references the target.
    #[error("referential violation: {message}")]
    ReferentialViolation { message: String },

    /// A prerequisite object does not exist yet.
    #[error("waiting for {dependency}")]
    UnresolvedPrerequisite { dependency: String },

    /// The switch rejected the operation.
    #[error("SAI error: {message}")]
    Sai { message: String },

    /// Internal bookkeeping error.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl TaskError {
    pub fn malformed(message: impl Into<String>) -> Self {
        TaskError::Malformed {
            message: message.into(),
        }
    }

    pub fn referential(message: impl Into<String>) -> Self {
        TaskError::ReferentialViolation {
            message: message.into(),
        }
    }

    pub fn waiting_for(dependency: impl Into<String>) -> Self {
        TaskError::UnresolvedPrerequisite {
            dependency: dependency.into(),
        }
    }

    pub fn sai(message: impl Into<String>) -> Self {
        TaskError::Sai {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        TaskError::Internal {
            message: message.into(),
        }
    }

    /// Converts this error to a TaskStatus.
    pub fn to_status(&self) -> TaskStatus {
        match self {
            TaskError::Malformed { .. } => TaskStatus::InvalidEntry,
            TaskError::ReferentialViolation { .. } => TaskStatus::NeedRetry,
            TaskError::UnresolvedPrerequisite { .. } => TaskStatus::WaitingForDependency,
            TaskError::Sai { .. } | TaskError::Internal { .. } => TaskStatus::Failed,
        }
    }

    /// Returns true if the entry should stay queued.
    pub fn is_retryable(&self) -> bool {
        self.to_status().is_retryable()
    }

    /// Returns the diagnostic category for this error.
    pub fn diagnostic_kind(&self) -> DiagnosticKind {
        match self {
            TaskError::Malformed { .. } => DiagnosticKind::Malformed,
            TaskError::ReferentialViolation { .. } => DiagnosticKind::ReferentialViolation,
            TaskError::UnresolvedPrerequisite { .. } => DiagnosticKind::UnresolvedPrerequisite,
            TaskError::Sai { .. } | TaskError::Internal { .. } => DiagnosticKind::HardwareFailure,
        }
    }
}

impl From<sonic_types::ParseError> for TaskError {
    fn from(err: sonic_types::ParseError) -> Self {
        TaskError::malformed(err.to_string())
    }
}

/// Result type for task processing.
pub type TaskResult<T> = Result<T, TaskError>;
