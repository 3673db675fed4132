//! Error taxonomy for manifest building, applying, and reconciling.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Transient,
    Fatal,
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("orchestrator call failed: {0}")]
    Orchestrator(String),

    #[error("fatal pod condition: {reason} ({remediation})")]
    FatalPod { reason: String, remediation: String },

    #[error("readiness wait timed out")]
    Timeout,
}

impl ReconcileError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReconcileError::Validation(_) => ErrorKind::Validation,
            ReconcileError::Orchestrator(_) | ReconcileError::Timeout => ErrorKind::Transient,
            ReconcileError::FatalPod { .. } => ErrorKind::Fatal,
        }
    }
}
