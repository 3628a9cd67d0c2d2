//! Stable error vocabulary and the mapping from internal failures onto it.
//!
//! Clients only ever see [`ErrorKind::message`]. Raw RPC or node text is kept
//! in `details` and shown only when verbose errors are enabled.

use alloy::primitives::TxHash;
use axum::http::StatusCode;
use serde::Serialize;

/// User-facing error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    MalformedRequest,
    RateLimited,
    DuplicateRequest,
    InvalidTarget,
    InvalidCaller,
    HashMismatch,
    Expired,
    AlreadyCompleted,
    FeeTooHigh,
    SubmissionFailed,
    Reverted,
    ConfirmationTimeout,
    ExecutionFailed,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::MalformedRequest
            | ErrorKind::DuplicateRequest
            | ErrorKind::InvalidTarget
            | ErrorKind::InvalidCaller
            | ErrorKind::HashMismatch
            | ErrorKind::Expired
            | ErrorKind::AlreadyCompleted => StatusCode::BAD_REQUEST,
            ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::FeeTooHigh => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::SubmissionFailed
            | ErrorKind::Reverted
            | ErrorKind::ConfirmationTimeout
            | ErrorKind::ExecutionFailed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            ErrorKind::MalformedRequest => "Invalid request body",
            ErrorKind::RateLimited => "Too many requests. Please try again later.",
            ErrorKind::DuplicateRequest => "This request has already been processed",
            ErrorKind::InvalidTarget => "Invalid target contract",
            ErrorKind::InvalidCaller => "Invalid caller address",
            ErrorKind::HashMismatch => "DataHash mismatch - signature invalid",
            ErrorKind::Expired => "Transaction deadline expired",
            ErrorKind::AlreadyCompleted => "This address has already completed this action",
            ErrorKind::FeeTooHigh => "Network gas prices too high. Please try again later.",
            ErrorKind::SubmissionFailed => "Transaction submission failed",
            ErrorKind::Reverted => "Transaction reverted by contract",
            ErrorKind::ConfirmationTimeout => "Timed out waiting for transaction confirmation",
            ErrorKind::ExecutionFailed => "Transaction failed",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// Tagged failure from the executor or receipt waiter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionFailure {
    #[error("failed to sign transaction: {0}")]
    Sign(String),
    #[error("failed to send transaction: {0}")]
    Submit(String),
    #[error("transaction {0} reverted")]
    Reverted(TxHash),
    #[error("timeout waiting for receipt of {0}")]
    Timeout(TxHash),
    #[error("rpc failure before submission: {0}")]
    Rpc(String),
}

impl ExecutionFailure {
    /// Hash of the submitted transaction, when one exists.
    pub fn tx_hash(&self) -> Option<TxHash> {
        match self {
            ExecutionFailure::Reverted(h) | ExecutionFailure::Timeout(h) => Some(*h),
            _ => None,
        }
    }
}

/// Map an execution-stage failure to its user-facing kind.
pub fn classify(failure: &ExecutionFailure) -> ErrorKind {
    match failure {
        ExecutionFailure::Submit(_) => ErrorKind::SubmissionFailed,
        ExecutionFailure::Reverted(_) => ErrorKind::Reverted,
        ExecutionFailure::Timeout(_) => ErrorKind::ConfirmationTimeout,
        ExecutionFailure::Sign(_) | ExecutionFailure::Rpc(_) => {
            ErrorKind::ExecutionFailed
        }
    }
}

/// Terminal result of one relay attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    Confirmed {
        tx_hash: TxHash,
        block_number: u64,
        gas_used: u64,
    },
    /// Refused before any funds were spent.
    Rejected {
        kind: ErrorKind,
        message: String,
        details: Option<String>,
    },
    /// Admitted, then failed during execution or confirmation.
    Failed {
        kind: ErrorKind,
        message: String,
        details: Option<String>,
        tx_hash: Option<TxHash>,
    },
}

impl RelayOutcome {
    pub fn rejected(kind: ErrorKind) -> Self {
        RelayOutcome::Rejected {
            kind,
            message: kind.message().to_string(),
            details: None,
        }
    }

    pub fn rejected_with(kind: ErrorKind, details: impl Into<String>) -> Self {
        RelayOutcome::Rejected {
            kind,
            message: kind.message().to_string(),
            details: Some(details.into()),
        }
    }

    pub fn failed(failure: &ExecutionFailure) -> Self {
        let kind = classify(failure);
        RelayOutcome::Failed {
            kind,
            message: kind.message().to_string(),
            details: Some(failure.to_string()),
            tx_hash: failure.tx_hash(),
        }
    }

    /// `None` for confirmed outcomes.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            RelayOutcome::Confirmed { .. } => None,
            RelayOutcome::Rejected { kind, .. } | RelayOutcome::Failed { kind, .. } => Some(*kind),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.kind().map_or(StatusCode::OK, ErrorKind::status)
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, RelayOutcome::Confirmed { .. })
    }
}
