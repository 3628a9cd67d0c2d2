//! Response types for the relayer API.

use crate::classify::{ErrorKind, RelayOutcome};
use serde::Serialize;

/// Body of every `POST /relay` response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    /// Older clients read this name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_used: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl RelayResponse {
    /// `details` carries raw underlying text and is dropped unless `verbose`.
    pub fn from_outcome(outcome: &RelayOutcome, verbose: bool) -> Self {
        match outcome {
            RelayOutcome::Confirmed {
                tx_hash,
                block_number,
                gas_used,
            } => Self {
                success: true,
                tx_hash: Some(tx_hash.to_string()),
                transaction_hash: Some(tx_hash.to_string()),
                block_number: Some(*block_number),
                gas_used: Some(gas_used.to_string()),
                error: None,
                code: None,
                details: None,
            },
            RelayOutcome::Rejected {
                kind,
                message,
                details,
            } => Self::err(*kind, message.clone(), details.clone().filter(|_| verbose), None),
            RelayOutcome::Failed {
                kind,
                message,
                details,
                tx_hash,
            } => Self::err(
                *kind,
                message.clone(),
                details.clone().filter(|_| verbose),
                tx_hash.map(|h| h.to_string()),
            ),
        }
    }

    fn err(
        kind: ErrorKind,
        message: String,
        details: Option<String>,
        tx_hash: Option<String>,
    ) -> Self {
        Self {
            success: false,
            transaction_hash: tx_hash.clone(),
            tx_hash,
            block_number: None,
            gas_used: None,
            error: Some(message),
            code: Some(kind),
            details,
        }
    }
}

/// Response from the health endpoint.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub relayer: String,
    pub timestamp: u64,
}
