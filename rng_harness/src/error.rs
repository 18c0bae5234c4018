use primitive_types::U256;
use std::fmt::{Display, Formatter};
use thiserror::Error;

use crate::sampler::SamplerKind;

/// A single bound that a generated value failed to respect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("The expected RNG event wasn't emitted")]
    EventMissing,

    #[error("The bit count of the generated value was incorrect: expected {expected}, got {actual}")]
    BitsMismatch { expected: u32, actual: u32 },

    #[error("The generated value ({value}) was below the absolute minimum for the expected bit count ({bound})")]
    BelowAbsoluteMinimum { value: U256, bound: U256 },

    #[error("The generated value ({value}) was above the absolute maximum for the expected bit count ({bound})")]
    AboveAbsoluteMaximum { value: U256, bound: U256 },

    #[error("The generated value ({value}) was below the specified range minimum ({bound})")]
    BelowRangeMinimum { value: U256, bound: U256 },

    #[error("The generated value ({value}) was above the specified range maximum ({bound})")]
    AboveRangeMaximum { value: U256, bound: U256 },
}

/// Validation failure of one result inside an epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    pub index: usize,
    pub error: ValidationError,
}

impl Display for ValidationFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "result #{}: {}", self.index, self.error)
    }
}

fn join_failures(failures: &[ValidationFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
pub enum HarnessError {
    // Transport and node side failures, these abort the campaign
    #[error("RPC call '{method}' failed: {message}")]
    Rpc { method: String, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Transaction {tx_hash} was reverted")]
    Reverted { tx_hash: String },

    #[error("Timed out after {waited_secs}s waiting for the receipt of transaction {tx_hash}")]
    ReceiptTimeout { tx_hash: String, waited_secs: u64 },

    #[error("ABI error: {0}")]
    Abi(String),

    // Assertion failures
    #[error("Epoch {epoch} produced {} invalid result(s): {}", .failures.len(), join_failures(.failures))]
    Validation {
        epoch: u32,
        failures: Vec<ValidationFailure>,
    },

    #[error("The result set exceeded the max duplicate quota ({duplicates} > {quota}), insufficient randomness")]
    DuplicateQuotaExceeded { duplicates: u64, quota: u64 },

    // Setup errors
    #[error("No {kind} RNG function registered for a bit width of {bits}")]
    UnsupportedBitWidth { bits: u32, kind: SamplerKind },

    #[error("Batch size must be at least 1")]
    InvalidBatchSize,

    #[error("Batch size {batch_size} exceeds the limit of {max}")]
    BatchSizeTooLarge { batch_size: usize, max: usize },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl HarnessError {
    pub fn rpc<M: Into<String>, E: Display>(method: M, error: E) -> Self {
        Self::Rpc {
            method: method.into(),
            message: error.to_string(),
        }
    }

    /// Whether the error comes from a value assertion rather than the node.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::DuplicateQuotaExceeded { .. }
        )
    }
}

impl From<reqwest::Error> for HarnessError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

impl From<alloy_dyn_abi::Error> for HarnessError {
    fn from(e: alloy_dyn_abi::Error) -> Self {
        Self::Abi(e.to_string())
    }
}

pub type HarnessResult<T> = Result<T, HarnessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_carries_value_and_bound() {
        let err = ValidationError::AboveAbsoluteMaximum {
            value: U256::from(300u64),
            bound: U256::from(255u64),
        };
        let msg = err.to_string();
        assert!(msg.contains("(300)"));
        assert!(msg.contains("(255)"));
        assert!(msg.contains("absolute maximum"));
    }

    #[test]
    fn test_validation_error_lists_every_failure() {
        let err = HarnessError::Validation {
            epoch: 3,
            failures: vec![
                ValidationFailure {
                    index: 0,
                    error: ValidationError::EventMissing,
                },
                ValidationFailure {
                    index: 4,
                    error: ValidationError::BitsMismatch {
                        expected: 8,
                        actual: 16,
                    },
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("Epoch 3 produced 2 invalid result(s)"));
        assert!(msg.contains("result #0"));
        assert!(msg.contains("result #4"));
        assert!(err.is_validation());
    }

    #[test]
    fn test_transport_errors_are_not_validation() {
        assert!(!HarnessError::rpc("evm_mine", "connection refused").is_validation());
        assert!(!HarnessError::InvalidBatchSize.is_validation());
    }
}
