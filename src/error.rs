//! Error taxonomy for the bridge core
//!
//! The split matters more than the shapes: `BridgeError` covers pre-burn and
//! precondition failures only. Anything that goes wrong after a burn is
//! confirmed is reported as a `PendingManualMint` outcome with the record
//! retained, never as an error that could read as data loss.

use thiserror::Error;

/// Record store failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record store io failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("record store backend failure: {0}")]
    Backend(String),
}

/// Chain adapter failures.
///
/// `NonceAlreadyUsed` is the destination contract's reused-nonce signal and
/// is load-bearing: the orchestrator treats it as confirmation that the
/// transfer already completed, not as an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    #[error("destination reports this transfer was already minted (nonce already used)")]
    NonceAlreadyUsed,

    #[error("active network does not match the requested chain: {0}")]
    NetworkMismatch(String),

    #[error("request was rejected by the signer: {0}")]
    Rejected(String),

    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("transaction reverted: {0}")]
    Reverted(String),

    #[error("timed out waiting for the chain: {0}")]
    Timeout(String),

    #[error("rpc failure: {0}")]
    Rpc(String),
}

/// Classify a raw provider/wallet error string into a typed adapter error.
///
/// Providers and wallets only give us strings at this boundary; classify
/// once here so nothing downstream ever dispatches on message text. Order
/// matters: the reused-nonce signal often arrives wrapped in a revert
/// message, so it is checked before the generic revert match.
pub fn classify_submit_error(raw: &str) -> AdapterError {
    let lower = raw.to_lowercase();

    if lower.contains("nonce already used")
        || lower.contains("already been processed")
        || lower.contains("already received")
        || lower.contains("message already processed")
    {
        return AdapterError::NonceAlreadyUsed;
    }

    if lower.contains("wrong network")
        || lower.contains("chain mismatch")
        || lower.contains("unrecognized chain")
        || lower.contains("network changed")
        || lower.contains("does not match the target chain")
    {
        return AdapterError::NetworkMismatch(raw.to_string());
    }

    if lower.contains("user rejected") || lower.contains("user denied") {
        return AdapterError::Rejected(raw.to_string());
    }

    if lower.contains("insufficient funds") || lower.contains("insufficient balance") {
        return AdapterError::InsufficientFunds(raw.to_string());
    }

    if lower.contains("reverted") {
        return AdapterError::Reverted(raw.to_string());
    }

    if lower.contains("timeout") || lower.contains("timed out") {
        return AdapterError::Timeout(raw.to_string());
    }

    AdapterError::Rpc(raw.to_string())
}

/// Attestation service failures.
///
/// All of these are retryable from the poll loop's point of view; they exist
/// so logs can distinguish "service unreachable" from "service responded
/// with something we cannot use".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttestationError {
    #[error("attestation service unreachable: {0}")]
    Transport(String),

    #[error("attestation service returned status {0}")]
    Status(u16),

    #[error("attestation response malformed: {0}")]
    Malformed(String),

    #[error("invalid attestation endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Top-level orchestrator errors: preconditions and pre-burn failures.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("transfer amount must be greater than zero")]
    InvalidAmount,

    #[error("insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: u128, available: u128 },

    #[error(
        "a transfer for this wallet is already in flight (burn {burn_tx_hash}); \
         resolve or dismiss it before starting a new one"
    )]
    TransferInFlight { burn_tx_hash: String },

    #[error("a claim for burn {burn_tx_hash} is already in progress")]
    ClaimInProgress { burn_tx_hash: String },

    #[error("token approval failed: {0}")]
    ApprovalFailed(AdapterError),

    #[error("burn failed before confirmation, no funds moved: {0}")]
    BurnFailed(AdapterError),

    #[error("transaction hash has an invalid shape: {0}")]
    InvalidTxHash(String),

    #[error("no CCTP burn found for {tx_hash} on any probed domain {probed:?}")]
    NoBurnFound { tx_hash: String, probed: Vec<u32> },

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Attestation(#[from] AttestationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_nonce_already_used() {
        assert_eq!(
            classify_submit_error("execution reverted: Nonce already used"),
            AdapterError::NonceAlreadyUsed
        );
        assert_eq!(
            classify_submit_error("message already processed"),
            AdapterError::NonceAlreadyUsed
        );
    }

    #[test]
    fn test_classify_nonce_beats_generic_revert() {
        // A reused nonce usually surfaces inside a revert message; it must
        // classify as NonceAlreadyUsed, not Reverted.
        let err = classify_submit_error("execution reverted: nonce already used by relayer");
        assert_eq!(err, AdapterError::NonceAlreadyUsed);
    }

    #[test]
    fn test_classify_network_mismatch() {
        assert!(matches!(
            classify_submit_error("Unrecognized chain ID 8453"),
            AdapterError::NetworkMismatch(_)
        ));
    }

    #[test]
    fn test_classify_rejection() {
        assert!(matches!(
            classify_submit_error("User rejected the request."),
            AdapterError::Rejected(_)
        ));
    }

    #[test]
    fn test_classify_revert_and_fallback() {
        assert!(matches!(
            classify_submit_error("execution reverted: paused"),
            AdapterError::Reverted(_)
        ));
        assert!(matches!(
            classify_submit_error("connection refused"),
            AdapterError::Rpc(_)
        ));
    }

    #[test]
    fn test_classify_timeout() {
        assert!(matches!(
            classify_submit_error("request timed out after 30s"),
            AdapterError::Timeout(_)
        ));
    }
}
