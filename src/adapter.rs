//! Chain adapter seam
//!
//! One adapter per chain; the orchestrator is parameterized over a
//! source/destination pair and never sees family-specific transaction
//! shapes. Those quirks live behind `TxRequest`: each family interprets the
//! same request with its own calls (an EVM adapter turns `Approve` into an
//! ERC-20 allowance transaction; a Solana adapter turns it into a no-op or a
//! token-program delegate).

use async_trait::async_trait;

use crate::error::AdapterError;
use crate::types::{Chain, ChainFamily};

/// Family-agnostic transaction request
#[derive(Debug, Clone, PartialEq)]
pub enum TxRequest {
    /// Grant the burn entry point a spending allowance
    Approve { amount: u128 },
    /// Burn `amount` toward `destination_domain`, crediting `mint_recipient`
    Burn {
        amount: u128,
        destination_domain: u32,
        mint_recipient: String,
        /// Relayer fee ceiling, quoted at call time (see
        /// `ChainAdapter::quote_max_fee`). Families whose burn call takes no
        /// fee parameter ignore it.
        max_fee: u128,
    },
    /// Present proof-of-burn to the destination's message-receiving entry
    /// point
    Mint {
        message: Vec<u8>,
        attestation: Vec<u8>,
    },
}

/// Outcome of waiting for a transaction
#[derive(Debug, Clone, PartialEq)]
pub struct TxReceipt {
    pub tx_hash: String,
    pub success: bool,
    pub block_number: Option<u64>,
}

/// Wallet/RPC access for a single chain.
///
/// `request_switch` is fire-and-forget: wallets can resolve a switch request
/// before the provider has actually updated, so callers must poll
/// `current_chain_id` to confirm the switch took effect.
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    /// The chain this adapter drives
    fn chain(&self) -> Chain;

    /// Address of the connected signer; used as the transfer initiator and
    /// default mint recipient
    fn signer_address(&self) -> String;

    /// Address of the bridged token on this chain
    fn bridged_token(&self) -> String;

    /// Whether burns on this chain need a prior spending allowance
    fn requires_approval(&self) -> bool {
        matches!(self.chain().family(), ChainFamily::Evm)
    }

    /// Wallet-visible chain id this adapter expects to be active before it
    /// can submit, when the family has switchable networks. `None` for
    /// families without a shared-wallet network concept.
    fn expected_chain_id(&self) -> Option<u64>;

    /// Token balance of `owner`
    async fn balance(&self, token: &str, owner: &str) -> Result<u128, AdapterError>;

    /// Current allowance granted by `owner` to the burn entry point
    async fn burn_allowance(&self, owner: &str) -> Result<u128, AdapterError>;

    /// Relayer fee ceiling for burning `amount`, quoted now rather than
    /// derived from a hardcoded schedule
    async fn quote_max_fee(&self, amount: u128) -> Result<u128, AdapterError>;

    /// Submit a transaction; returns its hash. A reused-nonce pre-flight
    /// failure surfaces as `AdapterError::NonceAlreadyUsed` without a hash,
    /// since no transaction reaches the chain.
    async fn submit(&self, tx: TxRequest) -> Result<String, AdapterError>;

    /// Wait for a submitted transaction to land and report its status
    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TxReceipt, AdapterError>;

    /// Chain id the wallet/provider is currently on
    async fn current_chain_id(&self) -> Result<u64, AdapterError>;

    /// Ask the wallet to switch networks. Resolution of this call does not
    /// mean the switch happened.
    async fn request_switch(&self, chain_id: u64) -> Result<(), AdapterError>;
}
