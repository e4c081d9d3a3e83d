//! Reference EVM adapter
//!
//! Drives the ERC-20 allowance calls, the token messenger burn, and the
//! message transmitter's proof-receiving entry point over JSON-RPC. Holds
//! one endpoint per supported chain id and an "active" slot that mimics
//! wallet network state: `request_switch` re-points the active endpoint and
//! `current_chain_id` asks the active RPC what chain it actually is, so a
//! misconfigured endpoint cannot silently pass switch verification.

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, Bytes, FixedBytes, B256, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use async_trait::async_trait;
use eyre::{eyre, Result, WrapErr};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::adapter::{ChainAdapter, TxRequest, TxReceipt};
use crate::error::{classify_submit_error, AdapterError};
use crate::types::Chain;

sol! {
    #[sol(rpc)]
    contract FiatToken {
        function approve(address spender, uint256 value) external returns (bool success);
        function allowance(address owner, address spender) external view returns (uint256 remaining);
        function balanceOf(address account) external view returns (uint256 balance);
    }

    #[sol(rpc)]
    contract TokenMessenger {
        function depositForBurn(
            uint256 amount,
            uint32 destinationDomain,
            bytes32 mintRecipient,
            address burnToken
        ) external returns (uint64 nonce);
    }

    #[sol(rpc)]
    contract MessageTransmitter {
        function receiveMessage(bytes calldata message, bytes calldata attestation) external returns (bool success);
    }
}

/// Receipt polling bounds; a receipt usually lands within a few blocks
const RECEIPT_POLL_ATTEMPTS: u32 = 60;
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// One chain's RPC endpoint and contract addresses
#[derive(Debug, Clone)]
pub struct EvmEndpoint {
    pub chain_id: u64,
    pub rpc_url: String,
    /// Bridged token (the stablecoin) on this chain
    pub token: String,
    /// Burn entry point; also the allowance spender
    pub token_messenger: String,
    /// Proof-receiving entry point
    pub message_transmitter: String,
}

/// Adapter configuration
#[derive(Clone)]
pub struct EvmAdapterConfig {
    /// The chain this adapter represents
    pub chain: Chain,
    /// Wallet-visible chain id of `chain`
    pub chain_id: u64,
    pub private_key: String,
    /// Endpoints the simulated wallet can switch between; must include
    /// `chain_id`
    pub endpoints: Vec<EvmEndpoint>,
    /// Relayer fee ceiling reported by `quote_max_fee`. The burn entry
    /// point used here takes no fee parameter, so zero is a safe floor;
    /// hosts override per deployment.
    pub max_fee_quote: u128,
}

/// Custom Debug that redacts private_key to prevent accidental log leakage.
impl fmt::Debug for EvmAdapterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvmAdapterConfig")
            .field("chain", &self.chain)
            .field("chain_id", &self.chain_id)
            .field("private_key", &"<redacted>")
            .field("endpoints", &self.endpoints)
            .field("max_fee_quote", &self.max_fee_quote)
            .finish()
    }
}

/// EVM implementation of the chain adapter seam
pub struct EvmAdapter {
    chain: Chain,
    home_chain_id: u64,
    signer: PrivateKeySigner,
    endpoints: HashMap<u64, EvmEndpoint>,
    active: RwLock<u64>,
    max_fee_quote: u128,
}

impl EvmAdapter {
    pub fn new(config: EvmAdapterConfig) -> Result<Self> {
        let signer: PrivateKeySigner = config
            .private_key
            .parse()
            .wrap_err("Invalid private key")?;

        let mut endpoints = HashMap::new();
        for endpoint in config.endpoints {
            Address::from_str(&endpoint.token)
                .wrap_err_with(|| format!("Invalid token address for chain {}", endpoint.chain_id))?;
            Address::from_str(&endpoint.token_messenger).wrap_err_with(|| {
                format!("Invalid token messenger address for chain {}", endpoint.chain_id)
            })?;
            Address::from_str(&endpoint.message_transmitter).wrap_err_with(|| {
                format!("Invalid message transmitter address for chain {}", endpoint.chain_id)
            })?;
            endpoints.insert(endpoint.chain_id, endpoint);
        }

        if !endpoints.contains_key(&config.chain_id) {
            return Err(eyre!(
                "No endpoint configured for the adapter's own chain id {}",
                config.chain_id
            ));
        }

        info!(
            chain = %config.chain,
            chain_id = config.chain_id,
            signer = %signer.address(),
            endpoint_count = endpoints.len(),
            "EVM adapter initialized"
        );

        Ok(Self {
            chain: config.chain,
            home_chain_id: config.chain_id,
            signer,
            endpoints,
            active: RwLock::new(config.chain_id),
            max_fee_quote: config.max_fee_quote,
        })
    }

    fn home(&self) -> &EvmEndpoint {
        // Presence is validated in new()
        &self.endpoints[&self.home_chain_id]
    }

    async fn active_endpoint(&self) -> Result<EvmEndpoint, AdapterError> {
        let id = *self.active.read().await;
        self.endpoints
            .get(&id)
            .cloned()
            .ok_or_else(|| AdapterError::Rpc(format!("no endpoint for active chain {}", id)))
    }

    fn parse_url(endpoint: &EvmEndpoint) -> Result<reqwest::Url, AdapterError> {
        endpoint
            .rpc_url
            .parse()
            .map_err(|e| AdapterError::Rpc(format!("invalid RPC URL: {}", e)))
    }

    fn parse_address(raw: &str) -> Result<Address, AdapterError> {
        Address::from_str(raw).map_err(|e| AdapterError::Rpc(format!("invalid address {}: {}", raw, e)))
    }
}

/// Encode a mint recipient for the burn call: EVM addresses are left-padded
/// to 32 bytes; Solana recipients arrive as base58 and are used raw.
fn recipient_to_bytes32(recipient: &str) -> Result<[u8; 32], AdapterError> {
    if let Some(hex_part) = recipient.strip_prefix("0x") {
        let bytes = hex::decode(hex_part)
            .map_err(|e| AdapterError::Rpc(format!("invalid recipient hex: {}", e)))?;
        if bytes.len() != 20 {
            return Err(AdapterError::Rpc(format!(
                "EVM recipient must be 20 bytes, got {}",
                bytes.len()
            )));
        }
        let mut out = [0u8; 32];
        out[12..].copy_from_slice(&bytes);
        return Ok(out);
    }

    let bytes = bs58::decode(recipient)
        .into_vec()
        .map_err(|e| AdapterError::Rpc(format!("invalid recipient base58: {}", e)))?;
    if bytes.len() != 32 {
        return Err(AdapterError::Rpc(format!(
            "Solana recipient must be 32 bytes, got {}",
            bytes.len()
        )));
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(out)
}

#[async_trait]
impl ChainAdapter for EvmAdapter {
    fn chain(&self) -> Chain {
        self.chain
    }

    fn signer_address(&self) -> String {
        self.signer.address().to_string()
    }

    fn bridged_token(&self) -> String {
        self.home().token.clone()
    }

    fn expected_chain_id(&self) -> Option<u64> {
        Some(self.home_chain_id)
    }

    async fn balance(&self, token: &str, owner: &str) -> Result<u128, AdapterError> {
        let provider = ProviderBuilder::new().on_http(Self::parse_url(self.home())?);
        let contract = FiatToken::new(Self::parse_address(token)?, &provider);

        let result = contract
            .balanceOf(Self::parse_address(owner)?)
            .call()
            .await
            .map_err(|e| classify_submit_error(&e.to_string()))?;

        result
            .balance
            .try_into()
            .map_err(|_| AdapterError::Rpc("balance exceeds u128".to_string()))
    }

    async fn burn_allowance(&self, owner: &str) -> Result<u128, AdapterError> {
        let home = self.home();
        let provider = ProviderBuilder::new().on_http(Self::parse_url(home)?);
        let contract = FiatToken::new(Self::parse_address(&home.token)?, &provider);

        let result = contract
            .allowance(
                Self::parse_address(owner)?,
                Self::parse_address(&home.token_messenger)?,
            )
            .call()
            .await
            .map_err(|e| classify_submit_error(&e.to_string()))?;

        result
            .remaining
            .try_into()
            .map_err(|_| AdapterError::Rpc("allowance exceeds u128".to_string()))
    }

    async fn quote_max_fee(&self, _amount: u128) -> Result<u128, AdapterError> {
        Ok(self.max_fee_quote)
    }

    async fn submit(&self, tx: TxRequest) -> Result<String, AdapterError> {
        let endpoint = self.active_endpoint().await?;

        // A wallet submits to whatever network it is on; refuse instead of
        // sending a transaction meant for this chain somewhere else.
        if endpoint.chain_id != self.home_chain_id {
            return Err(AdapterError::NetworkMismatch(format!(
                "active network is {}, adapter drives chain {}",
                endpoint.chain_id, self.home_chain_id
            )));
        }

        // with_recommended_fillers() populates nonce, gas limit, and fee
        // fields; transactions fail with missing-property errors without it
        let wallet = EthereumWallet::from(self.signer.clone());
        let provider = ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet(wallet)
            .on_http(Self::parse_url(&endpoint)?);

        let pending = match tx {
            TxRequest::Approve { amount } => {
                let contract = FiatToken::new(Self::parse_address(&endpoint.token)?, &provider);
                debug!(amount, spender = %endpoint.token_messenger, "Submitting approval");
                contract
                    .approve(
                        Self::parse_address(&endpoint.token_messenger)?,
                        U256::from(amount),
                    )
                    .send()
                    .await
                    .map_err(|e| classify_submit_error(&e.to_string()))?
            }
            TxRequest::Burn {
                amount,
                destination_domain,
                mint_recipient,
                // The burn entry point bound here takes no fee parameter;
                // the quoted ceiling applies to families whose call does.
                max_fee: _,
            } => {
                let contract =
                    TokenMessenger::new(Self::parse_address(&endpoint.token_messenger)?, &provider);
                let recipient = recipient_to_bytes32(&mint_recipient)?;
                debug!(amount, destination_domain, "Submitting burn");
                contract
                    .depositForBurn(
                        U256::from(amount),
                        destination_domain,
                        FixedBytes::from(recipient),
                        Self::parse_address(&endpoint.token)?,
                    )
                    .send()
                    .await
                    .map_err(|e| classify_submit_error(&e.to_string()))?
            }
            TxRequest::Mint {
                message,
                attestation,
            } => {
                let contract = MessageTransmitter::new(
                    Self::parse_address(&endpoint.message_transmitter)?,
                    &provider,
                );
                debug!(message_len = message.len(), "Submitting mint");
                contract
                    .receiveMessage(Bytes::from(message), Bytes::from(attestation))
                    .send()
                    .await
                    .map_err(|e| classify_submit_error(&e.to_string()))?
            }
        };

        let tx_hash = *pending.tx_hash();
        let tx_hash = format!("0x{:x}", tx_hash);
        info!(tx_hash = %tx_hash, "Transaction sent");
        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TxReceipt, AdapterError> {
        let endpoint = self.active_endpoint().await?;
        let provider = ProviderBuilder::new().on_http(Self::parse_url(&endpoint)?);
        let hash = B256::from_str(tx_hash)
            .map_err(|e| AdapterError::Rpc(format!("invalid transaction hash: {}", e)))?;

        for attempt in 1..=RECEIPT_POLL_ATTEMPTS {
            match provider.get_transaction_receipt(hash).await {
                Ok(Some(receipt)) => {
                    return Ok(TxReceipt {
                        tx_hash: tx_hash.to_string(),
                        success: receipt.status(),
                        block_number: receipt.block_number,
                    });
                }
                Ok(None) => {
                    debug!(tx_hash = %tx_hash, attempt, "Receipt not yet available");
                }
                Err(e) => {
                    debug!(error = %e, tx_hash = %tx_hash, attempt, "Receipt query failed");
                }
            }
            tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
        }

        Err(AdapterError::Timeout(format!(
            "no receipt for {} after {} attempts",
            tx_hash, RECEIPT_POLL_ATTEMPTS
        )))
    }

    async fn current_chain_id(&self) -> Result<u64, AdapterError> {
        let endpoint = self.active_endpoint().await?;
        let provider = ProviderBuilder::new().on_http(Self::parse_url(&endpoint)?);
        provider
            .get_chain_id()
            .await
            .map_err(|e| classify_submit_error(&e.to_string()))
    }

    async fn request_switch(&self, chain_id: u64) -> Result<(), AdapterError> {
        if !self.endpoints.contains_key(&chain_id) {
            return Err(AdapterError::NetworkMismatch(format!(
                "no endpoint configured for chain {}",
                chain_id
            )));
        }
        *self.active.write().await = chain_id;
        info!(chain_id, "Switched active endpoint");
        Ok(())
    }
}
