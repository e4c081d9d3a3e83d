//! Common types for cross-chain transfers
//!
//! Chains are symbolic identifiers that resolve to a chain family (which
//! adapter drives them) and an attestation-service domain code. Transaction
//! hashes are shape-validated per family before any network call is made.

use eyre::{eyre, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Wallet/adapter family a chain belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainFamily {
    Evm,
    Solana,
}

impl ChainFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainFamily::Evm => "evm",
            ChainFamily::Solana => "solana",
        }
    }
}

impl fmt::Display for ChainFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A chain the attestation service recognizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Ethereum,
    Avalanche,
    Optimism,
    Arbitrum,
    Solana,
    Base,
    Polygon,
}

impl Chain {
    /// Attestation-service domain code for this chain
    pub fn domain(&self) -> u32 {
        match self {
            Chain::Ethereum => 0,
            Chain::Avalanche => 1,
            Chain::Optimism => 2,
            Chain::Arbitrum => 3,
            Chain::Solana => 5,
            Chain::Base => 6,
            Chain::Polygon => 7,
        }
    }

    /// Which adapter family drives this chain
    pub fn family(&self) -> ChainFamily {
        match self {
            Chain::Solana => ChainFamily::Solana,
            _ => ChainFamily::Evm,
        }
    }

    /// Resolve a domain code back to a chain
    pub fn from_domain(domain: u32) -> Option<Self> {
        match domain {
            0 => Some(Chain::Ethereum),
            1 => Some(Chain::Avalanche),
            2 => Some(Chain::Optimism),
            3 => Some(Chain::Arbitrum),
            5 => Some(Chain::Solana),
            6 => Some(Chain::Base),
            7 => Some(Chain::Polygon),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Ethereum => "ethereum",
            Chain::Avalanche => "avalanche",
            Chain::Optimism => "optimism",
            Chain::Arbitrum => "arbitrum",
            Chain::Solana => "solana",
            Chain::Base => "base",
            Chain::Polygon => "polygon",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Chain {
    type Err = eyre::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ethereum" => Ok(Chain::Ethereum),
            "avalanche" => Ok(Chain::Avalanche),
            "optimism" => Ok(Chain::Optimism),
            "arbitrum" => Ok(Chain::Arbitrum),
            "solana" => Ok(Chain::Solana),
            "base" => Ok(Chain::Base),
            "polygon" => Ok(Chain::Polygon),
            other => Err(eyre!("Unknown chain: {}", other)),
        }
    }
}

/// Identifier of a burn transaction on its source chain.
///
/// The primary correlation key for everything downstream of a burn. Shape is
/// validated on parse: EVM hashes are `0x` + 64 hex chars, Solana signatures
/// are base58 text decoding to 64 bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BurnTxHash(String);

impl BurnTxHash {
    /// Validate a user-supplied transaction hash for the given chain family
    pub fn parse(raw: &str, family: ChainFamily) -> Result<Self> {
        let raw = raw.trim();
        match family {
            ChainFamily::Evm => {
                let hex_part = raw
                    .strip_prefix("0x")
                    .ok_or_else(|| eyre!("EVM transaction hash must start with 0x"))?;
                let bytes = hex::decode(hex_part)
                    .map_err(|_| eyre!("EVM transaction hash must be valid hex"))?;
                if bytes.len() != 32 {
                    return Err(eyre!("EVM transaction hash must be 32 bytes"));
                }
            }
            ChainFamily::Solana => {
                let bytes = bs58::decode(raw)
                    .into_vec()
                    .map_err(|_| eyre!("Solana signature must be valid base58"))?;
                if bytes.len() != 64 {
                    return Err(eyre!("Solana signature must be 64 bytes"));
                }
            }
        }
        Ok(BurnTxHash(raw.to_string()))
    }

    /// Wrap a hash returned by a chain adapter without re-validating
    pub fn unchecked(raw: impl Into<String>) -> Self {
        BurnTxHash(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BurnTxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle phase reported by the orchestrator.
///
/// `Idle` and `Complete` are the only phases with no persisted record
/// implied; `PendingManualMint` is the terminal side-state for interrupted
/// transfers whose burn is already confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferPhase {
    Idle,
    Approving,
    Burning,
    AwaitingAttestation,
    Minting,
    Complete,
    PendingManualMint,
}

impl TransferPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferPhase::Idle => "idle",
            TransferPhase::Approving => "approving",
            TransferPhase::Burning => "burning",
            TransferPhase::AwaitingAttestation => "awaiting_attestation",
            TransferPhase::Minting => "minting",
            TransferPhase::Complete => "complete",
            TransferPhase::PendingManualMint => "pending_manual_mint",
        }
    }

    /// Whether a persisted TransferRecord exists (or is about to) in this phase
    pub fn implies_record(&self) -> bool {
        !matches!(self, TransferPhase::Idle | TransferPhase::Complete)
    }
}

impl fmt::Display for TransferPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
