//! Durable transfer records and the store they live in
//!
//! A record is created the instant a burn is confirmed on-chain, never
//! before, and is only deleted on confirmed mint success, confirmed
//! prior-claim detection, or explicit user dismissal. The store itself is an
//! injected collaborator: the orchestrator only relies on per-key
//! last-write-wins durability across restarts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use crate::error::StoreError;
use crate::types::{BurnTxHash, Chain};

/// Durable state for one in-flight transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRecord {
    /// Burn transaction on the source chain; correlation key for everything
    /// downstream
    pub burn_tx_hash: BurnTxHash,
    pub source_chain: Chain,
    pub destination_chain: Chain,
    /// Base-unit token amount in source-chain precision. Absent when the
    /// record was reconstructed from a bare transaction hash; backfilled
    /// from attestation message bytes during reconciliation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<u128>,
    /// Wallet that performed the burn; store key and default mint recipient
    pub initiator: String,
    pub created_at: DateTime<Utc>,
}

impl TransferRecord {
    pub fn new(
        burn_tx_hash: BurnTxHash,
        source_chain: Chain,
        destination_chain: Chain,
        amount: Option<u128>,
        initiator: impl Into<String>,
    ) -> Self {
        Self {
            burn_tx_hash,
            source_chain,
            destination_chain,
            amount,
            initiator: initiator.into(),
            created_at: Utc::now(),
        }
    }

    /// Age of the record, for staleness decisions
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.created_at
    }
}

/// Durable key-value store holding at most one in-flight transfer per
/// initiating wallet address
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get(&self, initiator: &str) -> Result<Option<TransferRecord>, StoreError>;
    async fn put(&self, initiator: &str, record: &TransferRecord) -> Result<(), StoreError>;
    async fn delete(&self, initiator: &str) -> Result<(), StoreError>;
}

/// In-memory store for tests and short-lived hosts
#[derive(Default)]
pub struct MemoryRecordStore {
    records: Mutex<HashMap<String, TransferRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, TransferRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get(&self, initiator: &str) -> Result<Option<TransferRecord>, StoreError> {
        Ok(self.lock().get(&store_key(initiator)).cloned())
    }

    async fn put(&self, initiator: &str, record: &TransferRecord) -> Result<(), StoreError> {
        self.lock().insert(store_key(initiator), record.clone());
        Ok(())
    }

    async fn delete(&self, initiator: &str) -> Result<(), StoreError> {
        self.lock().remove(&store_key(initiator));
        Ok(())
    }
}

/// File-backed store: one JSON document per initiator under a directory.
///
/// Writes go through a temp file and a rename so a crash mid-write leaves
/// the previous record intact.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, initiator: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_key(initiator)))
    }
}

#[async_trait]
impl RecordStore for JsonFileStore {
    async fn get(&self, initiator: &str) -> Result<Option<TransferRecord>, StoreError> {
        let path = self.path_for(initiator);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let record: TransferRecord = serde_json::from_slice(&bytes)?;
                Ok(Some(record))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn put(&self, initiator: &str, record: &TransferRecord) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(initiator);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(record)?;
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn delete(&self, initiator: &str) -> Result<(), StoreError> {
        let path = self.path_for(initiator);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}

/// Canonical store key: addresses compare case-insensitively on EVM chains
fn store_key(initiator: &str) -> String {
    initiator.trim().to_lowercase()
}

/// Filesystem-safe variant of the store key
fn file_key(initiator: &str) -> String {
    store_key(initiator)
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChainFamily;

    fn sample_record(initiator: &str) -> TransferRecord {
        let hash = BurnTxHash::parse(&format!("0x{}", "aa".repeat(32)), ChainFamily::Evm).unwrap();
        TransferRecord::new(hash, Chain::Base, Chain::Solana, Some(1_000_000), initiator)
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryRecordStore::new();
        let record = sample_record("0xAbC1");

        assert!(store.get("0xAbC1").await.unwrap().is_none());
        store.put("0xAbC1", &record).await.unwrap();
        assert_eq!(store.get("0xAbC1").await.unwrap(), Some(record.clone()));

        // Key comparison is case-insensitive
        assert_eq!(store.get("0xabc1").await.unwrap(), Some(record));

        store.delete("0xABC1").await.unwrap();
        assert!(store.get("0xAbC1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store_overwrites() {
        let store = MemoryRecordStore::new();
        let first = sample_record("0xabc1");
        let mut second = sample_record("0xabc1");
        second.amount = Some(42);

        store.put("0xabc1", &first).await.unwrap();
        store.put("0xabc1", &second).await.unwrap();
        assert_eq!(store.get("0xabc1").await.unwrap().unwrap().amount, Some(42));
    }

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let record = sample_record("0xabc1");

        assert!(store.get("0xabc1").await.unwrap().is_none());
        store.put("0xabc1", &record).await.unwrap();
        assert_eq!(store.get("0xabc1").await.unwrap(), Some(record));

        store.delete("0xabc1").await.unwrap();
        assert!(store.get("0xabc1").await.unwrap().is_none());
        // Deleting a missing record is not an error
        store.delete("0xabc1").await.unwrap();
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let record = sample_record("0xabc1");

        {
            let store = JsonFileStore::new(dir.path());
            store.put("0xabc1", &record).await.unwrap();
        }

        let reopened = JsonFileStore::new(dir.path());
        assert_eq!(reopened.get("0xabc1").await.unwrap(), Some(record));
    }

    #[test]
    fn test_record_serde_roundtrip_without_amount() {
        let mut record = sample_record("0xabc1");
        record.amount = None;

        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("amount"));
        let back: TransferRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
