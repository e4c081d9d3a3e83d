//! CCTP Orchestrator: Burn/Attest/Mint Bridge Core
//!
//! This crate drives a stablecoin transfer between chains through a
//! third-party burn/attest/mint bridging protocol, as a library invoked by
//! a UI or host layer:
//!
//! - **Orchestrator** - The transfer state machine: approve → burn →
//!   attestation wait → mint, persisting exactly the state needed to
//!   resume after a crash or a closed tab
//! - **Reconciler** - Startup/reconnect recovery that reconciles the local
//!   record against the attestation service without trusting either alone
//! - **Attestation** - Polling client for the remote attestation service
//! - **Adapters** - One `ChainAdapter` per chain, hiding each family's
//!   transaction shapes; an alloy-backed EVM reference adapter is included
//! - **Record Store** - Injected durable store holding at most one
//!   in-flight transfer per wallet
//! - **Testing** - Scriptable mocks for host integration tests
//!
//! ## Usage
//!
//! ```ignore
//! let orchestrator = Arc::new(BridgeOrchestrator::new(
//!     source, destination, attestation, store, OrchestratorConfig::load()?,
//! ));
//!
//! // On session start, resolve anything left over from a previous run
//! let reconciler = Reconciler::new(orchestrator.clone());
//! reconciler.run(&wallet_address).await?;
//!
//! // Fresh transfer
//! let outcome = orchestrator.transfer(amount, None).await?;
//! ```

pub mod adapter;
pub mod attestation;
pub mod config;
pub mod error;
pub mod evm;
pub mod lock;
pub mod orchestrator;
pub mod reconcile;
pub mod record;
pub mod testing;
pub mod types;

// Re-export commonly used items at the crate root
pub use adapter::{ChainAdapter, TxReceipt, TxRequest};
pub use attestation::{
    AttestationSource, AttestationStatus, IrisAttestationClient, MessageProof,
    IRIS_API_MAINNET, IRIS_API_SANDBOX,
};
pub use config::OrchestratorConfig;
pub use error::{AdapterError, AttestationError, BridgeError, StoreError};
pub use orchestrator::{BridgeOrchestrator, ManualMintReason, TransferOutcome};
pub use reconcile::{ReconcileAction, ReconcileOutcome, Reconciler};
pub use record::{JsonFileStore, MemoryRecordStore, RecordStore, TransferRecord};
pub use types::{BurnTxHash, Chain, ChainFamily, TransferPhase};
