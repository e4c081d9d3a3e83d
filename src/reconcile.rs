//! Startup/reconnect reconciliation
//!
//! Runs once per session start to decide what to do with a previously
//! persisted record, trusting neither the local record nor any single
//! remote source. The deliberate asymmetry: attestation *presence* is never
//! taken as proof the mint happened: the attestation service cannot know
//! whether a relayer already completed it. The only authoritative
//! completion signal is the destination's reused-nonce response during an
//! actual claim attempt, which the orchestrator reports as success.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::attestation::{self, AttestationStatus};
use crate::error::BridgeError;
use crate::orchestrator::{BridgeOrchestrator, TransferOutcome};
use crate::record::TransferRecord;

/// What reconciliation decided to do with a persisted record
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileAction {
    /// Nothing persisted for this initiator
    NoRecord,
    /// Attestation not available yet; resume the orchestrator's polling loop
    ResumePolling { record: TransferRecord },
    /// Proof is available and the wallet is on the destination network;
    /// attempt the claim automatically
    AutoClaim { record: TransferRecord },
    /// Proof is available but the wallet is on another network; surface a
    /// "switch network to auto-claim, or claim manually" affordance
    ManualClaimNeeded { record: TransferRecord },
}

/// Terminal report of a driven reconciliation
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// No record; nothing to do
    Idle,
    /// The orchestrator resumed and ran to a terminal outcome
    Resumed(TransferOutcome),
    /// User action needed before the claim can run
    ManualClaimNeeded { record: TransferRecord },
}

/// Decides, on session start or wallet reconnect, whether to resume
/// polling, claim automatically, or ask the user to act
pub struct Reconciler {
    orchestrator: Arc<BridgeOrchestrator>,
}

impl Reconciler {
    pub fn new(orchestrator: Arc<BridgeOrchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Inspect the persisted record for `initiator` and decide what to do,
    /// without driving the orchestrator.
    pub async fn reconcile(&self, initiator: &str) -> Result<ReconcileAction, BridgeError> {
        let Some(mut record) = self.orchestrator.store().get(initiator).await? else {
            debug!(initiator = %initiator, "No persisted transfer record");
            return Ok(ReconcileAction::NoRecord);
        };

        info!(
            tx_hash = %record.burn_tx_hash,
            source = %record.source_chain,
            destination = %record.destination_chain,
            age_secs = record.age().num_seconds(),
            "Found persisted transfer record, reconciling"
        );

        let status = self
            .orchestrator
            .attestation()
            .fetch(record.source_chain.domain(), record.burn_tx_hash.as_str())
            .await;

        match status {
            Err(e) => {
                // Unreachable service is not evidence of anything; keep the
                // record and let the poll loop retry.
                warn!(error = %e, "Attestation service unreachable during reconciliation; resuming polling");
                Ok(ReconcileAction::ResumePolling { record })
            }
            Ok(AttestationStatus::NotFound) => {
                Ok(ReconcileAction::ResumePolling { record })
            }
            Ok(AttestationStatus::Pending { message }) => {
                if let Some(bytes) = message {
                    self.backfill_amount(&mut record, &bytes).await;
                }
                Ok(ReconcileAction::ResumePolling { record })
            }
            Ok(AttestationStatus::Ready(proof)) => {
                self.backfill_amount(&mut record, &proof.message).await;

                // Proof presence says the burn is attested, not that the
                // mint happened. Always route toward a claim attempt; an
                // "already minted" signal during that attempt is success.
                match self.orchestrator.destination().expected_chain_id() {
                    None => Ok(ReconcileAction::AutoClaim { record }),
                    Some(expected) => {
                        match self.orchestrator.destination().current_chain_id().await {
                            Ok(id) if id == expected => {
                                Ok(ReconcileAction::AutoClaim { record })
                            }
                            Ok(id) => {
                                info!(
                                    current = id,
                                    expected,
                                    "Proof ready but wallet is on another network"
                                );
                                Ok(ReconcileAction::ManualClaimNeeded { record })
                            }
                            Err(e) => {
                                warn!(error = %e, "Cannot read wallet network; deferring to manual claim");
                                Ok(ReconcileAction::ManualClaimNeeded { record })
                            }
                        }
                    }
                }
            }
        }
    }

    /// Reconcile and drive the resulting action to a terminal report
    pub async fn run(&self, initiator: &str) -> Result<ReconcileOutcome, BridgeError> {
        match self.reconcile(initiator).await? {
            ReconcileAction::NoRecord => Ok(ReconcileOutcome::Idle),
            ReconcileAction::ResumePolling { record } | ReconcileAction::AutoClaim { record } => {
                let outcome = self.orchestrator.claim(&record).await?;
                Ok(ReconcileOutcome::Resumed(outcome))
            }
            ReconcileAction::ManualClaimNeeded { record } => {
                info!(
                    tx_hash = %record.burn_tx_hash,
                    "Switch network to auto-claim, or claim manually"
                );
                Ok(ReconcileOutcome::ManualClaimNeeded { record })
            }
        }
    }

    /// Fill in a missing amount from decoded message bytes and persist the
    /// enriched record (the store is last-write-wins; a UI may read it
    /// before the claim finishes).
    async fn backfill_amount(&self, record: &mut TransferRecord, message: &[u8]) {
        if record.amount.is_some() {
            return;
        }
        let Ok(decoded) = attestation::decode_burn_message(message) else {
            warn!(tx_hash = %record.burn_tx_hash, "Could not decode message bytes for amount backfill");
            return;
        };

        record.amount = Some(decoded.amount);
        info!(
            tx_hash = %record.burn_tx_hash,
            amount = decoded.amount,
            "Backfilled transfer amount from attestation message"
        );
        if let Err(e) = self
            .orchestrator
            .store()
            .put(&record.initiator, record)
            .await
        {
            warn!(error = %e, "Failed to persist backfilled record");
        }
    }
}
