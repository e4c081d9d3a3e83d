//! Bridge orchestrator: the transfer state machine
//!
//! Drives one transfer from user intent to a terminal outcome through a
//! strict sequential pipeline: approve (if needed) → burn → persist on
//! confirmation → attestation wait → network-switch verify → mint. The
//! single most important invariant lives in `transfer`: a record is never
//! persisted for a burn that might not confirm, and always persisted the
//! instant one does.
//!
//! Anything that goes wrong after the burn is confirmed is an *outcome*
//! (`PendingManualMint`), never an error: the burn is sunk and the funds
//! are provably recoverable with the proof, so no path past that point may
//! read as data loss.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::adapter::{ChainAdapter, TxRequest};
use crate::attestation::{
    self, evm_address_from_bytes32, solana_address_from_bytes32, AttestationSource,
    AttestationStatus, MessageProof, PollResult,
};
use crate::config::OrchestratorConfig;
use crate::error::{AdapterError, BridgeError};
use crate::lock::InflightLock;
use crate::record::{RecordStore, TransferRecord};
use crate::types::{BurnTxHash, Chain, ChainFamily, TransferPhase};

/// Why a transfer landed in `PendingManualMint` instead of `Complete`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManualMintReason {
    /// Attestation was not available within the attempt budget. Funds are
    /// safe; the claim can be retried later.
    AttestationTimeout,
    /// The wallet is not on the destination network and the switch did not
    /// take effect. User action required; no re-burn needed.
    NetworkMismatch,
    /// A mint transaction was submitted but did not confirm as successful
    MintSubmitted { tx_hash: String, error: String },
    /// Minting failed before any transaction reached the chain
    MintFailed { error: String },
}

/// Non-error terminal report of a transfer or claim attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The mint confirmed, or the destination reported the proof as already
    /// consumed (`mint_tx_hash` is `None` in that case; someone else's
    /// transaction completed the transfer)
    Complete { mint_tx_hash: Option<String> },
    /// The burn is confirmed and the record retained; the mint leg needs
    /// another attempt
    PendingManualMint { reason: ManualMintReason },
}

/// The transfer state machine, parameterized over a source/destination
/// adapter pair. Direction is which adapter sits in which seat.
pub struct BridgeOrchestrator {
    source: Arc<dyn ChainAdapter>,
    destination: Arc<dyn ChainAdapter>,
    attestation: Arc<dyn AttestationSource>,
    store: Arc<dyn RecordStore>,
    config: OrchestratorConfig,
    inflight: InflightLock,
    phase_tx: watch::Sender<TransferPhase>,
    cancel_tx: watch::Sender<bool>,
}

impl BridgeOrchestrator {
    pub fn new(
        source: Arc<dyn ChainAdapter>,
        destination: Arc<dyn ChainAdapter>,
        attestation: Arc<dyn AttestationSource>,
        store: Arc<dyn RecordStore>,
        config: OrchestratorConfig,
    ) -> Self {
        let (phase_tx, _) = watch::channel(TransferPhase::Idle);
        let (cancel_tx, _) = watch::channel(false);

        Self {
            source,
            destination,
            attestation,
            store,
            config,
            inflight: InflightLock::new(),
            phase_tx,
            cancel_tx,
        }
    }

    /// Subscribe to phase transitions
    pub fn subscribe(&self) -> watch::Receiver<TransferPhase> {
        self.phase_tx.subscribe()
    }

    /// The phase most recently reported
    pub fn phase(&self) -> TransferPhase {
        *self.phase_tx.borrow()
    }

    pub fn source(&self) -> &Arc<dyn ChainAdapter> {
        &self.source
    }

    pub fn destination(&self) -> &Arc<dyn ChainAdapter> {
        &self.destination
    }

    pub fn attestation(&self) -> &Arc<dyn AttestationSource> {
        &self.attestation
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    fn set_phase(&self, phase: TransferPhase) {
        debug!(phase = %phase, "Phase transition");
        self.phase_tx.send_replace(phase);
    }

    /// Execute one transfer attempt from intent to terminal outcome.
    ///
    /// Preconditions: `amount > 0` and no un-dismissed record exists for the
    /// initiator. The mint recipient defaults to the initiator when not
    /// overridden.
    pub async fn transfer(
        &self,
        amount: u128,
        recipient: Option<&str>,
    ) -> Result<TransferOutcome, BridgeError> {
        if amount == 0 {
            return Err(BridgeError::InvalidAmount);
        }

        let initiator = self.source.signer_address();
        if let Some(existing) = self.store.get(&initiator).await? {
            return Err(BridgeError::TransferInFlight {
                burn_tx_hash: existing.burn_tx_hash.to_string(),
            });
        }

        self.cancel_tx.send_replace(false);

        info!(
            source = %self.source.chain(),
            destination = %self.destination.chain(),
            amount,
            initiator = %initiator,
            "Starting transfer"
        );

        // Step 1: pre-approval. Failure here leaves no record and no moved
        // funds; fully retryable from scratch.
        if let Err(e) = self.ensure_approved(amount, &initiator).await {
            self.set_phase(TransferPhase::Idle);
            return Err(e);
        }

        // Step 2: burn. The record is persisted only once the burn is
        // confirmed on-chain, not on submission.
        self.set_phase(TransferPhase::Burning);
        let record = match self.execute_burn(amount, recipient, &initiator).await {
            Ok(record) => record,
            Err(e) => {
                self.set_phase(TransferPhase::Idle);
                return Err(e);
            }
        };

        // Steps 3-5: shared with claim()
        self.finish(&record).await
    }

    async fn ensure_approved(&self, amount: u128, initiator: &str) -> Result<(), BridgeError> {
        let token = self.source.bridged_token();
        let balance = self
            .source
            .balance(&token, initiator)
            .await
            .map_err(BridgeError::Adapter)?;
        if balance < amount {
            return Err(BridgeError::InsufficientBalance {
                needed: amount,
                available: balance,
            });
        }

        if !self.source.requires_approval() {
            return Ok(());
        }

        let allowance = self
            .source
            .burn_allowance(initiator)
            .await
            .map_err(BridgeError::Adapter)?;
        if allowance >= amount {
            return Ok(());
        }

        self.set_phase(TransferPhase::Approving);
        info!(amount, allowance, "Submitting approval");

        let tx_hash = self
            .source
            .submit(TxRequest::Approve { amount })
            .await
            .map_err(BridgeError::ApprovalFailed)?;
        let receipt = self
            .source
            .wait_for_receipt(&tx_hash)
            .await
            .map_err(BridgeError::ApprovalFailed)?;
        if !receipt.success {
            return Err(BridgeError::ApprovalFailed(AdapterError::Reverted(
                format!("approval transaction {} reverted", tx_hash),
            )));
        }

        info!(tx_hash = %tx_hash, "Approval confirmed");
        Ok(())
    }

    async fn execute_burn(
        &self,
        amount: u128,
        recipient: Option<&str>,
        initiator: &str,
    ) -> Result<TransferRecord, BridgeError> {
        let max_fee = self
            .destination
            .quote_max_fee(amount)
            .await
            .map_err(BridgeError::Adapter)?;
        let mint_recipient = recipient.unwrap_or(initiator).to_string();

        let burn_tx = self
            .source
            .submit(TxRequest::Burn {
                amount,
                destination_domain: self.destination.chain().domain(),
                mint_recipient,
                max_fee,
            })
            .await
            .map_err(BridgeError::BurnFailed)?;

        info!(tx_hash = %burn_tx, "Burn submitted, waiting for confirmation");

        let receipt = self
            .source
            .wait_for_receipt(&burn_tx)
            .await
            .map_err(BridgeError::BurnFailed)?;
        if !receipt.success {
            return Err(BridgeError::BurnFailed(AdapterError::Reverted(format!(
                "burn transaction {} reverted",
                burn_tx
            ))));
        }

        // Burn is confirmed: persist before doing anything else, so an
        // interruption one instruction later still leaves a recoverable
        // record.
        let record = TransferRecord::new(
            BurnTxHash::unchecked(burn_tx.clone()),
            self.source.chain(),
            self.destination.chain(),
            Some(amount),
            initiator,
        );
        if let Err(e) = self.store.put(initiator, &record).await {
            // The burn already happened; losing the record must not abort
            // the in-flight attempt, which can still complete the mint.
            error!(error = %e, tx_hash = %burn_tx, "Failed to persist transfer record");
        } else {
            info!(tx_hash = %burn_tx, "Burn confirmed, transfer record persisted");
        }

        Ok(record)
    }

    /// Manual/resumed claim path: run the attestation wait and mint for an
    /// existing record, from wherever proof-of-burn stands.
    ///
    /// Idempotent: if the mint already happened by any path, the
    /// destination's reused-nonce signal is reported as success.
    pub async fn claim(&self, record: &TransferRecord) -> Result<TransferOutcome, BridgeError> {
        self.cancel_tx.send_replace(false);
        self.finish(record).await
    }

    /// Steps 3-5: attestation wait, network-switch verify, mint, classify.
    async fn finish(&self, record: &TransferRecord) -> Result<TransferOutcome, BridgeError> {
        let burn_hash = record.burn_tx_hash.as_str();
        let _guard = self.inflight.try_acquire(burn_hash).ok_or_else(|| {
            BridgeError::ClaimInProgress {
                burn_tx_hash: burn_hash.to_string(),
            }
        })?;

        self.set_phase(TransferPhase::AwaitingAttestation);

        let mut cancel_rx = self.cancel_tx.subscribe();
        let poll = attestation::poll_for_proof(
            self.attestation.as_ref(),
            record.source_chain.domain(),
            burn_hash,
            self.config.poll_interval(),
            self.config.attestation_max_attempts,
            &mut cancel_rx,
        )
        .await;

        match poll {
            PollResult::Cancelled => {
                self.set_phase(TransferPhase::Idle);
                Err(BridgeError::Cancelled)
            }
            PollResult::TimedOut => {
                // Expected under service latency; the record stays and the
                // claim resumes later.
                self.set_phase(TransferPhase::PendingManualMint);
                info!(
                    tx_hash = %burn_hash,
                    "Attestation not yet available; funds are safe, claim later"
                );
                Ok(TransferOutcome::PendingManualMint {
                    reason: ManualMintReason::AttestationTimeout,
                })
            }
            PollResult::Ready(proof) => self.mint(record, proof).await,
        }
    }

    /// Step 4-5: verify the wallet network, submit the mint, classify the
    /// result. Cancellation is not consulted past this point: once the mint
    /// transaction is submitted, only completion detection continues.
    async fn mint(
        &self,
        record: &TransferRecord,
        proof: MessageProof,
    ) -> Result<TransferOutcome, BridgeError> {
        self.set_phase(TransferPhase::Minting);

        if let Some(expected) = self.destination.expected_chain_id() {
            if let Err(e) = self.verify_network(expected).await {
                warn!(
                    error = %e,
                    expected_chain_id = expected,
                    "Destination network not active; mint can be retried after switching"
                );
                self.set_phase(TransferPhase::PendingManualMint);
                return Ok(TransferOutcome::PendingManualMint {
                    reason: ManualMintReason::NetworkMismatch,
                });
            }
        }

        let burn_hash = record.burn_tx_hash.as_str();
        let mint_tx = match self
            .destination
            .submit(TxRequest::Mint {
                message: proof.message,
                attestation: proof.attestation,
            })
            .await
        {
            Ok(tx_hash) => tx_hash,
            Err(AdapterError::NonceAlreadyUsed) => {
                // Someone (a relayer, a previous attempt) already minted.
                // Success in disguise.
                info!(tx_hash = %burn_hash, "Proof already consumed on destination; transfer complete");
                self.clear_record(&record.initiator).await;
                self.set_phase(TransferPhase::Complete);
                return Ok(TransferOutcome::Complete { mint_tx_hash: None });
            }
            Err(AdapterError::NetworkMismatch(msg)) => {
                warn!(error = %msg, "Mint rejected for network mismatch; record retained");
                self.set_phase(TransferPhase::PendingManualMint);
                return Ok(TransferOutcome::PendingManualMint {
                    reason: ManualMintReason::NetworkMismatch,
                });
            }
            Err(e) => {
                // No transaction reached the chain; the burn is sunk and the
                // proof remains valid, so this is still a claim-later state.
                error!(error = %e, tx_hash = %burn_hash, "Mint submission failed; burn remains claimable");
                self.set_phase(TransferPhase::PendingManualMint);
                return Ok(TransferOutcome::PendingManualMint {
                    reason: ManualMintReason::MintFailed {
                        error: e.to_string(),
                    },
                });
            }
        };

        info!(tx_hash = %mint_tx, "Mint submitted, waiting for confirmation");

        match self.destination.wait_for_receipt(&mint_tx).await {
            Ok(receipt) if receipt.success => {
                self.clear_record(&record.initiator).await;
                self.set_phase(TransferPhase::Complete);
                info!(tx_hash = %mint_tx, "Mint confirmed, transfer complete");
                Ok(TransferOutcome::Complete {
                    mint_tx_hash: Some(mint_tx),
                })
            }
            Ok(_) => {
                warn!(tx_hash = %mint_tx, "Mint transaction reverted; record retained for retry");
                self.set_phase(TransferPhase::PendingManualMint);
                Ok(TransferOutcome::PendingManualMint {
                    reason: ManualMintReason::MintSubmitted {
                        tx_hash: mint_tx,
                        error: "mint transaction reverted".to_string(),
                    },
                })
            }
            Err(AdapterError::NonceAlreadyUsed) => {
                info!(tx_hash = %mint_tx, "Proof already consumed on destination; transfer complete");
                self.clear_record(&record.initiator).await;
                self.set_phase(TransferPhase::Complete);
                Ok(TransferOutcome::Complete { mint_tx_hash: None })
            }
            Err(e) => {
                warn!(
                    error = %e,
                    tx_hash = %mint_tx,
                    "Mint confirmation unknown; record retained, retry the claim"
                );
                self.set_phase(TransferPhase::PendingManualMint);
                Ok(TransferOutcome::PendingManualMint {
                    reason: ManualMintReason::MintSubmitted {
                        tx_hash: mint_tx,
                        error: e.to_string(),
                    },
                })
            }
        }
    }

    /// Poll the adapter's reported chain id until the requested switch takes
    /// effect. The switch call resolving is not trusted on its own.
    async fn verify_network(&self, expected: u64) -> Result<(), AdapterError> {
        let current = self.destination.current_chain_id().await?;
        if current == expected {
            return Ok(());
        }

        info!(current, expected, "Requesting network switch");
        self.destination.request_switch(expected).await?;

        for attempt in 1..=self.config.switch_verify_attempts {
            tokio::time::sleep(self.config.switch_verify_delay()).await;
            match self.destination.current_chain_id().await {
                Ok(id) if id == expected => {
                    info!(chain_id = id, attempt, "Network switch verified");
                    return Ok(());
                }
                Ok(id) => {
                    debug!(attempt, current = id, expected, "Switch not yet effective");
                }
                Err(e) => {
                    warn!(error = %e, attempt, "Chain id query failed during switch verification");
                }
            }
        }

        Err(AdapterError::NetworkMismatch(format!(
            "network still not {} after {} verification attempts",
            expected, self.config.switch_verify_attempts
        )))
    }

    /// Reconstruct a transfer record from a user-supplied burn transaction
    /// hash when local state was lost.
    ///
    /// The hash alone does not indicate direction, so both source-domain
    /// hypotheses are probed against the attestation service; the hash's
    /// shape is validated per family before any network call.
    pub async fn restore(&self, raw_hash: &str) -> Result<TransferRecord, BridgeError> {
        let forward = (self.source.chain(), self.destination.chain());
        let reverse = (self.destination.chain(), self.source.chain());

        let mut probed = Vec::new();
        let mut hypotheses = Vec::new();
        for (from, to) in [forward, reverse] {
            if let Ok(hash) = BurnTxHash::parse(raw_hash, from.family()) {
                hypotheses.push((hash, from, to));
            }
        }
        if hypotheses.is_empty() {
            return Err(BridgeError::InvalidTxHash(raw_hash.to_string()));
        }

        for (hash, from, to) in hypotheses {
            probed.push(from.domain());
            match self.attestation.fetch(from.domain(), hash.as_str()).await {
                Ok(AttestationStatus::Ready(proof)) => {
                    return self.restore_record(hash, from, to, Some(&proof.message)).await;
                }
                Ok(AttestationStatus::Pending { message }) => {
                    return self.restore_record(hash, from, to, message.as_deref()).await;
                }
                Ok(AttestationStatus::NotFound) => {
                    debug!(domain = from.domain(), tx_hash = %hash, "No burn under this domain hypothesis");
                }
                Err(e) => {
                    warn!(error = %e, domain = from.domain(), "Attestation probe failed");
                }
            }
        }

        Err(BridgeError::NoBurnFound {
            tx_hash: raw_hash.to_string(),
            probed,
        })
    }

    async fn restore_record(
        &self,
        hash: BurnTxHash,
        from: Chain,
        to: Chain,
        message: Option<&[u8]>,
    ) -> Result<TransferRecord, BridgeError> {
        let decoded = message.and_then(|m| attestation::decode_burn_message(m).ok());

        // Prefer the burner identity decoded from the message; fall back to
        // the local burn-side signer when the message is not yet available.
        let initiator = match &decoded {
            Some(m) => match from.family() {
                ChainFamily::Evm => evm_address_from_bytes32(&m.message_sender),
                ChainFamily::Solana => solana_address_from_bytes32(&m.message_sender),
            },
            None => {
                if from == self.source.chain() {
                    self.source.signer_address()
                } else {
                    self.destination.signer_address()
                }
            }
        };

        let record = TransferRecord::new(
            hash,
            from,
            to,
            decoded.as_ref().map(|m| m.amount),
            initiator,
        );
        self.store.put(&record.initiator, &record).await?;

        info!(
            tx_hash = %record.burn_tx_hash,
            source = %from,
            destination = %to,
            amount = ?record.amount,
            "Transfer record reconstructed from transaction hash"
        );
        Ok(record)
    }

    /// Explicitly drop the persisted record for `initiator`, stopping any
    /// in-flight attestation poll first. A mint that has already been
    /// submitted is unaffected; from there only completion detection
    /// continues.
    pub async fn dismiss(&self, initiator: &str) -> Result<(), BridgeError> {
        self.cancel_tx.send_replace(true);
        self.store.delete(initiator).await?;
        self.set_phase(TransferPhase::Idle);
        info!(initiator = %initiator, "Transfer record dismissed");
        Ok(())
    }

    async fn clear_record(&self, initiator: &str) {
        if let Err(e) = self.store.delete(initiator).await {
            // Completion already happened on-chain; a stale record is
            // reconciled away on the next start.
            error!(error = %e, initiator = %initiator, "Failed to clear transfer record");
        }
    }
}
