//! Scriptable chain adapter

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::adapter::{ChainAdapter, TxRequest, TxReceipt};
use crate::error::AdapterError;
use crate::types::Chain;

struct MockChainState {
    balance: u128,
    allowance: u128,
    fee_quote: u128,
    current_chain_id: u64,
    /// (target, polls remaining before the switch takes effect)
    pending_switch: Option<(u64, u32)>,
    switch_lag: u32,
    submit_results: VecDeque<Result<String, AdapterError>>,
    receipt_results: VecDeque<Result<TxReceipt, AdapterError>>,
    submitted: Vec<TxRequest>,
    switch_requests: Vec<u64>,
    auto_nonce: u64,
}

/// Chain adapter whose responses are scripted per call.
///
/// Defaults are permissive: ample balance and allowance, submissions get a
/// generated hash, receipts succeed. Tests script failures where a scenario
/// needs them.
pub struct MockChainAdapter {
    chain: Chain,
    signer: String,
    expected_chain_id: Option<u64>,
    state: Mutex<MockChainState>,
}

impl MockChainAdapter {
    pub fn new(chain: Chain, signer: impl Into<String>) -> Self {
        Self {
            chain,
            signer: signer.into(),
            expected_chain_id: None,
            state: Mutex::new(MockChainState {
                balance: u128::MAX,
                allowance: u128::MAX,
                fee_quote: 0,
                current_chain_id: 0,
                pending_switch: None,
                switch_lag: 0,
                submit_results: VecDeque::new(),
                receipt_results: VecDeque::new(),
                submitted: Vec::new(),
                switch_requests: Vec::new(),
                auto_nonce: 0,
            }),
        }
    }

    pub fn with_balance(self, balance: u128) -> Self {
        self.lock().balance = balance;
        self
    }

    pub fn with_allowance(self, allowance: u128) -> Self {
        self.lock().allowance = allowance;
        self
    }

    pub fn with_fee_quote(self, fee: u128) -> Self {
        self.lock().fee_quote = fee;
        self
    }

    /// Turn on network-switch semantics: the adapter expects `expected` and
    /// the wallet currently reports `current`
    pub fn with_network(mut self, expected: u64, current: u64) -> Self {
        self.expected_chain_id = Some(expected);
        self.lock().current_chain_id = current;
        self
    }

    /// A requested switch takes effect only after `lag` chain-id polls
    pub fn with_switch_lag(self, lag: u32) -> Self {
        self.lock().switch_lag = lag;
        self
    }

    /// Script the result of the next unscripted submit
    pub fn script_submit(&self, result: Result<String, AdapterError>) {
        self.lock().submit_results.push_back(result);
    }

    /// Script the result of the next unscripted receipt wait
    pub fn script_receipt(&self, result: Result<TxReceipt, AdapterError>) {
        self.lock().receipt_results.push_back(result);
    }

    /// Everything submitted so far, in order
    pub fn submitted(&self) -> Vec<TxRequest> {
        self.lock().submitted.clone()
    }

    /// How many mint transactions were submitted
    pub fn mint_attempts(&self) -> usize {
        self.lock()
            .submitted
            .iter()
            .filter(|tx| matches!(tx, TxRequest::Mint { .. }))
            .count()
    }

    /// Every chain id passed to `request_switch`, in order
    pub fn switch_requests(&self) -> Vec<u64> {
        self.lock().switch_requests.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MockChainState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ChainAdapter for MockChainAdapter {
    fn chain(&self) -> Chain {
        self.chain
    }

    fn signer_address(&self) -> String {
        self.signer.clone()
    }

    fn bridged_token(&self) -> String {
        "0x0000000000000000000000000000000000000001".to_string()
    }

    fn expected_chain_id(&self) -> Option<u64> {
        self.expected_chain_id
    }

    async fn balance(&self, _token: &str, _owner: &str) -> Result<u128, AdapterError> {
        Ok(self.lock().balance)
    }

    async fn burn_allowance(&self, _owner: &str) -> Result<u128, AdapterError> {
        Ok(self.lock().allowance)
    }

    async fn quote_max_fee(&self, _amount: u128) -> Result<u128, AdapterError> {
        Ok(self.lock().fee_quote)
    }

    async fn submit(&self, tx: TxRequest) -> Result<String, AdapterError> {
        let mut state = self.lock();
        state.submitted.push(tx);
        match state.submit_results.pop_front() {
            Some(result) => result,
            None => {
                state.auto_nonce += 1;
                Ok(format!("0x{:064x}", state.auto_nonce))
            }
        }
    }

    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TxReceipt, AdapterError> {
        let mut state = self.lock();
        match state.receipt_results.pop_front() {
            Some(result) => result,
            None => Ok(TxReceipt {
                tx_hash: tx_hash.to_string(),
                success: true,
                block_number: Some(1),
            }),
        }
    }

    async fn current_chain_id(&self) -> Result<u64, AdapterError> {
        let mut state = self.lock();
        if let Some((target, remaining)) = state.pending_switch {
            if remaining == 0 {
                state.current_chain_id = target;
                state.pending_switch = None;
            } else {
                state.pending_switch = Some((target, remaining - 1));
            }
        }
        Ok(state.current_chain_id)
    }

    async fn request_switch(&self, chain_id: u64) -> Result<(), AdapterError> {
        let mut state = self.lock();
        state.switch_requests.push(chain_id);
        let lag = state.switch_lag;
        state.pending_switch = Some((chain_id, lag));
        Ok(())
    }
}
