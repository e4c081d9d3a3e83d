//! Scriptable attestation source

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use crate::attestation::{AttestationSource, AttestationStatus};
use crate::error::AttestationError;

type FetchResult = Result<AttestationStatus, AttestationError>;

/// Attestation source that replays a scripted sequence of responses, then
/// repeats a fallback. Records every query for assertions.
pub struct MockAttestationSource {
    responses: Mutex<VecDeque<FetchResult>>,
    fallback: FetchResult,
    queries: Mutex<Vec<(u32, String)>>,
}

impl MockAttestationSource {
    /// Answer every fetch with the same status
    pub fn always(status: AttestationStatus) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            fallback: Ok(status),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Replay `responses` in order, then answer `NotFound`
    pub fn sequence(responses: Vec<FetchResult>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            fallback: Ok(AttestationStatus::NotFound),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Replace the response used once the scripted sequence is exhausted
    pub fn with_fallback(mut self, fallback: FetchResult) -> Self {
        self.fallback = fallback;
        self
    }

    /// Number of fetches made so far
    pub fn fetch_count(&self) -> usize {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Every (domain, tx_hash) queried, in order
    pub fn queries(&self) -> Vec<(u32, String)> {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl AttestationSource for MockAttestationSource {
    async fn fetch(&self, domain: u32, tx_hash: &str) -> FetchResult {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((domain, tx_hash.to_string()));

        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}
