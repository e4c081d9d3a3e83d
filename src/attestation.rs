//! Attestation service client
//!
//! A plain polling HTTP client with no state of its own. Three answers are
//! distinguished and logged differently: the service was unreachable or
//! returned something unusable (error, retry), the service responded but the
//! attestation is not yet available (retry for a different reason), and the
//! service returned a usable proof (stop). A `"PENDING"` sentinel in the
//! attestation field is never surfaced as a proof value.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::AttestationError;

/// Public attestation service, mainnet chains
pub const IRIS_API_MAINNET: &str = "https://iris-api.circle.com";
/// Public attestation service, testnet chains
pub const IRIS_API_SANDBOX: &str = "https://iris-api-sandbox.circle.com";

/// Sentinel the service uses in the attestation field while signing is in
/// progress
const PENDING_SENTINEL: &str = "PENDING";

/// A signed proof-of-burn, ready to present to the destination chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageProof {
    pub message: Vec<u8>,
    pub attestation: Vec<u8>,
}

/// What the attestation service knows about a burn transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttestationStatus {
    /// The service has not indexed this transaction (yet)
    NotFound,
    /// Indexed, but the attestation is still being signed. The raw message
    /// bytes are often already available and are carried along for amount
    /// backfill.
    Pending { message: Option<Vec<u8>> },
    /// Signed and usable
    Ready(MessageProof),
}

/// Source of attestations, keyed by (domain, burn transaction hash)
#[async_trait]
pub trait AttestationSource: Send + Sync {
    async fn fetch(&self, domain: u32, tx_hash: &str)
        -> Result<AttestationStatus, AttestationError>;
}

/// HTTP client for the public attestation service
pub struct IrisAttestationClient {
    base: Url,
    client: reqwest::Client,
}

impl IrisAttestationClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AttestationError> {
        let base = Url::parse(base_url)
            .map_err(|e| AttestationError::InvalidEndpoint(e.to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Ok(Self { base, client })
    }
}

#[async_trait]
impl AttestationSource for IrisAttestationClient {
    async fn fetch(
        &self,
        domain: u32,
        tx_hash: &str,
    ) -> Result<AttestationStatus, AttestationError> {
        let url = format!(
            "{}/v1/messages/{}/{}",
            self.base.as_str().trim_end_matches('/'),
            domain,
            tx_hash
        );

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AttestationError::Transport(e.to_string()))?;

        // The service answers 404 until the transaction is indexed
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(AttestationStatus::NotFound);
        }
        if !resp.status().is_success() {
            return Err(AttestationError::Status(resp.status().as_u16()));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| AttestationError::Transport(e.to_string()))?;
        parse_status(&body)
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    messages: Vec<IrisMessage>,
}

#[derive(Debug, Deserialize)]
struct IrisMessage {
    message: Option<String>,
    attestation: Option<String>,
}

/// Parse a raw service response body into an attestation status.
///
/// The first message is authoritative when present.
fn parse_status(body: &str) -> Result<AttestationStatus, AttestationError> {
    let resp: MessagesResponse = serde_json::from_str(body)
        .map_err(|e| AttestationError::Malformed(e.to_string()))?;

    let Some(first) = resp.messages.first() else {
        return Ok(AttestationStatus::NotFound);
    };

    let message = match &first.message {
        Some(m) => Some(decode_hex_field("message", m)?),
        None => None,
    };

    match &first.attestation {
        None => Ok(AttestationStatus::Pending { message }),
        Some(a) if a.is_empty() || a.eq_ignore_ascii_case(PENDING_SENTINEL) => {
            Ok(AttestationStatus::Pending { message })
        }
        Some(a) => {
            let attestation = decode_hex_field("attestation", a)?;
            let Some(message) = message else {
                return Err(AttestationError::Malformed(
                    "attestation present but message missing".to_string(),
                ));
            };
            Ok(AttestationStatus::Ready(MessageProof {
                message,
                attestation,
            }))
        }
    }
}

fn decode_hex_field(name: &str, value: &str) -> Result<Vec<u8>, AttestationError> {
    let stripped = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(stripped)
        .map_err(|e| AttestationError::Malformed(format!("{} is not valid hex: {}", name, e)))
}

/// Result of a bounded attestation wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollResult {
    Ready(MessageProof),
    /// Attempt budget exhausted. Not an error: the burn is safe and the
    /// claim can be retried later.
    TimedOut,
    Cancelled,
}

/// Poll the attestation service until proof is available, the attempt budget
/// runs out, or the wait is cancelled.
///
/// Every per-attempt failure (unreachable service, non-success status,
/// malformed body) is swallowed, logged, and counted as an attempt; only
/// exhausting the budget is a timeout.
pub async fn poll_for_proof(
    source: &dyn AttestationSource,
    domain: u32,
    tx_hash: &str,
    interval: Duration,
    max_attempts: u32,
    cancel: &mut watch::Receiver<bool>,
) -> PollResult {
    if *cancel.borrow() {
        return PollResult::Cancelled;
    }

    for attempt in 1..=max_attempts {
        match source.fetch(domain, tx_hash).await {
            Ok(AttestationStatus::Ready(proof)) => {
                info!(tx_hash = %tx_hash, attempt, "Attestation available");
                return PollResult::Ready(proof);
            }
            Ok(AttestationStatus::Pending { .. }) => {
                debug!(tx_hash = %tx_hash, attempt, "Attestation pending, will retry");
            }
            Ok(AttestationStatus::NotFound) => {
                debug!(tx_hash = %tx_hash, attempt, "Burn not yet indexed, will retry");
            }
            Err(e) => {
                warn!(error = %e, tx_hash = %tx_hash, attempt, "Attestation query failed, will retry");
            }
        }

        if attempt == max_attempts {
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = cancelled(cancel) => {
                debug!(tx_hash = %tx_hash, "Attestation wait cancelled");
                return PollResult::Cancelled;
            }
        }
    }

    info!(
        tx_hash = %tx_hash,
        attempts = max_attempts,
        "Attestation wait exhausted its attempt budget"
    );
    PollResult::TimedOut
}

/// Resolve once the cancel flag is raised; never resolves if the flag stays
/// down (including when the sender side goes away).
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

// ============================================================================
// Wire message decoding
// ============================================================================

/// Byte layout of the bridging protocol's wire message: a fixed header
/// followed by the burn body.
const HEADER_LEN: usize = 116;
const BODY_LEN: usize = 132;

/// Decoded burn message, used to backfill amounts and recover transfer
/// direction when a record is reconstructed from a bare transaction hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurnMessage {
    pub source_domain: u32,
    pub destination_domain: u32,
    pub nonce: u64,
    pub burn_token: [u8; 32],
    pub mint_recipient: [u8; 32],
    pub amount: u128,
    pub message_sender: [u8; 32],
}

/// Decode the wire message carried in attestation responses.
///
/// Header: version(4) | sourceDomain(4) | destinationDomain(4) | nonce(8) |
/// sender(32) | recipient(32) | destinationCaller(32). Body: version(4) |
/// burnToken(32) | mintRecipient(32) | amount(32) | messageSender(32).
pub fn decode_burn_message(bytes: &[u8]) -> Result<BurnMessage, AttestationError> {
    if bytes.len() < HEADER_LEN + BODY_LEN {
        return Err(AttestationError::Malformed(format!(
            "message too short: {} bytes, need at least {}",
            bytes.len(),
            HEADER_LEN + BODY_LEN
        )));
    }

    let source_domain = u32::from_be_bytes(slice4(bytes, 4));
    let destination_domain = u32::from_be_bytes(slice4(bytes, 8));
    let nonce = u64::from_be_bytes(
        bytes[12..20]
            .try_into()
            .map_err(|_| AttestationError::Malformed("bad nonce field".to_string()))?,
    );

    let body = &bytes[HEADER_LEN..];
    let burn_token = slice32(body, 4);
    let mint_recipient = slice32(body, 36);
    let amount_word = slice32(body, 68);
    let message_sender = slice32(body, 100);

    // The amount is a 32-byte big-endian word; anything above u128 range is
    // not a token amount this system can have produced.
    if amount_word[..16].iter().any(|b| *b != 0) {
        return Err(AttestationError::Malformed(
            "amount exceeds u128 range".to_string(),
        ));
    }
    let amount = u128::from_be_bytes(
        amount_word[16..]
            .try_into()
            .map_err(|_| AttestationError::Malformed("bad amount field".to_string()))?,
    );

    Ok(BurnMessage {
        source_domain,
        destination_domain,
        nonce,
        burn_token,
        mint_recipient,
        amount,
        message_sender,
    })
}

fn slice4(bytes: &[u8], offset: usize) -> [u8; 4] {
    let mut out = [0u8; 4];
    out.copy_from_slice(&bytes[offset..offset + 4]);
    out
}

fn slice32(bytes: &[u8], offset: usize) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes[offset..offset + 32]);
    out
}

/// Render a 32-byte wire address in EVM form (last 20 bytes, 0x-prefixed)
pub fn evm_address_from_bytes32(bytes: &[u8; 32]) -> String {
    format!("0x{}", hex::encode(&bytes[12..]))
}

/// Render a 32-byte wire address in Solana form (base58)
pub fn solana_address_from_bytes32(bytes: &[u8; 32]) -> String {
    bs58::encode(bytes).into_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::encode_burn_message;

    #[test]
    fn test_parse_ready() {
        let body = r#"{"messages":[{"message":"0xdeadbeef","attestation":"0x0102"}]}"#;
        let status = parse_status(body).unwrap();
        assert_eq!(
            status,
            AttestationStatus::Ready(MessageProof {
                message: vec![0xde, 0xad, 0xbe, 0xef],
                attestation: vec![0x01, 0x02],
            })
        );
    }

    #[test]
    fn test_parse_pending_sentinel_is_never_a_proof() {
        for sentinel in ["PENDING", "pending", ""] {
            let body = format!(
                r#"{{"messages":[{{"message":"0xdeadbeef","attestation":"{}"}}]}}"#,
                sentinel
            );
            match parse_status(&body).unwrap() {
                AttestationStatus::Pending { message } => {
                    assert_eq!(message, Some(vec![0xde, 0xad, 0xbe, 0xef]));
                }
                other => panic!("sentinel {:?} surfaced as {:?}", sentinel, other),
            }
        }
    }

    #[test]
    fn test_parse_empty_messages_is_not_found() {
        assert_eq!(
            parse_status(r#"{"messages":[]}"#).unwrap(),
            AttestationStatus::NotFound
        );
        assert_eq!(parse_status(r#"{}"#).unwrap(), AttestationStatus::NotFound);
    }

    #[test]
    fn test_parse_malformed() {
        assert!(parse_status("not json").is_err());
        // Attestation hex that does not decode must not be surfaced as proof
        let body = r#"{"messages":[{"message":"0xdead","attestation":"0xzz"}]}"#;
        assert!(parse_status(body).is_err());
        // Attestation without a message is unusable
        let body = r#"{"messages":[{"attestation":"0x0102"}]}"#;
        assert!(parse_status(body).is_err());
    }

    #[test]
    fn test_decode_burn_message_roundtrip() {
        let sender = [3u8; 32];
        let recipient = [9u8; 32];
        let bytes = encode_burn_message(6, 5, 42, 1_500_000, &sender, &recipient);

        let decoded = decode_burn_message(&bytes).unwrap();
        assert_eq!(decoded.source_domain, 6);
        assert_eq!(decoded.destination_domain, 5);
        assert_eq!(decoded.nonce, 42);
        assert_eq!(decoded.amount, 1_500_000);
        assert_eq!(decoded.message_sender, sender);
        assert_eq!(decoded.mint_recipient, recipient);
    }

    #[test]
    fn test_decode_rejects_short_message() {
        assert!(decode_burn_message(&[0u8; 100]).is_err());
    }

    #[test]
    fn test_address_rendering() {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(&[0xab; 20]);
        assert_eq!(
            evm_address_from_bytes32(&word),
            format!("0x{}", "ab".repeat(20))
        );

        let sol = [7u8; 32];
        assert_eq!(
            solana_address_from_bytes32(&sol),
            bs58::encode([7u8; 32]).into_string()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_swallows_errors_until_budget_exhausted() {
        use crate::testing::MockAttestationSource;

        let source = MockAttestationSource::sequence(vec![
            Err(AttestationError::Transport("connection refused".to_string())),
            Err(AttestationError::Status(502)),
            Ok(AttestationStatus::NotFound),
        ]);
        let (_tx, mut rx) = watch::channel(false);

        let result = poll_for_proof(
            &source,
            6,
            "0xabc",
            Duration::from_secs(2),
            3,
            &mut rx,
        )
        .await;

        assert_eq!(result, PollResult::TimedOut);
        assert_eq!(source.fetch_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_stops_on_ready() {
        use crate::testing::MockAttestationSource;

        let proof = MessageProof {
            message: vec![1],
            attestation: vec![2],
        };
        let source = MockAttestationSource::sequence(vec![
            Ok(AttestationStatus::Pending { message: None }),
            Ok(AttestationStatus::Ready(proof.clone())),
        ]);
        let (_tx, mut rx) = watch::channel(false);

        let result = poll_for_proof(
            &source,
            6,
            "0xabc",
            Duration::from_secs(2),
            10,
            &mut rx,
        )
        .await;

        assert_eq!(result, PollResult::Ready(proof));
        assert_eq!(source.fetch_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_cancellation() {
        use crate::testing::MockAttestationSource;

        let source = MockAttestationSource::always(AttestationStatus::NotFound);
        let (tx, mut rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            poll_for_proof(
                &source,
                6,
                "0xabc",
                Duration::from_secs(2),
                1000,
                &mut rx,
            )
            .await
        });

        tokio::time::sleep(Duration::from_secs(5)).await;
        tx.send_replace(true);

        assert_eq!(handle.await.unwrap(), PollResult::Cancelled);
    }
}
