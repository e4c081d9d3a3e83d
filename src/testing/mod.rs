//! Test support: scriptable collaborator mocks
//!
//! Used by this crate's own test suite and by hosts that want to exercise
//! their integration against the orchestrator without touching a chain or
//! the attestation service.

mod mock_attestation;
mod mock_chain;

pub use mock_attestation::MockAttestationSource;
pub use mock_chain::MockChainAdapter;

/// Build a syntactically valid wire message for tests: the fixed header
/// followed by a burn body (see `attestation::decode_burn_message` for the
/// layout).
pub fn encode_burn_message(
    source_domain: u32,
    destination_domain: u32,
    nonce: u64,
    amount: u128,
    message_sender: &[u8; 32],
    mint_recipient: &[u8; 32],
) -> Vec<u8> {
    let mut out = Vec::with_capacity(248);

    // Header
    out.extend_from_slice(&0u32.to_be_bytes()); // version
    out.extend_from_slice(&source_domain.to_be_bytes());
    out.extend_from_slice(&destination_domain.to_be_bytes());
    out.extend_from_slice(&nonce.to_be_bytes());
    out.extend_from_slice(&[0x11u8; 32]); // sender (source messenger)
    out.extend_from_slice(&[0x22u8; 32]); // recipient (destination messenger)
    out.extend_from_slice(&[0u8; 32]); // destination caller (anyone)

    // Burn body
    out.extend_from_slice(&0u32.to_be_bytes()); // body version
    out.extend_from_slice(&[0x33u8; 32]); // burn token
    out.extend_from_slice(mint_recipient);
    let mut amount_word = [0u8; 32];
    amount_word[16..].copy_from_slice(&amount.to_be_bytes());
    out.extend_from_slice(&amount_word);
    out.extend_from_slice(message_sender);

    out
}
