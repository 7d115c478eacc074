//! Ethereum wallet signature recovery
//!
//! Recovers the signing address from `personal_sign` signatures produced by
//! EVM wallets (MetaMask and friends).

use alloy_primitives::{eip191_hash_message, keccak256};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use thiserror::Error;

/// Length of an `r || s || v` signature in bytes
const SIGNATURE_LENGTH: usize = 65;

/// Errors that can occur during signature recovery
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Invalid wallet address format: {0}")]
    InvalidAddressFormat(String),

    #[error("Invalid signature encoding: {0}")]
    InvalidSignatureEncoding(String),

    #[error("Invalid signature length: expected 65 bytes, got {0}")]
    InvalidSignatureLength(usize),

    #[error("Invalid recovery id: {0}")]
    InvalidRecoveryId(u8),

    #[error("Signature recovery failed")]
    RecoveryFailed,
}

/// Recover the address that signed `message`
///
/// The message is hashed with the EIP-191 `personal_sign` prefix
/// (`"\x19Ethereum Signed Message:\n" + len + message`) before recovery,
/// matching what wallets sign.
///
/// # Arguments
/// * `message` - The exact text the wallet was asked to sign
/// * `signature` - Hex-encoded 65-byte `r || s || v` signature, `0x` optional
///
/// # Returns
/// * `Ok(String)` - Lowercase `0x`-prefixed signer address
/// * `Err(CryptoError)` - If the signature is malformed or recovery fails
pub fn recover_signer(message: &str, signature: &str) -> Result<String, CryptoError> {
    let bytes = decode_signature(signature)?;

    let signature = Signature::from_slice(&bytes[..64])
        .map_err(|e| CryptoError::InvalidSignatureEncoding(e.to_string()))?;

    let recovery_id = parse_recovery_id(bytes[64])?;

    let prehash = eip191_hash_message(message.as_bytes());

    let verifying_key =
        VerifyingKey::recover_from_prehash(prehash.as_slice(), &signature, recovery_id)
            .map_err(|_| CryptoError::RecoveryFailed)?;

    Ok(address_from_verifying_key(&verifying_key))
}

/// Derive the lowercase address of a secp256k1 public key
pub fn address_from_verifying_key(key: &VerifyingKey) -> String {
    let point = key.to_encoded_point(false);
    // Uncompressed SEC1 points carry a leading 0x04 tag byte
    let hash = keccak256(&point.as_bytes()[1..]);
    format!("0x{}", hex::encode(&hash.as_slice()[12..]))
}

/// Compare two addresses ignoring hex case
pub fn addresses_match(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Validate and normalize a wallet address to lowercase `0x` form
pub fn normalize_address(address: &str) -> Result<String, CryptoError> {
    let address = address.trim();
    let hex_part = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .ok_or_else(|| {
            CryptoError::InvalidAddressFormat("address must start with 0x".to_string())
        })?;

    if hex_part.len() != 40 {
        return Err(CryptoError::InvalidAddressFormat(format!(
            "expected 40 hex digits, got {}",
            hex_part.len()
        )));
    }

    if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(CryptoError::InvalidAddressFormat(
            "address contains non-hex characters".to_string(),
        ));
    }

    Ok(format!("0x{}", hex_part.to_ascii_lowercase()))
}

/// Shorten an address to `0x1234...abcd` for display
pub fn short_address(address: &str) -> String {
    if address.len() <= 10 {
        return address.to_string();
    }
    format!("{}...{}", &address[..6], &address[address.len() - 4..])
}

fn decode_signature(signature: &str) -> Result<[u8; SIGNATURE_LENGTH], CryptoError> {
    let trimmed = signature.trim();
    let hex_part = trimmed.strip_prefix("0x").unwrap_or(trimmed);

    let bytes =
        hex::decode(hex_part).map_err(|e| CryptoError::InvalidSignatureEncoding(e.to_string()))?;

    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| CryptoError::InvalidSignatureLength(len))
}

/// Wallets emit `v` as 27/28, some libraries as 0/1
fn parse_recovery_id(v: u8) -> Result<RecoveryId, CryptoError> {
    let normalized = match v {
        27 | 28 => v - 27,
        0 | 1 => v,
        _ => return Err(CryptoError::InvalidRecoveryId(v)),
    };

    RecoveryId::from_byte(normalized).ok_or(CryptoError::InvalidRecoveryId(v))
}
