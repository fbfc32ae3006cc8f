use ring::digest::{Context, SHA256};
use ripemd::{Digest as RipemdDigest, Ripemd160};
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};

use crate::error::{BlockchainError, Result};
use std::time::{SystemTime, UNIX_EPOCH};

/// Length of a compact recoverable signature: header byte plus `r || s`.
pub const COMPACT_SIGNATURE_LEN: usize = 65;

const COMPACT_HEADER_BASE: u8 = 27;
const COMPACT_COMPRESSED_FLAG: u8 = 4;
const BASE58_CHECK_SUM_LEN: usize = 4;

pub fn current_timestamp() -> Result<i64> {
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| BlockchainError::Crypto(format!("System time error: {e}")))?
        .as_millis();

    if duration > i64::MAX as u128 {
        return Err(BlockchainError::Crypto("Timestamp overflow".to_string()));
    }

    Ok(duration as i64)
}

pub fn sha256_digest(data: &[u8]) -> Vec<u8> {
    let mut context = Context::new(&SHA256);
    context.update(data);
    let digest = context.finish();
    digest.as_ref().to_vec()
}

pub fn ripemd160_digest(data: &[u8]) -> Vec<u8> {
    let mut hasher = Ripemd160::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

pub fn base58_encode(data: &[u8]) -> String {
    bs58::encode(data).into_string()
}

pub fn base58_decode(data: &str) -> Result<Vec<u8>> {
    bs58::decode(data)
        .into_vec()
        .map_err(|e| BlockchainError::InvalidAddress(format!("Invalid base58 encoding: {e}")))
}

fn checksum(payload: &[u8]) -> Vec<u8> {
    let first_sha = sha256_digest(payload);
    let second_sha = sha256_digest(first_sha.as_slice());
    second_sha[0..BASE58_CHECK_SUM_LEN].to_vec()
}

/// Base58 with a trailing double-SHA-256 checksum (addresses and WIF keys).
pub fn base58check_encode(payload: &[u8]) -> String {
    let mut data = payload.to_vec();
    data.extend(checksum(payload));
    base58_encode(data.as_slice())
}

/// Decodes a Base58Check string and returns the payload without its checksum.
pub fn base58check_decode(data: &str) -> Result<Vec<u8>> {
    let decoded = base58_decode(data)?;
    if decoded.len() <= BASE58_CHECK_SUM_LEN {
        return Err(BlockchainError::InvalidAddress(format!(
            "Base58Check payload too short: {data}"
        )));
    }
    let (payload, actual) = decoded.split_at(decoded.len() - BASE58_CHECK_SUM_LEN);
    if checksum(payload) != actual {
        return Err(BlockchainError::InvalidAddress(format!(
            "Base58Check checksum mismatch: {data}"
        )));
    }
    Ok(payload.to_vec())
}

pub fn new_secret_key() -> SecretKey {
    SecretKey::new(&mut rand::thread_rng())
}

/// Signs `SHA-256(message)` and returns the 65-byte compact form
/// `[27 + recid (+4 if compressed)] || r || s`.
pub fn sign_compact(secret_key: &SecretKey, message: &[u8], compressed: bool) -> Result<Vec<u8>> {
    let secp = Secp256k1::signing_only();
    let digest = Message::from_digest_slice(sha256_digest(message).as_slice())?;
    let signature = secp.sign_ecdsa_recoverable(&digest, secret_key);
    let (recovery_id, rs) = signature.serialize_compact();

    let mut header = COMPACT_HEADER_BASE + recovery_id.to_i32() as u8;
    if compressed {
        header += COMPACT_COMPRESSED_FLAG;
    }

    let mut out = Vec::with_capacity(COMPACT_SIGNATURE_LEN);
    out.push(header);
    out.extend_from_slice(&rs);
    Ok(out)
}

/// Recovers the signing public key from a compact signature over `message`.
/// The returned flag tells whether the signer declared a compressed key.
pub fn recover_compact(signature: &[u8], message: &[u8]) -> Result<(PublicKey, bool)> {
    if signature.len() != COMPACT_SIGNATURE_LEN {
        return Err(BlockchainError::Crypto(format!(
            "Compact signature must be {COMPACT_SIGNATURE_LEN} bytes, got {}",
            signature.len()
        )));
    }

    let header = signature[0];
    if !(COMPACT_HEADER_BASE..COMPACT_HEADER_BASE + 8).contains(&header) {
        return Err(BlockchainError::Crypto(format!(
            "Invalid compact signature header: {header}"
        )));
    }
    let flags = header - COMPACT_HEADER_BASE;
    let compressed = flags & COMPACT_COMPRESSED_FLAG != 0;
    let recovery_id = RecoveryId::from_i32((flags & 3) as i32)?;

    let recoverable = RecoverableSignature::from_compact(&signature[1..], recovery_id)?;
    let digest = Message::from_digest_slice(sha256_digest(message).as_slice())?;
    let public_key = Secp256k1::verification_only().recover_ecdsa(&digest, &recoverable)?;
    Ok((public_key, compressed))
}
