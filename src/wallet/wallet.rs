use crate::error::{BlockchainError, Result};
use crate::utils::{
    base58check_decode, base58check_encode, new_secret_key, ripemd160_digest, sha256_digest,
};
use secp256k1::{PublicKey, Secp256k1, SecretKey};

const VERSION: u8 = 0x00;
const WIF_VERSION: u8 = 0x80;
const WIF_COMPRESSED_SUFFIX: u8 = 0x01;
const SECRET_KEY_LEN: usize = 32;
const PUB_KEY_HASH_LEN: usize = 20;
pub const ADDRESS_CHECK_SUM_LEN: usize = 4;

/// A secp256k1 key pair. Addresses are always derived from the compressed
/// public key, which is also what signature recovery checks against.
#[derive(Clone)]
pub struct Wallet {
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl Wallet {
    pub fn new() -> Wallet {
        Self::from_secret_key(new_secret_key())
    }

    pub fn from_secret_key(secret_key: SecretKey) -> Wallet {
        let public_key = PublicKey::from_secret_key(&Secp256k1::signing_only(), &secret_key);
        Wallet {
            secret_key,
            public_key,
        }
    }

    /// Imports a WIF-encoded private key. Both the compressed (`...01` suffix)
    /// and the legacy uncompressed payloads are accepted.
    pub fn from_wif(wif: &str) -> Result<Wallet> {
        let payload = base58check_decode(wif)
            .map_err(|e| BlockchainError::Crypto(format!("Invalid WIF key: {e}")))?;

        let key_bytes = match payload.as_slice() {
            [WIF_VERSION, key @ ..] if key.len() == SECRET_KEY_LEN => key,
            [WIF_VERSION, key @ .., WIF_COMPRESSED_SUFFIX] if key.len() == SECRET_KEY_LEN => key,
            _ => {
                return Err(BlockchainError::Crypto(
                    "Invalid WIF key: unexpected version or length".to_string(),
                ))
            }
        };

        let secret_key = SecretKey::from_slice(key_bytes)?;
        Ok(Self::from_secret_key(secret_key))
    }

    /// Exports the private key as compressed WIF.
    pub fn to_wif(&self) -> String {
        let mut payload = Vec::with_capacity(SECRET_KEY_LEN + 2);
        payload.push(WIF_VERSION);
        payload.extend_from_slice(&self.secret_key.secret_bytes());
        payload.push(WIF_COMPRESSED_SUFFIX);
        base58check_encode(payload.as_slice())
    }

    pub fn get_address(&self) -> String {
        address_from_public_key(&self.public_key)
    }

    pub fn get_public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn get_secret_key(&self) -> &SecretKey {
        &self.secret_key
    }
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.get_address())
            .finish()
    }
}

pub fn hash_pub_key(pub_key: &[u8]) -> Vec<u8> {
    let pub_key_sha256 = sha256_digest(pub_key);
    ripemd160_digest(pub_key_sha256.as_slice())
}

pub fn convert_address(pub_hash_key: &[u8]) -> String {
    let mut payload: Vec<u8> = vec![];
    payload.push(VERSION);
    payload.extend(pub_hash_key);
    // version + pub_key_hash + checksum
    base58check_encode(payload.as_slice())
}

pub fn address_from_public_key(public_key: &PublicKey) -> String {
    convert_address(hash_pub_key(&public_key.serialize()).as_slice())
}

pub fn validate_address(address: &str) -> bool {
    match base58check_decode(address) {
        Ok(payload) => payload.len() == PUB_KEY_HASH_LEN + 1 && payload[0] == VERSION,
        Err(_) => false,
    }
}
