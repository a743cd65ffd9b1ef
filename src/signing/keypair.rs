use crate::error::{Result, TapfleetError};
use ed25519_dalek::{Signer, SigningKey};
use zeroize::Zeroize;

/// Length of an encoded secret key: 32 byte seed followed by the 32 byte public key
pub const SECRET_KEY_LEN: usize = 64;

/// Ed25519 keypair addressed by its base58 public key
///
/// # Security
/// Raw secret bytes handed to the constructors are zeroized once the signing key
/// has been derived. `Debug` never prints secret material.
#[derive(Clone)]
pub struct Keypair {
    inner: SigningKey,
    address: String,
}

impl Keypair {
    /// Create a keypair from a base58 encoded 64 byte secret key
    pub fn from_base58(encoded: &str) -> Result<Self> {
        let mut bytes = bs58::decode(encoded.trim())
            .into_vec()
            .map_err(|e| TapfleetError::Keypair(format!("Invalid base58 secret: {}", e)))?;

        let result = Self::from_secret_bytes(&bytes);
        bytes.zeroize();
        result
    }

    /// Create a keypair from raw secret bytes (seed + public key)
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SECRET_KEY_LEN {
            return Err(TapfleetError::Keypair(format!(
                "Invalid secret key length: {}. Expected {} bytes.",
                bytes.len(),
                SECRET_KEY_LEN
            )));
        }

        let mut fixed = [0u8; SECRET_KEY_LEN];
        fixed.copy_from_slice(bytes);
        let inner = SigningKey::from_keypair_bytes(&fixed)
            .map_err(|e| TapfleetError::Keypair(format!("Inconsistent keypair bytes: {}", e)));
        fixed.zeroize();
        let inner = inner?;

        let address = bs58::encode(inner.verifying_key().as_bytes()).into_string();
        Ok(Self { inner, address })
    }

    /// Generate a fresh random keypair
    pub fn generate() -> Self {
        let seed: [u8; 32] = rand::random();
        let inner = SigningKey::from_bytes(&seed);
        let address = bs58::encode(inner.verifying_key().as_bytes()).into_string();
        Self { inner, address }
    }

    /// Base58 public address
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Full 64 byte secret (seed + public key), as persisted in the credential file
    pub fn secret_bytes(&self) -> [u8; SECRET_KEY_LEN] {
        self.inner.to_keypair_bytes()
    }

    /// Base58 encoding of the full 64 byte secret
    pub fn to_base58(&self) -> String {
        let mut bytes = self.secret_bytes();
        let encoded = bs58::encode(&bytes).into_string();
        bytes.zeroize();
        encoded
    }

    /// Detached signature over an arbitrary message, base58 encoded
    pub fn sign_base58(&self, message: &[u8]) -> String {
        let signature = self.inner.sign(message);
        bs58::encode(signature.to_bytes()).into_string()
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("address", &self.address)
            .finish()
    }
}

impl PartialEq for Keypair {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}
