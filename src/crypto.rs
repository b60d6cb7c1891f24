//! Cryptographic primitives for Rustorium
//!
//! Signing is exposed as a pair of capabilities, [`Signer`] and [`Verifier`],
//! so the ledger never depends on a concrete scheme. The bundled
//! implementation is secp256k1 ECDSA over SHA-256 digests.

use crate::error::ChainError;
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use secp256k1::{
    constants::{COMPACT_SIGNATURE_SIZE, PUBLIC_KEY_SIZE, SECRET_KEY_SIZE},
    ecdsa, All, Message, PublicKey, Secp256k1, SecretKey,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A thread-safe, lazily initialized Secp256k1 context.
static SECP256K1_CONTEXT: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

/// Account addresses are `0x`-prefixed hex strings.
pub type Address = String;

/// Number of hex characters in a derived address (20 bytes).
pub const ADDRESS_HEX_LEN: usize = 40;

/// Reserved sender of reward transactions. No account may spend from it.
pub const SYSTEM_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Derives an address from arbitrary key material: the first 20 bytes of its SHA-256 digest.
pub fn address_from_bytes(bytes: &[u8]) -> Address {
    let digest = Sha256::digest(bytes);
    format!("0x{}", &hex::encode(digest)[..ADDRESS_HEX_LEN])
}

/// Derives the address owning a compressed secp256k1 public key.
pub fn address_from_public_key(public_key: &[u8]) -> Address {
    address_from_bytes(public_key)
}

/// A detached signature together with the public key that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub public_key: Vec<u8>,
    pub bytes: Vec<u8>,
}

impl Signature {
    /// Address of the key that produced this signature.
    pub fn signer_address(&self) -> Address {
        address_from_public_key(&self.public_key)
    }
}

/// Anything that can authorize a message on behalf of an address.
pub trait Signer {
    fn address(&self) -> Address;
    fn sign(&self, message: &[u8]) -> Result<Signature, ChainError>;
}

/// Checks a detached signature over a message.
pub trait Verifier: Send + Sync {
    fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), ChainError>;
}

#[derive(Debug, Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generates a new random KeyPair using the OS random number generator.
    pub fn generate() -> Result<Self, ChainError> {
        let secret_key = SecretKey::new(&mut OsRng);
        Ok(Self::from_secret_key(secret_key))
    }

    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let public_key = PublicKey::from_secret_key(&SECP256K1_CONTEXT, &secret_key);
        KeyPair {
            secret_key,
            public_key,
        }
    }

    /// Creates a KeyPair from raw secret key bytes.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, ChainError> {
        let secret_key = SecretKey::from_slice(bytes).map_err(|e| {
            if bytes.len() != SECRET_KEY_SIZE {
                ChainError::CryptoError(format!(
                    "Secret key must be {} bytes, got {}",
                    SECRET_KEY_SIZE,
                    bytes.len()
                ))
            } else {
                ChainError::CryptoError(format!("Invalid secret key bytes: {}", e))
            }
        })?;

        Ok(Self::from_secret_key(secret_key))
    }

    /// Parses a `0x`-prefixed (or bare) hex secret key.
    pub fn from_secret_hex(secret_hex: &str) -> Result<Self, ChainError> {
        let trimmed = secret_hex.strip_prefix("0x").unwrap_or(secret_hex);
        let bytes = hex::decode(trimmed)
            .map_err(|e| ChainError::CryptoError(format!("Invalid hex secret key: {}", e)))?;
        Self::from_secret_bytes(&bytes)
    }

    pub fn public_key_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.public_key.serialize()
    }

    /// The secret key as a `0x`-prefixed hex credential.
    pub fn secret_hex(&self) -> String {
        format!("0x{}", hex::encode(self.secret_key.secret_bytes()))
    }
}

impl Signer for KeyPair {
    fn address(&self) -> Address {
        address_from_public_key(&self.public_key_bytes())
    }

    /// Signs the SHA-256 digest of `message` and returns a compact signature.
    fn sign(&self, message: &[u8]) -> Result<Signature, ChainError> {
        let digest = Sha256::digest(message);
        let message = Message::from_digest_slice(&digest)
            .map_err(|e| ChainError::CryptoError(format!("Failed to create message: {}", e)))?;

        let signature = SECP256K1_CONTEXT.sign_ecdsa(&message, &self.secret_key);

        Ok(Signature {
            public_key: self.public_key_bytes().to_vec(),
            bytes: signature.serialize_compact().to_vec(),
        })
    }
}

/// secp256k1 ECDSA over SHA-256 digests.
#[derive(Debug, Clone, Copy, Default)]
pub struct Secp256k1Verifier;

impl Verifier for Secp256k1Verifier {
    fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), ChainError> {
        verify_signature(&signature.public_key, message, &signature.bytes)
    }
}

/// Verifies an ECDSA signature given the raw public key bytes, message, and signature bytes.
pub fn verify_signature(
    public_key_bytes: &[u8],
    message: &[u8],
    signature_bytes: &[u8],
) -> Result<(), ChainError> {
    if public_key_bytes.len() != PUBLIC_KEY_SIZE {
        return Err(ChainError::CryptoError(format!(
            "Public key must be exactly {} bytes (compressed), got {}",
            PUBLIC_KEY_SIZE,
            public_key_bytes.len()
        )));
    }
    if signature_bytes.len() != COMPACT_SIGNATURE_SIZE {
        return Err(ChainError::CryptoError(format!(
            "Signature must be exactly {} bytes (compact), got {}",
            COMPACT_SIGNATURE_SIZE,
            signature_bytes.len()
        )));
    }

    let public_key = PublicKey::from_slice(public_key_bytes)
        .map_err(|e| ChainError::CryptoError(format!("Invalid public key: {}", e)))?;

    let digest = Sha256::digest(message);
    let message = Message::from_digest_slice(&digest)
        .map_err(|e| ChainError::CryptoError(format!("Failed to create message: {}", e)))?;

    let signature = ecdsa::Signature::from_compact(signature_bytes)
        .map_err(|e| ChainError::CryptoError(format!("Invalid signature: {}", e)))?;

    SECP256K1_CONTEXT
        .verify_ecdsa(&message, &signature, &public_key)
        .map_err(|_| ChainError::CryptoError("Signature verification failed".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_format() {
        let keypair = KeyPair::generate().unwrap();
        let address = keypair.address();
        assert!(address.starts_with("0x"));
        assert_eq!(address.len(), 2 + ADDRESS_HEX_LEN);
        assert!(address[2..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_secret_hex_round_trip_keeps_address() {
        let keypair = KeyPair::generate().unwrap();
        let restored = KeyPair::from_secret_hex(&keypair.secret_hex()).unwrap();
        assert_eq!(keypair.address(), restored.address());
    }

    #[test]
    fn test_signing_and_verification() {
        let keypair = KeyPair::generate().unwrap();
        let message = b"Hello, Rustorium!";

        let signature = keypair.sign(message).unwrap();
        assert_eq!(signature.bytes.len(), COMPACT_SIGNATURE_SIZE);
        assert_eq!(signature.signer_address(), keypair.address());
        assert!(Secp256k1Verifier.verify(message, &signature).is_ok());
    }

    #[test]
    fn test_signature_from_other_key_fails() {
        let keypair1 = KeyPair::generate().unwrap();
        let keypair2 = KeyPair::generate().unwrap();

        let mut signature = keypair1.sign(b"Test message").unwrap();
        signature.public_key = keypair2.public_key_bytes().to_vec();

        let result = Secp256k1Verifier.verify(b"Test message", &signature);
        assert_eq!(
            result.unwrap_err().to_string(),
            "Cryptographic error: Signature verification failed"
        );
    }

    #[test]
    fn test_tampered_message() {
        let keypair = KeyPair::generate().unwrap();
        let signature = keypair.sign(b"Original message").unwrap();
        assert!(Secp256k1Verifier
            .verify(b"Tampered message", &signature)
            .is_err());
    }

    #[test]
    fn test_invalid_key_or_sig_length_check() {
        let keypair = KeyPair::generate().unwrap();
        let signature = keypair.sign(b"Test").unwrap();
        let pubkey_bytes = keypair.public_key_bytes();

        let result = verify_signature(&pubkey_bytes[1..], b"Test", &signature.bytes);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Public key must be exactly"));

        let result = verify_signature(&pubkey_bytes, b"Test", &signature.bytes[1..]);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Signature must be exactly"));
    }

    #[test]
    fn test_from_secret_bytes_invalid_length() {
        let short_bytes = [0u8; SECRET_KEY_SIZE - 1];
        let result = KeyPair::from_secret_bytes(&short_bytes);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Secret key must be"));
    }
}
