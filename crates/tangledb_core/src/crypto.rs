//! Signing keypairs and signature verification.

use crate::error::{CoreError, CoreResult};
use crate::protocol::SIGNING_KEY_BYTES;
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;

/// An ed25519 keypair used to sign message metadata.
pub struct Keypair {
    signing: SigningKey,
}

impl Keypair {
    /// Generates a fresh keypair from the OS entropy source.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::generate(&mut OsRng),
        }
    }

    /// Builds a keypair from a 32-byte seed. Deterministic; used for tests
    /// and key restoration.
    #[must_use]
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing: SigningKey::from_bytes(seed),
        }
    }

    /// Returns the base58-encoded public key.
    #[must_use]
    pub fn public_key(&self) -> String {
        bs58::encode(self.signing.verifying_key().to_bytes()).into_string()
    }

    /// Signs `bytes`, returning a base58-encoded signature.
    #[must_use]
    pub fn sign(&self, bytes: &[u8]) -> String {
        bs58::encode(self.signing.sign(bytes).to_bytes()).into_string()
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

/// Decodes a base58 public key into its raw bytes.
///
/// # Errors
///
/// Returns a crypto error if the encoding is invalid or the length is wrong.
pub fn decode_public_key(key: &str) -> CoreResult<[u8; SIGNING_KEY_BYTES]> {
    let bytes = bs58::decode(key)
        .into_vec()
        .map_err(|e| CoreError::crypto(format!("bad key encoding: {e}")))?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| CoreError::crypto(format!("bad key length: {}", bytes.len())))
}

/// Verifies a base58 signature over `bytes` with a base58 public key.
///
/// Returns `false` for a signature that does not verify; malformed keys or
/// signatures are errors rather than verification failures.
///
/// # Errors
///
/// Returns a crypto error if the key or signature cannot be decoded.
pub fn verify(public_key: &str, bytes: &[u8], signature: &str) -> CoreResult<bool> {
    let key_bytes = decode_public_key(public_key)?;
    let key = VerifyingKey::from_bytes(&key_bytes)
        .map_err(|e| CoreError::crypto(format!("bad public key: {e}")))?;

    let sig_bytes: [u8; 64] = bs58::decode(signature)
        .into_vec()
        .map_err(|e| CoreError::crypto(format!("bad signature encoding: {e}")))?
        .as_slice()
        .try_into()
        .map_err(|_| CoreError::crypto("bad signature length"))?;
    let sig = Signature::from_bytes(&sig_bytes);

    Ok(key.verify_strict(bytes, &sig).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify() {
        let keypair = Keypair::generate();
        let sig = keypair.sign(b"canonical metadata");

        assert!(verify(&keypair.public_key(), b"canonical metadata", &sig).unwrap());
        assert!(!verify(&keypair.public_key(), b"tampered", &sig).unwrap());
    }

    #[test]
    fn wrong_key_does_not_verify() {
        let signer = Keypair::generate();
        let other = Keypair::generate();
        let sig = signer.sign(b"data");

        assert!(!verify(&other.public_key(), b"data", &sig).unwrap());
    }

    #[test]
    fn seed_is_deterministic() {
        let a = Keypair::from_seed(&[7u8; 32]);
        let b = Keypair::from_seed(&[7u8; 32]);
        assert_eq!(a.public_key(), b.public_key());
        assert_eq!(a.sign(b"x"), b.sign(b"x"));
    }

    #[test]
    fn malformed_key_is_an_error() {
        assert!(decode_public_key("not!base58").is_err());
        assert!(decode_public_key("abc").is_err());
        assert!(verify("abc", b"data", "alsoabc").is_err());
    }
}
