//! Pluggable payload encryption formats.
//!
//! Encrypted payloads travel as strings of the form `<base64>.<name>`,
//! where `name` selects the registered [`EncryptionFormat`] that produced
//! the ciphertext. The store itself never interprets ciphertext; it only
//! routes it to the right format for decryption.

use crate::error::{CoreError, CoreResult};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::collections::HashMap;

/// One encryption scheme, identified by a suffix name.
pub trait EncryptionFormat: Send + Sync {
    /// Suffix name carried on encrypted payload strings. Must be non-empty
    /// and contain no `.`.
    fn name(&self) -> &'static str;

    /// Encrypts `plaintext` with `key`.
    ///
    /// # Errors
    ///
    /// Fails on scheme-specific errors such as a wrong key length.
    fn encrypt(&self, plaintext: &[u8], key: &[u8]) -> CoreResult<Vec<u8>>;

    /// Decrypts `ciphertext` with `key`.
    ///
    /// # Errors
    ///
    /// Fails when the ciphertext does not authenticate under `key`.
    fn decrypt(&self, ciphertext: &[u8], key: &[u8]) -> CoreResult<Vec<u8>>;
}

/// Registry of encryption formats, looked up by suffix name.
#[derive(Default)]
pub struct EncryptionFormats {
    formats: HashMap<&'static str, Box<dyn EncryptionFormat>>,
}

impl EncryptionFormats {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a format under its own name, replacing any previous format
    /// of the same name.
    ///
    /// # Errors
    ///
    /// Fails if the format's name is empty or contains `.`.
    pub fn register(&mut self, format: Box<dyn EncryptionFormat>) -> CoreResult<()> {
        let name = format.name();
        if name.is_empty() || name.contains('.') {
            return Err(CoreError::crypto(format!(
                "invalid encryption format name: {name:?}"
            )));
        }
        self.formats.insert(name, format);
        Ok(())
    }

    /// Looks up a format by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn EncryptionFormat> {
        self.formats.get(name).map(Box::as_ref)
    }

    /// Encrypts `plaintext` with the named format, returning the
    /// `<base64>.<name>` payload string.
    ///
    /// # Errors
    ///
    /// Fails if the format is unregistered or encryption fails.
    pub fn encrypt(&self, name: &str, plaintext: &[u8], key: &[u8]) -> CoreResult<String> {
        let format = self
            .get(name)
            .ok_or_else(|| CoreError::crypto(format!("unknown encryption format: {name}")))?;
        let ciphertext = format.encrypt(plaintext, key)?;
        Ok(join_suffix(&BASE64.encode(ciphertext), name))
    }

    /// Decrypts a `<base64>.<name>` payload string.
    ///
    /// # Errors
    ///
    /// Fails if the string carries no format suffix, the format is
    /// unregistered, the base64 is malformed, or decryption fails.
    pub fn decrypt(&self, payload: &str, key: &[u8]) -> CoreResult<Vec<u8>> {
        let (encoded, name) = split_suffix(payload)
            .ok_or_else(|| CoreError::crypto(format!("payload has no format suffix: {payload}")))?;
        let format = self
            .get(name)
            .ok_or_else(|| CoreError::crypto(format!("unknown encryption format: {name}")))?;
        let ciphertext = BASE64
            .decode(encoded)
            .map_err(|e| CoreError::crypto(format!("bad ciphertext encoding: {e}")))?;
        format.decrypt(&ciphertext, key)
    }
}

/// Splits `<base64>.<name>` into `(base64, name)` at the last `.`.
#[must_use]
pub fn split_suffix(payload: &str) -> Option<(&str, &str)> {
    let (encoded, name) = payload.rsplit_once('.')?;
    if encoded.is_empty() || name.is_empty() {
        return None;
    }
    Some((encoded, name))
}

/// Joins a base64 ciphertext and a format name into a payload string.
#[must_use]
pub fn join_suffix(encoded: &str, name: &str) -> String {
    format!("{encoded}.{name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Keyed XOR; only good for exercising the registry plumbing.
    struct XorFormat;

    impl EncryptionFormat for XorFormat {
        fn name(&self) -> &'static str {
            "xor"
        }

        fn encrypt(&self, plaintext: &[u8], key: &[u8]) -> CoreResult<Vec<u8>> {
            if key.is_empty() {
                return Err(CoreError::crypto("empty key"));
            }
            Ok(plaintext
                .iter()
                .zip(key.iter().cycle())
                .map(|(p, k)| p ^ k)
                .collect())
        }

        fn decrypt(&self, ciphertext: &[u8], key: &[u8]) -> CoreResult<Vec<u8>> {
            self.encrypt(ciphertext, key)
        }
    }

    struct BadName;
    impl EncryptionFormat for BadName {
        fn name(&self) -> &'static str {
            "has.dot"
        }
        fn encrypt(&self, p: &[u8], _: &[u8]) -> CoreResult<Vec<u8>> {
            Ok(p.to_vec())
        }
        fn decrypt(&self, c: &[u8], _: &[u8]) -> CoreResult<Vec<u8>> {
            Ok(c.to_vec())
        }
    }

    #[test]
    fn encrypt_decrypt_roundtrip_through_registry() {
        let mut formats = EncryptionFormats::new();
        formats.register(Box::new(XorFormat)).unwrap();

        let payload = formats.encrypt("xor", b"secret message", b"key").unwrap();
        assert!(payload.ends_with(".xor"));
        assert_eq!(
            formats.decrypt(&payload, b"key").unwrap(),
            b"secret message"
        );
    }

    #[test]
    fn unknown_format_is_an_error() {
        let formats = EncryptionFormats::new();
        assert!(formats.encrypt("nacl", b"x", b"k").is_err());
        assert!(formats.decrypt("aGk=.nacl", b"k").is_err());
    }

    #[test]
    fn suffix_split_rules() {
        assert_eq!(split_suffix("aGk=.xor"), Some(("aGk=", "xor")));
        assert_eq!(split_suffix("a.b.xor"), Some(("a.b", "xor")));
        assert_eq!(split_suffix("nosuffix"), None);
        assert_eq!(split_suffix(".xor"), None);
        assert_eq!(split_suffix("aGk=."), None);
    }

    #[test]
    fn dotted_format_name_rejected() {
        let mut formats = EncryptionFormats::new();
        assert!(formats.register(Box::new(BadName)).is_err());
    }
}
