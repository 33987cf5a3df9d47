//! HMAC-SHA256 signing keys and signatures.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;

use crate::compare::constant_time_eq;
use crate::error::{CryptoError, CryptoResult};

type HmacSha256 = Hmac<Sha256>;

/// A process-wide HMAC-SHA256 signing key.
///
/// Key material never appears in `Debug` output.
#[derive(Clone)]
pub struct SigningKey {
    key: Vec<u8>,
}

impl SigningKey {
    /// Minimum accepted key length in bytes.
    pub const MIN_LEN: usize = 32;

    /// Create a signing key from raw material.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::KeyTooShort`] if the material is under
    /// [`Self::MIN_LEN`] bytes.
    pub fn new(material: impl Into<Vec<u8>>) -> CryptoResult<Self> {
        let key = material.into();
        if key.len() < Self::MIN_LEN {
            return Err(CryptoError::KeyTooShort {
                len: key.len(),
                min: Self::MIN_LEN,
            });
        }
        Ok(Self { key })
    }

    /// Sign a message, producing an HMAC-SHA256 signature.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> HmacSignature {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("HMAC accepts any key length");
        mac.update(message);
        let bytes: [u8; 32] = mac.finalize().into_bytes().into();
        HmacSignature(bytes)
    }

    /// Verify a signature over a message in constant time.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::SignatureMismatch`] if verification fails.
    pub fn verify(&self, message: &[u8], signature: &HmacSignature) -> CryptoResult<()> {
        let expected = self.sign(message);
        if constant_time_eq(&expected.0, &signature.0) {
            Ok(())
        } else {
            Err(CryptoError::SignatureMismatch)
        }
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("len", &self.key.len())
            .finish_non_exhaustive()
    }
}

/// An HMAC-SHA256 signature (32 bytes), rendered as lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct HmacSignature([u8; 32]);

impl HmacSignature {
    /// Get the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Create from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Encode as a lowercase hex string.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Decode from a hex string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid hex or not 32 bytes.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for HmacSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HmacSignature({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for HmacSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for HmacSignature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for HmacSignature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> SigningKey {
        SigningKey::new(vec![7u8; 32]).unwrap()
    }

    #[test]
    fn test_sign_verify_round_trip() {
        let key = test_key();
        let sig = key.sign(b"message");
        assert!(key.verify(b"message", &sig).is_ok());
        assert!(key.verify(b"tampered", &sig).is_err());
    }

    #[test]
    fn test_different_keys_differ() {
        let a = SigningKey::new(vec![1u8; 32]).unwrap();
        let b = SigningKey::new(vec![2u8; 32]).unwrap();
        assert_ne!(a.sign(b"msg"), b.sign(b"msg"));
    }

    #[test]
    fn test_short_key_rejected() {
        assert!(matches!(
            SigningKey::new(vec![0u8; 16]),
            Err(CryptoError::KeyTooShort { len: 16, min: 32 })
        ));
    }

    #[test]
    fn test_hex_round_trip() {
        let sig = test_key().sign(b"x");
        assert_eq!(HmacSignature::from_hex(&sig.to_hex()).unwrap(), sig);
    }
}
