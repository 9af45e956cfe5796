//! Cryptographic verifier contracts.

use crate::error::TrustResult;
use crate::openpgp::GpgSignature;
use crate::types::GpgKey;

/// Which part of a key validated a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMatch {
    Primary,
    /// Index into [`GpgKey::subkeys`].
    Subkey(usize),
}

impl KeyMatch {
    /// The key record that matched.
    pub fn select<'a>(&self, key: &'a GpgKey) -> Option<&'a GpgKey> {
        match self {
            Self::Primary => Some(key),
            Self::Subkey(index) => key.subkeys.get(*index),
        }
    }
}

/// OpenPGP signature verification.
pub trait GpgBackend: Send + Sync {
    /// Verify `signature` over `payload` against the key or any of its
    /// subkeys that can sign.
    ///
    /// `Ok(None)` means no key part validated the signature; `Err` means the
    /// backend could not process the key or hash the payload.
    fn verify(
        &self,
        signature: &GpgSignature,
        payload: &[u8],
        key: &GpgKey,
        candidate_email: &str,
    ) -> TrustResult<Option<KeyMatch>>;

    /// Parse an armored public key block into primary keys with subkeys.
    fn parse_armored_keys(&self, armored: &str) -> TrustResult<Vec<GpgKey>>;
}

/// SSH signature verification.
pub trait SshVerifier: Send + Sync {
    /// Whether the armored SSH `signature` over `payload` was made by
    /// `public_key` (authorized-keys line) under `namespace`.
    fn verify(&self, signature: &str, payload: &[u8], public_key: &str, namespace: &str) -> bool;
}
