//! SSH public keys and `SSHSIG` signatures.
//!
//! Only `ssh-ed25519` keys are verified here; other key types are rejected
//! and simply fail to match.

use base64::{
    engine::general_purpose::{STANDARD as BASE64, STANDARD_NO_PAD as BASE64_NO_PAD},
    Engine,
};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use sha2::{Digest, Sha256, Sha512};
use tracing::debug;

use crate::armor;
use crate::backend::SshVerifier;
use crate::error::{TrustError, TrustResult};

const SIGNATURE_LABEL: &str = "SSH SIGNATURE";
const MAGIC: &[u8] = b"SSHSIG";
const ED25519: &str = "ssh-ed25519";

/// Namespace git uses when signing commits.
pub const GIT_NAMESPACE: &str = "git";

/// Parsed authorized-keys line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshPublicKey {
    pub algorithm: String,
    /// Wire-format key blob.
    pub blob: Vec<u8>,
    pub comment: Option<String>,
}

fn key_error(reason: impl Into<String>) -> TrustError {
    TrustError::SshKey {
        reason: reason.into(),
    }
}

fn sig_error(reason: impl Into<String>) -> TrustError {
    TrustError::SshSignature {
        reason: reason.into(),
    }
}

/// Parse `ssh-ed25519 AAAA... comment`.
pub fn parse_public_key(content: &str) -> TrustResult<SshPublicKey> {
    let mut fields = content.split_whitespace();
    let algorithm = fields.next().ok_or_else(|| key_error("empty key"))?;
    let encoded = fields.next().ok_or_else(|| key_error("missing key data"))?;
    let comment = fields.collect::<Vec<_>>().join(" ");

    let blob = BASE64
        .decode(encoded)
        .map_err(|e| key_error(format!("invalid base64 key data: {}", e)))?;
    let embedded = Reader::new(&blob)
        .string()
        .map_err(|_| key_error("truncated key blob"))?;
    if embedded != algorithm.as_bytes() {
        return Err(key_error(format!(
            "key type mismatch: line says {}, blob says {}",
            algorithm,
            String::from_utf8_lossy(embedded)
        )));
    }

    Ok(SshPublicKey {
        algorithm: algorithm.to_string(),
        blob,
        comment: (!comment.is_empty()).then_some(comment),
    })
}

/// OpenSSH style fingerprint: `SHA256:` + unpadded base64 of the blob digest.
pub fn fingerprint(content: &str) -> TrustResult<String> {
    let key = parse_public_key(content)?;
    Ok(format!(
        "SHA256:{}",
        BASE64_NO_PAD.encode(Sha256::digest(&key.blob).to_vec())
    ))
}

/// Verify an armored `SSHSIG` signature over `payload`.
pub fn verify_sshsig(
    signature: &str,
    payload: &[u8],
    public_key: &str,
    namespace: &str,
) -> TrustResult<()> {
    let expected = parse_public_key(public_key)?;
    let blob = armor::decode(signature, SIGNATURE_LABEL)?;

    let mut reader = Reader::new(&blob);
    if reader.take(MAGIC.len())? != MAGIC {
        return Err(sig_error("missing SSHSIG magic"));
    }
    let version = reader.u32()?;
    if version != 1 {
        return Err(sig_error(format!("unsupported version {}", version)));
    }
    let signer_key = reader.string()?;
    let sig_namespace = reader.string()?;
    let reserved = reader.string()?;
    let hash_algorithm = reader.string()?;
    let sig_blob = reader.string()?;

    if signer_key != expected.blob.as_slice() {
        return Err(sig_error("signature was made by a different key"));
    }
    if sig_namespace != namespace.as_bytes() {
        return Err(sig_error(format!(
            "namespace mismatch: expected {}, got {}",
            namespace,
            String::from_utf8_lossy(sig_namespace)
        )));
    }

    let digest = match hash_algorithm {
        b"sha256" => Sha256::digest(payload).to_vec(),
        b"sha512" => Sha512::digest(payload).to_vec(),
        other => {
            return Err(sig_error(format!(
                "unsupported hash algorithm {}",
                String::from_utf8_lossy(other)
            )))
        }
    };

    let mut signed = MAGIC.to_vec();
    put_string(&mut signed, sig_namespace);
    put_string(&mut signed, reserved);
    put_string(&mut signed, hash_algorithm);
    put_string(&mut signed, &digest);

    let mut sig_reader = Reader::new(sig_blob);
    let sig_type = sig_reader.string()?;
    let raw_sig = sig_reader.string()?;
    if expected.algorithm != ED25519 || sig_type != ED25519.as_bytes() {
        return Err(sig_error(format!(
            "unsupported key type {}",
            expected.algorithm
        )));
    }

    let mut key_reader = Reader::new(&expected.blob);
    key_reader.string()?;
    let key_bytes: [u8; 32] = key_reader
        .string()?
        .try_into()
        .map_err(|_| key_error("ed25519 key must be 32 bytes"))?;
    let key = VerifyingKey::from_bytes(&key_bytes)
        .map_err(|e| key_error(format!("invalid ed25519 key: {}", e)))?;
    let sig = Signature::from_slice(raw_sig)
        .map_err(|e| sig_error(format!("invalid signature bytes: {}", e)))?;

    key.verify(&signed, &sig)
        .map_err(|_| sig_error("ed25519 verification failed"))
}

/// [`SshVerifier`] backed by [`verify_sshsig`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SshSigVerifier;

impl SshVerifier for SshSigVerifier {
    fn verify(&self, signature: &str, payload: &[u8], public_key: &str, namespace: &str) -> bool {
        match verify_sshsig(signature, payload, public_key, namespace) {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "ssh signature did not verify");
                false
            }
        }
    }
}

fn put_string(out: &mut Vec<u8>, data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(data);
}

struct Reader<'a> {
    data: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn take(&mut self, n: usize) -> TrustResult<&'a [u8]> {
        if self.data.len() < n {
            return Err(sig_error("truncated data"));
        }
        let (head, tail) = self.data.split_at(n);
        self.data = tail;
        Ok(head)
    }

    fn u32(&mut self) -> TrustResult<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn string(&mut self) -> TrustResult<&'a [u8]> {
        let len = self.u32()? as usize;
        self.take(len)
    }
}
