//! Shared fixtures for the resolution tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use commit_trust::{
    armor, Account, Commit, CommitSignature, CommitVerifier, GpgBackend, GpgKey, GpgSignature,
    KeyEmail, KeyMatch, MemoryTrustStore, RepositoryRef, Signature, SigningConfig,
    StaticSigningProvider, TrustError, TrustResult,
};
use ed25519_dalek::{Signer, SigningKey};
use sha2::{Digest, Sha512};

pub const PAYLOAD: &[u8] = b"tree 4b825dc642cb6eb9a060e54bf8d69288fbee4904\n\
author Jane Doe <jane@example.com> 1700000000 +0000\n\
committer Jane Doe <jane@example.com> 1700000000 +0000\n\
\n\
Initial commit\n";

pub const JANE_EMAIL: &str = "jane@example.com";
pub const REPOSITORY: &str = "jane/project";

/// GPG backend that accepts signatures made by a fixed set of key ids.
///
/// A key part "verifies" when it can sign, its id is in the accepted set and
/// the payload is [`PAYLOAD`].
#[derive(Debug, Default)]
pub struct ScriptedGpgBackend {
    accepted: HashSet<String>,
    armored: HashMap<String, Vec<GpgKey>>,
    broken: bool,
}

impl ScriptedGpgBackend {
    pub fn accepting(key_ids: &[&str]) -> Self {
        Self {
            accepted: key_ids.iter().map(|id| id.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Backend that fails to process any key.
    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::default()
        }
    }

    pub fn with_armored_key(mut self, armored: &str, keys: Vec<GpgKey>) -> Self {
        self.armored.insert(armored.to_string(), keys);
        self
    }

    fn accepts(&self, key: &GpgKey) -> bool {
        key.can_sign && self.accepted.contains(&key.key_id)
    }
}

impl GpgBackend for ScriptedGpgBackend {
    fn verify(
        &self,
        _signature: &GpgSignature,
        payload: &[u8],
        key: &GpgKey,
        _candidate_email: &str,
    ) -> TrustResult<Option<KeyMatch>> {
        if self.broken {
            return Err(TrustError::backend("hash failure"));
        }
        if payload != PAYLOAD {
            return Ok(None);
        }
        if self.accepts(key) {
            return Ok(Some(KeyMatch::Primary));
        }
        Ok(key
            .subkeys
            .iter()
            .position(|sub| self.accepts(sub))
            .map(KeyMatch::Subkey))
    }

    fn parse_armored_keys(&self, armored: &str) -> TrustResult<Vec<GpgKey>> {
        self.armored
            .get(armored)
            .cloned()
            .ok_or_else(|| TrustError::backend("malformed armored key"))
    }
}

/// Armored v4 signature naming `key_id` as issuer (or no issuer).
pub fn gpg_signature(key_id: Option<&str>) -> String {
    let mut hashed = vec![5, 2, 0x65, 0x00, 0x00, 0x00];
    if let Some(key_id) = key_id {
        let raw = hex_decode(key_id);
        hashed.push(9);
        hashed.push(16);
        hashed.extend_from_slice(&raw);
    }

    let mut body = vec![4, 0x00, 22, 8];
    body.extend_from_slice(&(hashed.len() as u16).to_be_bytes());
    body.extend_from_slice(&hashed);
    body.extend_from_slice(&[0, 0]);
    body.extend_from_slice(&[0x12, 0x34, 0x00, 0x08, 0xFF]);

    let mut packet = vec![0xC2, body.len() as u8];
    packet.extend_from_slice(&body);
    armor::encode(&packet, "PGP SIGNATURE", true)
}

fn hex_decode(s: &str) -> Vec<u8> {
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
        .collect()
}

/// Stored primary key with activated emails.
pub fn gpg_key(id: i64, owner: Option<i64>, key_id: &str, emails: &[&str]) -> GpgKey {
    GpgKey {
        id,
        owner_id: owner,
        key_id: key_id.to_string(),
        can_sign: true,
        emails: emails.iter().map(|e| KeyEmail::activated(*e)).collect(),
        ..GpgKey::default()
    }
}

/// Deterministic ed25519 signer producing `SSHSIG` signatures.
pub struct SshSigner {
    key: SigningKey,
}

impl SshSigner {
    pub fn new(seed: u8) -> Self {
        Self {
            key: SigningKey::from_bytes(&[seed; 32]),
        }
    }

    fn key_blob(&self) -> Vec<u8> {
        let mut blob = Vec::new();
        put_string(&mut blob, b"ssh-ed25519");
        put_string(&mut blob, self.key.verifying_key().as_bytes());
        blob
    }

    /// Authorized-keys line.
    pub fn public_key(&self) -> String {
        format!("ssh-ed25519 {} jane@laptop", BASE64.encode(self.key_blob()))
    }

    pub fn sign(&self, payload: &[u8]) -> String {
        let namespace = b"git";
        let digest = Sha512::digest(payload).to_vec();
        let mut signed = b"SSHSIG".to_vec();
        put_string(&mut signed, namespace);
        put_string(&mut signed, b"");
        put_string(&mut signed, b"sha512");
        put_string(&mut signed, &digest);
        let raw = self.key.sign(&signed);

        let mut sig_blob = Vec::new();
        put_string(&mut sig_blob, b"ssh-ed25519");
        put_string(&mut sig_blob, &raw.to_bytes());

        let mut out = b"SSHSIG".to_vec();
        out.extend_from_slice(&1u32.to_be_bytes());
        put_string(&mut out, &self.key_blob());
        put_string(&mut out, namespace);
        put_string(&mut out, b"");
        put_string(&mut out, b"sha512");
        put_string(&mut out, &sig_blob);
        armor::encode(&out, "SSH SIGNATURE", false)
    }
}

fn put_string(out: &mut Vec<u8>, data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(data);
}

pub fn commit(email: &str, signature: Option<String>) -> Commit {
    Commit {
        id: "9fceb02d0ae598e95dc970b74767f19372d61af8".to_string(),
        committer: Signature::new("Jane Doe", email),
        signature: signature.map(|sig| CommitSignature::new(sig, PAYLOAD)),
        repository: RepositoryRef::new(REPOSITORY),
    }
}

pub fn jane() -> Account {
    Account::new(1, "jane", JANE_EMAIL)
}

/// Store with the `jane` account registered.
pub async fn store_with_jane() -> Arc<MemoryTrustStore> {
    let store = Arc::new(MemoryTrustStore::new());
    store.add_account(jane()).await;
    store
}

pub fn verifier(
    store: &Arc<MemoryTrustStore>,
    signing: StaticSigningProvider,
    gpg: ScriptedGpgBackend,
) -> CommitVerifier {
    CommitVerifier::with_store(store.clone(), Arc::new(signing), Arc::new(gpg))
}

pub fn default_signing() -> StaticSigningProvider {
    StaticSigningProvider::new(SigningConfig::default())
}
