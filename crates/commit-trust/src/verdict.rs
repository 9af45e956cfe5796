//! Verification verdicts.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::types::{GpgKey, Identity, SshKey};

/// Why a verdict came out the way it did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerdictReason {
    /// Commit carries no signature.
    NotSigned,

    /// No tier located a key addressable by the signature.
    NoKeyFound,

    /// A key matching the signature's key id exists but did not validate it.
    BadSignature,

    /// Verified: signer display name and key id (GPG) or fingerprint (SSH).
    Signed { signer: String, key: String },

    /// Signature text could not be decoded.
    ExtractSignature,

    /// Key lookup failed or was cancelled.
    KeyRetrievalFailed,

    /// Account lookup failed or was cancelled.
    NoCommitterAccount,

    /// The signature backend failed, or a configured key is malformed.
    GenerateHash,
}

impl VerdictReason {
    /// Stable machine code.
    pub fn code(&self) -> String {
        match self {
            Self::NotSigned => "not_signed".to_string(),
            Self::NoKeyFound => "no_key_found".to_string(),
            Self::BadSignature => "bad_signature".to_string(),
            Self::Signed { signer, key } => format!("{} / {}", signer, key),
            Self::ExtractSignature => "extract_sign".to_string(),
            Self::KeyRetrievalFailed => "failed_retrieval_keys".to_string(),
            Self::NoCommitterAccount => "no_committer_account".to_string(),
            Self::GenerateHash => "generate_hash".to_string(),
        }
    }

    /// Whether the reason says "could not determine trust" rather than a
    /// trust outcome.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            Self::KeyRetrievalFailed | Self::NoCommitterAccount | Self::GenerateHash
        )
    }
}

impl fmt::Display for VerdictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code())
    }
}

impl Serialize for VerdictReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.code())
    }
}

/// The outcome of resolving one commit signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub verified: bool,

    /// Set when unverified for a reason more specific than "no key found".
    pub warning: bool,

    pub reason: VerdictReason,

    pub committing_user: Identity,

    pub signing_user: Option<Identity>,

    pub signing_key: Option<GpgKey>,

    pub signing_ssh_key: Option<SshKey>,

    pub signing_email: Option<String>,
}

impl Verdict {
    /// Unverified verdict without warning.
    pub fn failure(committer: &Identity, reason: VerdictReason) -> Self {
        let warning = reason == VerdictReason::BadSignature;
        Self {
            verified: false,
            warning,
            reason,
            committing_user: committer.clone(),
            signing_user: None,
            signing_key: None,
            signing_ssh_key: None,
            signing_email: None,
        }
    }

    pub fn not_signed(committer: &Identity) -> Self {
        Self::failure(committer, VerdictReason::NotSigned)
    }

    /// A known key id did not validate the signature.
    pub fn bad_signature(committer: &Identity) -> Self {
        Self::failure(committer, VerdictReason::BadSignature)
    }

    pub(crate) fn gpg_verified(
        committer: &Identity,
        signer: Identity,
        key: GpgKey,
        email: String,
    ) -> Self {
        Self {
            verified: true,
            warning: false,
            reason: VerdictReason::Signed {
                signer: signer.name().to_string(),
                key: key.key_id.clone(),
            },
            committing_user: committer.clone(),
            signing_user: Some(signer),
            signing_key: Some(key),
            signing_ssh_key: None,
            signing_email: Some(email),
        }
    }

    pub(crate) fn ssh_verified(
        committer: &Identity,
        signer: Identity,
        key: SshKey,
        email: String,
    ) -> Self {
        Self {
            verified: true,
            warning: false,
            reason: VerdictReason::Signed {
                signer: signer.name().to_string(),
                key: key.fingerprint.clone(),
            },
            committing_user: committer.clone(),
            signing_user: Some(signer),
            signing_key: None,
            signing_ssh_key: Some(key),
            signing_email: Some(email),
        }
    }

    /// End-of-search GPG verdict carrying the extracted key id.
    pub(crate) fn gpg_unverified(committer: &Identity, reason: VerdictReason, key_id: &str) -> Self {
        Self {
            warning: reason != VerdictReason::NoKeyFound,
            signing_key: Some(GpgKey::with_key_id(key_id)),
            ..Self::failure(committer, reason)
        }
    }
}
