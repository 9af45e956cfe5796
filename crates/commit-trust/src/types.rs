//! Value objects for commits, identities and key records.

use serde::{Deserialize, Serialize};

/// Armor header that marks an SSH signature.
pub const SSH_SIGNATURE_HEADER: &str = "-----BEGIN SSH SIGNATURE-----";

/// Numeric account id. Real accounts are always non-zero.
pub type AccountId = i64;

/// Case-insensitive comparison with full Unicode case folding, so that
/// `ÉLISE@example.com` and `élise@example.com` are the same address.
pub(crate) fn fold_eq(a: &str, b: &str) -> bool {
    a == b
        || a.chars()
            .flat_map(char::to_lowercase)
            .eq(b.chars().flat_map(char::to_lowercase))
}

/// A commit submitted for verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// Commit id (hex object name).
    pub id: String,

    /// Raw committer name/email from the commit header.
    pub committer: Signature,

    /// Embedded signature, if the commit is signed.
    pub signature: Option<CommitSignature>,

    /// Repository the commit belongs to.
    pub repository: RepositoryRef,
}

/// Name/email pair as written in a commit header.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub email: String,
}

impl Signature {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// Repository reference used to look up repository-level signing keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RepositoryRef {
    /// `owner/name` path.
    pub full_name: String,
}

impl RepositoryRef {
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
        }
    }
}

/// Signature format, derived from the armor marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureFormat {
    Gpg,
    Ssh,
}

/// A commit signature together with the payload it was computed over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSignature {
    /// Armored signature text.
    pub signature: String,

    /// Canonical signed payload.
    pub payload: Vec<u8>,
}

impl CommitSignature {
    pub fn new(signature: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            signature: signature.into(),
            payload: payload.into(),
        }
    }

    /// Classify by leading armor marker. Anything that is not SSH is treated as GPG.
    pub fn format(&self) -> SignatureFormat {
        if self.signature.starts_with(SSH_SIGNATURE_HEADER) {
            SignatureFormat::Ssh
        } else {
            SignatureFormat::Gpg
        }
    }
}

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub email: String,

    /// Synthetic address used when the real one is hidden.
    #[serde(default)]
    pub placeholder_email: Option<String>,
}

impl Account {
    pub fn new(id: AccountId, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.into(),
            placeholder_email: None,
        }
    }

    pub fn with_placeholder_email(mut self, email: impl Into<String>) -> Self {
        self.placeholder_email = Some(email.into());
        self
    }
}

/// Who a commit or signature is attributed to.
///
/// `Synthetic` identities carry only a display name/email and are built when
/// no account is known, e.g. for instance-wide signing keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Identity {
    Known(Account),
    Synthetic { name: String, email: String },
}

impl Identity {
    pub fn synthetic(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self::Synthetic {
            name: name.into(),
            email: email.into(),
        }
    }

    /// Account if known, otherwise a synthetic identity for the commit header.
    /// Accounts with id 0 count as unknown.
    pub fn from_committer(account: Option<Account>, committer: &Signature) -> Self {
        match account.filter(|account| account.id != 0) {
            Some(account) => Self::Known(account),
            None => Self::synthetic(committer.name.clone(), committer.email.clone()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Known(account) => &account.name,
            Self::Synthetic { name, .. } => name,
        }
    }

    pub fn email(&self) -> &str {
        match self {
            Self::Known(account) => &account.email,
            Self::Synthetic { email, .. } => email,
        }
    }

    pub fn account(&self) -> Option<&Account> {
        match self {
            Self::Known(account) => Some(account),
            Self::Synthetic { .. } => None,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self, Self::Synthetic { .. })
    }
}

/// Email attached to a key record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEmail {
    pub email: String,
    #[serde(default)]
    pub is_activated: bool,
}

impl KeyEmail {
    pub fn activated(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            is_activated: true,
        }
    }

    pub fn unactivated(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            is_activated: false,
        }
    }
}

/// Stored OpenPGP key, either a primary key or one of its subkeys.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GpgKey {
    /// Record id in the key store.
    #[serde(default)]
    pub id: i64,

    /// Owning account (absent for unowned keys).
    #[serde(default)]
    pub owner_id: Option<AccountId>,

    /// 16 hex digit key id, upper case.
    pub key_id: String,

    /// Key id of the primary key when this record is a subkey.
    #[serde(default)]
    pub primary_key_id: Option<String>,

    /// Base64 encoded public key packet.
    #[serde(default)]
    pub content: String,

    #[serde(default)]
    pub can_sign: bool,

    /// Whether the binding of this key to its owner has been attested.
    #[serde(default)]
    pub verified: bool,

    #[serde(default)]
    pub emails: Vec<KeyEmail>,

    #[serde(default)]
    pub subkeys: Vec<GpgKey>,
}

impl GpgKey {
    /// Key record carrying only a key id (used on unverified verdicts).
    pub fn with_key_id(key_id: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            ..Self::default()
        }
    }

    /// Whether `key_id` names this key or one of its subkeys.
    pub fn addresses(&self, key_id: &str) -> bool {
        fold_eq(&self.key_id, key_id) || self.subkeys.iter().any(|sub| fold_eq(&sub.key_id, key_id))
    }
}

/// Stored SSH public key.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SshKey {
    #[serde(default)]
    pub id: i64,

    #[serde(default)]
    pub owner_id: Option<AccountId>,

    #[serde(default)]
    pub name: String,

    /// `SHA256:` fingerprint of the key blob.
    pub fingerprint: String,

    /// Authorized-keys line (`ssh-ed25519 AAAA... comment`).
    pub content: String,

    /// Whether the binding of this key to its owner has been attested.
    #[serde(default)]
    pub verified: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection() {
        let ssh = CommitSignature::new(
            "-----BEGIN SSH SIGNATURE-----\nU1NIU0lH\n-----END SSH SIGNATURE-----\n",
            "payload",
        );
        assert_eq!(ssh.format(), SignatureFormat::Ssh);

        let gpg = CommitSignature::new("-----BEGIN PGP SIGNATURE-----\n", "payload");
        assert_eq!(gpg.format(), SignatureFormat::Gpg);

        // Leading whitespace is not an SSH marker.
        let odd = CommitSignature::new(" -----BEGIN SSH SIGNATURE-----", "payload");
        assert_eq!(odd.format(), SignatureFormat::Gpg);
    }

    #[test]
    fn test_identity_from_committer() {
        let header = Signature::new("Jane", "jane@example.com");
        let synthetic = Identity::from_committer(None, &header);
        assert!(synthetic.is_synthetic());
        assert_eq!(synthetic.name(), "Jane");
        assert_eq!(synthetic.email(), "jane@example.com");
        assert!(synthetic.account().is_none());

        let known = Identity::from_committer(Some(Account::new(7, "jane", "j@x.org")), &header);
        assert_eq!(known.account().map(|a| a.id), Some(7));
        assert_eq!(known.email(), "j@x.org");

        let placeholder = Identity::from_committer(Some(Account::new(0, "ghost", "")), &header);
        assert!(placeholder.is_synthetic());
    }

    #[test]
    fn test_key_addresses_subkeys() {
        let key = GpgKey {
            key_id: "AAAAAAAAAAAAAAAA".into(),
            subkeys: vec![GpgKey::with_key_id("BBBBBBBBBBBBBBBB")],
            ..GpgKey::default()
        };
        assert!(key.addresses("aaaaaaaaaaaaaaaa"));
        assert!(key.addresses("BBBBBBBBBBBBBBBB"));
        assert!(!key.addresses("CCCCCCCCCCCCCCCC"));
    }

    #[test]
    fn test_fold_eq_unicode() {
        assert!(fold_eq("ÉLISE@example.com", "élise@example.com"));
        assert!(fold_eq("Jane@Example.COM", "jane@example.com"));
        assert!(!fold_eq("elise@example.com", "élise@example.com"));
        assert!(!fold_eq("jane@example.com", "jane@example.co"));
    }
}
