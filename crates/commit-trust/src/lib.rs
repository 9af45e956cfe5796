//! Commit signature trust resolution.
//!
//! Decides whether a commit's GPG or SSH signature is trustworthy and which
//! identity it should be attributed to:
//!
//! - Tiered key resolution (issuer key id, committer keys, instance key,
//!   repository key, rotated SSH keys)
//! - Email attribution against key emails and attested account emails
//! - Request-scoped cancellation and deadlines
//! - A shared TTL cache in front of the key and identity stores
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use commit_trust::{
//!     Commit, CommitSignature, CommitVerifier, GpgBackend, MemoryTrustStore, RepositoryRef,
//!     RequestContext, Signature, SigningConfig, StaticSigningProvider,
//! };
//!
//! # async fn example(gpg: Arc<dyn GpgBackend>) {
//! let store = Arc::new(MemoryTrustStore::new());
//! let signing = Arc::new(StaticSigningProvider::new(SigningConfig::from_env()));
//! let verifier = CommitVerifier::with_store(store, signing, gpg);
//!
//! let commit = Commit {
//!     id: "3f1c2a".into(),
//!     committer: Signature::new("Jane", "jane@example.com"),
//!     signature: Some(CommitSignature::new("-----BEGIN SSH SIGNATURE-----\n...", "tree ...")),
//!     repository: RepositoryRef::new("jane/project"),
//! };
//! let verdict = verifier.verify_commit(&RequestContext::new(), &commit).await;
//! println!("{}: {}", verdict.verified, verdict.reason);
//! # }
//! ```
//!
//! # Configuration
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `COMMIT_TRUST_APP_NAME` | Signer name for unowned keys (default: `commit-trust`) |
//! | `COMMIT_TRUST_SIGNING_KEY` | Instance signing key id or SSH key path (`default`/`none` disable it) |
//! | `COMMIT_TRUST_SIGNING_NAME` | Display name of the instance signer |
//! | `COMMIT_TRUST_SIGNING_EMAIL` | Email of the instance signer |
//! | `COMMIT_TRUST_SIGNING_FORMAT` | `openpgp` (default) or `ssh` |
//! | `COMMIT_TRUST_TRUSTED_SSH_KEYS` | `;` separated rotated SSH public keys |

pub mod armor;
pub mod backend;
pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod memory;
pub mod openpgp;
mod resolver;
pub mod sshsig;
pub mod store;
mod trust;
pub mod types;
pub mod verdict;
pub mod verifier;

// Re-export main types
pub use backend::{GpgBackend, KeyMatch, SshVerifier};
pub use cache::{CacheConfig, LookupCache};
pub use config::{
    SigningConfig, SigningConfigProvider, SigningFormat, SigningKeySettings,
    StaticSigningProvider,
};
pub use context::RequestContext;
pub use error::{TrustError, TrustResult};
pub use memory::MemoryTrustStore;
pub use openpgp::{extract_signature, GpgSignature};
pub use sshsig::{SshSigVerifier, GIT_NAMESPACE};
pub use store::{IdentityStore, KeyStore};
pub use types::{
    Account, AccountId, Commit, CommitSignature, GpgKey, Identity, KeyEmail, RepositoryRef,
    Signature, SignatureFormat, SshKey, SSH_SIGNATURE_HEADER,
};
pub use verdict::{Verdict, VerdictReason};
pub use verifier::CommitVerifier;
