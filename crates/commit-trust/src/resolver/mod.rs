//! Signature-to-identity resolution.
//!
//! GPG signatures are resolved through these tiers, in order:
//! 1. Keys registered under the signature's issuer key id
//! 2. Keys owned by the committer
//! 3. The instance signing key
//! 4. The repository default signing key
//!
//! SSH signatures are resolved against:
//! 1. Attested keys owned by the committer
//! 2. Configured trusted (rotated) keys
//! 3. The instance signing key
//!
//! The first tier that verifies the signature decides the verdict. A lookup
//! failure ends resolution immediately.

pub(crate) mod gpg;
pub(crate) mod ssh;

use crate::backend::{GpgBackend, SshVerifier};
use crate::cache::LookupCache;
use crate::config::SigningConfigProvider;
use crate::context::RequestContext;
use crate::store::{IdentityStore, KeyStore};
use crate::types::{Commit, CommitSignature, Identity};
use crate::verdict::Verdict;

/// Outcome of one resolution tier.
#[derive(Debug)]
pub(crate) enum Step {
    /// Nothing found; try the next tier.
    Continue,

    /// A key matched the signature's key id but did not verify it.
    Mismatch,

    /// Resolution is over.
    Terminal(Verdict),
}

/// Borrowed view of the verifier's collaborators.
#[derive(Clone, Copy)]
pub(crate) struct Deps<'a> {
    pub(crate) keys: &'a dyn KeyStore,
    pub(crate) identities: &'a dyn IdentityStore,
    pub(crate) signing: &'a dyn SigningConfigProvider,
    pub(crate) gpg: &'a dyn GpgBackend,
    pub(crate) ssh: &'a dyn SshVerifier,
    pub(crate) cache: &'a LookupCache,
}

/// A single verification request.
pub(crate) struct Request<'a> {
    pub(crate) ctx: &'a RequestContext,
    pub(crate) commit: &'a Commit,
    pub(crate) signature: &'a CommitSignature,
    pub(crate) committer: &'a Identity,
}
