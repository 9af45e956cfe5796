//! Commit verification entry point.

use std::sync::Arc;

use tracing::{debug, error};

use crate::backend::{GpgBackend, SshVerifier};
use crate::cache::LookupCache;
use crate::config::SigningConfigProvider;
use crate::context::RequestContext;
use crate::resolver::{self, Deps, Request};
use crate::sshsig::SshSigVerifier;
use crate::store::{IdentityStore, KeyStore};
use crate::types::{Account, Commit, Identity, SignatureFormat};
use crate::verdict::{Verdict, VerdictReason};

/// Resolves commit signatures to identities.
///
/// Holds no per-request state; one verifier can serve concurrent requests.
/// The lookup cache is shared across requests.
#[derive(Clone)]
pub struct CommitVerifier {
    keys: Arc<dyn KeyStore>,
    identities: Arc<dyn IdentityStore>,
    signing: Arc<dyn SigningConfigProvider>,
    gpg: Arc<dyn GpgBackend>,
    ssh: Arc<dyn SshVerifier>,
    cache: LookupCache,
}

impl std::fmt::Debug for CommitVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitVerifier")
            .field("signing", self.signing.signing_config())
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl CommitVerifier {
    /// Create a verifier. SSH signatures are checked with [`SshSigVerifier`]
    /// unless replaced with [`with_ssh_verifier`](Self::with_ssh_verifier).
    pub fn new(
        keys: Arc<dyn KeyStore>,
        identities: Arc<dyn IdentityStore>,
        signing: Arc<dyn SigningConfigProvider>,
        gpg: Arc<dyn GpgBackend>,
    ) -> Self {
        Self {
            keys,
            identities,
            signing,
            gpg,
            ssh: Arc::new(SshSigVerifier),
            cache: LookupCache::default(),
        }
    }

    /// Create a verifier over a single store serving keys and identities.
    pub fn with_store<S>(
        store: Arc<S>,
        signing: Arc<dyn SigningConfigProvider>,
        gpg: Arc<dyn GpgBackend>,
    ) -> Self
    where
        S: KeyStore + IdentityStore + 'static,
    {
        let keys: Arc<dyn KeyStore> = store.clone();
        Self::new(keys, store, signing, gpg)
    }

    pub fn with_ssh_verifier(mut self, ssh: Arc<dyn SshVerifier>) -> Self {
        self.ssh = ssh;
        self
    }

    /// Use `cache`, e.g. to share it with another verifier.
    pub fn with_cache(mut self, cache: LookupCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> &LookupCache {
        &self.cache
    }

    /// Verify `commit`, resolving the committer account by the committer
    /// email.
    ///
    /// A failed committer lookup ends with [`VerdictReason::NoCommitterAccount`].
    pub async fn verify_commit(&self, ctx: &RequestContext, commit: &Commit) -> Verdict {
        let email = &commit.committer.email;
        let committer = match ctx
            .run(self.identities.account_by_email(ctx, email))
            .await
        {
            Ok(account) => account,
            Err(e) => {
                error!(commit = %commit.id, email = %email, error = %e, "failed to look up committer");
                let committer = Identity::from_committer(None, &commit.committer);
                return Verdict::failure(&committer, VerdictReason::NoCommitterAccount);
            }
        };
        self.verify_commit_with_committer(ctx, commit, committer).await
    }

    /// Verify `commit` against an already resolved committer account.
    ///
    /// `None` (or an account with id 0) means the committer has no account;
    /// the committing user is then built from the commit header.
    pub async fn verify_commit_with_committer(
        &self,
        ctx: &RequestContext,
        commit: &Commit,
        committer: Option<Account>,
    ) -> Verdict {
        let committer = Identity::from_committer(committer, &commit.committer);
        let Some(signature) = &commit.signature else {
            return Verdict::not_signed(&committer);
        };

        let deps = self.deps();
        let req = Request {
            ctx,
            commit,
            signature,
            committer: &committer,
        };
        let verdict = match signature.format() {
            SignatureFormat::Ssh => resolver::ssh::resolve(deps, &req).await,
            SignatureFormat::Gpg => resolver::gpg::resolve(deps, &req).await,
        };

        debug!(
            commit = %commit.id,
            verified = verdict.verified,
            warning = verdict.warning,
            reason = %verdict.reason,
            "resolved commit signature"
        );
        verdict
    }

    fn deps(&self) -> Deps<'_> {
        Deps {
            keys: self.keys.as_ref(),
            identities: self.identities.as_ref(),
            signing: self.signing.as_ref(),
            gpg: self.gpg.as_ref(),
            ssh: self.ssh.as_ref(),
            cache: &self.cache,
        }
    }
}
