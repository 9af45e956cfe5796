//! GPG signature resolution.

use std::sync::Arc;

use tracing::{debug, error, warn};

use super::{Deps, Request, Step};
use crate::config::SigningKeySettings;
use crate::error::{TrustError, TrustResult};
use crate::openpgp::{self, GpgSignature};
use crate::trust::EmailMatcher;
use crate::types::{Account, GpgKey, Identity};
use crate::verdict::{Verdict, VerdictReason};

/// Resolve a GPG signed commit.
pub(crate) async fn resolve(deps: Deps<'_>, req: &Request<'_>) -> Verdict {
    let signature = match openpgp::extract_signature(&req.signature.signature) {
        Ok(signature) => signature,
        Err(e) => {
            error!(commit = %req.commit.id, error = %e, "failed to extract gpg signature");
            return Verdict::failure(req.committer, VerdictReason::ExtractSignature);
        }
    };
    let key_id = signature.issuer_key_id.clone().unwrap_or_default();

    GpgSearch {
        deps,
        req,
        signature: &signature,
        key_id: &key_id,
    }
    .run()
    .await
}

/// Folds a tier outcome into the running default reason.
fn settle(step: Step, reason: &mut VerdictReason) -> Option<Verdict> {
    match step {
        Step::Terminal(verdict) => Some(verdict),
        Step::Mismatch => {
            *reason = VerdictReason::BadSignature;
            None
        }
        Step::Continue => None,
    }
}

struct GpgSearch<'a> {
    deps: Deps<'a>,
    req: &'a Request<'a>,
    signature: &'a GpgSignature,
    /// Issuer key id of the signature, empty when absent.
    key_id: &'a str,
}

impl GpgSearch<'_> {
    async fn run(&self) -> Verdict {
        let config = self.deps.signing.signing_config();
        let mut reason = VerdictReason::NoKeyFound;

        let step = self.verify_for_key_id(self.key_id, &config.app_name, "").await;
        if let Some(verdict) = settle(step, &mut reason) {
            return verdict;
        }

        if let Some(account) = self.req.committer.account() {
            if let Step::Terminal(verdict) = self.verify_committer_keys(account).await {
                return verdict;
            }
        }

        if config.has_instance_key() {
            let step = self.verify_instance_key().await;
            if let Some(verdict) = settle(step, &mut reason) {
                return verdict;
            }
        }

        let step = self.verify_repository_key().await;
        if let Some(verdict) = settle(step, &mut reason) {
            return verdict;
        }

        debug!(
            commit = %self.req.commit.id,
            key_id = self.key_id,
            reason = %reason,
            "no key verified the gpg signature"
        );
        Verdict::gpg_unverified(self.req.committer, reason, self.key_id)
    }

    /// Keys registered under `key_id`, attributed to `email` (any activated
    /// address when empty). Unowned signers are reported as `name`.
    async fn verify_for_key_id(&self, key_id: &str, name: &str, email: &str) -> Step {
        if key_id.is_empty() {
            return Step::Continue;
        }
        let keys = match self.keys_by_id(key_id).await {
            Ok(keys) => keys,
            Err(e) => return self.retrieval_failed(key_id, &e),
        };
        if keys.is_empty() {
            return Step::Continue;
        }

        let ctx = self.req.ctx;
        let matcher = EmailMatcher::new(self.deps.identities, self.deps.cache);
        for key in keys.iter() {
            let primary = match &key.primary_key_id {
                Some(primary_id) => match self.keys_by_id(primary_id).await {
                    Ok(primary) => primary,
                    Err(e) => return self.retrieval_failed(primary_id, &e),
                },
                None => Arc::default(),
            };
            let mut candidates = vec![key];
            candidates.extend(primary.iter());

            let signing_email = match matcher.attribute(ctx, email, &candidates).await {
                Ok(Some(found)) => found,
                Ok(None) => continue,
                Err(e) => return self.identity_failed(key, &e),
            };
            let signer = match self.key_owner(key, name, &signing_email).await {
                Ok(signer) => signer,
                Err(e) => return self.identity_failed(key, &e),
            };
            if let step @ Step::Terminal(_) = self.verify_key(key, &signing_email, signer) {
                return step;
            }
        }

        warn!(
            commit = %self.req.commit.id,
            key_id,
            "registered key id did not verify the signature"
        );
        Step::Mismatch
    }

    /// Keys owned by the committer. Never yields a mismatch.
    async fn verify_committer_keys(&self, account: &Account) -> Step {
        let ctx = self.req.ctx;
        let mut keys = match ctx.run(self.deps.keys.gpg_keys_by_owner(ctx, account.id)).await {
            Ok(keys) => keys,
            Err(e) => return self.retrieval_failed("committer", &e),
        };
        if let Err(e) = ctx.run(self.deps.keys.load_subkeys(ctx, &mut keys)).await {
            return self.retrieval_failed("committer", &e);
        }

        let commit_email = &self.req.commit.committer.email;
        let matcher = EmailMatcher::new(self.deps.identities, self.deps.cache);
        for key in &keys {
            let email = match matcher.attribute(ctx, commit_email, &[key]).await {
                Ok(Some(found)) => found,
                Ok(None) => continue,
                Err(e) => return self.identity_failed(key, &e),
            };
            let signer = Identity::Known(account.clone());
            if let step @ Step::Terminal(_) = self.verify_key(key, &email, signer) {
                return step;
            }
        }
        Step::Continue
    }

    async fn verify_instance_key(&self) -> Step {
        let ctx = self.req.ctx;
        let mut settings = self.deps.signing.signing_config().instance_key();
        match ctx.run(self.deps.signing.instance_public_key(ctx)).await {
            Ok(content) => settings.public_key_content = Some(content),
            Err(e) if e.is_interruption() => return self.retrieval_failed(&settings.key_id, &e),
            Err(e) => {
                error!(key_id = %settings.key_id, error = %e, "failed to load instance signing key");
                return Step::Continue;
            }
        }
        self.verify_with_settings(&settings).await
    }

    async fn verify_repository_key(&self) -> Step {
        let ctx = self.req.ctx;
        let repository = &self.req.commit.repository;
        let settings = match ctx
            .run(self.deps.signing.repository_default_key(ctx, repository))
            .await
        {
            Ok(Some(settings)) => settings,
            Ok(None) => {
                warn!(
                    commit = %self.req.commit.id,
                    repository = %repository.full_name,
                    "no default signing key for repository"
                );
                return Step::Continue;
            }
            Err(e) if e.is_interruption() => return self.retrieval_failed("repository", &e),
            Err(e) => {
                error!(repository = %repository.full_name, error = %e, "failed to load repository signing key");
                return Step::Continue;
            }
        };
        self.verify_with_settings(&settings).await
    }

    /// A configured key: first through the key store by id, then by parsing
    /// its armored public key.
    async fn verify_with_settings(&self, settings: &SigningKeySettings) -> Step {
        if !settings.sign {
            return Step::Continue;
        }
        match self
            .verify_for_key_id(&settings.key_id, &settings.name, &settings.email)
            .await
        {
            Step::Continue => {}
            other => return other,
        }

        let Some(content) = settings.public_key_content.as_deref() else {
            warn!(key_id = %settings.key_id, "signing key has no public key content");
            return Step::Continue;
        };
        let parsed = match self.deps.gpg.parse_armored_keys(content) {
            Ok(parsed) => parsed,
            Err(e) => {
                error!(key_id = %settings.key_id, error = %e, "unable to parse signing key");
                return Step::Terminal(Verdict::failure(
                    self.req.committer,
                    VerdictReason::GenerateHash,
                ));
            }
        };

        let signer = Identity::synthetic(&settings.name, &settings.email);
        for key in &parsed {
            if let step @ Step::Terminal(_) = self.verify_key(key, &settings.email, signer.clone())
            {
                return step;
            }
            if !self.key_id.is_empty() && key.addresses(self.key_id) {
                warn!(
                    commit = %self.req.commit.id,
                    key_id = self.key_id,
                    "configured signing key did not verify the signature"
                );
                return Step::Mismatch;
            }
        }
        Step::Continue
    }

    /// Check the signature against `key` and its subkeys.
    fn verify_key(&self, key: &GpgKey, email: &str, signer: Identity) -> Step {
        let payload = &self.req.signature.payload;
        match self.deps.gpg.verify(self.signature, payload, key, email) {
            Ok(Some(matched)) => match matched.select(key) {
                Some(signing_key) => {
                    debug!(
                        commit = %self.req.commit.id,
                        key_id = %signing_key.key_id,
                        signer = signer.name(),
                        "gpg signature verified"
                    );
                    Step::Terminal(Verdict::gpg_verified(
                        self.req.committer,
                        signer,
                        signing_key.clone(),
                        email.to_string(),
                    ))
                }
                None => {
                    warn!(key_id = %key.key_id, "backend matched an unknown subkey");
                    Step::Continue
                }
            },
            Ok(None) => Step::Continue,
            Err(e) => {
                error!(key_id = %key.key_id, error = %e, "failed to verify gpg signature");
                Step::Terminal(Verdict::failure(
                    self.req.committer,
                    VerdictReason::GenerateHash,
                ))
            }
        }
    }

    /// Account owning `key`, or a synthetic signer for unowned keys.
    async fn key_owner(&self, key: &GpgKey, name: &str, email: &str) -> TrustResult<Identity> {
        let synthetic = || Identity::synthetic(name, email);
        let Some(owner_id) = key.owner_id.filter(|id| *id > 0) else {
            return Ok(synthetic());
        };
        let ctx = self.req.ctx;
        let owner = self
            .deps
            .cache
            .account(owner_id, || ctx.run(self.deps.identities.account_by_id(ctx, owner_id)))
            .await?;
        Ok(owner.map_or_else(synthetic, |account| Identity::Known((*account).clone())))
    }

    async fn keys_by_id(&self, key_id: &str) -> TrustResult<Arc<Vec<GpgKey>>> {
        let ctx = self.req.ctx;
        self.deps
            .cache
            .gpg_keys(key_id, || ctx.run(self.deps.keys.gpg_keys_by_key_id(ctx, key_id)))
            .await
    }

    fn retrieval_failed(&self, key_id: &str, e: &TrustError) -> Step {
        error!(commit = %self.req.commit.id, key_id, error = %e, "failed to retrieve gpg keys");
        Step::Terminal(Verdict::failure(
            self.req.committer,
            VerdictReason::KeyRetrievalFailed,
        ))
    }

    fn identity_failed(&self, key: &GpgKey, e: &TrustError) -> Step {
        error!(
            commit = %self.req.commit.id,
            key_id = %key.key_id,
            owner_id = ?key.owner_id,
            error = %e,
            "failed to load key owner"
        );
        Step::Terminal(Verdict::failure(
            self.req.committer,
            VerdictReason::NoCommitterAccount,
        ))
    }
}
