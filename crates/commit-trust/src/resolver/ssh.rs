//! SSH signature resolution.
//!
//! A key that fails to verify is skipped, so SSH resolution never reports a
//! bad signature: it either verifies or ends with no key found.

use tracing::{debug, error};

use super::{Deps, Request};
use crate::config::SigningFormat;
use crate::sshsig::{self, GIT_NAMESPACE};
use crate::types::{Identity, SshKey};
use crate::verdict::{Verdict, VerdictReason};

/// Resolve an SSH signed commit.
pub(crate) async fn resolve(deps: Deps<'_>, req: &Request<'_>) -> Verdict {
    let ctx = req.ctx;

    if let Some(account) = req.committer.account() {
        let keys = match ctx.run(deps.keys.ssh_keys_by_owner(ctx, account.id)).await {
            Ok(keys) => keys,
            Err(e) => {
                error!(commit = %req.commit.id, owner_id = account.id, error = %e, "failed to retrieve ssh keys");
                return Verdict::failure(req.committer, VerdictReason::KeyRetrievalFailed);
            }
        };
        for key in keys.into_iter().filter(|key| key.verified) {
            if verify(deps, req, &key.content) {
                return verified(req, req.committer.clone(), key, &req.commit.committer.email);
            }
        }
    }

    let config = deps.signing.signing_config();
    let configured_signer = Identity::synthetic(&config.signing_name, &config.signing_email);

    // Rotated keys sign on behalf of the committer's email.
    for content in &config.trusted_ssh_keys {
        if let Some(verdict) = verify_configured_key(
            deps,
            req,
            content,
            &configured_signer,
            &req.commit.committer.email,
        ) {
            return verdict;
        }
    }

    if config.signing_format == SigningFormat::Ssh && config.has_instance_key() {
        match ctx.run(deps.signing.instance_public_key(ctx)).await {
            Ok(content) => {
                if let Some(verdict) = verify_configured_key(
                    deps,
                    req,
                    &content,
                    &configured_signer,
                    &config.signing_email,
                ) {
                    return verdict;
                }
            }
            Err(e) if e.is_interruption() => {
                error!(commit = %req.commit.id, error = %e, "instance ssh key lookup interrupted");
                return Verdict::failure(req.committer, VerdictReason::KeyRetrievalFailed);
            }
            Err(e) => {
                error!(key = %config.signing_key, error = %e, "failed to load instance ssh signing key");
            }
        }
    }

    Verdict::failure(req.committer, VerdictReason::NoKeyFound)
}

fn verify(deps: Deps<'_>, req: &Request<'_>, public_key: &str) -> bool {
    deps.ssh.verify(
        &req.signature.signature,
        &req.signature.payload,
        public_key,
        GIT_NAMESPACE,
    )
}

/// A key from configuration rather than the key store. Its binding is
/// implicitly trusted.
fn verify_configured_key(
    deps: Deps<'_>,
    req: &Request<'_>,
    content: &str,
    signer: &Identity,
    email: &str,
) -> Option<Verdict> {
    let fingerprint = match sshsig::fingerprint(content) {
        Ok(fingerprint) => fingerprint,
        Err(e) => {
            error!(error = %e, "failed to fingerprint configured ssh key");
            return None;
        }
    };
    if !verify(deps, req, content) {
        return None;
    }
    let key = SshKey {
        fingerprint,
        content: content.trim().to_string(),
        verified: true,
        ..SshKey::default()
    };
    Some(verified(req, signer.clone(), key, email))
}

fn verified(req: &Request<'_>, signer: Identity, key: SshKey, email: &str) -> Verdict {
    debug!(
        commit = %req.commit.id,
        fingerprint = %key.fingerprint,
        signer = signer.name(),
        "ssh signature verified"
    );
    Verdict::ssh_verified(req.committer, signer, key, email.to_string())
}
