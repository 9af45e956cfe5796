//! Integration tests for SSH commit resolution.
//!
//! Signatures are real `SSHSIG` ed25519 signatures checked by the default
//! verifier.

mod common;

use std::io::Write;

use commit_trust::{
    sshsig, Identity, RequestContext, SigningConfig, SigningFormat, SshKey, StaticSigningProvider,
    VerdictReason,
};

use common::{
    commit, default_signing, jane, store_with_jane, verifier, ScriptedGpgBackend, SshSigner,
    JANE_EMAIL, PAYLOAD,
};

fn stored_key(signer: &SshSigner, verified: bool) -> SshKey {
    let content = signer.public_key();
    SshKey {
        id: 1,
        owner_id: Some(1),
        name: "laptop".to_string(),
        fingerprint: sshsig::fingerprint(&content).unwrap(),
        content,
        verified,
    }
}

#[tokio::test]
async fn test_committer_attested_key() {
    let signer = SshSigner::new(7);
    let store = store_with_jane().await;
    store.add_ssh_key(stored_key(&signer, true)).await;
    let verifier = verifier(&store, default_signing(), ScriptedGpgBackend::default());

    let verdict = verifier
        .verify_commit(
            &RequestContext::new(),
            &commit(JANE_EMAIL, Some(signer.sign(PAYLOAD))),
        )
        .await;

    let fingerprint = sshsig::fingerprint(&signer.public_key()).unwrap();
    assert!(verdict.verified);
    assert!(!verdict.warning);
    assert_eq!(verdict.reason.code(), format!("jane / {}", fingerprint));
    assert_eq!(verdict.signing_user, Some(Identity::Known(jane())));
    assert_eq!(verdict.signing_email.as_deref(), Some(JANE_EMAIL));
    assert_eq!(
        verdict.signing_ssh_key.map(|k| k.fingerprint),
        Some(fingerprint)
    );
    assert!(verdict.signing_key.is_none());
}

#[tokio::test]
async fn test_unattested_key_is_ignored() {
    let signer = SshSigner::new(7);
    let store = store_with_jane().await;
    store.add_ssh_key(stored_key(&signer, false)).await;
    let verifier = verifier(&store, default_signing(), ScriptedGpgBackend::default());

    let verdict = verifier
        .verify_commit(
            &RequestContext::new(),
            &commit(JANE_EMAIL, Some(signer.sign(PAYLOAD))),
        )
        .await;

    assert!(!verdict.verified);
    assert_eq!(verdict.reason, VerdictReason::NoKeyFound);
}

#[tokio::test]
async fn test_wrong_key_is_never_bad_signature() {
    let store = store_with_jane().await;
    store.add_ssh_key(stored_key(&SshSigner::new(7), true)).await;
    let verifier = verifier(&store, default_signing(), ScriptedGpgBackend::default());

    let forged = SshSigner::new(9).sign(PAYLOAD);
    let verdict = verifier
        .verify_commit(&RequestContext::new(), &commit(JANE_EMAIL, Some(forged)))
        .await;

    assert!(!verdict.verified);
    assert!(!verdict.warning);
    assert_eq!(verdict.reason, VerdictReason::NoKeyFound);
}

#[tokio::test]
async fn test_tampered_payload() {
    let signer = SshSigner::new(7);
    let store = store_with_jane().await;
    store.add_ssh_key(stored_key(&signer, true)).await;
    let verifier = verifier(&store, default_signing(), ScriptedGpgBackend::default());

    let signature = signer.sign(b"tree 0000000000000000000000000000000000000000\n");
    let verdict = verifier
        .verify_commit(&RequestContext::new(), &commit(JANE_EMAIL, Some(signature)))
        .await;

    assert_eq!(verdict.reason, VerdictReason::NoKeyFound);
}

#[tokio::test]
async fn test_rotated_key_signs_for_committer_email() {
    let rotated = SshSigner::new(3);
    let store = store_with_jane().await;
    let config = SigningConfig::default()
        .with_signer("Forge", "forge@example.com")
        .with_trusted_ssh_key(rotated.public_key());
    let verifier = verifier(
        &store,
        StaticSigningProvider::new(config),
        ScriptedGpgBackend::default(),
    );

    let verdict = verifier
        .verify_commit(
            &RequestContext::new(),
            &commit("old-bot@example.org", Some(rotated.sign(PAYLOAD))),
        )
        .await;

    assert!(verdict.verified);
    assert_eq!(
        verdict.signing_user,
        Some(Identity::synthetic("Forge", "forge@example.com"))
    );
    assert_eq!(verdict.signing_email.as_deref(), Some("old-bot@example.org"));
    assert!(verdict.committing_user.is_synthetic());
    assert!(verdict.signing_ssh_key.map(|k| k.verified).unwrap_or(false));
}

#[tokio::test]
async fn test_rotated_key_for_known_committer() {
    let rotated = SshSigner::new(3);
    let store = store_with_jane().await;
    store.add_ssh_key(stored_key(&SshSigner::new(7), true)).await;
    let config = SigningConfig::default()
        .with_signer("Forge", "forge@example.com")
        .with_trusted_ssh_key(rotated.public_key());
    let verifier = verifier(
        &store,
        StaticSigningProvider::new(config),
        ScriptedGpgBackend::default(),
    );

    let verdict = verifier
        .verify_commit(
            &RequestContext::new(),
            &commit(JANE_EMAIL, Some(rotated.sign(PAYLOAD))),
        )
        .await;

    assert!(verdict.verified);
    assert_eq!(
        verdict.signing_user,
        Some(Identity::synthetic("Forge", "forge@example.com"))
    );
    assert_eq!(verdict.signing_email.as_deref(), Some(JANE_EMAIL));
    assert_eq!(verdict.committing_user, Identity::Known(jane()));
    assert_eq!(
        verdict.signing_ssh_key.map(|k| k.fingerprint),
        Some(sshsig::fingerprint(&rotated.public_key()).unwrap())
    );
}

#[tokio::test]
async fn test_instance_key_from_file() {
    let instance = SshSigner::new(5);
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "{}", instance.public_key()).unwrap();

    let store = store_with_jane().await;
    let config = SigningConfig::default()
        .with_signing_key(file.path().to_string_lossy(), SigningFormat::Ssh)
        .with_signer("Forge", "forge@example.com");
    let verifier = verifier(
        &store,
        StaticSigningProvider::new(config),
        ScriptedGpgBackend::default(),
    );

    let verdict = verifier
        .verify_commit(
            &RequestContext::new(),
            &commit(JANE_EMAIL, Some(instance.sign(PAYLOAD))),
        )
        .await;

    assert!(verdict.verified);
    assert_eq!(verdict.signing_email.as_deref(), Some("forge@example.com"));
    assert_eq!(verdict.committing_user, Identity::Known(jane()));
}

#[tokio::test]
async fn test_missing_instance_key_file() {
    let instance = SshSigner::new(5);
    let store = store_with_jane().await;
    let config = SigningConfig::default()
        .with_signing_key("/nonexistent/instance.pub", SigningFormat::Ssh)
        .with_signer("Forge", "forge@example.com");
    let verifier = verifier(
        &store,
        StaticSigningProvider::new(config),
        ScriptedGpgBackend::default(),
    );

    let verdict = verifier
        .verify_commit(
            &RequestContext::new(),
            &commit(JANE_EMAIL, Some(instance.sign(PAYLOAD))),
        )
        .await;

    assert_eq!(verdict.reason, VerdictReason::NoKeyFound);
}

#[tokio::test]
async fn test_store_failure() {
    let signer = SshSigner::new(7);
    let store = store_with_jane().await;
    let verifier = verifier(&store, default_signing(), ScriptedGpgBackend::default());
    store.set_failure(Some("timeout")).await;

    let verdict = verifier
        .verify_commit_with_committer(
            &RequestContext::new(),
            &commit(JANE_EMAIL, Some(signer.sign(PAYLOAD))),
            Some(jane()),
        )
        .await;

    assert_eq!(verdict.reason, VerdictReason::KeyRetrievalFailed);
}
