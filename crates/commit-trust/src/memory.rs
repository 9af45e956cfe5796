//! In-memory key and identity store.
//!
//! Implements [`KeyStore`] and [`IdentityStore`] over plain maps. Useful for
//! tests and for small deployments that load keys from configuration.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::context::RequestContext;
use crate::error::{TrustError, TrustResult};
use crate::store::{IdentityStore, KeyStore};
use crate::types::{fold_eq, Account, AccountId, GpgKey, SshKey};

/// In-memory trust store. Cloning shares the underlying data.
#[derive(Debug, Clone, Default)]
pub struct MemoryTrustStore {
    inner: Arc<RwLock<MemoryTrustStoreInner>>,
    lookups: Arc<AtomicUsize>,
}

#[derive(Debug, Default)]
struct MemoryTrustStoreInner {
    /// Account ID -> account
    accounts: HashMap<AccountId, Account>,

    /// Account ID -> (email, activated)
    emails: HashMap<AccountId, Vec<(String, bool)>>,

    /// Primary GPG keys; subkeys are stored inline.
    gpg_keys: Vec<GpgKey>,

    ssh_keys: Vec<SshKey>,

    /// When set, every lookup fails with this message.
    failure: Option<String>,
}

impl MemoryTrustStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an account. Its primary email is registered as activated.
    pub async fn add_account(&self, account: Account) {
        let mut inner = self.inner.write().await;
        inner
            .emails
            .entry(account.id)
            .or_default()
            .push((account.email.clone(), true));
        inner.accounts.insert(account.id, account);
    }

    /// Add a secondary email address to an account.
    pub async fn add_email(&self, owner_id: AccountId, email: impl Into<String>, activated: bool) {
        let mut inner = self.inner.write().await;
        inner
            .emails
            .entry(owner_id)
            .or_default()
            .push((email.into(), activated));
    }

    /// Add a primary GPG key. Subkeys go in [`GpgKey::subkeys`] and get their
    /// `primary_key_id` and owner filled in.
    pub async fn add_gpg_key(&self, mut key: GpgKey) {
        for sub in &mut key.subkeys {
            sub.primary_key_id = Some(key.key_id.clone());
            sub.owner_id = key.owner_id;
        }
        self.inner.write().await.gpg_keys.push(key);
    }

    pub async fn add_ssh_key(&self, key: SshKey) {
        self.inner.write().await.ssh_keys.push(key);
    }

    /// Make every subsequent lookup fail (`None` to recover).
    pub async fn set_failure(&self, message: Option<&str>) {
        self.inner.write().await.failure = message.map(String::from);
    }

    /// Number of lookups served so far.
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    async fn read(
        &self,
        ctx: &RequestContext,
    ) -> TrustResult<tokio::sync::RwLockReadGuard<'_, MemoryTrustStoreInner>> {
        ctx.check()?;
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let inner = self.inner.read().await;
        if let Some(message) = &inner.failure {
            return Err(TrustError::lookup(message.clone()));
        }
        Ok(inner)
    }
}

fn without_subkeys(key: &GpgKey) -> GpgKey {
    GpgKey {
        subkeys: Vec::new(),
        ..key.clone()
    }
}

#[async_trait]
impl KeyStore for MemoryTrustStore {
    async fn gpg_keys_by_key_id(
        &self,
        ctx: &RequestContext,
        key_id: &str,
    ) -> TrustResult<Vec<GpgKey>> {
        let inner = self.read(ctx).await?;
        let mut found = Vec::new();
        for key in &inner.gpg_keys {
            if key.key_id.eq_ignore_ascii_case(key_id) {
                found.push(key.clone());
            }
            found.extend(
                key.subkeys
                    .iter()
                    .filter(|sub| sub.key_id.eq_ignore_ascii_case(key_id))
                    .cloned(),
            );
        }
        Ok(found)
    }

    async fn gpg_keys_by_owner(
        &self,
        ctx: &RequestContext,
        owner_id: AccountId,
    ) -> TrustResult<Vec<GpgKey>> {
        let inner = self.read(ctx).await?;
        Ok(inner
            .gpg_keys
            .iter()
            .filter(|key| key.owner_id == Some(owner_id))
            .map(without_subkeys)
            .collect())
    }

    async fn load_subkeys(&self, ctx: &RequestContext, keys: &mut [GpgKey]) -> TrustResult<()> {
        let inner = self.read(ctx).await?;
        for key in keys.iter_mut() {
            key.subkeys = inner
                .gpg_keys
                .iter()
                .find(|stored| stored.id == key.id && stored.key_id == key.key_id)
                .map(|stored| stored.subkeys.clone())
                .unwrap_or_default();
        }
        Ok(())
    }

    async fn ssh_keys_by_owner(
        &self,
        ctx: &RequestContext,
        owner_id: AccountId,
    ) -> TrustResult<Vec<SshKey>> {
        let inner = self.read(ctx).await?;
        Ok(inner
            .ssh_keys
            .iter()
            .filter(|key| key.owner_id == Some(owner_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl IdentityStore for MemoryTrustStore {
    async fn account_by_email(
        &self,
        ctx: &RequestContext,
        email: &str,
    ) -> TrustResult<Option<Account>> {
        let inner = self.read(ctx).await?;
        let owner = inner.emails.iter().find_map(|(owner_id, emails)| {
            emails
                .iter()
                .any(|(e, activated)| *activated && fold_eq(e, email))
                .then_some(*owner_id)
        });
        Ok(owner.and_then(|id| inner.accounts.get(&id).cloned()))
    }

    async fn account_by_id(
        &self,
        ctx: &RequestContext,
        id: AccountId,
    ) -> TrustResult<Option<Account>> {
        let inner = self.read(ctx).await?;
        Ok(inner.accounts.get(&id).cloned())
    }

    async fn activated_emails(
        &self,
        ctx: &RequestContext,
        owner_id: AccountId,
    ) -> TrustResult<Vec<String>> {
        let inner = self.read(ctx).await?;
        Ok(inner
            .emails
            .get(&owner_id)
            .map(|emails| {
                emails
                    .iter()
                    .filter(|(_, activated)| *activated)
                    .map(|(email, _)| email.clone())
                    .collect()
            })
            .unwrap_or_default())
    }
}
