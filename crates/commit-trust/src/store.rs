//! Key and identity store contracts.
//!
//! Implementations are expected to honour the [`RequestContext`] they are
//! given; the engine additionally races every call against it.

use async_trait::async_trait;

use crate::context::RequestContext;
use crate::error::TrustResult;
use crate::types::{Account, AccountId, GpgKey, SshKey};

/// Read access to stored public keys.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// All GPG key records addressable by `key_id` (primary keys and
    /// subkeys), with subkeys loaded. Not owner scoped.
    async fn gpg_keys_by_key_id(
        &self,
        ctx: &RequestContext,
        key_id: &str,
    ) -> TrustResult<Vec<GpgKey>>;

    /// Primary GPG keys owned by an account. Subkeys may be left empty; see
    /// [`KeyStore::load_subkeys`].
    async fn gpg_keys_by_owner(
        &self,
        ctx: &RequestContext,
        owner_id: AccountId,
    ) -> TrustResult<Vec<GpgKey>>;

    /// Populate `subkeys` on each key.
    async fn load_subkeys(&self, ctx: &RequestContext, keys: &mut [GpgKey]) -> TrustResult<()>;

    /// SSH keys owned by an account, excluding principal entries.
    async fn ssh_keys_by_owner(
        &self,
        ctx: &RequestContext,
        owner_id: AccountId,
    ) -> TrustResult<Vec<SshKey>>;
}

/// Read access to accounts and their email addresses.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Account owning `email` (primary or activated secondary address).
    async fn account_by_email(
        &self,
        ctx: &RequestContext,
        email: &str,
    ) -> TrustResult<Option<Account>>;

    async fn account_by_id(
        &self,
        ctx: &RequestContext,
        id: AccountId,
    ) -> TrustResult<Option<Account>>;

    /// Activated email addresses of an account.
    async fn activated_emails(
        &self,
        ctx: &RequestContext,
        owner_id: AccountId,
    ) -> TrustResult<Vec<String>>;
}
