//! Email attribution for GPG keys.
//!
//! Decides whether a signature made with a key may be attributed to a target
//! email, and to which concrete address.

use std::sync::Arc;

use crate::cache::LookupCache;
use crate::context::RequestContext;
use crate::error::TrustResult;
use crate::store::IdentityStore;
use crate::types::{fold_eq, Account, AccountId, GpgKey};

/// Attributes keys to emails, going through the owner-scoped lookup cache.
pub(crate) struct EmailMatcher<'a> {
    identities: &'a dyn IdentityStore,
    cache: &'a LookupCache,
}

/// Owner data fetched for the previous candidate key.
struct OwnerData {
    id: AccountId,
    emails: Arc<Vec<String>>,
    account: Option<Arc<Account>>,
}

fn matches_target(email: &str, target: &str) -> bool {
    target.is_empty() || fold_eq(email, target)
}

impl<'a> EmailMatcher<'a> {
    pub(crate) fn new(identities: &'a dyn IdentityStore, cache: &'a LookupCache) -> Self {
        Self { identities, cache }
    }

    /// First attributable email over `keys`, in order. An empty `target`
    /// accepts any activated address.
    ///
    /// Owner data is only refetched when the owner differs from the previous
    /// candidate's.
    pub(crate) async fn attribute(
        &self,
        ctx: &RequestContext,
        target: &str,
        keys: &[&GpgKey],
    ) -> TrustResult<Option<String>> {
        let mut owner: Option<OwnerData> = None;
        for key in keys {
            if let Some(email) = key
                .emails
                .iter()
                .find(|e| e.is_activated && matches_target(&e.email, target))
            {
                return Ok(Some(email.email.clone()));
            }

            let owner_id = match key.owner_id {
                Some(id) if key.verified && id != 0 => id,
                _ => continue,
            };
            if owner.as_ref().map(|o| o.id) != Some(owner_id) {
                owner = Some(self.load_owner(ctx, owner_id).await?);
            }
            let Some(data) = owner.as_ref() else {
                continue;
            };

            if let Some(email) = data.emails.iter().find(|e| matches_target(e, target)) {
                return Ok(Some(email.clone()));
            }
            if let Some(placeholder) = data
                .account
                .as_ref()
                .and_then(|account| account.placeholder_email.as_deref())
            {
                if fold_eq(placeholder, target) {
                    return Ok(Some(placeholder.to_string()));
                }
            }
        }
        Ok(None)
    }

    async fn load_owner(&self, ctx: &RequestContext, owner_id: AccountId) -> TrustResult<OwnerData> {
        let emails = self
            .cache
            .owner_emails(owner_id, || {
                ctx.run(self.identities.activated_emails(ctx, owner_id))
            })
            .await?;
        let account = self
            .cache
            .account(owner_id, || ctx.run(self.identities.account_by_id(ctx, owner_id)))
            .await?;
        Ok(OwnerData {
            id: owner_id,
            emails,
            account,
        })
    }
}
