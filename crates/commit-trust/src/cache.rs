//! Read-through lookup cache shared across verification requests.
//!
//! Three caches are kept: GPG key records by key id, activated emails by
//! owner id and accounts by id. Entries expire after a short TTL; a miss
//! always falls through to the authoritative store, so staleness only delays
//! key or email changes by at most one TTL. Lookup failures, empty key id
//! lookups and missing accounts are never cached, so a newly registered key
//! or account is visible on the next request.

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;

use crate::error::TrustResult;
use crate::types::{Account, AccountId, GpgKey};

/// Default entry TTL.
const DEFAULT_TTL_SECS: u64 = 60;

/// Default capacity of each cache.
const DEFAULT_MAX_ENTRIES: u64 = 10_000;

/// Lookup cache sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

/// Process-wide lookup cache. Cloning shares the underlying storage.
#[derive(Clone)]
pub struct LookupCache {
    gpg_keys: Cache<String, Arc<Vec<GpgKey>>>,
    owner_emails: Cache<AccountId, Arc<Vec<String>>>,
    accounts: Cache<AccountId, Arc<Account>>,
}

impl std::fmt::Debug for LookupCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookupCache")
            .field("gpg_keys", &self.gpg_keys.entry_count())
            .field("owner_emails", &self.owner_emails.entry_count())
            .field("accounts", &self.accounts.entry_count())
            .finish()
    }
}

impl Default for LookupCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl LookupCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            gpg_keys: build(config),
            owner_emails: build(config),
            accounts: build(config),
        }
    }

    /// GPG key records for `key_id`, loading on miss. Ids are case-folded.
    /// Empty results are not cached.
    pub async fn gpg_keys<F, Fut>(&self, key_id: &str, load: F) -> TrustResult<Arc<Vec<GpgKey>>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = TrustResult<Vec<GpgKey>>>,
    {
        let key = key_id.to_ascii_uppercase();
        if let Some(keys) = self.gpg_keys.get(&key) {
            return Ok(keys);
        }
        let keys = Arc::new(load().await?);
        if !keys.is_empty() {
            self.gpg_keys.insert(key, Arc::clone(&keys));
        }
        Ok(keys)
    }

    /// Activated emails of an account, loading on miss.
    pub async fn owner_emails<F, Fut>(
        &self,
        owner_id: AccountId,
        load: F,
    ) -> TrustResult<Arc<Vec<String>>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = TrustResult<Vec<String>>>,
    {
        get_or_load(&self.owner_emails, owner_id, || async move {
            load().await.map(Arc::new)
        })
        .await
    }

    /// Account by id, loading on miss. `None` results are not cached.
    pub async fn account<F, Fut>(&self, id: AccountId, load: F) -> TrustResult<Option<Arc<Account>>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = TrustResult<Option<Account>>>,
    {
        if let Some(account) = self.accounts.get(&id) {
            return Ok(Some(account));
        }
        let loaded = load().await?.map(Arc::new);
        if let Some(account) = &loaded {
            self.accounts.insert(id, Arc::clone(account));
        }
        Ok(loaded)
    }

    /// Drop every cached entry.
    pub fn invalidate_all(&self) {
        self.gpg_keys.invalidate_all();
        self.owner_emails.invalidate_all();
        self.accounts.invalidate_all();
    }
}

fn build<K, V>(config: CacheConfig) -> Cache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    Cache::builder()
        .max_capacity(config.max_entries)
        .time_to_live(config.ttl)
        .build()
}

async fn get_or_load<K, V, F, Fut>(cache: &Cache<K, V>, key: K, load: F) -> TrustResult<V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = TrustResult<V>>,
{
    if let Some(value) = cache.get(&key) {
        return Ok(value);
    }
    let value = load().await?;
    cache.insert(key, value.clone());
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::error::TrustError;

    #[tokio::test]
    async fn test_gpg_keys_loaded_once() {
        let cache = LookupCache::default();
        let loads = AtomicUsize::new(0);
        for _ in 0..3 {
            let keys = cache
                .gpg_keys("abcd", || async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok(vec![GpgKey::with_key_id("ABCD")])
                })
                .await
                .unwrap();
            assert_eq!(keys.len(), 1);
        }
        // case-folded key
        cache
            .gpg_keys("ABCD", || async { Ok(Vec::new()) })
            .await
            .unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_key_id_not_cached() {
        let cache = LookupCache::default();
        let keys = cache.gpg_keys("FEED", || async { Ok(Vec::new()) }).await.unwrap();
        assert!(keys.is_empty());

        // registered after the first miss
        let keys = cache
            .gpg_keys("FEED", || async { Ok(vec![GpgKey::with_key_id("FEED")]) })
            .await
            .unwrap();
        assert_eq!(keys.len(), 1);
    }

    #[tokio::test]
    async fn test_errors_not_cached() {
        let cache = LookupCache::default();
        let err = cache
            .owner_emails(1, || async { Err(TrustError::lookup("down")) })
            .await;
        assert!(err.is_err());

        let emails = cache
            .owner_emails(1, || async { Ok(vec!["a@x".to_string()]) })
            .await
            .unwrap();
        assert_eq!(emails.as_slice(), ["a@x".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_account_not_cached() {
        let cache = LookupCache::default();
        assert!(cache.account(5, || async { Ok(None) }).await.unwrap().is_none());
        let account = cache
            .account(5, || async { Ok(Some(Account::new(5, "e", "e@x"))) })
            .await
            .unwrap();
        assert_eq!(account.map(|a| a.id), Some(5));

        // served from cache now
        let cached = cache
            .account(5, || async { Err(TrustError::lookup("must not load")) })
            .await
            .unwrap();
        assert!(cached.is_some());
    }

    #[tokio::test]
    async fn test_invalidate_all() {
        let cache = LookupCache::default();
        cache
            .owner_emails(1, || async { Ok(vec!["a@x".to_string()]) })
            .await
            .unwrap();
        cache.invalidate_all();
        let reloaded = cache
            .owner_emails(1, || async { Ok(vec!["b@x".to_string()]) })
            .await
            .unwrap();
        assert_eq!(reloaded.as_slice(), ["b@x".to_string()]);
    }
}
