//! Seams for the collaborators a handler may need.
//!
//! The gateway does not own user storage or caching; it only carries handles
//! to them so message handlers can reach them through the connection they
//! are serving. Both collaborators are optional.

use crate::error::ServiceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// The identity facts a handler needs about a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    pub username: String,
    pub email: String,
}

/// Lookup of known users.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<UserIdentity>, ServiceError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserIdentity>, ServiceError>;
}

/// Key/value cache whose entries expire after a per-entry time to live.
#[async_trait]
pub trait ExpiringCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, ServiceError>;

    async fn set(&self, key: &str, value: serde_json::Value, ttl: Duration) -> Result<(), ServiceError>;

    /// Removes `key`, returning whether it was present and unexpired.
    async fn delete(&self, key: &str) -> Result<bool, ServiceError>;
}

#[derive(Debug)]
struct CacheEntry {
    value: serde_json::Value,
    expires_at: Instant,
}

/// In-process [`ExpiringCache`].
///
/// Expired entries are invisible to readers immediately but only freed by a
/// later write to the same key or by [`MemoryCache::purge_expired`].
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every expired entry and returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl ExpiringCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, ServiceError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: serde_json::Value, ttl: Duration) -> Result<(), ServiceError> {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, ServiceError> {
        let removed = self.entries.write().await.remove(key);
        Ok(removed.is_some_and(|entry| entry.expires_at > Instant::now()))
    }
}

/// Collaborators shared by every connection of a gateway.
#[derive(Clone, Default)]
pub struct Services {
    identity: Option<Arc<dyn IdentityStore>>,
    cache: Option<Arc<dyn ExpiringCache>>,
}

impl Services {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identity_store(mut self, store: Arc<dyn IdentityStore>) -> Self {
        self.identity = Some(store);
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn ExpiringCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// The identity store, or [`ServiceError::Unavailable`] if none is configured.
    pub fn identity(&self) -> Result<&dyn IdentityStore, ServiceError> {
        self.identity.as_deref().ok_or(ServiceError::Unavailable("identity store"))
    }

    /// The cache, or [`ServiceError::Unavailable`] if none is configured.
    pub fn cache(&self) -> Result<&dyn ExpiringCache, ServiceError> {
        self.cache.as_deref().ok_or(ServiceError::Unavailable("cache"))
    }
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services")
            .field("identity", &self.identity.is_some())
            .field("cache", &self.cache.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FixedIdentities(Vec<UserIdentity>);

    #[async_trait]
    impl IdentityStore for FixedIdentities {
        async fn find_by_id(&self, id: &str) -> Result<Option<UserIdentity>, ServiceError> {
            Ok(self.0.iter().find(|user| user.id == id).cloned())
        }

        async fn find_by_email(&self, email: &str) -> Result<Option<UserIdentity>, ServiceError> {
            Ok(self.0.iter().find(|user| user.email == email).cloned())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_entries_expire() {
        let cache = MemoryCache::new();
        cache.set("session:1", json!({"user": "u1"}), Duration::from_secs(30)).await.unwrap();
        assert_eq!(cache.get("session:1").await.unwrap(), Some(json!({"user": "u1"})));

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(cache.get("session:1").await.unwrap(), None);
        assert_eq!(cache.len().await, 1);

        assert_eq!(cache.purge_expired().await, 1);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_cache_delete_reports_presence() {
        let cache = MemoryCache::new();
        cache.set("k", json!(1), Duration::from_secs(60)).await.unwrap();

        assert!(cache.delete("k").await.unwrap());
        assert!(!cache.delete("k").await.unwrap());
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_services_report_missing_collaborators() {
        let services = Services::default();
        assert!(matches!(services.identity(), Err(ServiceError::Unavailable("identity store"))));
        assert!(matches!(services.cache(), Err(ServiceError::Unavailable("cache"))));
    }

    #[tokio::test]
    async fn test_services_expose_identity_store() {
        let user = UserIdentity {
            id: "u1".to_string(),
            username: "ayla".to_string(),
            email: "ayla@example.com".to_string(),
        };
        let services = Services::new()
            .with_identity_store(Arc::new(FixedIdentities(vec![user.clone()])))
            .with_cache(Arc::new(MemoryCache::new()));

        let store = services.identity().unwrap();
        assert_eq!(store.find_by_email("ayla@example.com").await.unwrap(), Some(user));
        assert_eq!(store.find_by_id("nobody").await.unwrap(), None);
        assert!(services.cache().is_ok());
    }
}
