pub mod cache;
pub mod cache_invalidation;
pub mod categorydb;
pub mod gateway;
pub mod memory;
pub mod supabase;
pub mod taskdb;
pub mod userdb;
pub mod walletdb;

use std::sync::Arc;

use uuid::Uuid;

use cache::QueryCache;
use cache_invalidation::{invalidate_cache_for_mutation, CacheInvalidationConfig};
use gateway::RemoteGateway;

/// Shared handle on the remote data gateway plus the local query cache.
#[derive(Clone)]
pub struct DBClient {
    pub gateway: Arc<dyn RemoteGateway>,
    pub cache: Arc<QueryCache>,
    invalidation: Arc<CacheInvalidationConfig>,
}

impl std::fmt::Debug for DBClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DBClient")
            .field("gateway", &"dyn RemoteGateway")
            .field("cache", &self.cache.stats())
            .finish()
    }
}

impl DBClient {
    pub fn new(gateway: Arc<dyn RemoteGateway>) -> Self {
        DBClient {
            gateway,
            cache: Arc::new(QueryCache::new()),
            invalidation: Arc::new(CacheInvalidationConfig::new()),
        }
    }

    /// Drops every cached read the mutation may have made stale.
    pub async fn invalidate(&self, mutation: &str, target: Option<Uuid>) {
        invalidate_cache_for_mutation(&self.cache, &self.invalidation, mutation, target).await;
    }
}
