use async_trait::async_trait;

use crate::cache::{CacheEntry, ContentId};
use crate::error::StoreError;

/// Remote mapping from content identifier to cached model response.
///
/// `get` returning `Ok(None)` is an ordinary miss. Implementations do no
/// local caching and no retries of their own.
#[async_trait]
pub trait ResponseStore: Send + Sync {
    async fn get(&self, id: &ContentId) -> Result<Option<CacheEntry>, StoreError>;

    /// Full-record overwrite of `/responses/<id>`.
    async fn put(&self, id: &ContentId, entry: &CacheEntry) -> Result<(), StoreError>;

    /// Short label used in logs.
    fn name(&self) -> &'static str;
}
