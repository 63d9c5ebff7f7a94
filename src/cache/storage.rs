use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::cache::{CacheEntry, ContentId, ResponseStore, response_key};
use crate::error::StoreError;

/// Keeps cache entries as JSON files under `<base_dir>/responses/`.
#[derive(Clone, Debug)]
pub struct LocalFileStore {
    base_dir: PathBuf,
}

impl LocalFileStore {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn resolve_path(&self, id: &ContentId) -> PathBuf {
        let key = format!("{}.json", response_key(id));
        self.base_dir.join(Path::new(&key))
    }

    pub async fn exists(&self, id: &ContentId) -> Result<bool, StoreError> {
        match fs::metadata(self.resolve_path(id)).await {
            Ok(_) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl ResponseStore for LocalFileStore {
    async fn get(&self, id: &ContentId) -> Result<Option<CacheEntry>, StoreError> {
        let bytes = match fs::read(self.resolve_path(id)).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    async fn put(&self, id: &ContentId, entry: &CacheEntry) -> Result<(), StoreError> {
        let path = self.resolve_path(id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let payload = serde_json::to_vec_pretty(entry)?;
        // write-then-rename so a concurrent reader never sees half a record
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, payload).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::content_id;

    #[tokio::test]
    async fn miss_then_hit() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path().to_path_buf());
        let id = content_id(b"png bytes");

        assert!(store.get(&id).await.unwrap().is_none());
        assert!(!store.exists(&id).await.unwrap());

        let entry = CacheEntry::new("Null", &id);
        store.put(&id, &entry).await.unwrap();

        assert!(store.exists(&id).await.unwrap());
        assert_eq!(store.get(&id).await.unwrap(), Some(entry));
        assert!(
            store
                .resolve_path(&id)
                .ends_with(format!("responses/{id}.json"))
        );
    }

    #[tokio::test]
    async fn put_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path().to_path_buf());
        let id = content_id(b"same image");

        store.put(&id, &CacheEntry::new("first", &id)).await.unwrap();
        store.put(&id, &CacheEntry::new("second", &id)).await.unwrap();

        let got = store.get(&id).await.unwrap().unwrap();
        assert_eq!(got.response_text(), "second");
    }

    #[tokio::test]
    async fn corrupt_record_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path().to_path_buf());
        let id = content_id(b"corrupt");
        let path = store.resolve_path(&id);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"not json").unwrap();

        assert!(matches!(store.get(&id).await, Err(StoreError::Json(_))));
    }

    #[tokio::test]
    async fn record_written_without_encoding_is_a_hit() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path().to_path_buf());
        let id = content_id(b"hand written");
        let path = store.resolve_path(&id);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, br#"{"response":"cached text"}"#).unwrap();

        let got = store.get(&id).await.unwrap().unwrap();
        assert_eq!(got.response_text(), "cached text");
    }
}
