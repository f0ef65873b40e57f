//! In-process store backed by a `BTreeMap`.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{fill_page, Cursor, CursorTable, DropIndexOutcome, KeyValueStore, ScanPage};
use crate::error::StoreError;
use crate::pattern;

#[derive(Default)]
struct MemoryInner {
    entries: BTreeMap<String, Vec<u8>>,
    // index name -> keys of indexed documents
    indexes: BTreeMap<String, BTreeSet<String>>,
    cursors: CursorTable,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryInner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::DatabaseError("memory store lock poisoned".into()))
    }

    pub fn set(&self, key: &str, value: impl Into<Vec<u8>>) -> Result<(), StoreError> {
        self.lock()?.entries.insert(key.to_string(), value.into());
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.lock()?.entries.get(key).cloned())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().map(|g| g.entries.contains_key(key)).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.lock().map(|g| g.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock()
            .map(|g| g.entries.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Registers an index. Existing documents are kept.
    pub fn create_index(&self, name: &str) -> Result<(), StoreError> {
        self.lock()?.indexes.entry(name.to_string()).or_default();
        Ok(())
    }

    pub fn has_index(&self, name: &str) -> bool {
        self.lock().map(|g| g.indexes.contains_key(name)).unwrap_or(false)
    }

    pub fn index_document(&self, name: &str, key: &str) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let docs = inner
            .indexes
            .get_mut(name)
            .ok_or_else(|| StoreError::DatabaseError(format!("unknown index '{}'", name)))?;
        docs.insert(key.to_string());
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn scan(
        &self,
        cursor: Cursor,
        pattern: &str,
        count: usize,
    ) -> Result<ScanPage, StoreError> {
        let mut guard = self.lock()?;
        let inner = &mut *guard;
        let start = match inner.cursors.resume(cursor, pattern)? {
            Some(last) => {
                Bound::Excluded(String::from_utf8(last).map_err(|e| {
                    StoreError::DatabaseError(format!("non-utf8 cursor key: {}", e))
                })?)
            }
            None => {
                let literal = pattern::literal_prefix(pattern);
                Bound::Included(String::from_utf8_lossy(&literal).into_owned())
            }
        };
        let keys = inner
            .entries
            .range::<String, _>((start, Bound::Unbounded))
            .map(|(k, _)| Ok(k.as_bytes().to_vec()));
        fill_page(&mut inner.cursors, keys, pattern, count)
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, StoreError> {
        let mut inner = self.lock()?;
        let removed = keys
            .iter()
            .filter(|k| inner.entries.remove(k.as_str()).is_some())
            .count();
        Ok(removed as u64)
    }

    async fn drop_index(
        &self,
        name: &str,
        delete_documents: bool,
    ) -> Result<DropIndexOutcome, StoreError> {
        let mut inner = self.lock()?;
        let Some(docs) = inner.indexes.remove(name) else {
            return Ok(DropIndexOutcome::NotFound);
        };
        if delete_documents {
            for key in &docs {
                inner.entries.remove(key);
            }
        }
        Ok(DropIndexOutcome::Dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn scan_all(store: &MemoryStore, pattern: &str, count: usize) -> (Vec<String>, usize) {
        let mut cursor = Cursor::INITIAL;
        let mut keys = Vec::new();
        let mut pages = 0;
        loop {
            let page = store.scan(cursor, pattern, count).await.unwrap();
            pages += 1;
            keys.extend(page.keys);
            cursor = page.cursor;
            if cursor.is_initial() {
                break;
            }
        }
        (keys, pages)
    }

    #[tokio::test]
    async fn test_scan_pages_through_prefix_only() {
        let store = MemoryStore::new();
        for i in 0..10 {
            store.set(&format!("ns:{:02}", i), "v").unwrap();
        }
        store.set("a:1", "v").unwrap();
        store.set("ns-vec_num", "10").unwrap();
        store.set("zz:1", "v").unwrap();

        let (keys, pages) = scan_all(&store, "ns:*", 3).await;
        assert_eq!(keys.len(), 10);
        assert!(keys.iter().all(|k| k.starts_with("ns:")));
        assert_eq!(pages, 4);
    }

    #[tokio::test]
    async fn test_scan_survives_deletes_between_pages() {
        let store = MemoryStore::new();
        for i in 0..9 {
            store.set(&format!("ns:{}", i), "v").unwrap();
        }
        let mut cursor = Cursor::INITIAL;
        let mut seen = Vec::new();
        loop {
            let page = store.scan(cursor, "ns:*", 2).await.unwrap();
            store.delete(&page.keys).await.unwrap();
            seen.extend(page.keys);
            cursor = page.cursor;
            if cursor.is_initial() {
                break;
            }
        }
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 9);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_delete_counts_existing_keys_only() {
        let store = MemoryStore::new();
        store.set("ns:1", "v").unwrap();
        let removed = store
            .delete(&["ns:1".to_string(), "ns:missing".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.delete(&["ns:1".to_string()]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_drop_index() {
        let store = MemoryStore::new();
        store.set("doc:1", "v").unwrap();
        store.set("doc:2", "v").unwrap();
        store.create_index("docs").unwrap();
        store.index_document("docs", "doc:1").unwrap();

        assert_eq!(store.drop_index("missing", true).await.unwrap(), DropIndexOutcome::NotFound);
        assert_eq!(store.drop_index("docs", true).await.unwrap(), DropIndexOutcome::Dropped);
        assert!(!store.has_index("docs"));
        assert!(!store.contains("doc:1"));
        assert!(store.contains("doc:2"));
        assert_eq!(store.drop_index("docs", true).await.unwrap(), DropIndexOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_stale_cursor_rejected() {
        let store = MemoryStore::new();
        for i in 0..4 {
            store.set(&format!("ns:{}", i), "v").unwrap();
        }
        let page = store.scan(Cursor::INITIAL, "ns:*", 2).await.unwrap();
        assert!(!page.cursor.is_initial());
        assert!(matches!(
            store.scan(page.cursor, "other:*", 2).await,
            Err(StoreError::InvalidCursor { .. })
        ));
    }
}
