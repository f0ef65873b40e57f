//! Persistent store on sled.
//!
//! Entries live in the default tree. Index metadata lives in the `__indexes`
//! tree and each index keeps the keys of its documents in its own
//! `__index_docs:<name>` tree, so neither shows up in a SCAN.

use std::ops::Bound;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sled::transaction::{ConflictableTransactionError, TransactionError};

use super::{fill_page, Cursor, CursorTable, DropIndexOutcome, KeyValueStore, ScanPage};
use crate::error::StoreError;
use crate::pattern;

const INDEX_TREE: &str = "__indexes";

fn docs_tree_name(index: &str) -> String {
    format!("__index_docs:{}", index)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexMeta {
    pub name: String,
    pub created_at: i64,
}

pub struct SledStore {
    db: sled::Db,
    indexes: sled::Tree,
    cursors: Mutex<CursorTable>,
}

impl SledStore {
    pub fn open(path: &str) -> Result<Self, StoreError> {
        Self::from_db(sled::open(path)?)
    }

    /// Store in a temporary directory, removed on drop.
    pub fn temporary() -> Result<Self, StoreError> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: sled::Db) -> Result<Self, StoreError> {
        let indexes = db.open_tree(INDEX_TREE)?;
        Ok(Self {
            db,
            indexes,
            cursors: Mutex::new(CursorTable::new()),
        })
    }

    fn cursors(&self) -> Result<MutexGuard<'_, CursorTable>, StoreError> {
        self.cursors
            .lock()
            .map_err(|_| StoreError::DatabaseError("cursor table lock poisoned".into()))
    }

    // Generic Helper: Put
    pub fn put_value<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let serialized = bincode::serialize(value)?;
        self.db.insert(key.as_bytes(), serialized)?;
        Ok(())
    }

    // Generic Helper: Get
    pub fn get_value<T: for<'a> Deserialize<'a>>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.db.get(key.as_bytes())? {
            Some(data) => Ok(Some(bincode::deserialize(&data)?)),
            None => Ok(None),
        }
    }

    pub fn contains(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.db.contains_key(key.as_bytes())?)
    }

    pub fn len(&self) -> usize {
        self.db.len()
    }

    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }

    pub fn index_meta(&self, name: &str) -> Result<Option<IndexMeta>, StoreError> {
        match self.indexes.get(name.as_bytes())? {
            Some(data) => Ok(Some(bincode::deserialize(&data)?)),
            None => Ok(None),
        }
    }

    /// Registers `name`, returning the existing metadata if it is already
    /// there.
    pub fn create_index(&self, name: &str) -> Result<IndexMeta, StoreError> {
        if let Some(meta) = self.index_meta(name)? {
            return Ok(meta);
        }
        let meta = IndexMeta {
            name: name.to_string(),
            created_at: chrono::Utc::now().timestamp(),
        };
        self.indexes
            .insert(name.as_bytes(), bincode::serialize(&meta)?)?;
        self.db.open_tree(docs_tree_name(name))?;
        Ok(meta)
    }

    pub fn index_document(&self, name: &str, key: &str) -> Result<(), StoreError> {
        if self.index_meta(name)?.is_none() {
            return Err(StoreError::DatabaseError(format!("unknown index '{}'", name)));
        }
        self.db
            .open_tree(docs_tree_name(name))?
            .insert(key.as_bytes(), Vec::<u8>::new())?;
        Ok(())
    }

    pub async fn flush(&self) -> Result<usize, StoreError> {
        Ok(self.db.flush_async().await?)
    }
}

#[async_trait]
impl KeyValueStore for SledStore {
    async fn scan(
        &self,
        cursor: Cursor,
        pattern: &str,
        count: usize,
    ) -> Result<ScanPage, StoreError> {
        let mut cursors = self.cursors()?;
        let start = match cursors.resume(cursor, pattern)? {
            Some(last) => Bound::Excluded(last),
            None => Bound::Included(pattern::literal_prefix(pattern)),
        };
        let keys = self
            .db
            .range::<Vec<u8>, _>((start, Bound::Unbounded))
            .keys()
            .map(|k| k.map(|k| k.to_vec()).map_err(StoreError::from));
        fill_page(&mut cursors, keys, pattern, count)
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, StoreError> {
        let result = self.db.transaction(|tx| {
            let mut removed = 0u64;
            for key in keys {
                if tx.remove(key.as_bytes())?.is_some() {
                    removed += 1;
                }
            }
            Ok::<_, ConflictableTransactionError<()>>(removed)
        });
        match result {
            Ok(removed) => Ok(removed),
            Err(TransactionError::Storage(e)) => Err(e.into()),
            Err(TransactionError::Abort(())) => {
                Err(StoreError::DatabaseError("delete transaction aborted".into()))
            }
        }
    }

    async fn drop_index(
        &self,
        name: &str,
        delete_documents: bool,
    ) -> Result<DropIndexOutcome, StoreError> {
        if !self.indexes.contains_key(name.as_bytes())? {
            return Ok(DropIndexOutcome::NotFound);
        }
        // The registry entry goes last so a failed drop can be retried.
        let docs_name = docs_tree_name(name);
        if delete_documents {
            let docs = self.db.open_tree(&docs_name)?;
            for key in docs.iter().keys() {
                let key = key?;
                self.db.remove(&key)?;
                docs.remove(&key)?;
            }
        }
        self.db.drop_tree(docs_name.as_bytes())?;
        self.indexes.remove(name.as_bytes())?;
        Ok(DropIndexOutcome::Dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EvictionConfig;
    use crate::evict::{EvictionStatus, NamespaceEvictor};

    #[tokio::test]
    async fn test_scan_and_delete() {
        let store = SledStore::temporary().unwrap();
        for i in 0..25 {
            store.put_value(&format!("ns:{}", i), &i).unwrap();
        }
        store.put_value("other:1", &"keep").unwrap();

        let mut cursor = Cursor::INITIAL;
        let mut deleted = 0;
        loop {
            let page = store.scan(cursor, "ns:*", 7).await.unwrap();
            deleted += store.delete(&page.keys).await.unwrap();
            cursor = page.cursor;
            if cursor.is_initial() {
                break;
            }
        }
        assert_eq!(deleted, 25);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get_value::<String>("other:1").unwrap(), Some("keep".to_string()));
    }

    #[tokio::test]
    async fn test_index_trees_are_not_scanned() {
        let store = SledStore::temporary().unwrap();
        store.create_index("ns").unwrap();
        store.put_value("ns:1", &1u64).unwrap();
        store.index_document("ns", "ns:1").unwrap();

        let page = store.scan(Cursor::INITIAL, "*", 100).await.unwrap();
        assert_eq!(page.keys, vec!["ns:1".to_string()]);
        assert!(page.cursor.is_initial());
    }

    #[tokio::test]
    async fn test_drop_index_with_documents() {
        let store = SledStore::temporary().unwrap();
        let meta = store.create_index("books").unwrap();
        assert_eq!(store.create_index("books").unwrap(), meta);
        store.put_value("book:1", &"dune").unwrap();
        store.put_value("book:2", &"emma").unwrap();
        store.index_document("books", "book:1").unwrap();

        assert_eq!(store.drop_index("books", true).await.unwrap(), DropIndexOutcome::Dropped);
        assert!(!store.contains("book:1").unwrap());
        assert!(store.contains("book:2").unwrap());
        assert!(store.index_meta("books").unwrap().is_none());
        assert_eq!(store.drop_index("books", true).await.unwrap(), DropIndexOutcome::NotFound);
        assert!(store.index_document("books", "book:2").is_err());
    }

    #[tokio::test]
    async fn test_interrupted_drop_index_can_be_finished() {
        let store = SledStore::temporary().unwrap();
        store.create_index("books").unwrap();
        store.put_value("book:1", &"dune").unwrap();
        store.put_value("book:2", &"emma").unwrap();
        store.index_document("books", "book:1").unwrap();
        store.index_document("books", "book:2").unwrap();

        // State left by a drop that removed one document and then failed.
        store.db.remove("book:1").unwrap();
        store
            .db
            .open_tree(docs_tree_name("books"))
            .unwrap()
            .remove("book:1")
            .unwrap();

        assert!(store.index_meta("books").unwrap().is_some());
        assert_eq!(store.drop_index("books", true).await.unwrap(), DropIndexOutcome::Dropped);
        assert!(!store.contains("book:2").unwrap());
        assert!(store.index_meta("books").unwrap().is_none());
        assert!(!store
            .db
            .tree_names()
            .iter()
            .any(|t| t.as_ref() == docs_tree_name("books").as_bytes()));
    }

    #[tokio::test]
    async fn test_non_utf8_key_makes_eviction_partial() {
        let store = SledStore::temporary().unwrap();
        store.put_value("ns:1", &1u64).unwrap();
        store.db.insert(b"ns:\xff\xfe", Vec::<u8>::new()).unwrap();

        let evictor = NamespaceEvictor::new(&store, EvictionConfig::default()).unwrap();
        let summary = evictor.evict_namespace("ns").await.unwrap();

        assert_eq!(summary.deleted, 1);
        assert_eq!(summary.unreadable, 1);
        assert_eq!(summary.status, EvictionStatus::Partial);
        assert!(summary.failure.as_deref().unwrap().contains("not valid UTF-8"));
        assert!(store.db.contains_key(b"ns:\xff\xfe").unwrap());
    }

    #[tokio::test]
    async fn test_drop_index_keeps_documents() {
        let store = SledStore::temporary().unwrap();
        store.create_index("books").unwrap();
        store.put_value("book:1", &"dune").unwrap();
        store.index_document("books", "book:1").unwrap();

        assert_eq!(store.drop_index("books", false).await.unwrap(), DropIndexOutcome::Dropped);
        assert!(store.contains("book:1").unwrap());
    }
}
