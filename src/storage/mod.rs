//! Key-value store abstraction.
//!
//! The eviction engine only needs three primitives from a store: cursor based
//! SCAN, multi-key DELETE and DROP_INDEX. Backends own their cursor state in a
//! [`CursorTable`] so the token handed to callers stays an opaque `u64`.

pub mod memory;
pub mod sled_store;

pub use memory::MemoryStore;
pub use sled_store::SledStore;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::pattern;

/// Opaque SCAN position. `Cursor::INITIAL` both starts and ends a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cursor(u64);

impl Cursor {
    pub const INITIAL: Cursor = Cursor(0);

    pub fn is_initial(self) -> bool {
        self.0 == 0
    }

    pub fn id(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPage {
    pub cursor: Cursor,
    pub keys: Vec<String>,
    /// Matching keys left out of `keys` because they are not valid UTF-8.
    pub unreadable: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropIndexOutcome {
    Dropped,
    NotFound,
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Examines up to `count` keys after `cursor` and returns those matching
    /// `pattern`. The page may be empty while the returned cursor is not
    /// `INITIAL`.
    async fn scan(&self, cursor: Cursor, pattern: &str, count: usize)
        -> Result<ScanPage, StoreError>;

    /// Removes `keys`, returning how many existed.
    async fn delete(&self, keys: &[String]) -> Result<u64, StoreError>;

    async fn drop_index(
        &self,
        name: &str,
        delete_documents: bool,
    ) -> Result<DropIndexOutcome, StoreError>;
}

const MAX_OPEN_CURSORS: usize = 1024;

struct OpenCursor {
    pattern: String,
    last_key: Vec<u8>,
}

/// Server-side cursor bookkeeping.
///
/// A cursor records the last key examined, so a resumed scan continues
/// strictly after it no matter what was deleted in between. Cursors are single
/// use and bound to the pattern they were issued for.
#[derive(Default)]
pub struct CursorTable {
    next_id: u64,
    open: BTreeMap<u64, OpenCursor>,
}

impl CursorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the key to resume after, or `None` for a fresh scan.
    pub fn resume(&mut self, cursor: Cursor, pattern: &str) -> Result<Option<Vec<u8>>, StoreError> {
        if cursor.is_initial() {
            return Ok(None);
        }
        let invalid = || StoreError::InvalidCursor {
            cursor: cursor.id(),
            pattern: pattern.to_string(),
        };
        let open = self.open.remove(&cursor.id()).ok_or_else(invalid)?;
        if open.pattern != pattern {
            return Err(invalid());
        }
        Ok(Some(open.last_key))
    }

    pub fn issue(&mut self, pattern: &str, last_key: Vec<u8>) -> Cursor {
        // Abandoned scans never come back for their cursor.
        while self.open.len() >= MAX_OPEN_CURSORS {
            self.open.pop_first();
        }
        self.next_id = self.next_id.wrapping_add(1).max(1);
        self.open.insert(
            self.next_id,
            OpenCursor {
                pattern: pattern.to_string(),
                last_key,
            },
        );
        Cursor(self.next_id)
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }
}

/// Fills one SCAN page from `keys`, which must yield keys in ascending order
/// starting at the scan position, itself no earlier than the pattern's literal
/// prefix. Stops after `count` examined keys or when
/// `keys` leaves the pattern's literal prefix.
pub(crate) fn fill_page<I>(
    cursors: &mut CursorTable,
    keys: I,
    pattern: &str,
    count: usize,
) -> Result<ScanPage, StoreError>
where
    I: Iterator<Item = Result<Vec<u8>, StoreError>>,
{
    let literal = pattern::literal_prefix(pattern);
    let mut matched = Vec::new();
    let mut unreadable = 0u64;
    let mut examined = 0usize;
    let mut last_key = None;

    for key in keys {
        let key = key?;
        if !key.starts_with(&literal) {
            break;
        }
        examined += 1;
        if pattern::matches(pattern, &key) {
            match std::str::from_utf8(&key) {
                Ok(s) => matched.push(s.to_string()),
                Err(_) => unreadable += 1,
            }
        }
        if examined >= count.max(1) {
            last_key = Some(key);
            break;
        }
    }

    let cursor = match last_key {
        Some(key) => cursors.issue(pattern, key),
        None => Cursor::INITIAL,
    };
    Ok(ScanPage {
        cursor,
        keys: matched,
        unreadable,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(list: &[&str]) -> impl Iterator<Item = Result<Vec<u8>, StoreError>> {
        list.iter()
            .map(|k| Ok(k.as_bytes().to_vec()))
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn test_cursor_bound_to_pattern() {
        let mut table = CursorTable::new();
        let cursor = table.issue("ns:*", b"ns:5".to_vec());
        assert!(!cursor.is_initial());
        assert_eq!(
            table.resume(cursor, "other:*"),
            Err(StoreError::InvalidCursor {
                cursor: cursor.id(),
                pattern: "other:*".to_string()
            })
        );

        let cursor = table.issue("ns:*", b"ns:5".to_vec());
        assert_eq!(table.resume(cursor, "ns:*").unwrap(), Some(b"ns:5".to_vec()));
        // Single use.
        assert!(table.resume(cursor, "ns:*").is_err());
        assert_eq!(table.resume(Cursor::INITIAL, "ns:*").unwrap(), None);
    }

    #[test]
    fn test_cursor_table_is_bounded() {
        let mut table = CursorTable::new();
        let first = table.issue("a*", b"a".to_vec());
        for _ in 0..MAX_OPEN_CURSORS {
            table.issue("a*", b"a".to_vec());
        }
        assert_eq!(table.len(), MAX_OPEN_CURSORS);
        assert!(table.resume(first, "a*").is_err());
    }

    #[test]
    fn test_fill_page_counts_examined_not_matched() {
        let mut table = CursorTable::new();
        let page = fill_page(&mut table, keys(&["a:1", "a:2", "a:3"]), "a:[13]", 2).unwrap();
        assert_eq!(page.keys, vec!["a:1".to_string()]);
        assert!(!page.cursor.is_initial());

        let page = fill_page(&mut table, keys(&["a:3"]), "a:[13]", 2).unwrap();
        assert_eq!(page.keys, vec!["a:3".to_string()]);
        assert!(page.cursor.is_initial());
    }

    #[test]
    fn test_fill_page_stops_at_literal_prefix() {
        let mut table = CursorTable::new();
        let page = fill_page(&mut table, keys(&["ns:1", "other:1", "other:2"]), "ns:*", 10).unwrap();
        assert_eq!(page.keys, vec!["ns:1".to_string()]);
        assert!(page.cursor.is_initial());
        assert!(table.is_empty());
    }

    #[test]
    fn test_fill_page_counts_unreadable_keys() {
        let mut table = CursorTable::new();
        let raw: Vec<Result<Vec<u8>, StoreError>> = vec![
            Ok(b"ns:1".to_vec()),
            Ok(b"ns:\xff\xfe".to_vec()),
            Ok(b"ns:2".to_vec()),
        ];
        let page = fill_page(&mut table, raw.into_iter(), "ns:*", 10).unwrap();
        assert_eq!(page.keys, vec!["ns:1".to_string(), "ns:2".to_string()]);
        assert_eq!(page.unreadable, 1);
    }
}
