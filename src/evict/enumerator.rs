use tracing::{debug, warn};

use crate::error::EvictError;
use crate::namespace::Namespace;
use crate::storage::{Cursor, KeyValueStore};

/// One SCAN page worth of namespace keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBatch {
    pub keys: Vec<String>,
    /// Cursor the store returned with this page; `INITIAL` on the last one.
    pub cursor: Cursor,
    /// Namespace keys the store matched but could not hand back as text.
    pub unreadable: u64,
}

/// Lazily pages through the keys of one namespace.
///
/// Each call to [`next_batch`](Self::next_batch) issues exactly one SCAN.
/// The sequence ends after the store hands back the initial cursor, or after
/// the first failure. It cannot be restarted; build a new enumerator instead.
pub struct KeyEnumerator<'a, S: KeyValueStore + ?Sized> {
    store: &'a S,
    namespace: &'a Namespace,
    pattern: String,
    page_size: usize,
    cursor: Cursor,
    finished: bool,
    pages: u64,
    unreadable: u64,
}

impl<'a, S: KeyValueStore + ?Sized> KeyEnumerator<'a, S> {
    pub fn new(store: &'a S, namespace: &'a Namespace, page_size: usize) -> Self {
        Self {
            store,
            namespace,
            pattern: namespace.scan_pattern(),
            page_size: page_size.max(1),
            cursor: Cursor::INITIAL,
            finished: false,
            pages: 0,
            unreadable: 0,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn pages(&self) -> u64 {
        self.pages
    }

    /// Total non-UTF-8 keys seen so far. These cannot be deleted by name.
    pub fn unreadable(&self) -> u64 {
        self.unreadable
    }

    pub async fn next_batch(&mut self) -> Option<Result<KeyBatch, EvictError>> {
        if self.finished {
            return None;
        }

        let page = match self.store.scan(self.cursor, &self.pattern, self.page_size).await {
            Ok(page) => page,
            Err(e) => {
                self.finished = true;
                return Some(Err(EvictError::ScanFailed(e)));
            }
        };
        self.pages += 1;
        self.cursor = page.cursor;
        if self.cursor.is_initial() {
            self.finished = true;
        }

        let returned = page.keys.len();
        let keys: Vec<String> = page
            .keys
            .into_iter()
            .filter(|k| self.namespace.owns(k))
            .collect();
        if page.unreadable > 0 {
            self.unreadable += page.unreadable;
            warn!(
                "Scan of '{}' matched {} keys that are not valid UTF-8; they are left in place",
                self.pattern, page.unreadable
            );
        }
        if keys.len() != returned {
            warn!(
                "Scan of '{}' returned {} keys outside the namespace; ignoring them",
                self.pattern,
                returned - keys.len()
            );
        }
        debug!(
            "Scan page {} of '{}': {} keys, cursor {}",
            self.pages,
            self.pattern,
            keys.len(),
            self.cursor.id()
        );

        Some(Ok(KeyBatch {
            keys,
            cursor: self.cursor,
            unreadable: page.unreadable,
        }))
    }
}
