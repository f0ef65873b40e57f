//! Helpers for putting data into a store from the command line.

use crate::error::StoreError;
use crate::storage::{MemoryStore, SledStore};

pub trait SeedStore {
    fn put_string(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn ensure_index(&self, name: &str) -> Result<(), StoreError>;
    fn add_to_index(&self, name: &str, key: &str) -> Result<(), StoreError>;
}

impl SeedStore for SledStore {
    fn put_string(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.put_value(key, &value.to_string())
    }

    fn ensure_index(&self, name: &str) -> Result<(), StoreError> {
        self.create_index(name).map(|_| ())
    }

    fn add_to_index(&self, name: &str, key: &str) -> Result<(), StoreError> {
        self.index_document(name, key)
    }
}

impl SeedStore for MemoryStore {
    fn put_string(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.set(key, value)
    }

    fn ensure_index(&self, name: &str) -> Result<(), StoreError> {
        self.create_index(name)
    }

    fn add_to_index(&self, name: &str, key: &str) -> Result<(), StoreError> {
        self.index_document(name, key)
    }
}

pub fn handle_put_command<S: SeedStore + ?Sized>(store: &S, key: &str, value: &str) -> Result<(), StoreError> {
    store.put_string(key, value)?;
    println!("OK {}", key);
    Ok(())
}

pub fn handle_index_command<S: SeedStore + ?Sized>(
    store: &S,
    name: &str,
    documents: &[String],
) -> Result<(), StoreError> {
    store.ensure_index(name)?;
    for key in documents {
        store.add_to_index(name, key)?;
    }
    println!("Index '{}' ready ({} documents added)", name, documents.len());
    Ok(())
}
