use crate::config::EvictionConfig;
use crate::error::EvictError;
use crate::evict::KeyEnumerator;
use crate::namespace::Namespace;
use crate::storage::KeyValueStore;

/// Collects up to `limit` keys of `namespace`. The flag is set when at least
/// one more key exists past the limit.
pub async fn list_keys<S: KeyValueStore + ?Sized>(
    store: &S,
    namespace: &str,
    limit: Option<usize>,
    config: &EvictionConfig,
) -> Result<(Vec<String>, bool), EvictError> {
    let namespace = Namespace::new(namespace, config)?;
    let mut enumerator = KeyEnumerator::new(store, &namespace, config.scan_count);
    let limit = limit.unwrap_or(usize::MAX);
    let mut keys = Vec::new();
    while let Some(batch) = enumerator.next_batch().await {
        for key in batch?.keys {
            if keys.len() == limit {
                return Ok((keys, true));
            }
            keys.push(key);
        }
    }
    Ok((keys, false))
}

pub async fn handle_scan_command<S: KeyValueStore + ?Sized>(
    store: &S,
    namespace: &str,
    limit: Option<usize>,
    config: &EvictionConfig,
) -> Result<(), EvictError> {
    let (keys, more) = list_keys(store, namespace, limit, config).await?;
    for key in &keys {
        println!("{}", key);
    }
    if more {
        println!("... {} shown, more remain", keys.len());
    } else {
        println!("{} keys in '{}'", keys.len(), namespace);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn test_list_respects_limit() {
        let store = MemoryStore::new();
        for i in 0..20 {
            store.set(&format!("ns:{:02}", i), "v").unwrap();
        }
        store.set("other:1", "v").unwrap();
        let config = EvictionConfig {
            scan_count: 4,
            ..EvictionConfig::default()
        };

        let (keys, more) = list_keys(&store, "ns", Some(6), &config).await.unwrap();
        assert_eq!(keys.len(), 6);
        assert_eq!(keys[0], "ns:00");
        assert!(more);

        let (keys, more) = list_keys(&store, "ns", None, &config).await.unwrap();
        assert_eq!(keys.len(), 20);
        assert!(!more);
        assert_eq!(store.len(), 21);
    }

    #[tokio::test]
    async fn test_limit_on_page_boundary() {
        let store = MemoryStore::new();
        for i in 0..8 {
            store.set(&format!("ns:{}", i), "v").unwrap();
        }
        let config = EvictionConfig {
            scan_count: 4,
            ..EvictionConfig::default()
        };

        let (keys, more) = list_keys(&store, "ns", Some(4), &config).await.unwrap();
        assert_eq!(keys.len(), 4);
        assert!(more);

        let (keys, more) = list_keys(&store, "ns", Some(8), &config).await.unwrap();
        assert_eq!(keys.len(), 8);
        assert!(!more);
    }

    #[tokio::test]
    async fn test_list_rejects_wildcard() {
        let store = MemoryStore::new();
        assert!(list_keys(&store, "*", None, &EvictionConfig::default()).await.is_err());
    }
}
