//! Namespace naming convention.
//!
//! A namespace is not stored anywhere; it is the key prefix
//! `<name><separator>` plus two auxiliary names derived from it: the counter
//! key `<name><counter_suffix>` and the secondary index named `<name>`.

use crate::config::EvictionConfig;
use crate::error::EvictError;
use crate::pattern;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    name: String,
    prefix: String,
    counter_key: String,
}

impl Namespace {
    /// Validates `name` and derives its keys. Rejects names that would make
    /// the scan cover the whole keyspace: empty, blank, or made only of `*`.
    pub fn new(name: &str, config: &EvictionConfig) -> Result<Self, EvictError> {
        let reject = |reason: &str| EvictError::NoOp {
            namespace: name.to_string(),
            reason: reason.to_string(),
        };

        if name.trim().is_empty() {
            return Err(reject("namespace is empty"));
        }
        if name.chars().all(|c| c == '*') {
            return Err(reject("namespace is the store-wide wildcard"));
        }

        Ok(Self {
            name: name.to_string(),
            prefix: format!("{}{}", name, config.separator),
            counter_key: format!("{}{}", name, config.counter_suffix),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `<name><separator>`; every entry key starts with this.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// SCAN pattern with the name escaped, so it can never widen the match.
    pub fn scan_pattern(&self) -> String {
        format!("{}*", pattern::escape(&self.prefix))
    }

    pub fn counter_key(&self) -> &str {
        &self.counter_key
    }

    pub fn index_name(&self) -> &str {
        &self.name
    }

    pub fn owns(&self, key: &str) -> bool {
        key.starts_with(&self.prefix)
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_keys() {
        let ns = Namespace::new("ns", &EvictionConfig::default()).unwrap();
        assert_eq!(ns.prefix(), "ns:");
        assert_eq!(ns.scan_pattern(), "ns:*");
        assert_eq!(ns.counter_key(), "ns-vec_num");
        assert_eq!(ns.index_name(), "ns");
        assert!(ns.owns("ns:1"));
        assert!(!ns.owns("ns-vec_num"));
        assert!(!ns.owns("nsx:1"));
    }

    #[test]
    fn test_guard_rejects_wildcards() {
        let config = EvictionConfig::default();
        for bad in ["", "   ", "*", "**"] {
            match Namespace::new(bad, &config) {
                Err(EvictError::NoOp { .. }) => {}
                other => panic!("expected NoOp for {:?}, got {:?}", bad, other),
            }
        }
        let nested = Namespace::new("a:b", &config).unwrap();
        assert_eq!(nested.prefix(), "a:b:");
    }

    #[test]
    fn test_metacharacters_are_escaped() {
        let ns = Namespace::new("us*r", &EvictionConfig::default()).unwrap();
        assert_eq!(ns.scan_pattern(), "us\\*r:*");
        assert!(pattern::matches(&ns.scan_pattern(), b"us*r:1"));
        assert!(!pattern::matches(&ns.scan_pattern(), b"user:1"));
    }
}
