use tracing::{debug, warn};

use super::summary::{AuxiliaryReport, IndexOutcome};
use crate::error::EvictError;
use crate::namespace::Namespace;
use crate::storage::{DropIndexOutcome, KeyValueStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexPolicy {
    pub drop_index: bool,
    pub delete_documents: bool,
}

/// Removes the counter key and secondary index of a namespace.
pub struct AuxiliaryCleaner<'a, S: KeyValueStore + ?Sized> {
    store: &'a S,
    policy: IndexPolicy,
}

impl<'a, S: KeyValueStore + ?Sized> AuxiliaryCleaner<'a, S> {
    pub fn new(store: &'a S, policy: IndexPolicy) -> Self {
        Self { store, policy }
    }

    /// Never fails: a missing counter or index is the common case, and index
    /// errors are reported in the returned [`AuxiliaryReport`].
    pub async fn cleanup(&self, namespace: &Namespace) -> AuxiliaryReport {
        let mut report = AuxiliaryReport::skipped();

        match self.store.delete(&[namespace.counter_key().to_string()]).await {
            Ok(removed) => {
                report.counter_removed = removed > 0;
                debug!(
                    "Counter '{}' {}",
                    namespace.counter_key(),
                    if removed > 0 { "removed" } else { "absent" }
                );
            }
            Err(e) => {
                warn!("Failed to delete counter '{}': {}", namespace.counter_key(), e);
                report.counter_error = Some(e.to_string());
            }
        }

        if !self.policy.drop_index {
            return report;
        }

        report.index = match self
            .store
            .drop_index(namespace.index_name(), self.policy.delete_documents)
            .await
        {
            Ok(DropIndexOutcome::Dropped) => {
                debug!("Index '{}' dropped", namespace.index_name());
                IndexOutcome::Dropped
            }
            Ok(DropIndexOutcome::NotFound) => {
                debug!("Index '{}' does not exist", namespace.index_name());
                IndexOutcome::Absent
            }
            Err(e) => {
                let err = EvictError::IndexCleanupFailed(e);
                warn!("Ignoring index failure for '{}': {}", namespace, err);
                IndexOutcome::Failed(err.to_string())
            }
        };
        report
    }
}
