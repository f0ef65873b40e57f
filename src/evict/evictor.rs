use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::auxiliary::{AuxiliaryCleaner, IndexPolicy};
use super::cancel::CancelToken;
use super::deleter::BatchDeleter;
use super::enumerator::KeyEnumerator;
use super::summary::{AuxiliaryReport, EvictionStatus, EvictionSummary};
use crate::config::EvictionConfig;
use crate::error::EvictError;
use crate::namespace::Namespace;
use crate::storage::KeyValueStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionPhase {
    Idle,
    Scanning,
    Deleting,
    AuxCleanup,
    Done,
    Rejected,
}

struct PhaseTracker<'n> {
    namespace: &'n str,
    phase: EvictionPhase,
}

impl PhaseTracker<'_> {
    fn enter(&mut self, next: EvictionPhase) {
        if self.phase != next {
            debug!("[{}] {:?} -> {:?}", self.namespace, self.phase, next);
            self.phase = next;
        }
    }
}

/// Removes every entry of a namespace plus its counter and index.
///
/// Holds no state between calls; one evictor can serve any number of
/// sequential or concurrent evictions of different namespaces.
pub struct NamespaceEvictor<'a, S: KeyValueStore + ?Sized> {
    store: &'a S,
    config: EvictionConfig,
    cancel: CancelToken,
}

impl<'a, S: KeyValueStore + ?Sized> NamespaceEvictor<'a, S> {
    pub fn new(store: &'a S, config: EvictionConfig) -> Result<Self, EvictError> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            cancel: CancelToken::new(),
        })
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &EvictionConfig {
        &self.config
    }

    /// Deletes the namespace's entries page by page, then its counter and
    /// index.
    ///
    /// Returns `Err` only for a rejected namespace. Scan and delete failures
    /// and cancellation end the run early with a `Partial` summary that
    /// counts what was already deleted.
    pub async fn evict_namespace(&self, name: &str) -> Result<EvictionSummary, EvictError> {
        let mut phase = PhaseTracker {
            namespace: name,
            phase: EvictionPhase::Idle,
        };
        let namespace = match Namespace::new(name, &self.config) {
            Ok(ns) => ns,
            Err(e) => {
                phase.enter(EvictionPhase::Rejected);
                warn!("{}", e);
                return Err(e);
            }
        };

        let mut summary = EvictionSummary::begin(name);
        info!(
            "Evicting namespace '{}' (pattern '{}', run {})",
            namespace,
            namespace.scan_pattern(),
            summary.run_id
        );

        let mut enumerator =
            KeyEnumerator::new(self.store, &namespace, self.config.scan_count);
        let mut deleter = BatchDeleter::new(self.store, self.config.delete_batch_size)
            .with_cancel(self.cancel.clone());
        let mut stopped: Option<EvictError> = None;

        phase.enter(EvictionPhase::Scanning);
        loop {
            if self.cancel.is_cancelled() {
                stopped = Some(EvictError::Cancelled);
                break;
            }
            let batch = match enumerator.next_batch().await {
                None => break,
                Some(Ok(batch)) => batch,
                Some(Err(e)) => {
                    error!("Scan of '{}' stopped: {}", namespace, e);
                    stopped = Some(e);
                    break;
                }
            };
            if batch.keys.is_empty() {
                continue;
            }
            phase.enter(EvictionPhase::Deleting);
            if let Err(e) = deleter.delete_all(&batch.keys).await {
                if e != EvictError::Cancelled {
                    error!("Delete for '{}' stopped after {} keys: {}", namespace, deleter.deleted(), e);
                }
                stopped = Some(e);
                break;
            }
            phase.enter(EvictionPhase::Scanning);
        }

        summary.deleted = deleter.deleted();
        summary.batches = deleter.batches();
        summary.pages = enumerator.pages();
        summary.unreadable = enumerator.unreadable();

        let report = match &stopped {
            Some(EvictError::Cancelled) => {
                summary.cancelled = true;
                AuxiliaryReport::skipped()
            }
            _ => {
                phase.enter(EvictionPhase::AuxCleanup);
                let policy = IndexPolicy {
                    drop_index: self.config.drop_index,
                    delete_documents: self.config.delete_documents,
                };
                AuxiliaryCleaner::new(self.store, policy)
                    .cleanup(&namespace)
                    .await
            }
        };
        let counter_error = report.counter_error.clone();
        summary.merge_auxiliary(report);

        if let Some(e) = stopped {
            summary.status = EvictionStatus::Partial;
            summary.failure = Some(e.to_string());
        } else if let Some(e) = counter_error {
            summary.status = EvictionStatus::Partial;
            summary.failure = Some(format!("counter delete failed: {}", e));
        } else if summary.unreadable > 0 {
            summary.status = EvictionStatus::Partial;
            summary.failure = Some(format!(
                "{} keys are not valid UTF-8 and were not deleted",
                summary.unreadable
            ));
        }
        summary.finished_at = Utc::now();
        phase.enter(EvictionPhase::Done);

        match summary.status {
            EvictionStatus::Complete => info!("Eviction finished: {}", summary),
            _ => warn!("Eviction incomplete, safe to re-run: {}", summary),
        }
        Ok(summary)
    }

    /// Number of keys `evict_namespace` would delete right now. Read-only.
    pub async fn count(&self, name: &str) -> Result<u64, EvictError> {
        let namespace = Namespace::new(name, &self.config)?;
        let mut enumerator =
            KeyEnumerator::new(self.store, &namespace, self.config.scan_count);
        let mut total = 0u64;
        while let Some(batch) = enumerator.next_batch().await {
            if self.cancel.is_cancelled() {
                return Err(EvictError::Cancelled);
            }
            total += batch?.keys.len() as u64;
        }
        Ok(total)
    }
}
