//! Caller-side policy around [`NamespaceEvictor`]: retrying partial runs and
//! evicting several namespaces at once.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{info, warn};

use super::cancel::CancelToken;
use super::evictor::NamespaceEvictor;
use super::summary::{EvictionStatus, EvictionSummary, IndexOutcome};
use crate::config::EvictionConfig;
use crate::error::EvictError;
use crate::storage::KeyValueStore;

pub struct EvictionRunner<S: KeyValueStore + 'static> {
    store: Arc<S>,
    config: EvictionConfig,
    cancel: CancelToken,
}

impl<S: KeyValueStore + 'static> Clone for EvictionRunner<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            config: self.config.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

impl<S: KeyValueStore + 'static> EvictionRunner<S> {
    pub fn new(store: Arc<S>, config: EvictionConfig) -> Result<Self, EvictError> {
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

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn evictor(&self) -> Result<NamespaceEvictor<'_, S>, EvictError> {
        Ok(NamespaceEvictor::new(&*self.store, self.config.clone())?.with_cancel(self.cancel.clone()))
    }

    /// Evicts `name`, re-running while the result is `Partial` and attempts
    /// remain. The returned summary is the last attempt's, with `deleted`,
    /// `batches` and `pages` summed over all attempts and the counter and
    /// index reported removed if any attempt removed them.
    pub async fn evict_with_retry(&self, name: &str) -> Result<EvictionSummary, EvictError> {
        let evictor = self.evictor()?;
        let backoff = Duration::from_millis(self.config.retry_backoff_ms);
        let mut total: Option<EvictionSummary> = None;

        for attempt in 1..=self.config.max_attempts {
            let mut summary = evictor.evict_namespace(name).await?;
            if let Some(prev) = &total {
                summary.deleted += prev.deleted;
                summary.batches += prev.batches;
                summary.pages += prev.pages;
                summary.started_at = prev.started_at;
                // An earlier attempt may already have removed what this one
                // found missing.
                summary.counter_removed |= prev.counter_removed;
                if prev.index == IndexOutcome::Dropped && summary.index == IndexOutcome::Absent {
                    summary.index = IndexOutcome::Dropped;
                }
            }
            summary.attempts = attempt;

            let done = summary.status != EvictionStatus::Partial || summary.cancelled;
            total = Some(summary);
            if done || attempt == self.config.max_attempts {
                break;
            }
            warn!(
                "Attempt {}/{} for '{}' was partial; retrying in {:?}",
                attempt, self.config.max_attempts, name, backoff
            );
            tokio::time::sleep(backoff).await;
        }

        total.ok_or_else(|| EvictError::Config("max_attempts must be at least 1".into()))
    }

    /// Evicts each distinct namespace in its own task. Results come back in
    /// the order of first appearance in `names`.
    pub async fn evict_many(&self, names: &[String]) -> Vec<(String, Result<EvictionSummary, EvictError>)> {
        let mut seen = HashSet::new();
        let unique: Vec<String> = names
            .iter()
            .filter(|n| seen.insert(n.as_str()))
            .cloned()
            .collect();
        if unique.len() < names.len() {
            info!("Ignoring {} duplicate namespace(s)", names.len() - unique.len());
        }

        let mut tasks = JoinSet::new();
        for (pos, name) in unique.iter().enumerate() {
            let runner = self.clone();
            let name = name.clone();
            tasks.spawn(async move { (pos, runner.evict_with_retry(&name).await) });
        }

        let mut results: Vec<Option<Result<EvictionSummary, EvictError>>> =
            unique.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((pos, result)) => results[pos] = Some(result),
                Err(e) => warn!("Eviction task did not finish: {}", e),
            }
        }

        unique
            .into_iter()
            .zip(results)
            .map(|(name, result)| {
                let result = result.unwrap_or_else(|| {
                    Err(EvictError::TaskFailed(format!("task for '{}' aborted", name)))
                });
                (name, result)
            })
            .collect()
    }
}
