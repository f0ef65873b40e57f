use std::sync::Arc;

use clap::Args;
use tracing::{info, warn};

use crate::config::EvictionConfig;
use crate::error::EvictError;
use crate::evict::{CancelToken, EvictionRunner, EvictionStatus, EvictionSummary, NamespaceEvictor};
use crate::storage::KeyValueStore;

#[derive(Args, Debug, Clone)]
pub struct EvictArgs {
    /// Namespaces to evict; distinct namespaces run concurrently
    #[arg(required = true)]
    pub namespaces: Vec<String>,
    /// Only count the keys that would be deleted
    #[arg(long)]
    pub dry_run: bool,
    /// Print summaries as JSON
    #[arg(long)]
    pub json: bool,
    /// Leave the secondary index in place
    #[arg(long)]
    pub no_index: bool,
    /// Drop the index but keep the documents it indexed
    #[arg(long)]
    pub keep_documents: bool,
    #[arg(long)]
    pub batch_size: Option<usize>,
    #[arg(long)]
    pub scan_count: Option<usize>,
    /// Attempts per namespace while the result stays partial
    #[arg(long)]
    pub attempts: Option<u32>,
}

impl EvictArgs {
    pub fn apply(&self, config: &mut EvictionConfig) {
        if self.no_index {
            config.drop_index = false;
        }
        if self.keep_documents {
            config.delete_documents = false;
        }
        if let Some(n) = self.batch_size {
            config.delete_batch_size = n;
        }
        if let Some(n) = self.scan_count {
            config.scan_count = n;
        }
        if let Some(n) = self.attempts {
            config.max_attempts = n;
        }
    }
}

/// Runs the `evict` command. Returns `true` when every namespace finished
/// `Complete`.
pub async fn handle_evict_command<S: KeyValueStore + 'static>(
    store: Arc<S>,
    args: EvictArgs,
    mut config: EvictionConfig,
    cancel: CancelToken,
) -> Result<bool, EvictError> {
    args.apply(&mut config);

    if args.dry_run {
        return dry_run(&*store, &args, config, cancel).await;
    }

    warn!("No snapshot is taken before eviction; back up the store first if the data matters.");
    let runner = EvictionRunner::new(store, config)?.with_cancel(cancel);
    let results = runner.evict_many(&args.namespaces).await;
    let (summaries, all_complete) = collect_summaries(results);

    if args.json {
        let out = serde_json::to_string_pretty(&summaries)
            .map_err(|e| EvictError::Config(format!("encoding summary: {}", e)))?;
        println!("{}", out);
    } else {
        for summary in &summaries {
            print_summary(summary);
        }
    }
    Ok(all_complete)
}

/// Turns per-namespace results into summaries, one per namespace, and
/// reports whether all of them are `Complete`.
fn collect_summaries(
    results: Vec<(String, Result<EvictionSummary, EvictError>)>,
) -> (Vec<EvictionSummary>, bool) {
    let mut summaries = Vec::with_capacity(results.len());
    let mut all_complete = true;
    for (name, result) in results {
        let summary = match result {
            Ok(summary) => summary,
            Err(EvictError::NoOp { reason, .. }) => EvictionSummary::rejected(&name, &reason),
            Err(e) => {
                warn!("Eviction of '{}' failed: {}", name, e);
                EvictionSummary::failed(&name, &e.to_string())
            }
        };
        all_complete &= summary.status == EvictionStatus::Complete;
        summaries.push(summary);
    }
    (summaries, all_complete)
}

async fn dry_run<S: KeyValueStore + ?Sized>(
    store: &S,
    args: &EvictArgs,
    config: EvictionConfig,
    cancel: CancelToken,
) -> Result<bool, EvictError> {
    let evictor = NamespaceEvictor::new(store, config)?.with_cancel(cancel);
    let mut all_ok = true;
    for name in &args.namespaces {
        match evictor.count(name).await {
            Ok(n) => {
                info!("Dry run for '{}': {} keys", name, n);
                if args.json {
                    println!("{}", serde_json::json!({ "namespace": name, "would_delete": n }));
                } else {
                    println!("{}: would delete {} keys", name, n);
                }
            }
            Err(e) => {
                all_ok = false;
                println!("{}: {}", name, e);
            }
        }
    }
    Ok(all_ok)
}

fn print_summary(summary: &EvictionSummary) {
    println!("Namespace:       {}", summary.namespace);
    println!("  Status:        {}", summary.status);
    println!("  Deleted:       {}", summary.deleted);
    println!("  Batches:       {}", summary.batches);
    if summary.attempts > 1 {
        println!("  Attempts:      {}", summary.attempts);
    }
    println!("  Counter:       {}", if summary.counter_removed { "removed" } else { "not present" });
    match summary.index.error() {
        Some(e) => println!("  Index:         not removed ({})", e),
        None => println!("  Index:         {:?}", summary.index),
    }
    if let Some(failure) = &summary.failure {
        println!("  Failure:       {}", failure);
    }
    if summary.status == EvictionStatus::Partial {
        println!("  Re-run the same command to finish the eviction.");
    }
}
