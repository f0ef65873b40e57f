use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvictionStatus {
    /// Every key seen by the scan was deleted.
    Complete,
    /// The scan or a delete failed, or the run was cancelled. Re-running is
    /// safe and finishes the remainder.
    Partial,
    /// The namespace was rejected; nothing was touched.
    NoOp,
}

impl std::fmt::Display for EvictionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EvictionStatus::Complete => "complete",
            EvictionStatus::Partial => "partial",
            EvictionStatus::NoOp => "noop",
        };
        write!(f, "{}", s)
    }
}

/// What happened to the namespace's secondary index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "error", rename_all = "snake_case")]
pub enum IndexOutcome {
    Dropped,
    Absent,
    Failed(String),
    /// Index dropping disabled, or auxiliary cleanup never ran.
    Skipped,
}

impl IndexOutcome {
    pub fn removed(&self) -> bool {
        matches!(self, IndexOutcome::Dropped)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            IndexOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuxiliaryReport {
    pub counter_removed: bool,
    /// Set when the counter delete itself failed.
    pub counter_error: Option<String>,
    pub index: IndexOutcome,
}

impl AuxiliaryReport {
    pub fn skipped() -> Self {
        Self {
            counter_removed: false,
            counter_error: None,
            index: IndexOutcome::Skipped,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvictionSummary {
    pub run_id: Uuid,
    pub namespace: String,
    pub deleted: u64,
    /// DELETE calls issued.
    pub batches: u64,
    /// SCAN pages consumed.
    pub pages: u64,
    /// Namespace keys left behind because they are not valid UTF-8.
    #[serde(default)]
    pub unreadable: u64,
    pub counter_removed: bool,
    pub counter_error: Option<String>,
    pub index: IndexOutcome,
    pub status: EvictionStatus,
    pub failure: Option<String>,
    pub cancelled: bool,
    /// Runs folded into this summary by a retrying caller.
    pub attempts: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl EvictionSummary {
    pub(crate) fn begin(namespace: &str) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            namespace: namespace.to_string(),
            deleted: 0,
            batches: 0,
            pages: 0,
            unreadable: 0,
            counter_removed: false,
            counter_error: None,
            index: IndexOutcome::Skipped,
            status: EvictionStatus::Complete,
            failure: None,
            cancelled: false,
            attempts: 1,
            started_at: now,
            finished_at: now,
        }
    }

    /// Summary for a namespace the guard refused.
    pub fn rejected(namespace: &str, reason: &str) -> Self {
        let mut summary = Self::begin(namespace);
        summary.status = EvictionStatus::NoOp;
        summary.failure = Some(reason.to_string());
        summary
    }

    /// Summary for a run that ended in an error before producing its own.
    /// Nothing is known to be deleted, so the result is `Partial`.
    pub fn failed(namespace: &str, error: &str) -> Self {
        let mut summary = Self::begin(namespace);
        summary.status = EvictionStatus::Partial;
        summary.failure = Some(error.to_string());
        summary
    }

    pub(crate) fn merge_auxiliary(&mut self, report: AuxiliaryReport) {
        self.counter_removed = report.counter_removed;
        self.counter_error = report.counter_error;
        self.index = report.index;
    }

    pub fn index_removed(&self) -> bool {
        self.index.removed()
    }

    pub fn is_complete(&self) -> bool {
        self.status == EvictionStatus::Complete
    }
}

impl std::fmt::Display for EvictionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "namespace={} status={} deleted={} batches={} counter_removed={} index={}",
            self.namespace,
            self.status,
            self.deleted,
            self.batches,
            self.counter_removed,
            match &self.index {
                IndexOutcome::Dropped => "dropped".to_string(),
                IndexOutcome::Absent => "absent".to_string(),
                IndexOutcome::Skipped => "skipped".to_string(),
                IndexOutcome::Failed(e) => format!("failed ({})", e),
            }
        )?;
        if self.unreadable > 0 {
            write!(f, " unreadable={}", self.unreadable)?;
        }
        if let Some(failure) = &self.failure {
            write!(f, " failure=\"{}\"", failure)?;
        }
        Ok(())
    }
}
