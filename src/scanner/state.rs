use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::aggregate::PortfolioView;
use crate::core::{ScanJob, WalletScan};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Idle,
    Running,
    Completed,
    Cancelled,
}

/// Per-job state shown in the progress list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Done,
    /// Served from the wallet cache
    Cached,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_finished(&self) -> bool {
        matches!(self, JobState::Done | JobState::Cached | JobState::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobProgress {
    pub job: ScanJob,
    pub state: JobState,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanProgress {
    pub jobs: Vec<JobProgress>,
    pub total: usize,
    pub finished: usize,
}

/// A job whose wallet fetch failed, kept for retry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedJob {
    pub job: ScanJob,
    pub error: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Info,
    Error,
}

/// Dismissible status banner
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusMessage {
    pub id: u64,
    pub level: MessageLevel,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanSummary {
    pub status: ScanStatus,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub elapsed_ms: u64,
}

/// Mutable scan state, only touched between awaits
pub(crate) struct ScanState {
    pub status: ScanStatus,
    pub wallets: BTreeMap<String, WalletScan>,
    pub view: Arc<PortfolioView>,
    pub progress: Vec<JobProgress>,
    pub failed: Vec<FailedJob>,
    pub messages: Vec<StatusMessage>,
    next_message_id: u64,
}

impl ScanState {
    pub fn new() -> Self {
        Self {
            status: ScanStatus::Idle,
            wallets: BTreeMap::new(),
            view: Arc::new(PortfolioView::default()),
            progress: Vec::new(),
            failed: Vec::new(),
            messages: Vec::new(),
            next_message_id: 1,
        }
    }

    pub fn push_message(&mut self, level: MessageLevel, text: String) -> u64 {
        let id = self.next_message_id;
        self.next_message_id += 1;
        self.messages.push(StatusMessage { id, level, text });
        id
    }

    pub fn set_job_state(&mut self, slot: usize, state: JobState) {
        if let Some(progress) = self.progress.get_mut(slot) {
            progress.state = state;
        }
    }

    /// Rebuild the view from every settled wallet
    pub fn recompute(&mut self) {
        self.view = Arc::new(PortfolioView::build(&self.wallets));
    }

    /// Progress listed by input position, whatever the queue order
    pub fn progress(&self) -> ScanProgress {
        let mut jobs = self.progress.clone();
        jobs.sort_by_key(|p| p.job.index);
        ScanProgress {
            jobs,
            total: self.progress.len(),
            finished: self.progress.iter().filter(|p| p.state.is_finished()).count(),
        }
    }
}
