//! Bounded-concurrency wallet scanner.
//!
//! A `ScannerContext` owns its caches, the settled wallet results, the
//! failed-job queue and the cancellation token of the running scan. Jobs
//! are dispatched FIFO from a shared cursor to a fixed pool of workers;
//! completion order is unspecified.

pub mod state;

use futures_util::future::join_all;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::aggregate::PortfolioView;
use crate::change::ChangeResolver;
use crate::config::{Config, ScanSettings};
use crate::core::{wallet_key, Chain, GatewayError, HoldingRecord, ScanError, ScanJob, WalletIdentifier, WalletScan};
use crate::gateway::{fetch_wallet_day_change, fetch_wallet_holdings, ProviderApi};
use crate::render::RenderScheduler;
use crate::util::cache::Caches;
use crate::util::display::{short_address, truncate};

pub use state::{
    FailedJob, JobProgress, JobState, MessageLevel, ScanProgress, ScanStatus, ScanSummary, StatusMessage,
};
use state::ScanState;

const MAX_MESSAGE_ERROR_CHARS: usize = 120;

pub struct ScannerContext {
    api: Arc<dyn ProviderApi>,
    settings: ScanSettings,
    caches: Arc<Caches>,
    resolver: ChangeResolver,
    state: Mutex<ScanState>,
    running: AtomicBool,
    cancel: Mutex<Option<CancellationToken>>,
    render: Option<RenderScheduler>,
}

impl ScannerContext {
    pub fn new(api: Arc<dyn ProviderApi>, config: &Config) -> Self {
        let caches = Arc::new(Caches::new(&config.cache, config.change.zero_epsilon));
        let resolver = ChangeResolver::new(api.clone(), caches.clone(), config);
        Self {
            api,
            settings: config.scan.clone(),
            caches,
            resolver,
            state: Mutex::new(ScanState::new()),
            running: AtomicBool::new(false),
            cancel: Mutex::new(None),
            render: None,
        }
    }

    /// Request a render after every settled job
    pub fn with_render(mut self, render: RenderScheduler) -> Self {
        self.render = Some(render);
        self
    }

    /// Queue for `wallets`: Solana first, then EVM, duplicates dropped.
    /// Each job keeps its position in `wallets` as its index.
    pub fn build_jobs(wallets: &[WalletIdentifier]) -> Vec<ScanJob> {
        let mut seen = HashSet::new();
        let indexed = || wallets.iter().enumerate();
        let solana = indexed().filter(|(_, w)| w.chain == Chain::Solana);
        let evm = indexed().filter(|(_, w)| w.chain == Chain::Evm);

        solana
            .chain(evm)
            .filter(|(_, w)| seen.insert(w.key()))
            .map(|(index, w)| ScanJob {
                wallet: w.normalized.clone(),
                chain: w.chain,
                index,
            })
            .collect()
    }

    /// Scan every wallet. Fails only when nothing can be scanned or a scan
    /// is already running; per-wallet failures end up in the failed queue.
    pub async fn scan(&self, wallets: &[WalletIdentifier]) -> Result<ScanSummary, ScanError> {
        let jobs = Self::build_jobs(wallets);
        if jobs.is_empty() {
            return Err(ScanError::NoWallets);
        }
        self.run_jobs(jobs).await
    }

    /// Re-run the jobs that failed in the last scan
    pub async fn retry_failed(&self) -> Result<ScanSummary, ScanError> {
        if self.is_scanning() {
            return Err(ScanError::AlreadyRunning);
        }
        let jobs: Vec<ScanJob> = self
            .state
            .lock()
            .failed
            .iter()
            .map(|failed| failed.job.clone())
            .collect();
        if jobs.is_empty() {
            return Err(ScanError::NoWallets);
        }
        self.run_jobs(jobs).await
    }

    #[instrument(skip(self, jobs), fields(jobs = jobs.len()))]
    async fn run_jobs(&self, jobs: Vec<ScanJob>) -> Result<ScanSummary, ScanError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Scan requested while another is running");
            return Err(ScanError::AlreadyRunning);
        }

        let purged = self.caches.purge_expired();
        if purged > 0 {
            debug!("Purged {} expired cache entries", purged);
        }

        let cancel = CancellationToken::new();
        *self.cancel.lock() = Some(cancel.clone());
        {
            let mut state = self.state.lock();
            state.status = ScanStatus::Running;
            state.failed.clear();
            state.progress = jobs
                .iter()
                .map(|job| JobProgress {
                    job: job.clone(),
                    state: JobState::Pending,
                })
                .collect();
        }
        if let Some(render) = &self.render {
            render.set_scanning(true);
            render.schedule_render();
        }

        let started = Instant::now();
        let workers = self.settings.worker_count().min(jobs.len()).max(1);
        info!("🔎 Scanning {} wallets with {} workers", jobs.len(), workers);

        let cursor = AtomicUsize::new(0);
        join_all((0..workers).map(|worker| self.worker(worker, &jobs, &cursor, &cancel))).await;

        Ok(self.finish(&cancel, started))
    }

    async fn worker(&self, worker: usize, jobs: &[ScanJob], cursor: &AtomicUsize, cancel: &CancellationToken) {
        loop {
            if cancel.is_cancelled() {
                break;
            }
            let slot = cursor.fetch_add(1, Ordering::AcqRel);
            let Some(job) = jobs.get(slot) else {
                break;
            };
            self.state.lock().set_job_state(slot, JobState::Running);
            debug!("Worker {} picked {}", worker, job.key());

            match self.run_job(job, cancel).await {
                Ok(done) => {
                    self.state.lock().set_job_state(slot, done);
                }
                Err(GatewayError::Cancelled) => {
                    debug!("Job {} cancelled", job.key());
                    self.state.lock().set_job_state(slot, JobState::Cancelled);
                }
                Err(e) => self.record_failure(slot, job, &e),
            }
            self.schedule_render();
        }
    }

    async fn run_job(&self, job: &ScanJob, cancel: &CancellationToken) -> Result<JobState, GatewayError> {
        let key = job.key();

        if let Some(cached) = self.caches.wallet_scan.get(&key) {
            let day_change = self
                .state
                .lock()
                .wallets
                .get(&key)
                .and_then(|scan| scan.day_change_usd);
            let holdings = if job.chain == Chain::Solana && self.settings.refresh_change_on_cache_hit {
                self.resolver.enrich_holdings(cached, cancel).await?
            } else {
                cached
            };
            if cancel.is_cancelled() {
                return Err(GatewayError::Cancelled);
            }
            self.store(job, holdings, day_change);
            return Ok(JobState::Cached);
        }

        let raw = fetch_wallet_holdings(self.api.as_ref(), &job.wallet, job.chain, cancel).await?;
        let (holdings, day_change) = match job.chain {
            Chain::Solana => {
                let enriched = self.resolver.enrich_holdings(raw.clone(), cancel).await?;
                let day_change = match fetch_wallet_day_change(self.api.as_ref(), &job.wallet, cancel).await {
                    Ok(day_change) => day_change,
                    Err(GatewayError::Cancelled) => return Err(GatewayError::Cancelled),
                    Err(e) => {
                        debug!("No net worth history for {}: {}", job.wallet, e);
                        None
                    }
                };
                (enriched, day_change)
            }
            Chain::Evm => (raw.clone(), None),
        };

        if cancel.is_cancelled() {
            return Err(GatewayError::Cancelled);
        }
        self.caches.wallet_scan.set(key, raw);
        self.store(job, holdings, day_change);
        Ok(JobState::Done)
    }

    /// Settle a wallet and rebuild the view in one critical section
    fn store(&self, job: &ScanJob, holdings: Vec<HoldingRecord>, day_change_usd: Option<f64>) {
        let scan = WalletScan {
            wallet: job.wallet.clone(),
            chain: job.chain,
            holdings,
            day_change_usd,
            fetched_at: chrono::Utc::now(),
        };
        let mut state = self.state.lock();
        state.wallets.insert(scan.key(), scan);
        state.recompute();
    }

    fn record_failure(&self, slot: usize, job: &ScanJob, error: &GatewayError) {
        warn!("Failed to load {} wallet {}: {}", job.chain, job.wallet, error);
        let text = format!(
            "Failed to load {} wallet {}: {}",
            job.chain,
            short_address(&job.wallet),
            truncate(&error.to_string(), MAX_MESSAGE_ERROR_CHARS)
        );

        let mut state = self.state.lock();
        state.set_job_state(slot, JobState::Failed);
        state.failed.push(FailedJob {
            job: job.clone(),
            error: error.to_string(),
        });
        state.push_message(MessageLevel::Error, text);
    }

    fn finish(&self, cancel: &CancellationToken, started: Instant) -> ScanSummary {
        let cancelled = cancel.is_cancelled();
        let summary = {
            let mut state = self.state.lock();
            if cancelled {
                for progress in state.progress.iter_mut() {
                    if matches!(progress.state, JobState::Pending | JobState::Running) {
                        progress.state = JobState::Cancelled;
                    }
                }
                state.push_message(MessageLevel::Info, "Scan stopped".to_string());
            }
            state.status = if cancelled {
                ScanStatus::Cancelled
            } else {
                ScanStatus::Completed
            };
            state.recompute();

            let count = |wanted: &[JobState]| {
                state
                    .progress
                    .iter()
                    .filter(|p| wanted.contains(&p.state))
                    .count()
            };
            ScanSummary {
                status: state.status,
                total: state.progress.len(),
                succeeded: count(&[JobState::Done, JobState::Cached]),
                failed: count(&[JobState::Failed]),
                cancelled: count(&[JobState::Cancelled]),
                elapsed_ms: started.elapsed().as_millis() as u64,
            }
        };

        *self.cancel.lock() = None;
        self.running.store(false, Ordering::Release);
        if let Some(render) = &self.render {
            render.set_scanning(false);
            render.schedule_render();
        }

        info!(
            "✅ Scan {:?}: {} ok, {} failed, {} cancelled in {}ms",
            summary.status, summary.succeeded, summary.failed, summary.cancelled, summary.elapsed_ms
        );
        summary
    }

    fn schedule_render(&self) {
        if let Some(render) = &self.render {
            render.schedule_render();
        }
    }

    /// Stop starting new jobs and abort in-flight requests
    pub fn cancel(&self) {
        if let Some(cancel) = self.cancel.lock().as_ref() {
            info!("🛑 Cancelling scan");
            cancel.cancel();
        }
    }

    pub fn is_scanning(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn status(&self) -> ScanStatus {
        self.state.lock().status
    }

    pub fn progress(&self) -> ScanProgress {
        self.state.lock().progress()
    }

    pub fn failed_queue(&self) -> Vec<FailedJob> {
        self.state.lock().failed.clone()
    }

    pub fn messages(&self) -> Vec<StatusMessage> {
        self.state.lock().messages.clone()
    }

    pub fn dismiss_message(&self, id: u64) -> bool {
        let mut state = self.state.lock();
        let before = state.messages.len();
        state.messages.retain(|message| message.id != id);
        state.messages.len() != before
    }

    /// Latest portfolio snapshot
    pub fn view(&self) -> Arc<PortfolioView> {
        self.state.lock().view.clone()
    }

    /// Settled results of one wallet
    pub fn wallet(&self, chain: Chain, wallet: &str) -> Option<WalletScan> {
        self.state.lock().wallets.get(&wallet_key(chain, wallet)).cloned()
    }

    /// Drop a wallet's results and cached holdings
    pub fn remove_wallet(&self, chain: Chain, wallet: &str) -> bool {
        let key = wallet_key(chain, wallet);
        self.caches.wallet_scan.remove(&key);
        let removed = {
            let mut state = self.state.lock();
            let removed = state.wallets.remove(&key).is_some();
            if removed {
                state.recompute();
            }
            removed
        };
        if removed {
            self.schedule_render();
        }
        removed
    }
}
