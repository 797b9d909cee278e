//! Render scheduling: coalesced, frame-paced and throttled while scanning

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::RenderSettings;

/// Draws the current state. Reads whatever is current at call time.
pub trait RenderSink: Send + Sync {
    fn render(&self);
}

impl<F> RenderSink for F
where
    F: Fn() + Send + Sync,
{
    fn render(&self) {
        self()
    }
}

struct SchedulerState {
    pending: AtomicBool,
    scanning: AtomicBool,
    notify: Notify,
    renders: AtomicU64,
    frame: Duration,
    throttle: Duration,
    last_render: Mutex<Option<Instant>>,
}

impl SchedulerState {
    /// When a render requested at `requested` may run: one frame later, and
    /// while scanning no sooner than `throttle` after the previous render
    fn next_deadline(&self, requested: Instant) -> Instant {
        let frame = requested + self.frame;
        if !self.scanning.load(Ordering::Acquire) {
            return frame;
        }
        match *self.last_render.lock() {
            Some(last) => frame.max(last + self.throttle),
            None => frame,
        }
    }

    fn flush(&self, sink: &dyn RenderSink) {
        if self.pending.swap(false, Ordering::AcqRel) {
            sink.render();
            self.renders.fetch_add(1, Ordering::Relaxed);
            *self.last_render.lock() = Some(Instant::now());
        }
    }
}

/// Coalesces render requests: any number of `schedule_render` calls before
/// the next frame produce one render. While a scan runs, renders are at
/// least `scan_throttle_ms` apart.
#[derive(Clone)]
pub struct RenderScheduler {
    state: Arc<SchedulerState>,
}

impl RenderScheduler {
    pub fn new(settings: &RenderSettings) -> Self {
        Self {
            state: Arc::new(SchedulerState {
                pending: AtomicBool::new(false),
                scanning: AtomicBool::new(false),
                notify: Notify::new(),
                renders: AtomicU64::new(0),
                frame: Duration::from_millis(settings.frame_interval_ms.max(1)),
                throttle: Duration::from_millis(settings.scan_throttle_ms),
                last_render: Mutex::new(None),
            }),
        }
    }

    pub fn schedule_render(&self) {
        if !self.state.pending.swap(true, Ordering::AcqRel) {
            self.state.notify.notify_one();
        }
    }

    /// Leaving scan mode wakes the loop so a throttled render moves up to the next frame
    pub fn set_scanning(&self, scanning: bool) {
        let was_scanning = self.state.scanning.swap(scanning, Ordering::AcqRel);
        if was_scanning && !scanning {
            self.state.notify.notify_one();
        }
    }

    pub fn render_count(&self) -> u64 {
        self.state.renders.load(Ordering::Relaxed)
    }

    /// Run the render loop until `shutdown` fires; a pending render is flushed on exit
    pub fn spawn(&self, sink: Arc<dyn RenderSink>, shutdown: CancellationToken) -> JoinHandle<()> {
        let state = self.state.clone();
        tokio::spawn(async move {
            'run: loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = state.notify.notified() => {}
                }
                if !state.pending.load(Ordering::Acquire) {
                    continue;
                }

                let requested = Instant::now();
                loop {
                    // Re-evaluated whenever the scanning mode changes mid-wait
                    let deadline = state.next_deadline(requested);
                    tokio::select! {
                        _ = shutdown.cancelled() => break 'run,
                        _ = sleep_until(deadline) => break,
                        _ = state.notify.notified() => {}
                    }
                }
                state.flush(sink.as_ref());
            }
            state.flush(sink.as_ref());
            debug!("Render loop stopped after {} renders", state.renders.load(Ordering::Relaxed));
        })
    }
}
