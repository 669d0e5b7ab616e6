//! Background expiration scheduler.
//!
//! One tokio task per scheduler runs `sleep -> cycle -> sleep` until it is
//! cancelled. The delay is rearmed only after a cycle finishes, so at most
//! one cycle is ever in flight and a slow cycle pushes the next one back.

use std::{
    panic::AssertUnwindSafe,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use chrono::Utc;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use super::{BulkReaper, ExpiryPredicate, ReapError, ReapOutcome, RetentionPolicy};
use crate::{
    config::{ConfigError, ExpirationConfig},
    models::MESSAGES_VIEW_INDEX,
    observability::metrics,
    store::ExpiryStore,
};

/// Lifecycle of an [`ExpirationScheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Constructed with expiration enabled but not started yet.
    Idle,
    /// Expiration is turned off (`interval_secs == 0`). Terminal.
    Disabled,
    /// Waiting for the next cycle.
    Armed,
    /// A cycle is executing.
    Running,
    /// Stopped. Terminal.
    Disposed,
}

/// Counters accumulated over the scheduler's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub cycles_completed: u64,
    pub cycles_failed: u64,
    pub documents_deleted: u64,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<SchedulerState>,
    cycles_completed: AtomicU64,
    cycles_failed: AtomicU64,
    documents_deleted: AtomicU64,
}

impl Shared {
    fn new(state: SchedulerState) -> Self {
        Self {
            state: Mutex::new(state),
            cycles_completed: AtomicU64::new(0),
            cycles_failed: AtomicU64::new(0),
            documents_deleted: AtomicU64::new(0),
        }
    }

    fn set_state(&self, state: SchedulerState) {
        *self.state.lock() = state;
    }
}

/// Periodically deletes audit documents older than the retention window.
///
/// ```no_run
/// # use std::sync::Arc;
/// # use audit_expiry::{config::ExpirationConfig, expiration::ExpirationScheduler, store::InMemoryAuditStore};
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut scheduler = ExpirationScheduler::new(&ExpirationConfig::default())?;
/// scheduler.start(Arc::new(InMemoryAuditStore::default()));
/// // ...
/// scheduler.stop().await;
/// # Ok(())
/// # }
/// ```
pub struct ExpirationScheduler {
    policy: RetentionPolicy,
    interval: Option<Duration>,
    /// Interval is enabled but shorter than one hour.
    aggressive: bool,
    index_name: String,
    shared: Arc<Shared>,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ExpirationScheduler {
    /// Build a scheduler from configuration.
    ///
    /// Invalid retention settings are rejected here so they never surface
    /// at cycle time.
    pub fn new(config: &ExpirationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let policy = RetentionPolicy::from_config(config)?;
        let interval = config.interval();
        let state = if interval.is_some() {
            SchedulerState::Idle
        } else {
            SchedulerState::Disabled
        };

        Ok(Self {
            policy,
            interval,
            aggressive: config.is_aggressive(),
            index_name: MESSAGES_VIEW_INDEX.to_string(),
            shared: Arc::new(Shared::new(state)),
            cancel: CancellationToken::new(),
            handle: None,
        })
    }

    pub fn state(&self) -> SchedulerState {
        *self.shared.state.lock()
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            cycles_completed: self.shared.cycles_completed.load(Ordering::Relaxed),
            cycles_failed: self.shared.cycles_failed.load(Ordering::Relaxed),
            documents_deleted: self.shared.documents_deleted.load(Ordering::Relaxed),
        }
    }

    pub fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    /// Spawn the background task. Must be called from within a tokio
    /// runtime.
    ///
    /// Does nothing when expiration is disabled or the scheduler has
    /// already been started or stopped.
    pub fn start(&mut self, store: Arc<dyn ExpiryStore>) {
        let Some(interval) = self.interval else {
            tracing::info!("Expiration disabled by configuration (interval_secs = 0)");
            return;
        };

        if self.state() != SchedulerState::Idle {
            tracing::warn!(state = ?self.state(), "Expiration scheduler already started");
            return;
        }

        tracing::info!(
            interval_secs = interval.as_secs(),
            hours_to_keep = self.policy.hours_to_keep(),
            index = %self.index_name,
            "Starting expiration scheduler"
        );

        if self.aggressive {
            tracing::warn!(
                interval_secs = interval.as_secs(),
                default_interval_secs = crate::config::default_interval_secs(),
                "Expiration interval is shorter than one hour. Every cycle bulk-deletes \
                through the store; consider the default of 3 hours"
            );
        }

        self.shared.set_state(SchedulerState::Armed);

        let task = ExpirationTask {
            reaper: BulkReaper::new(store, self.index_name.clone()),
            policy: self.policy,
            interval,
            shared: self.shared.clone(),
            cancel: self.cancel.clone(),
        };
        let span = tracing::info_span!("expiration_scheduler", index = %self.index_name);
        self.handle = Some(tokio::spawn(task.run().instrument(span)));
    }

    /// Stop the scheduler, waiting for an in-flight cycle to finish.
    ///
    /// The store is not touched after this returns.
    pub async fn stop(&mut self) {
        self.cancel.cancel();

        if let Some(handle) = self.handle.take() {
            tracing::debug!("Waiting for expiration scheduler to finish");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Expiration scheduler task failed");
            }
        }

        let mut state = self.shared.state.lock();
        if *state != SchedulerState::Disabled {
            *state = SchedulerState::Disposed;
        }
    }
}

impl Drop for ExpirationScheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct ExpirationTask {
    reaper: BulkReaper,
    policy: RetentionPolicy,
    interval: Duration,
    shared: Arc<Shared>,
    cancel: CancellationToken,
}

impl ExpirationTask {
    async fn run(self) {
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }

            self.shared.set_state(SchedulerState::Running);
            let span = tracing::debug_span!("expiration_cycle", cycle_id = %Uuid::new_v4());
            self.run_cycle().instrument(span).await;
            self.shared.set_state(SchedulerState::Armed);
        }

        tracing::debug!("Expiration scheduler stopped");
    }

    /// Run one cycle. Every failure is handled here.
    async fn run_cycle(&self) {
        let result = AssertUnwindSafe(self.reap_once()).catch_unwind().await;

        match result {
            Ok(Ok(outcome)) => self.record_success(outcome),
            Ok(Err(ReapError::Cancelled { deleted })) if self.cancel.is_cancelled() => {
                self.shared
                    .documents_deleted
                    .fetch_add(deleted, Ordering::Relaxed);
                tracing::debug!(deleted, "Expiration cycle interrupted by shutdown");
            }
            Ok(Err(e)) => {
                self.shared.cycles_failed.fetch_add(1, Ordering::Relaxed);
                metrics::record_expiration_error(e.kind());
                tracing::error!(error = %e, "Error running expiration cycle");
            }
            Err(panic) => {
                self.shared.cycles_failed.fetch_add(1, Ordering::Relaxed);
                metrics::record_expiration_error("panic");
                tracing::error!(
                    panic = panic_message(panic.as_ref()),
                    "Expiration cycle panicked"
                );
            }
        }
    }

    async fn reap_once(&self) -> Result<ReapOutcome, ReapError> {
        let cutoff = self.policy.cutoff(Utc::now());
        let predicate = ExpiryPredicate::new(cutoff);

        tracing::debug!(
            cutoff = %cutoff,
            query = %predicate.to_lucene(),
            "Deleting expired audit documents"
        );

        self.reaper.reap(&predicate, &self.cancel).await
    }

    fn record_success(&self, outcome: ReapOutcome) {
        self.shared.cycles_completed.fetch_add(1, Ordering::Relaxed);
        self.shared
            .documents_deleted
            .fetch_add(outcome.deleted, Ordering::Relaxed);

        let index = self.reaper.index_name();
        if outcome.deleted > 0 {
            metrics::record_expiration_deletion(index, outcome.deleted);
        }
        metrics::record_expiration_cycle_duration(index, outcome.elapsed.as_secs_f64());

        tracing::debug!(
            deleted = outcome.deleted,
            elapsed = ?outcome.elapsed,
            "Expiration cycle complete"
        );
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}
