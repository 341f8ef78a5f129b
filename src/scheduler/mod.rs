//! Periodic and on-demand refresh cycles.
//!
//! One cycle runs at start-up, then one per interval. The interval is measured
//! from the *start* of the previous cycle. When a cycle overruns one or more
//! deadlines, they collapse into a single cycle started right after it, and the
//! schedule stays on its original grid.
//!
//! On-demand triggers go through a one-slot channel: a trigger received while a
//! cycle is running is deferred until that cycle finishes, and any further
//! triggers are coalesced into it. Cycles never overlap.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use crate::aggregator::Aggregator;
use crate::app::{Result, SecNewsError};
use crate::config::{ConfigError, SchedulerSettings};
use crate::domain::CycleReport;

/// Something that can run a full refresh cycle.
#[async_trait]
pub trait CycleRunner: Send + Sync {
    async fn run_cycle(&self) -> CycleReport;
}

#[async_trait]
impl CycleRunner for Aggregator {
    async fn run_cycle(&self) -> CycleReport {
        Aggregator::run_cycle(self).await
    }
}

/// Longest accepted refresh period (365 days)
pub const MAX_INTERVAL_SECS: u64 = 365 * 86400;

/// Scheduler configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Time between cycle starts (default: 1 hour)
    pub interval: Duration,
    /// Whether to run a cycle immediately on start
    pub run_on_start: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3600),
            run_on_start: true,
        }
    }
}

impl SchedulerConfig {
    pub fn from_settings(settings: &SchedulerSettings) -> std::result::Result<Self, ConfigError> {
        let secs = Self::parse_interval(&settings.interval)?;
        if secs == 0 || secs > MAX_INTERVAL_SECS {
            return Err(ConfigError::InvalidInterval(settings.interval.clone()));
        }
        Ok(Self {
            interval: Duration::from_secs(secs),
            run_on_start: settings.run_on_start,
        })
    }

    /// Parse interval string like "1h", "30m", "6h", "1d"
    pub fn parse_interval(s: &str) -> std::result::Result<u64, ConfigError> {
        let s = s.trim().to_lowercase();
        let invalid = || ConfigError::InvalidInterval(s.clone());

        let (digits, multiplier) = if let Some(hours) = s.strip_suffix('h') {
            (hours, 3600)
        } else if let Some(minutes) = s.strip_suffix('m') {
            (minutes, 60)
        } else if let Some(days) = s.strip_suffix('d') {
            (days, 86400)
        } else if let Some(secs) = s.strip_suffix('s') {
            (secs, 1)
        } else {
            // Raw seconds
            (s.as_str(), 1)
        };

        digits
            .trim()
            .parse::<u64>()
            .ok()
            .and_then(|n| n.checked_mul(multiplier))
            .ok_or_else(invalid)
    }

    /// Format interval for display
    pub fn format_interval(secs: u64) -> String {
        if secs >= 86400 && secs.is_multiple_of(86400) {
            format!("{}d", secs / 86400)
        } else if secs >= 3600 && secs.is_multiple_of(3600) {
            format!("{}h", secs / 3600)
        } else if secs >= 60 && secs.is_multiple_of(60) {
            format!("{}m", secs / 60)
        } else {
            format!("{}s", secs)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Running,
    Stopped,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub phase: Phase,
    pub cycles_completed: u64,
    pub refresh_pending: bool,
    pub consecutive_storage_failures: u32,
    pub last_report: Option<CycleReport>,
}

impl Default for SchedulerStatus {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            cycles_completed: 0,
            refresh_pending: false,
            consecutive_storage_failures: 0,
            last_report: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerOutcome {
    /// A cycle will start now, or right after the running one
    Scheduled,
    /// A follow-up cycle was already pending
    Coalesced,
}

/// Handle to trigger, inspect and stop a running scheduler
#[derive(Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<()>,
    shutdown: Arc<watch::Sender<bool>>,
    status: Arc<Mutex<SchedulerStatus>>,
}

impl SchedulerHandle {
    /// Request a refresh without waiting for it.
    pub fn trigger(&self) -> Result<TriggerOutcome> {
        match self.tx.try_send(()) {
            Ok(()) => Ok(TriggerOutcome::Scheduled),
            Err(TrySendError::Full(())) => Ok(TriggerOutcome::Coalesced),
            Err(TrySendError::Closed(())) => Err(SecNewsError::SchedulerStopped),
        }
    }

    pub fn status(&self) -> SchedulerStatus {
        let mut status = lock(&self.status).clone();
        status.refresh_pending = !self.tx.is_closed() && self.tx.capacity() == 0;
        status
    }

    /// Stop after the in-flight cycle, if any, completes.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

pub struct Scheduler {
    runner: Arc<dyn CycleRunner>,
    config: SchedulerConfig,
    rx: mpsc::Receiver<()>,
    shutdown: watch::Receiver<bool>,
    status: Arc<Mutex<SchedulerStatus>>,
}

impl Scheduler {
    pub fn new(runner: Arc<dyn CycleRunner>, config: SchedulerConfig) -> (Self, SchedulerHandle) {
        let (tx, rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let status = Arc::new(Mutex::new(SchedulerStatus::default()));

        let handle = SchedulerHandle {
            tx,
            shutdown: Arc::new(shutdown_tx),
            status: status.clone(),
        };
        let scheduler = Self {
            runner,
            config,
            rx,
            shutdown: shutdown_rx,
            status,
        };
        (scheduler, handle)
    }

    /// Run the scheduler loop until shutdown or until every handle is dropped.
    pub async fn run(mut self) {
        let period = self.config.interval;
        info!(
            interval = %SchedulerConfig::format_interval(period.as_secs()),
            run_on_start = self.config.run_on_start,
            "Scheduler started"
        );

        // None once the next deadline is past what `Instant` can represent;
        // only on-demand refreshes run from then on.
        let start = Instant::now();
        let mut next_due = if self.config.run_on_start {
            Some(start)
        } else {
            start.checked_add(period)
        };

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.changed() => break,
                Some(()) = self.rx.recv() => debug!("On-demand refresh"),
                _ = sleep_until(next_due.unwrap_or(start)), if next_due.is_some() => {
                    debug!("Scheduled refresh")
                }
            }

            // A cycle starting now satisfies any request already queued
            while self.rx.try_recv().is_ok() {}

            let started = Instant::now();
            while let Some(due) = next_due.filter(|due| *due <= started) {
                next_due = due.checked_add(period);
                if next_due.is_none() {
                    warn!("Refresh interval out of range; timer disabled");
                }
            }

            lock(&self.status).phase = Phase::Running;
            let report = self.runner.run_cycle().await;
            self.record(report);
        }

        lock(&self.status).phase = Phase::Stopped;
        info!("Scheduler stopped");
    }

    fn record(&self, report: CycleReport) {
        let mut status = lock(&self.status);

        if report.has_storage_failure() {
            status.consecutive_storage_failures += 1;
            let streak = status.consecutive_storage_failures;
            if streak > 1 {
                error!(cycles = streak, "Storage unavailable in consecutive refresh cycles");
            } else {
                warn!("Storage failure during refresh cycle");
            }
        } else {
            status.consecutive_storage_failures = 0;
        }

        status.phase = Phase::Idle;
        status.cycles_completed += 1;
        status.last_report = Some(report);
    }
}

/// Spawn the scheduler on the current runtime.
pub fn spawn_scheduler(
    runner: Arc<dyn CycleRunner>,
    config: SchedulerConfig,
) -> (SchedulerHandle, JoinHandle<()>) {
    let (scheduler, handle) = Scheduler::new(runner, config);
    let task = tokio::spawn(scheduler.run());
    (handle, task)
}

fn lock(status: &Mutex<SchedulerStatus>) -> std::sync::MutexGuard<'_, SchedulerStatus> {
    status.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
