//! Periodic reconciliation and bulk apply
//!
//! Handles are never trusted across passes: every tick re-enumerates, and bulk
//! apply re-validates each handle right before using it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::applier::{ApplyOutcome, GeometryApplier};
use crate::config::{ConfigRecord, SharedStore};
use crate::constants::scheduler;
use crate::error::ApplyError;
use crate::matcher;
use crate::snapshot::{SnapshotProvider, WindowSnapshot};
use crate::types::WindowHandle;

#[derive(Debug, Clone, Copy)]
pub struct SchedulerOptions {
    pub tick_interval: Duration,
    pub auto_apply_delay: Duration,
    pub bulk_apply_delay: Duration,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            tick_interval: scheduler::TICK_INTERVAL,
            auto_apply_delay: scheduler::AUTO_APPLY_DELAY,
            bulk_apply_delay: scheduler::BULK_APPLY_DELAY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFailure {
    pub name: String,
    pub reason: String,
}

/// Per-record outcome counts for one pass over the records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub applied: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failures: Vec<RecordFailure>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.applied + self.unchanged
    }

    fn fail(&mut self, record: &ConfigRecord, reason: impl ToString) {
        self.failed += 1;
        self.failures.push(RecordFailure {
            name: record.display_name(),
            reason: reason.to_string(),
        });
    }

    fn count(&mut self, outcome: ApplyOutcome) {
        match outcome {
            ApplyOutcome::Applied => self.applied += 1,
            ApplyOutcome::Unchanged => self.unchanged += 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub selection_cleared: bool,
    pub reconciliation: Option<BatchReport>,
}

#[derive(Clone)]
pub struct AutoApplyScheduler {
    snapshots: Arc<SnapshotProvider>,
    applier: GeometryApplier,
    options: SchedulerOptions,
    selected: Option<WindowHandle>,
}

impl AutoApplyScheduler {
    pub fn new(snapshots: Arc<SnapshotProvider>, applier: GeometryApplier, options: SchedulerOptions) -> Self {
        Self {
            snapshots,
            applier,
            options,
            selected: None,
        }
    }

    /// Track a window the user picked; dropped once it disappears
    pub fn select(&mut self, handle: Option<WindowHandle>) {
        self.selected = handle;
    }

    pub fn selected(&self) -> Option<WindowHandle> {
        self.selected
    }

    fn enumerate(&self) -> Vec<WindowSnapshot> {
        self.snapshots.list_windows().unwrap_or_else(|e| {
            warn!(error = %e, "Window enumeration failed");
            Vec::new()
        })
    }

    /// One scheduler period: drop a stale selection, then reconcile if enabled
    pub fn tick(&mut self, store: &SharedStore, auto_apply: bool) -> TickReport {
        let mut report = TickReport::default();

        if let Some(handle) = self.selected {
            if !self.snapshots.is_window_valid(handle) {
                info!(window = %handle, "Selected window closed, clearing selection");
                self.selected = None;
                report.selection_cleared = true;
            }
        }

        // Losing the selection does not skip this period's reconciliation
        if auto_apply {
            // Clone under the lock; never hold it while touching windows
            let records = store.lock().records().to_vec();
            report.reconciliation = Some(self.reconcile(&records));
        }

        report
    }

    /// Bring every enabled, matched record's window to its saved geometry.
    /// Unmatched records and windows that vanish mid-pass are silent skips.
    pub fn reconcile(&self, records: &[ConfigRecord]) -> BatchReport {
        let windows = self.enumerate();
        let mut report = BatchReport::default();

        for record in records.iter().filter(|r| r.enabled) {
            let target = record.geometry();
            match matcher::find_match(&windows, &record.title, &record.process) {
                None => report.skipped += 1,
                Some(window) if !matcher::needs_apply(window.rect, target) => report.unchanged += 1,
                Some(window) => match self.applier.apply(window.handle, target) {
                    Ok(outcome) => report.count(outcome),
                    Err(ApplyError::StaleHandle(handle)) => {
                        debug!(window = %handle, "Window closed before auto-apply");
                        report.skipped += 1;
                    }
                    Err(e) => {
                        warn!(config = %record.display_name(), error = %e, "Auto-apply failed");
                        report.fail(record, e);
                    }
                },
            }
            thread::sleep(self.options.auto_apply_delay);
        }

        report
    }

    /// Apply every enabled record once. Unmatched records count as failures;
    /// a failure never stops the remaining records.
    pub fn apply_all(&self, records: &[ConfigRecord]) -> BatchReport {
        let mut windows = self.enumerate();
        let mut report = BatchReport::default();

        for (position, record) in records.iter().filter(|r| r.enabled).enumerate() {
            if position > 0 {
                thread::sleep(self.options.bulk_apply_delay);
            }

            let Some(mut handle) = matcher::find_match(&windows, &record.title, &record.process).map(|w| w.handle)
            else {
                report.fail(record, "no matching window");
                continue;
            };

            if !self.snapshots.is_window_valid(handle) {
                debug!(window = %handle, "Handle went stale, re-enumerating");
                windows = self.enumerate();
                match matcher::find_match(&windows, &record.title, &record.process) {
                    Some(window) => handle = window.handle,
                    None => {
                        report.fail(record, ApplyError::StaleHandle(handle));
                        continue;
                    }
                }
            }

            match self.applier.apply(handle, record.geometry()) {
                Ok(outcome) => report.count(outcome),
                Err(e) => {
                    warn!(config = %record.display_name(), error = %e, "Bulk apply failed");
                    report.fail(record, e);
                }
            }
        }

        info!(
            applied = report.applied,
            unchanged = report.unchanged,
            failed = report.failed,
            "Bulk apply finished"
        );
        report
    }

    /// Run `apply_all` on a worker thread against the shared store
    pub fn spawn_apply_all(&self, store: SharedStore) -> thread::JoinHandle<BatchReport> {
        let worker = self.clone();
        thread::spawn(move || {
            let records = store.lock().records().to_vec();
            worker.apply_all(&records)
        })
    }

    /// Watch loop: tick every interval until `shutdown` is raised.
    /// Picks up external edits to the record file between ticks.
    pub fn run(&mut self, store: &SharedStore, auto_apply: &dyn Fn() -> bool, shutdown: &AtomicBool) {
        info!(interval = ?self.options.tick_interval, "Watching windows");

        while !shutdown.load(Ordering::Relaxed) {
            store.lock().reload_if_changed();

            let report = self.tick(store, auto_apply());
            if let Some(batch) = &report.reconciliation {
                if batch.applied > 0 || batch.failed > 0 {
                    info!(applied = batch.applied, failed = batch.failed, "Auto-apply pass");
                }
            }

            self.wait_for_next_tick(shutdown);
        }

        info!("Watch loop stopped");
    }

    fn wait_for_next_tick(&self, shutdown: &AtomicBool) {
        let deadline = Instant::now() + self.options.tick_interval;
        while !shutdown.load(Ordering::Relaxed) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep((deadline - now).min(scheduler::SHUTDOWN_POLL));
        }
    }
}
