//! Background synchronization.
//!
//! A run is started by the interval timer, by the UI becoming visible, or by
//! connectivity coming back. Runs are exclusive (see [`SyncState`]) and only
//! proceed when the UI is visible and the network is reachable. Each run:
//!
//! 1. Deep-prefetches the next few days of the active path, once per day,
//!    publishing every day to the update channel.
//! 2. Silently re-fetches the calendar entries of every remote path for the
//!    same window, picking up corrections made upstream.
//!
//! The retention sweep is separate and runs from the startup path.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Local, NaiveDate, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{Config, SyncSettings};
use crate::connectivity::ConnectivityStatus;
use crate::error::FetchError;
use crate::fetcher::{ContentFetcher, DayContent};
use crate::migration::{LegacyDays, LEGACY_DAYS_KEY};
use crate::models::{calendar_key, StudyPath};
use crate::progress::ProgressView;

/// Metadata key holding the date of the last completed daily prefetch.
pub const LAST_DAILY_PREFETCH_KEY: &str = "last_daily_prefetch";

pub const CHANNEL_BUFFER_SIZE: usize = 32;

// ============================================================================
// Run Exclusion
// ============================================================================

/// Process-wide "a sync is running" token.
#[derive(Clone, Default)]
pub struct SyncState {
    running: Arc<AtomicBool>,
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the token; `None` if a run is already in progress.
    pub fn try_begin(&self) -> Option<SyncGuard> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SyncGuard {
                running: self.running.clone(),
            })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Releases the sync token when dropped.
pub struct SyncGuard {
    running: Arc<AtomicBool>,
}

impl Drop for SyncGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

// ============================================================================
// Run Results
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    Interval,
    Visible,
    Online,
    /// Requested by the host, e.g. a one-shot CLI command.
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyRunning,
    Hidden,
    Unreachable,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrefetchReport {
    pub days: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// `None` when today's prefetch had already completed.
    pub prefetch: Option<PrefetchReport>,
    pub refreshed: usize,
    pub refresh_failures: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Skipped(SkipReason),
    Completed(SyncReport),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub calendar_deleted: usize,
    pub texts_deleted: usize,
    /// Old days kept because they are bookmarked or unfinished.
    pub protected_days: usize,
}

/// Messages from background runs to the UI.
#[derive(Debug, Clone)]
pub enum SyncUpdate {
    /// A prefetched day, ready to display.
    Day(Box<DayContent>),
    Finished {
        trigger: SyncTrigger,
        outcome: SyncOutcome,
    },
}

// ============================================================================
// Scheduler
// ============================================================================

pub struct SyncScheduler {
    fetcher: ContentFetcher,
    paths: Vec<StudyPath>,
    active_path: String,
    settings: SyncSettings,
    state: SyncState,
    visible: Arc<AtomicBool>,
    progress: Arc<dyn ProgressView>,
    updates: Option<mpsc::Sender<SyncUpdate>>,
}

impl SyncScheduler {
    pub fn new(
        fetcher: ContentFetcher,
        config: &Config,
        state: SyncState,
        progress: Arc<dyn ProgressView>,
    ) -> Self {
        Self {
            fetcher,
            paths: config.study_paths.clone(),
            active_path: config.active_path.clone(),
            settings: config.sync.clone(),
            state,
            visible: Arc::new(AtomicBool::new(true)),
            progress,
            updates: None,
        }
    }

    /// Publish prefetched days and run results on `tx`.
    pub fn with_updates(mut self, tx: mpsc::Sender<SyncUpdate>) -> Self {
        self.updates = Some(tx);
        self
    }

    pub fn set_visible(&self, visible: bool) {
        self.visible.store(visible, Ordering::Release);
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::Acquire)
    }

    async fn send_update(&self, update: SyncUpdate) {
        if let Some(tx) = &self.updates {
            if let Err(e) = tx.send(update).await {
                debug!(error = %e, "Sync update dropped - channel closed");
            }
        }
    }

    fn window(&self, today: NaiveDate) -> impl Iterator<Item = NaiveDate> {
        (0..i64::from(self.settings.prefetch_days)).map(move |offset| today + Duration::days(offset))
    }

    /// One sync run. Failures for individual days or paths are logged and
    /// never abort the run.
    pub async fn run(&self, today: NaiveDate, trigger: SyncTrigger) -> SyncOutcome {
        let outcome = self.run_inner(today, trigger).await;
        self.send_update(SyncUpdate::Finished { trigger, outcome }).await;
        outcome
    }

    async fn run_inner(&self, today: NaiveDate, trigger: SyncTrigger) -> SyncOutcome {
        let Some(_guard) = self.state.try_begin() else {
            debug!(?trigger, "Sync already running");
            return SyncOutcome::Skipped(SkipReason::AlreadyRunning);
        };
        if !self.is_visible() {
            debug!(?trigger, "Not visible, skipping sync");
            return SyncOutcome::Skipped(SkipReason::Hidden);
        }
        if !self.fetcher.is_reachable().await {
            debug!(?trigger, "Not reachable, skipping sync");
            return SyncOutcome::Skipped(SkipReason::Unreachable);
        }

        info!(?trigger, today = %today, "Sync started");
        let prefetch = self.daily_prefetch(today).await;
        let (refreshed, refresh_failures) = self.refresh_near_term(today).await;

        let report = SyncReport {
            prefetch,
            refreshed,
            refresh_failures,
        };
        info!(?trigger, ?report, "Sync finished");
        SyncOutcome::Completed(report)
    }

    /// Prefetch the active path's upcoming days, at most once per day.
    async fn daily_prefetch(&self, today: NaiveDate) -> Option<PrefetchReport> {
        let cache = self.fetcher.cache();
        match cache.get_meta::<NaiveDate>(LAST_DAILY_PREFETCH_KEY).await {
            Ok(Some(last)) if last == today => {
                debug!(today = %today, "Daily prefetch already done");
                return None;
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Could not read last prefetch date"),
        }

        let Some(path) = self.paths.iter().find(|p| p.id == self.active_path) else {
            warn!(path = %self.active_path, "Active path is not configured, skipping prefetch");
            return Some(PrefetchReport::default());
        };

        let mut report = PrefetchReport::default();
        for date in self.window(today) {
            match self.fetcher.get_day(date, path).await {
                Ok(day) => {
                    report.days += 1;
                    self.send_update(SyncUpdate::Day(Box::new(day))).await;
                }
                Err(e) => {
                    warn!(path = %path.id, date = %date, error = %e, "Prefetch failed");
                    report.failed += 1;
                }
            }
        }

        if report.failed == 0 {
            if let Err(e) = cache.set_meta(LAST_DAILY_PREFETCH_KEY, &today).await {
                warn!(error = %e, "Failed to record prefetch date");
            }
        }
        Some(report)
    }

    /// Re-fetch every remote path's calendar entries for the window.
    async fn refresh_near_term(&self, today: NaiveDate) -> (usize, usize) {
        let mut refreshed = 0;
        let mut failed = 0;
        for path in self.paths.iter().filter(|p| !p.is_local()) {
            for date in self.window(today) {
                match self.fetcher.refresh_calendar_entry(date, path).await {
                    Ok(_) => refreshed += 1,
                    Err(FetchError::Remote(e)) if e.is_transient() => {
                        debug!(path = %path.id, date = %date, error = %e, "Calendar refresh failed");
                        failed += 1;
                    }
                    Err(e) => {
                        warn!(path = %path.id, date = %date, error = %e, "Calendar refresh failed");
                        failed += 1;
                    }
                }
            }
        }
        (refreshed, failed)
    }

    /// Delete calendar entries dated before the retention window and texts
    /// fetched before it, keeping anything a bookmarked or unfinished day
    /// needs.
    pub async fn sweep(&self, today: NaiveDate) -> SweepReport {
        let retention = Duration::days(self.settings.retention_days);
        let cutoff_date = today - retention;
        let cutoff_time = Utc::now() - retention;
        let cache = self.fetcher.cache();
        let mut report = SweepReport::default();

        let texts = match cache.scan_texts().await {
            Ok(texts) => texts,
            Err(e) => {
                error!(error = %e, "Retention sweep could not scan texts");
                return report;
            }
        };
        let calendar = match cache.scan_calendar().await {
            Ok(calendar) => calendar,
            Err(e) => {
                error!(error = %e, "Retention sweep could not scan calendar");
                return report;
            }
        };

        let text_info: HashMap<&str, (usize, DateTime<Utc>)> = texts
            .iter()
            .map(|(key, cached)| (key.as_str(), (cached.data.len(), cached.cached_at)))
            .collect();
        let known_count = |references: &[String]| -> usize {
            references
                .iter()
                .filter_map(|r| text_info.get(r.as_str()).map(|(len, _)| *len))
                .sum()
        };

        let mut protected_refs: HashSet<String> = HashSet::new();
        let mut seen_days = HashSet::new();

        for (key, cached) in &calendar {
            let entry = &cached.data;
            seen_days.insert((entry.path.clone(), entry.date));
            let count = match entry.count {
                0 => known_count(&entry.references),
                count => count,
            };

            if self.progress.day_progress(&entry.path, entry.date).is_protected(count) {
                protected_refs.extend(entry.references.iter().cloned());
                if entry.date < cutoff_date {
                    report.protected_days += 1;
                }
                continue;
            }
            if entry.date < cutoff_date {
                match cache.delete_calendar(key).await {
                    Ok(()) => report.calendar_deleted += 1,
                    Err(e) => warn!(key = %key, error = %e, "Failed to delete calendar entry"),
                }
            }
        }

        let legacy_days = match cache.get_meta::<LegacyDays>(LEGACY_DAYS_KEY).await {
            Ok(days) => days.unwrap_or_default(),
            Err(e) => {
                error!(error = %e, "Retention sweep could not read legacy day references");
                return report;
            }
        };

        // Days with progress but no stored calendar entry: local schedules,
        // and remote days whose text came from the legacy cache
        for (path_id, date) in self.progress.tracked_days() {
            if seen_days.contains(&(path_id.clone(), date)) {
                continue;
            }
            let references = self
                .paths
                .iter()
                .find(|p| p.id == path_id)
                .and_then(|path| self.fetcher.resolver().resolve(date, path))
                .map(|day| day.references)
                .or_else(|| legacy_days.get(&calendar_key(&path_id, date)).cloned());
            let Some(references) = references else {
                continue;
            };
            let count = known_count(&references);
            if self.progress.day_progress(&path_id, date).is_protected(count) {
                if date < cutoff_date {
                    report.protected_days += 1;
                }
                protected_refs.extend(references);
            }
        }

        for (reference, (_, cached_at)) in &text_info {
            if *cached_at < cutoff_time && !protected_refs.contains(*reference) {
                match cache.delete_text(reference).await {
                    Ok(()) => report.texts_deleted += 1,
                    Err(e) => warn!(reference = %reference, error = %e, "Failed to delete text"),
                }
            }
        }

        info!(
            calendar_deleted = report.calendar_deleted,
            texts_deleted = report.texts_deleted,
            protected = report.protected_days,
            "Retention sweep finished"
        );
        report
    }
}

// ============================================================================
// Trigger Loop
// ============================================================================

enum SyncCommand {
    Trigger(SyncTrigger),
    SetVisible(bool),
}

/// Host-side handle to a spawned sync loop.
#[derive(Clone)]
pub struct SyncHandle {
    tx: mpsc::Sender<SyncCommand>,
}

impl SyncHandle {
    async fn send(&self, command: SyncCommand) {
        if let Err(e) = self.tx.send(command).await {
            error!(error = %e, "Failed to reach sync loop - channel closed");
        }
    }

    pub async fn trigger(&self, trigger: SyncTrigger) {
        self.send(SyncCommand::Trigger(trigger)).await;
    }

    /// Becoming visible starts a run.
    pub async fn set_visible(&self, visible: bool) {
        self.send(SyncCommand::SetVisible(visible)).await;
    }
}

/// Run the scheduler on the tokio runtime.
///
/// The interval's first tick fires immediately, so a run starts as soon as
/// the loop does. A transition of `connectivity` from offline to online
/// starts a run. The loop ends when every [`SyncHandle`] is dropped.
pub fn spawn(
    scheduler: SyncScheduler,
    mut connectivity: watch::Receiver<ConnectivityStatus>,
) -> (SyncHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
    let period: StdDuration = scheduler.settings.interval();

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        let mut was_offline = connectivity.borrow_and_update().is_offline();
        let mut watching = true;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    scheduler.run(today(), SyncTrigger::Interval).await;
                }
                command = rx.recv() => match command {
                    Some(SyncCommand::Trigger(trigger)) => {
                        scheduler.run(today(), trigger).await;
                    }
                    Some(SyncCommand::SetVisible(visible)) => {
                        let became_visible = visible && !scheduler.is_visible();
                        scheduler.set_visible(visible);
                        if became_visible {
                            scheduler.run(today(), SyncTrigger::Visible).await;
                        }
                    }
                    None => {
                        debug!("Sync loop stopping");
                        break;
                    }
                },
                changed = connectivity.changed(), if watching => {
                    if changed.is_err() {
                        watching = false;
                        continue;
                    }
                    let offline = connectivity.borrow_and_update().is_offline();
                    if was_offline && !offline {
                        scheduler.run(today(), SyncTrigger::Online).await;
                    }
                    was_offline = offline;
                }
            }
        }
    });

    (SyncHandle { tx }, task)
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}
