//! The poll-diff-notify loop.
//!
//! Each tick fetches the page region, compares it with the stored snapshot,
//! notifies on change and then overwrites the snapshot. A failed fetch leaves
//! the snapshot untouched. Nothing inside a tick is fatal; the loop only ends
//! when shutdown is requested.

use crate::config::WatchConfig;
use crate::fetch::{FetchError, Fetcher};
use crate::notify::Notifier;
use crate::signals::{self, Shutdown, ShutdownReason};
use crate::snapshot::SnapshotStore;
use crate::status::{MonitorState, OutcomeKind, StatusTracker};
use std::path::PathBuf;
use std::time::Duration;

/// Result of one loop iteration. Never persisted.
#[derive(Debug)]
pub enum TickOutcome {
    FetchFailed(FetchError),
    /// `first_snapshot` is set when there was no prior snapshot to compare with.
    NoChange { first_snapshot: bool },
    Changed(String),
}

impl TickOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            TickOutcome::FetchFailed(_) => OutcomeKind::FetchFailed,
            TickOutcome::NoChange {
                first_snapshot: true,
            } => OutcomeKind::FirstSnapshot,
            TickOutcome::NoChange {
                first_snapshot: false,
            } => OutcomeKind::NoChange,
            TickOutcome::Changed(_) => OutcomeKind::Changed,
        }
    }
}

/// Loop settings resolved from [`WatchConfig`].
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub url: String,
    pub selector: String,
    pub interval: Duration,
    pub startup_message: String,
    pub change_message: String,
    pub failure_alert_after: u32,
    pub stop_file: PathBuf,
}

impl MonitorSettings {
    pub fn from_config(config: &WatchConfig) -> Self {
        Self {
            url: config.source.url.clone(),
            selector: config.source.selector.clone(),
            interval: config.interval(),
            startup_message: config.notify.startup_message.clone(),
            change_message: config.change_message(),
            failure_alert_after: config.notify.failure_alert_after,
            stop_file: config.shutdown.stop_file.clone(),
        }
    }
}

pub struct Monitor {
    settings: MonitorSettings,
    fetcher: Box<dyn Fetcher>,
    store: Box<dyn SnapshotStore>,
    notifier: Box<dyn Notifier>,
    status: StatusTracker,
}

impl Monitor {
    pub fn new(
        settings: MonitorSettings,
        fetcher: Box<dyn Fetcher>,
        store: Box<dyn SnapshotStore>,
        notifier: Box<dyn Notifier>,
        status: StatusTracker,
    ) -> Self {
        Self {
            settings,
            fetcher,
            store,
            notifier,
            status,
        }
    }

    /// Announce the (re)start. Sent unconditionally, before any fetch.
    pub async fn announce_startup(&mut self) {
        tracing::info!(
            url = %self.settings.url,
            selector = %self.settings.selector,
            interval_secs = self.settings.interval.as_secs(),
            "starting website monitor"
        );
        self.status.update(MonitorState::Starting);
        self.notifier.notify(&self.settings.startup_message).await;
    }

    /// Run one fetch/compare/notify/persist cycle.
    pub async fn tick(&mut self) -> TickOutcome {
        self.status.update(MonitorState::Fetching);

        let outcome = match self.fetcher.fetch().await {
            Err(e) => {
                tracing::warn!(error = %e, "error fetching page content");
                TickOutcome::FetchFailed(e)
            }
            Ok(current) => {
                let previous = self.store.read();
                let changed = !previous.is_empty() && current != previous;

                if changed {
                    tracing::info!("website content changed, sending notification");
                    self.notifier.notify(&self.settings.change_message).await;
                } else if previous.is_empty() {
                    tracing::info!(bytes = current.len(), "first snapshot recorded");
                } else {
                    tracing::info!("no change detected");
                }

                self.store.write(&current);

                if changed {
                    TickOutcome::Changed(current)
                } else {
                    TickOutcome::NoChange {
                        first_snapshot: previous.is_empty(),
                    }
                }
            }
        };

        let failures = self.status.record_tick(outcome.kind());
        if let TickOutcome::FetchFailed(e) = &outcome {
            self.alert_if_failing(failures, e).await;
        }
        self.status.update(MonitorState::Idle);
        outcome
    }

    /// One alert per failure streak, sent when the streak reaches the threshold.
    async fn alert_if_failing(&self, failures: u32, error: &FetchError) {
        let threshold = self.settings.failure_alert_after;
        if threshold == 0 || failures != threshold {
            return;
        }
        tracing::warn!(failures, "fetch keeps failing, alerting operator");
        let message = format!(
            "⚠️ Website monitor cannot fetch {}: {error}",
            self.settings.url
        );
        self.notifier.notify(&message).await;
    }

    /// Startup notice followed by a single tick.
    pub async fn run_once(&mut self) -> TickOutcome {
        self.announce_startup().await;
        let outcome = self.tick().await;
        self.status.remove();
        outcome
    }

    /// Tick forever, sleeping `interval` between ticks, until `shutdown`
    /// fires or the stop file appears.
    pub async fn run(&mut self, mut shutdown: Shutdown) -> ShutdownReason {
        self.announce_startup().await;

        let reason = loop {
            if let Some(reason) = shutdown.reason() {
                break reason;
            }
            if signals::check_stop_file(&self.settings.stop_file) {
                break ShutdownReason::StopFile;
            }

            self.tick().await;

            tokio::select! {
                _ = tokio::time::sleep(self.settings.interval) => {}
                reason = shutdown.requested() => break reason,
            }
        };

        tracing::info!(%reason, ticks = self.status.ticks(), "website monitor stopping");
        self.status.update(MonitorState::ShuttingDown);
        self.status.remove();
        reason
    }
}
