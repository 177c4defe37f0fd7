/// Status file: writes the monitor's state as JSON on every state transition.
///
/// Uses atomic write pattern: write to temp file then rename.
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Monitor states written to the status file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorState {
    Starting,
    Fetching,
    Idle,
    ShuttingDown,
}

/// What the most recent tick concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    FetchFailed,
    NoChange,
    FirstSnapshot,
    Changed,
}

/// The JSON payload written to the status file.
#[derive(Debug, Clone, Serialize)]
pub struct StatusData {
    pub pid: u32,
    pub state: MonitorState,
    pub url: String,
    pub ticks: u64,
    pub last_tick: Option<DateTime<Utc>>,
    pub last_outcome: Option<OutcomeKind>,
    pub last_change: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub last_update: DateTime<Utc>,
}

/// Manages the status file lifecycle.
pub struct StatusFile {
    path: PathBuf,
}

impl StatusFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Atomically write status data to the status file.
    ///
    /// Writes to a temporary file in the same directory, then renames
    /// to ensure readers never see a partial write.
    pub fn write(&self, data: &StatusData) -> Result<(), StatusError> {
        let json =
            serde_json::to_string_pretty(data).map_err(|e| StatusError::Serialize { source: e })?;

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let tmp_path = dir.join(format!(".pagewatch.status.tmp.{}", std::process::id()));

        std::fs::write(&tmp_path, json.as_bytes()).map_err(|e| StatusError::Write {
            path: tmp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&tmp_path, &self.path).map_err(|e| StatusError::Rename {
            from: tmp_path,
            to: self.path.clone(),
            source: e,
        })?;

        Ok(())
    }

    /// Remove the status file (on clean shutdown).
    pub fn remove(&self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Mutable state tracker that builds StatusData for each update.
/// A tracker without a file only keeps counters.
pub struct StatusTracker {
    file: Option<StatusFile>,
    pid: u32,
    url: String,
    ticks: u64,
    last_tick: Option<DateTime<Utc>>,
    last_outcome: Option<OutcomeKind>,
    last_change: Option<DateTime<Utc>>,
    consecutive_failures: u32,
}

impl StatusTracker {
    pub fn new(status_path: Option<PathBuf>, url: &str) -> Self {
        Self {
            file: status_path.map(StatusFile::new),
            pid: std::process::id(),
            url: url.to_string(),
            ticks: 0,
            last_tick: None,
            last_outcome: None,
            last_change: None,
            consecutive_failures: 0,
        }
    }

    /// Update and write the status file with the given state.
    pub fn update(&self, state: MonitorState) {
        let Some(file) = &self.file else {
            return;
        };
        let data = StatusData {
            pid: self.pid,
            state,
            url: self.url.clone(),
            ticks: self.ticks,
            last_tick: self.last_tick,
            last_outcome: self.last_outcome,
            last_change: self.last_change,
            consecutive_failures: self.consecutive_failures,
            last_update: Utc::now(),
        };

        if let Err(e) = file.write(&data) {
            tracing::warn!(error = %e, "failed to write status file");
        }
    }

    /// Record a finished tick. Returns the new consecutive failure count.
    pub fn record_tick(&mut self, outcome: OutcomeKind) -> u32 {
        let now = Utc::now();
        self.ticks += 1;
        self.last_tick = Some(now);
        self.last_outcome = Some(outcome);
        match outcome {
            OutcomeKind::FetchFailed => self.consecutive_failures += 1,
            OutcomeKind::Changed => {
                self.last_change = Some(now);
                self.consecutive_failures = 0;
            }
            OutcomeKind::NoChange | OutcomeKind::FirstSnapshot => self.consecutive_failures = 0,
        }
        self.consecutive_failures
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Remove the status file.
    pub fn remove(&self) {
        if let Some(file) = &self.file {
            file.remove();
        }
    }
}

/// Errors from status file operations.
#[derive(Debug)]
pub enum StatusError {
    Serialize {
        source: serde_json::Error,
    },
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    Rename {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

impl std::fmt::Display for StatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusError::Serialize { source } => write!(f, "failed to serialize status: {source}"),
            StatusError::Write { path, source } => {
                write!(
                    f,
                    "failed to write temp status file {}: {source}",
                    path.display()
                )
            }
            StatusError::Rename { from, to, source } => {
                write!(
                    f,
                    "failed to rename {} -> {}: {source}",
                    from.display(),
                    to.display()
                )
            }
        }
    }
}

impl std::error::Error for StatusError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StatusError::Serialize { source } => Some(source),
            StatusError::Write { source, .. } => Some(source),
            StatusError::Rename { source, .. } => Some(source),
        }
    }
}
