/// Signal handling for graceful shutdown.
///
/// Handles SIGINT (Ctrl-C), SIGTERM, and STOP file detection.
/// Any of them asks the monitor loop to stop; the loop notices at its next
/// check or immediately if it is sleeping between ticks.
use std::path::Path;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    Interrupt,
    Terminate,
    StopFile,
    Requested,
}

impl std::fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ShutdownReason::Interrupt => "SIGINT",
            ShutdownReason::Terminate => "SIGTERM",
            ShutdownReason::StopFile => "stop file",
            ShutdownReason::Requested => "requested",
        };
        f.write_str(s)
    }
}

/// Sending half: requests shutdown.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<Option<ShutdownReason>>,
}

/// Receiving half: observed by the monitor loop.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<Option<ShutdownReason>>,
}

pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(None);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

impl ShutdownTrigger {
    /// Request shutdown. The first reason wins.
    pub fn fire(&self, reason: ShutdownReason) {
        self.tx.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(reason);
                true
            } else {
                false
            }
        });
    }
}

impl Shutdown {
    pub fn reason(&self) -> Option<ShutdownReason> {
        *self.rx.borrow()
    }

    /// Resolves once shutdown has been requested. Never resolves if the
    /// trigger was dropped without firing.
    pub async fn requested(&mut self) -> ShutdownReason {
        let observed = self.rx.wait_for(|r| r.is_some()).await.map(|r| *r);
        match observed {
            Ok(reason) => reason.unwrap_or(ShutdownReason::Requested),
            Err(_) => std::future::pending().await,
        }
    }
}

/// Spawn a task that fires `trigger` on SIGINT or SIGTERM.
pub fn install(trigger: ShutdownTrigger) {
    tokio::spawn(async move {
        let reason = wait_for_signal().await;
        tracing::info!(%reason, "shutdown signal received");
        trigger.fire(reason);
    });
}

#[cfg(unix)]
async fn wait_for_signal() -> ShutdownReason {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            return ShutdownReason::Interrupt;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => ShutdownReason::Interrupt,
        _ = term.recv() => ShutdownReason::Terminate,
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> ShutdownReason {
    let _ = tokio::signal::ctrl_c().await;
    ShutdownReason::Interrupt
}

/// Returns true (and consumes the file) if a STOP file is present.
pub fn check_stop_file(path: &Path) -> bool {
    if path.as_os_str().is_empty() || !path.exists() {
        return false;
    }
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!(error = %e, path = %path.display(), "failed to remove stop file");
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_not_requested_initially() {
        let (_trigger, shutdown) = channel();
        assert_eq!(shutdown.reason(), None);
    }

    #[test]
    fn test_first_reason_wins() {
        let (trigger, shutdown) = channel();
        trigger.fire(ShutdownReason::Terminate);
        trigger.fire(ShutdownReason::Interrupt);
        assert_eq!(shutdown.reason(), Some(ShutdownReason::Terminate));
    }

    #[test]
    fn test_clones_observe_the_same_request() {
        let (trigger, shutdown) = channel();
        let other = shutdown.clone();
        trigger.fire(ShutdownReason::Requested);
        assert!(other.reason().is_some());
    }

    #[tokio::test]
    async fn test_requested_resolves_after_fire() {
        let (trigger, mut shutdown) = channel();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.fire(ShutdownReason::StopFile);
        });

        let reason = tokio::time::timeout(Duration::from_secs(5), shutdown.requested())
            .await
            .unwrap();
        assert_eq!(reason, ShutdownReason::StopFile);
    }

    #[tokio::test]
    async fn test_requested_pends_when_trigger_dropped() {
        let (trigger, mut shutdown) = channel();
        drop(trigger);

        let result = tokio::time::timeout(Duration::from_millis(50), shutdown.requested()).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_stop_file_detected_and_removed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("STOP");
        assert!(!check_stop_file(&path));

        std::fs::write(&path, "").unwrap();
        assert!(check_stop_file(&path));
        assert!(!path.exists());
    }

    #[test]
    fn test_empty_stop_file_path_is_ignored() {
        assert!(!check_stop_file(Path::new("")));
    }

    #[test]
    fn test_reason_display() {
        assert_eq!(ShutdownReason::Interrupt.to_string(), "SIGINT");
        assert_eq!(ShutdownReason::StopFile.to_string(), "stop file");
    }
}
