/// Snapshot store: the last extracted region text, persisted across restarts.
///
/// Writes go to a temp file in the same directory and are renamed into place,
/// so a crash never leaves a partially written snapshot behind.
use std::path::{Path, PathBuf};

/// Single-slot durable text store used by the monitor loop.
///
/// `read` never fails: every error degrades to "no prior snapshot".
/// `write` is best-effort: failures are logged, never returned.
pub trait SnapshotStore: Send {
    fn read(&mut self) -> String;
    fn write(&mut self, content: &str);
}

/// Outcome of loading the snapshot file, keeping "not there yet" apart from
/// "there but unreadable".
#[derive(Debug)]
pub enum SnapshotRead {
    Missing,
    Found(String),
    Failed(SnapshotError),
}

/// File-backed snapshot at a fixed path.
#[derive(Debug, Clone)]
pub struct FileSnapshot {
    path: PathBuf,
}

impl FileSnapshot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the snapshot, distinguishing a missing file from a read failure.
    pub fn load(&self) -> SnapshotRead {
        match std::fs::read(&self.path) {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(text) => SnapshotRead::Found(text),
                Err(e) => SnapshotRead::Failed(SnapshotError::Read {
                    path: self.path.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
                }),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => SnapshotRead::Missing,
            Err(e) => SnapshotRead::Failed(SnapshotError::Read {
                path: self.path.clone(),
                source: e,
            }),
        }
    }

    /// Replace the snapshot with `content` via temp file + rename.
    pub fn save(&self, content: &str) -> Result<(), SnapshotError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(|e| SnapshotError::Write {
            path: dir.to_path_buf(),
            source: e,
        })?;

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "snapshot".to_string());
        let tmp_path = dir.join(format!(".{file_name}.tmp.{}", std::process::id()));

        std::fs::write(&tmp_path, content.as_bytes()).map_err(|e| SnapshotError::Write {
            path: tmp_path.clone(),
            source: e,
        })?;

        if let Err(e) = std::fs::rename(&tmp_path, &self.path) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(SnapshotError::Rename {
                from: tmp_path,
                to: self.path.clone(),
                source: e,
            });
        }

        Ok(())
    }
}

impl SnapshotStore for FileSnapshot {
    fn read(&mut self) -> String {
        match self.load() {
            SnapshotRead::Found(text) => text,
            SnapshotRead::Missing => {
                tracing::debug!(path = %self.path.display(), "no snapshot yet");
                String::new()
            }
            SnapshotRead::Failed(e) => {
                tracing::warn!(error = %e, "snapshot unreadable, treating as first run");
                String::new()
            }
        }
    }

    fn write(&mut self, content: &str) {
        if let Err(e) = self.save(content) {
            tracing::warn!(error = %e, "failed to persist snapshot");
        }
    }
}

/// Errors from snapshot file operations.
#[derive(Debug)]
pub enum SnapshotError {
    Read {
        path: PathBuf,
        source: std::io::Error,
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

impl std::fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotError::Read { path, source } => {
                write!(f, "failed to read snapshot {}: {source}", path.display())
            }
            SnapshotError::Write { path, source } => {
                write!(f, "failed to write snapshot {}: {source}", path.display())
            }
            SnapshotError::Rename { from, to, source } => {
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

impl std::error::Error for SnapshotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SnapshotError::Read { source, .. } => Some(source),
            SnapshotError::Write { source, .. } => Some(source),
            SnapshotError::Rename { source, .. } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_reads_as_empty() {
        let dir = tempdir().unwrap();
        let mut store = FileSnapshot::new(dir.path().join("last_content.txt"));

        assert!(matches!(store.load(), SnapshotRead::Missing));
        assert_eq!(store.read(), "");
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempdir().unwrap();
        let mut store = FileSnapshot::new(dir.path().join("last_content.txt"));

        store.write("Hello");
        assert_eq!(store.read(), "Hello");

        store.write("World");
        assert_eq!(store.read(), "World");
    }

    #[test]
    fn test_survives_new_instance() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("last_content.txt");

        FileSnapshot::new(&path).write("persisted text\nwith lines");
        let mut reopened = FileSnapshot::new(&path);
        assert_eq!(reopened.read(), "persisted text\nwith lines");
    }

    #[test]
    fn test_write_empty_overwrites_previous() {
        let dir = tempdir().unwrap();
        let mut store = FileSnapshot::new(dir.path().join("last_content.txt"));

        store.write("something");
        store.write("");
        assert!(matches!(store.load(), SnapshotRead::Found(ref s) if s.is_empty()));
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let store = FileSnapshot::new(dir.path().join("last_content.txt"));
        store.save("abc").unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["last_content.txt".to_string()]);
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state").join("nested").join("snap.txt");
        let store = FileSnapshot::new(&path);

        store.save("deep").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "deep");
    }

    #[test]
    fn test_invalid_utf8_is_read_failure_not_missing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("last_content.txt");
        std::fs::write(&path, [0xff, 0xfe, 0xfd]).unwrap();

        let mut store = FileSnapshot::new(&path);
        assert!(matches!(store.load(), SnapshotRead::Failed(SnapshotError::Read { .. })));
        assert_eq!(store.read(), "");
    }

    #[test]
    fn test_directory_at_path_is_read_failure() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("last_content.txt");
        std::fs::create_dir(&path).unwrap();

        let mut store = FileSnapshot::new(&path);
        assert!(matches!(store.load(), SnapshotRead::Failed(_)));
        assert_eq!(store.read(), "");
    }

    #[test]
    fn test_write_failure_is_swallowed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("last_content.txt");
        // A directory in the target slot makes the rename fail.
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("occupant"), "x").unwrap();

        let mut store = FileSnapshot::new(&path);
        assert!(store.save("new").is_err());
        store.write("new");
        assert!(path.is_dir());
    }

    #[test]
    fn test_snapshot_error_display() {
        let err = SnapshotError::Write {
            path: PathBuf::from("/tmp/snap"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "no perms"),
        };
        let msg = err.to_string();
        assert!(msg.contains("failed to write snapshot"));
        assert!(msg.contains("no perms"));
    }
}
