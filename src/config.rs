use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration loaded from pagewatch.toml.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct WatchConfig {
    pub source: SourceConfig,
    pub notify: NotifyConfig,
    pub poll: PollConfig,
    pub storage: StorageConfig,
    pub shutdown: ShutdownConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceConfig {
    pub url: String,
    pub selector: String,
    /// Treat a page without the selected region as a failed fetch.
    pub require_region: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub server: String,
    pub topic: String,
    pub startup_message: String,
    /// `{url}` is replaced by the monitored URL.
    pub change_message: String,
    /// Alert after this many consecutive failed fetches (0 = never).
    pub failure_alert_after: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PollConfig {
    pub interval_secs: u64,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub snapshot_path: PathBuf,
    /// Empty path disables the status file.
    pub status_file: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    pub stop_file: PathBuf,
}

// --- Default implementations ---

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: "https://jlistopad.cz".to_string(),
            selector: ".panel-body".to_string(),
            require_region: false,
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            server: "https://ntfy.sh".to_string(),
            topic: "jlistopad".to_string(),
            startup_message: "🔄 Website monitor service restarted!".to_string(),
            change_message: "📢 The website has been updated: {url}".to_string(),
            failure_alert_after: 0,
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: 600,
            timeout_secs: 30,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from("last_content.txt"),
            status_file: PathBuf::new(),
        }
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            stop_file: PathBuf::from("STOP"),
        }
    }
}

impl WatchConfig {
    /// Load config from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&contents).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parse config from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            source: e,
        })
    }

    /// Check the resolved settings before anything touches the network.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_http_url("source.url", &self.source.url)?;
        check_http_url("notify.server", &self.notify.server)?;

        if self.notify.topic.trim().is_empty() {
            return Err(ConfigError::invalid("notify.topic must not be empty"));
        }
        if self.notify.topic.contains('/') {
            return Err(ConfigError::invalid("notify.topic must not contain '/'"));
        }
        if let Err(e) = scraper::Selector::parse(&self.source.selector) {
            return Err(ConfigError::invalid(format!(
                "source.selector {:?} is not a valid CSS selector: {e}",
                self.source.selector
            )));
        }
        if self.poll.interval_secs == 0 {
            return Err(ConfigError::invalid("poll.interval_secs must be greater than 0"));
        }
        if self.poll.timeout_secs == 0 {
            return Err(ConfigError::invalid("poll.timeout_secs must be greater than 0"));
        }
        if self.storage.snapshot_path.as_os_str().is_empty() {
            return Err(ConfigError::invalid("storage.snapshot_path must not be empty"));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.poll.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.poll.timeout_secs)
    }

    /// Full notification endpoint: `{server}/{topic}`.
    pub fn notify_url(&self) -> String {
        format!(
            "{}/{}",
            self.notify.server.trim_end_matches('/'),
            self.notify.topic
        )
    }

    /// The change notification body with `{url}` filled in. A template
    /// without the placeholder gets the URL appended.
    pub fn change_message(&self) -> String {
        let template = &self.notify.change_message;
        if template.contains("{url}") {
            template.replace("{url}", &self.source.url)
        } else if template.trim().is_empty() {
            self.source.url.clone()
        } else {
            format!("{} {}", template.trim_end(), self.source.url)
        }
    }

    pub fn status_file(&self) -> Option<&Path> {
        let path = self.storage.status_file.as_path();
        (!path.as_os_str().is_empty()).then_some(path)
    }
}

fn check_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    match reqwest::Url::parse(value) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Ok(()),
        Ok(url) => Err(ConfigError::invalid(format!(
            "{field} must be an http(s) URL, got scheme {:?}",
            url.scheme()
        ))),
        Err(e) => Err(ConfigError::invalid(format!(
            "{field} {value:?} is not a valid URL: {e}"
        ))),
    }
}

/// Errors from loading or validating configuration.
#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    Invalid {
        reason: String,
    },
}

impl ConfigError {
    fn invalid(reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read config {}: {source}", path.display())
            }
            ConfigError::Parse { path, source } => {
                write!(f, "failed to parse config {}: {source}", path.display())
            }
            ConfigError::Invalid { reason } => write!(f, "invalid config: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::Invalid { .. } => None,
        }
    }
}
