/// Push notifications through an ntfy-style relay: one plain-text POST to
/// `{server}/{topic}` per message.
///
/// Delivery is best-effort. `notify` logs failures and returns; it never
/// retries and never reports back to the caller.
use async_trait::async_trait;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str);
}

pub struct NtfyNotifier {
    client: reqwest::Client,
    endpoint: String,
}

impl NtfyNotifier {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    /// Send one message and report the outcome.
    pub async fn send(&self, message: &str) -> Result<(), NotifyError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(message.to_string())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    NotifyError::Timeout {
                        endpoint: self.endpoint.clone(),
                    }
                } else if e.is_builder() {
                    NotifyError::Client { source: e }
                } else {
                    NotifyError::Transport { source: e }
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(NotifyError::BadStatus {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for NtfyNotifier {
    async fn notify(&self, message: &str) {
        match self.send(message).await {
            Ok(()) => tracing::info!(endpoint = %self.endpoint, "push notification sent"),
            Err(e) => tracing::warn!(error = %e, "failed to send notification"),
        }
    }
}

/// Errors from a single notification attempt.
#[derive(Debug)]
pub enum NotifyError {
    /// The request could not be constructed (e.g. malformed endpoint).
    Client { source: reqwest::Error },
    Transport { source: reqwest::Error },
    Timeout { endpoint: String },
    BadStatus { status: u16 },
}

impl std::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifyError::Client { source } => {
                write!(f, "failed to build notification request: {source}")
            }
            NotifyError::Transport { source } => {
                write!(f, "notification request failed: {source}")
            }
            NotifyError::Timeout { endpoint } => {
                write!(f, "notification to {endpoint} timed out")
            }
            NotifyError::BadStatus { status } => {
                write!(f, "notification endpoint returned status {status}")
            }
        }
    }
}

impl std::error::Error for NotifyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NotifyError::Client { source } => Some(source),
            NotifyError::Transport { source } => Some(source),
            NotifyError::Timeout { .. } | NotifyError::BadStatus { .. } => None,
        }
    }
}
