/// Page fetcher: GET the monitored URL and extract the text of one region.
///
/// Any non-2xx status is a failure. No retries happen here; the monitor loop
/// simply tries again on its next tick.
use crate::config::SourceConfig;
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::time::Duration;

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Retrieve the page and return the monitored region's text.
    async fn fetch(&self) -> Result<String, FetchError>;
}

/// Result of looking up the monitored region in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Region {
    Found(String),
    Missing,
}

/// Concatenated text of every element matching `selector`, in document order.
pub fn extract_region(html: &str, selector: &Selector) -> Region {
    let document = Html::parse_document(html);
    let mut matched = false;
    let mut text = String::new();
    for element in document.select(selector) {
        matched = true;
        text.extend(element.text());
    }
    if matched {
        Region::Found(text)
    } else {
        Region::Missing
    }
}

/// Build the HTTP client shared by the fetcher and the notifier.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, FetchError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("pagewatch/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| FetchError::Client { source: e })
}

/// Fetcher for a fixed URL and CSS selector.
pub struct HttpFetcher {
    client: reqwest::Client,
    url: String,
    selector: Selector,
    selector_text: String,
    require_region: bool,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client, source: &SourceConfig) -> Result<Self, FetchError> {
        let selector =
            Selector::parse(&source.selector).map_err(|e| FetchError::InvalidSelector {
                selector: source.selector.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
            url: source.url.clone(),
            selector,
            selector_text: source.selector.clone(),
            require_region: source.require_region,
        })
    }

    fn classify(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout {
                url: self.url.clone(),
            }
        } else {
            FetchError::Transport { source: err }
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self) -> Result<String, FetchError> {
        tracing::debug!(url = %self.url, "fetching page");
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::BadStatus {
                status: status.as_u16(),
            });
        }

        let body = resp.text().await.map_err(|e| {
            if e.is_timeout() {
                self.classify(e)
            } else {
                FetchError::Body { source: e }
            }
        })?;
        tracing::debug!(bytes = body.len(), "page body received");

        match extract_region(&body, &self.selector) {
            Region::Found(text) => Ok(text),
            Region::Missing if self.require_region => Err(FetchError::RegionNotFound {
                selector: self.selector_text.clone(),
            }),
            Region::Missing => {
                tracing::warn!(
                    selector = %self.selector_text,
                    "monitored region not found, using empty text"
                );
                Ok(String::new())
            }
        }
    }
}

/// Errors that can occur while fetching the monitored page.
#[derive(Debug)]
pub enum FetchError {
    /// Failed to build the HTTP client.
    Client { source: reqwest::Error },
    /// Connection, DNS, TLS or protocol failure.
    Transport { source: reqwest::Error },
    /// The request did not complete within the configured timeout.
    Timeout { url: String },
    /// The server answered with a non-2xx status.
    BadStatus { status: u16 },
    /// Failed to read the response body.
    Body { source: reqwest::Error },
    InvalidSelector { selector: String, reason: String },
    /// Only raised when `require_region` is set.
    RegionNotFound { selector: String },
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Client { source } => write!(f, "failed to build HTTP client: {source}"),
            FetchError::Transport { source } => write!(f, "request failed: {source}"),
            FetchError::Timeout { url } => write!(f, "request to {url} timed out"),
            FetchError::BadStatus { status } => write!(f, "received status code {status}"),
            FetchError::Body { source } => write!(f, "failed to read response body: {source}"),
            FetchError::InvalidSelector { selector, reason } => {
                write!(f, "invalid selector {selector:?}: {reason}")
            }
            FetchError::RegionNotFound { selector } => {
                write!(f, "no element matches {selector:?}")
            }
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Client { source } => Some(source),
            FetchError::Transport { source } => Some(source),
            FetchError::Body { source } => Some(source),
            FetchError::Timeout { .. }
            | FetchError::BadStatus { .. }
            | FetchError::InvalidSelector { .. }
            | FetchError::RegionNotFound { .. } => None,
        }
    }
}
