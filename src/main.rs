mod config;
mod fetch;
mod monitor;
mod notify;
mod signals;
mod snapshot;
mod status;
#[cfg(test)]
mod testutil;

use clap::Parser;
use config::WatchConfig;
use fetch::HttpFetcher;
use monitor::{Monitor, MonitorSettings, TickOutcome};
use notify::NtfyNotifier;
use snapshot::FileSnapshot;
use status::StatusTracker;
use std::path::PathBuf;
use std::process::ExitCode;

/// Polls one web page, watches a single region of it, and sends a push
/// notification whenever that region's text changes.
#[derive(Parser, Debug)]
#[command(name = "pagewatch", version, about)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "pagewatch.toml")]
    config: PathBuf,

    /// Page to monitor (overrides config)
    #[arg(long)]
    url: Option<String>,

    /// CSS selector of the monitored region (overrides config)
    #[arg(long)]
    selector: Option<String>,

    /// Notification topic (overrides config)
    #[arg(long)]
    topic: Option<String>,

    /// Seconds between checks (overrides config)
    #[arg(long)]
    interval: Option<u64>,

    /// Snapshot file path (overrides config)
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Send the startup notice, check once, and exit
    #[arg(long)]
    once: bool,

    /// Validate config and print resolved settings, don't run
    #[arg(long)]
    dry_run: bool,

    /// Debug logging
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn apply_overrides(&self, config: &mut WatchConfig) {
        if let Some(url) = &self.url {
            config.source.url = url.clone();
        }
        if let Some(selector) = &self.selector {
            config.source.selector = selector.clone();
        }
        if let Some(topic) = &self.topic {
            config.notify.topic = topic.clone();
        }
        if let Some(interval) = self.interval {
            config.poll.interval_secs = interval;
        }
        if let Some(snapshot) = &self.snapshot {
            config.storage.snapshot_path = snapshot.clone();
        }
    }

    fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log_level())),
        )
        .with_target(false)
        .with_thread_ids(false)
        .init();

    tracing::debug!(?cli, "parsed CLI arguments");

    let mut config = match WatchConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "failed to load config");
            return ExitCode::FAILURE;
        }
    };
    cli.apply_overrides(&mut config);
    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "configuration rejected");
        return ExitCode::FAILURE;
    }

    if cli.dry_run {
        match toml::to_string_pretty(&config) {
            Ok(rendered) => {
                println!("Dry run mode: config validated, not running.\n");
                println!("{rendered}");
                return ExitCode::SUCCESS;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to render config");
                return ExitCode::FAILURE;
            }
        }
    }

    let client = match fetch::build_client(config.timeout()) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "failed to set up HTTP client");
            return ExitCode::FAILURE;
        }
    };
    let fetcher = match HttpFetcher::new(client.clone(), &config.source) {
        Ok(f) => f,
        Err(e) => {
            tracing::error!(error = %e, "failed to set up fetcher");
            return ExitCode::FAILURE;
        }
    };
    let notifier = NtfyNotifier::new(client, config.notify_url());
    let store = FileSnapshot::new(&config.storage.snapshot_path);
    let status = StatusTracker::new(
        config.status_file().map(|p| p.to_path_buf()),
        &config.source.url,
    );

    let mut monitor = Monitor::new(
        MonitorSettings::from_config(&config),
        Box::new(fetcher),
        Box::new(store),
        Box::new(notifier),
        status,
    );

    if cli.once {
        let outcome = monitor.run_once().await;
        if let TickOutcome::Changed(text) = &outcome {
            tracing::debug!(bytes = text.len(), "new region text stored");
        }
        tracing::debug!(outcome = ?outcome.kind(), "single check finished");
        return ExitCode::SUCCESS;
    }

    let (trigger, shutdown) = signals::channel();
    signals::install(trigger);
    monitor.run(shutdown).await;
    ExitCode::SUCCESS
}
