//! CLI argument parsing and run wiring

use std::io;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use http::HeaderMap;
use tokio_util::sync::CancellationToken;
use url::Url;

use vessel_core::collector::stats_channel;
use vessel_core::template::parse_header;
use vessel_core::{Config, CoordinatorBuilder, EventCollector, TOOL_AGENT};

use crate::validation::{parse_basic_auth, parse_method};

/// HTTP benchmarking utility
#[derive(Parser, Debug)]
#[command(name = "vessel", version, about = "HTTP Benchmarking utility")]
pub struct Cli {
    /// Target URL
    pub url: String,

    /// Suppresses output
    #[arg(short, long)]
    pub quiet: bool,

    /// Maximum requests in flight (0 = unlimited)
    #[arg(short = 'r', long = "max-rps", default_value_t = 0, allow_negative_numbers = true)]
    pub max_rps: i64,

    /// Number of concurrent workers
    #[arg(short, long, default_value_t = 10, allow_negative_numbers = true)]
    pub concurrency: i64,

    /// Duration to send requests for (e.g. 30s, 2m), cannot be used with -n
    #[arg(short, long, value_parser = humantime::parse_duration, conflicts_with = "number")]
    pub duration: Option<Duration>,

    /// The total number of requests, cannot be used with -d
    #[arg(short = 'n', long)]
    pub number: Option<u64>,

    /// HTTP verb to perform
    #[arg(short, long, default_value = "GET")]
    pub method: String,

    /// Per request timeout before terminating the request (e.g. 500ms)
    #[arg(short, long, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,

    /// Enable HTTP/2 support
    #[arg(long)]
    pub http2: bool,

    /// Set a custom HOST header
    #[arg(long)]
    pub host: Option<String>,

    /// Set a custom user agent header, always suffixed with the tool's own
    #[arg(short = 'u', long = "agent")]
    pub agent: Option<String>,

    /// Colon separated user:pass for basic auth
    #[arg(short, long)]
    pub basic: Option<String>,

    /// Colon separated name:value for arbitrary HTTP headers (repeatable)
    #[arg(short = 'H', long = "headers")]
    pub headers: Vec<String>,

    /// Automatically follow redirects (disable with --follow=false)
    #[arg(
        short = 'f',
        long,
        default_value_t = true,
        action = clap::ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    pub follow: bool,

    /// Do not verify the server certificate or host name
    #[arg(short, long)]
    pub insecure: bool,

    /// Print the resolved configuration on startup
    #[arg(short, long)]
    pub show: bool,
}

impl Cli {
    /// Run the benchmark described by the parsed flags.
    pub async fn run(&self) -> Result<()> {
        let cfg = self.config()?;
        if self.show {
            println!("{cfg:#?}");
        }

        let cancel = CancellationToken::new();
        let signals = spawn_signal_handler(cancel.clone());

        let (stats_tx, stats_rx) = stats_channel();
        let mut collector = EventCollector::new(stats_rx, &cfg);
        collector.start();

        let mut coordinator = CoordinatorBuilder::new()
            .config(cfg)
            .stats_tx(stats_tx)
            .cancel(cancel)
            .build()
            .context("unable to prepare the run")?;

        coordinator.start();
        coordinator.wait().await;
        signals.abort();

        if self.quiet {
            collector.summarise(&mut io::sink()).await;
        } else {
            let stdout = io::stdout();
            collector.summarise(&mut stdout.lock()).await;
        }
        Ok(())
    }

    /// Resolve raw flags into the engine's config.
    fn config(&self) -> Result<Config> {
        let endpoint = Url::parse(&self.url).context("bad endpoint provided")?;
        let method = parse_method(&self.method)?;

        let mut headers = HeaderMap::new();
        for raw in &self.headers {
            match parse_header(raw) {
                Some((name, value)) => {
                    headers.append(name, value);
                }
                None => tracing::debug!(header = raw, "dropping malformed header"),
            }
        }

        let basic_auth = self
            .basic
            .as_deref()
            .map(parse_basic_auth)
            .transpose()?;

        let user_agent = match self.agent.as_deref() {
            Some(custom) if !custom.is_empty() => format!("{custom} {TOOL_AGENT}"),
            _ => TOOL_AGENT.to_string(),
        };

        let duration = self.duration.unwrap_or_default();
        let amount = match self.duration {
            Some(_) => 0,
            None => self.number.unwrap_or(50),
        };

        let cfg = Config {
            endpoint,
            method,
            amount,
            duration,
            // Negative values from the flags clamp rather than error.
            concurrency: self.concurrency.max(0) as usize,
            max_rps: self.max_rps.max(0) as usize,
            timeout: self.timeout.unwrap_or_default(),
            headers,
            host_override: self.host.clone(),
            basic_auth,
            user_agent,
            insecure_tls: self.insecure,
            http2: self.http2,
            follow_redirects: self.follow,
            max_connections: 0,
        };
        cfg.validate()
            .map_err(|e| anyhow::anyhow!(e).context("invalid workload"))?;
        Ok(cfg)
    }
}

/// Cancel the run on SIGINT or SIGTERM; the drain still completes and the
/// summary prints for whatever finished.
fn spawn_signal_handler(cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        interrupted().await;
        tracing::info!("interrupt received, finishing in-flight attempts");
        cancel.cancel();
    })
}

#[cfg(unix)]
async fn interrupted() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "unable to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn interrupted() {
    let _ = tokio::signal::ctrl_c().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("args should parse")
    }

    #[test]
    fn defaults_match_the_documented_surface() {
        let cli = parse(&["vessel", "http://localhost:8080/"]);
        let cfg = cli.config().unwrap();
        assert_eq!(cfg.amount, 50);
        assert!(cfg.duration.is_zero());
        assert_eq!(cfg.concurrency, 10);
        assert_eq!(cfg.max_rps, 0);
        assert!(cfg.follow_redirects);
        assert!(!cfg.insecure_tls);
        assert_eq!(cfg.user_agent, TOOL_AGENT);
    }

    #[test]
    fn duration_and_number_conflict() {
        let result = Cli::try_parse_from(["vessel", "-d", "10s", "-n", "100", "http://x/"]);
        assert!(result.is_err());
    }

    #[test]
    fn duration_mode_zeroes_the_amount() {
        let cli = parse(&["vessel", "-d", "2s", "http://localhost/"]);
        let cfg = cli.config().unwrap();
        assert_eq!(cfg.amount, 0);
        assert_eq!(cfg.duration, Duration::from_secs(2));
    }

    #[test]
    fn explicit_zero_workload_is_fatal() {
        let cli = parse(&["vessel", "-n", "0", "http://localhost/"]);
        assert!(cli.config().is_err());
    }

    #[test]
    fn negative_flags_clamp() {
        let cli = parse(&["vessel", "-r", "-5", "-c", "-3", "http://localhost/"]);
        let cfg = cli.config().unwrap();
        assert_eq!(cfg.max_rps, 0);
        assert_eq!(cfg.concurrency, 0);
        assert_eq!(cfg.workers(), 1);
    }

    #[test]
    fn custom_agent_keeps_the_tool_suffix() {
        let cli = parse(&["vessel", "-u", "loadbot/1.0", "http://localhost/"]);
        let cfg = cli.config().unwrap();
        assert!(cfg.user_agent.starts_with("loadbot/1.0 "));
        assert!(cfg.user_agent.ends_with(TOOL_AGENT));
    }

    #[test]
    fn malformed_headers_are_dropped_quietly() {
        let cli = parse(&[
            "vessel",
            "-H",
            "X-Ok: yes",
            "-H",
            "not-a-header",
            "http://localhost/",
        ]);
        let cfg = cli.config().unwrap();
        assert_eq!(cfg.headers.len(), 1);
        assert!(cfg.headers.contains_key("x-ok"));
    }

    #[test]
    fn bad_url_is_fatal() {
        let cli = parse(&["vessel", "::not a url::"]);
        assert!(cli.config().is_err());
    }

    #[test]
    fn malformed_basic_auth_is_fatal() {
        let cli = parse(&["vessel", "-b", "no-separator", "http://localhost/"]);
        assert!(cli.config().is_err());
    }

    #[test]
    fn follow_can_be_disabled() {
        let cli = parse(&["vessel", "--follow=false", "http://localhost/"]);
        let cfg = cli.config().unwrap();
        assert!(!cfg.follow_redirects);
    }
}
