// # tcpgetd - TCP GET Daemon
//
// Thin integration layer: all acquisition logic lives in tcpget-core, all
// I/O in tcpget-net.
//
// The tcpgetd daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Wiring the tokio services into an AcquisitionController
// 4. Logging every reply's extracted fields until shutdown
//
// ## Configuration
//
// ### Endpoint
// - `TCPGET_HOSTNAME`: Host name to resolve
// - `TCPGET_ADDRESS`: Literal IPv4 address (used directly without a host
//   name, or as the fallback when resolution fails)
// - `TCPGET_PORT`: Remote port (default 80)
// - `TCPGET_PATH`: Request path (default `/`)
// - `TCPGET_INTERVAL_MS`: Acquisition interval (default 10000)
//
// ### Reply
// - `TCPGET_REPLY_TIMEOUT_MS`: Reply timeout (default 5000)
// - `TCPGET_TERMINATOR`: Reply terminator, `\r` and `\n` escapes allowed
//   (default `\r\n\r\n`)
// - `TCPGET_RULES`: JSON array of extraction rules
//
// ### DNS
// - `TCPGET_DNS_MAX_TRIES`: Resolution attempts (default 5)
// - `TCPGET_DNS_SERVERS`: Up to two comma-separated DNS server addresses
//
// ### Logging
// - `TCPGET_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// export TCPGET_HOSTNAME=sensor.local
// export TCPGET_PATH=/status
// export TCPGET_INTERVAL_MS=30000
// export TCPGET_RULES='[{"name":"temp","start_match":"TEMP:","terminator":","}]'
//
// tcpgetd
// ```

use anyhow::{Context, Result};
use std::env;
use std::net::Ipv4Addr;
use std::process::ExitCode;
use tcpget_core::{
    AcquisitionConfig, AcquisitionController, DnsConfig, EndpointConfig, ExtractionRule,
    FieldExtractor, Hooks, ReplyOutcome,
};
use tcpget_net::{TokioResolver, TokioTimers, TokioTransport};
use tokio::sync::{mpsc, oneshot};
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum TcpgetExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<TcpgetExitCode> for ExitCode {
    fn from(code: TcpgetExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

const DEFAULT_TERMINATOR: &str = "\r\n\r\n";

/// Application configuration
#[derive(Debug)]
struct Config {
    hostname: Option<String>,
    address: Option<String>,
    port: u16,
    path: String,
    interval_ms: u64,
    reply_timeout_ms: u64,
    dns_max_tries: u16,
    dns_servers: Vec<Ipv4Addr>,
    terminator: String,
    rules: Vec<ExtractionRule>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let nonempty = |key: &str| var(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Ok(Self {
            hostname: nonempty("TCPGET_HOSTNAME"),
            address: nonempty("TCPGET_ADDRESS"),
            port: parse_var(&var, "TCPGET_PORT", 80)?,
            path: nonempty("TCPGET_PATH").unwrap_or_else(|| "/".to_string()),
            interval_ms: parse_var(&var, "TCPGET_INTERVAL_MS", 10_000)?,
            reply_timeout_ms: parse_var(&var, "TCPGET_REPLY_TIMEOUT_MS", 5_000)?,
            dns_max_tries: parse_var(&var, "TCPGET_DNS_MAX_TRIES", 5)?,
            dns_servers: nonempty("TCPGET_DNS_SERVERS")
                .map(|servers| {
                    servers
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(|s| {
                            s.parse::<Ipv4Addr>()
                                .with_context(|| format!("TCPGET_DNS_SERVERS: invalid address '{}'", s))
                        })
                        .collect::<Result<Vec<_>>>()
                })
                .transpose()?
                .unwrap_or_default(),
            terminator: var("TCPGET_TERMINATOR")
                .map(|t| unescape(&t))
                .unwrap_or_else(|| DEFAULT_TERMINATOR.to_string()),
            rules: match nonempty("TCPGET_RULES") {
                Some(json) => parse_rules(&json)?,
                None => Vec::new(),
            },
            log_level: var("TCPGET_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    ///
    /// Everything the controller would reject is caught here, before the
    /// runtime starts.
    fn validate(&self) -> Result<()> {
        if self.hostname.is_none() && self.address.is_none() {
            anyhow::bail!(
                "TCPGET_HOSTNAME or TCPGET_ADDRESS is required. \
                Set it via: export TCPGET_HOSTNAME=sensor.local"
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "TCPGET_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        self.acquisition_config()
            .validate()
            .context("Invalid endpoint configuration")?;
        self.extractor().context("Invalid extraction rules")?;

        if self.rules.is_empty() {
            eprintln!("WARNING: TCPGET_RULES is empty, replies will only be logged raw");
        }

        Ok(())
    }

    fn acquisition_config(&self) -> AcquisitionConfig {
        let endpoint = EndpointConfig {
            hostname: self.hostname.clone(),
            address: self.address.clone(),
            port: self.port,
            path: self.path.clone(),
            interval_ms: self.interval_ms,
        };

        AcquisitionConfig::new(endpoint)
            .with_reply_timeout_ms(self.reply_timeout_ms)
            .with_dns(DnsConfig {
                max_tries: self.dns_max_tries,
                servers: self.dns_servers.clone(),
                ..DnsConfig::default()
            })
            .with_auto_start(true)
    }

    fn extractor(&self) -> tcpget_core::Result<FieldExtractor> {
        FieldExtractor::new(self.terminator.as_bytes(), self.rules.clone())
    }

    fn log_level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }
}

fn parse_var<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{} must be a number, got '{}'", key, value)),
        None => Ok(default),
    }
}

fn parse_rules(json: &str) -> Result<Vec<ExtractionRule>> {
    // parsed through the extractor so rule validation matches the library
    let extractor = FieldExtractor::from_json(DEFAULT_TERMINATOR, json).context("TCPGET_RULES")?;
    Ok(extractor.rules().to_vec())
}

/// Expand `\r`, `\n`, `\t` and `\\` escapes
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return TcpgetExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return TcpgetExitCode::ConfigError.into();
    }

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level())
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return TcpgetExitCode::ConfigError.into();
    }

    info!("Starting tcpgetd daemon");
    info!(
        "Endpoint {}:{}{} every {}ms, {} rule(s)",
        config.hostname.as_deref().or(config.address.as_deref()).unwrap_or_default(),
        config.port,
        config.path,
        config.interval_ms,
        config.rules.len()
    );

    // One task processes every event
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return TcpgetExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config).await {
            error!("Daemon error: {:#}", e);
            TcpgetExitCode::RuntimeError
        } else {
            TcpgetExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon
async fn run_daemon(config: Config) -> Result<()> {
    let acquisition = config.acquisition_config();
    let (events_tx, events_rx) = tcpget_core::event::channel();

    let resolver = TokioResolver::from_config(&acquisition.dns, events_tx.clone())?;
    info!("Using {} name service", resolver.service_name());

    let mut controller = AcquisitionController::new(
        acquisition,
        Box::new(resolver),
        Box::new(TokioTransport::new(events_tx.clone())),
        Box::new(TokioTimers::new(events_tx)),
    )?;

    controller.set_extractor(config.extractor()?);
    controller.set_hooks(logging_hooks());

    // permanent DNS failure without a fallback address ends the daemon
    let (fatal_tx, mut fatal_rx) = mpsc::unbounded_channel::<String>();
    let host = controller.host().to_string();
    let has_fallback = config.address.is_some();

    controller.resolve_host_name(move |answer| match answer {
        Some(address) => info!("Endpoint address: {}", address),
        None if has_fallback => warn!("Could not resolve {}, using fallback address", host),
        None => {
            let _ = fatal_tx.send(format!("Could not resolve {}", host));
        }
    })?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let watcher = tokio::spawn(async move {
        let outcome = tokio::select! {
            signal = wait_for_shutdown() => signal.map(|name| info!("Received shutdown signal: {}", name)),
            Some(reason) = fatal_rx.recv() => Err(anyhow::anyhow!(reason)),
        };
        let _ = shutdown_tx.send(());
        outcome
    });

    controller.run_with_shutdown(events_rx, Some(shutdown_rx)).await?;
    watcher.await??;

    info!("Shutting down daemon");
    Ok(())
}

/// Hooks that log each cycle
fn logging_hooks() -> Hooks {
    Hooks::new()
        .with_connect_failed(|connection, e| warn!("Connect failed on {}: {}", connection, e))
        .with_send_failed(|connection, e| warn!("Send failed on {}: {}", connection, e))
        .with_receive(|connection, data| {
            tracing::trace!("{} received: {}", connection, String::from_utf8_lossy(data))
        })
        .with_data_ready(|outcome| match outcome {
            ReplyOutcome::Complete(results) => info!("Data ready: {}", results.to_json()),
            ReplyOutcome::TimedOut => warn!("No reply before timeout"),
            ReplyOutcome::Closed => warn!("Connection closed before reply was complete"),
        })
}

/// Wait for SIGTERM or SIGINT
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for CTRL-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
