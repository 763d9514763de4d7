//! Configuration types for the TCP GET client
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::time::Duration;

/// Main acquisition configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Where and how often to poll
    pub endpoint: EndpointConfig,

    /// DNS retry policy
    #[serde(default)]
    pub dns: DnsConfig,

    /// Time allowed between a successful send and the reply terminator (ms)
    #[serde(default = "default_reply_timeout_ms")]
    pub reply_timeout_ms: u64,

    /// Capacity of the outgoing request buffer (bytes)
    #[serde(default = "default_request_buffer_size")]
    pub request_buffer_size: usize,

    /// Start acquisition as soon as the host name is resolved
    #[serde(default)]
    pub auto_start: bool,
}

impl AcquisitionConfig {
    /// Create a configuration with default policies for the given endpoint
    pub fn new(endpoint: EndpointConfig) -> Self {
        Self {
            endpoint,
            dns: DnsConfig::default(),
            reply_timeout_ms: default_reply_timeout_ms(),
            request_buffer_size: default_request_buffer_size(),
            auto_start: false,
        }
    }

    /// Set the reply timeout
    pub fn with_reply_timeout_ms(mut self, reply_timeout_ms: u64) -> Self {
        self.reply_timeout_ms = reply_timeout_ms;
        self
    }

    /// Set the DNS retry policy
    pub fn with_dns(mut self, dns: DnsConfig) -> Self {
        self.dns = dns;
        self
    }

    /// Start acquisition automatically once resolved
    pub fn with_auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }

    /// Set the request buffer capacity
    pub fn with_request_buffer_size(mut self, size: usize) -> Self {
        self.request_buffer_size = size;
        self
    }

    /// Reply timeout as a [`Duration`]
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.endpoint.validate()?;
        self.dns.validate()?;

        if self.reply_timeout_ms == 0 {
            return Err(crate::Error::config("Reply timeout must be > 0"));
        }
        if self.request_buffer_size == 0 {
            return Err(crate::Error::config("Request buffer size must be > 0"));
        }

        Ok(())
    }
}

/// Remote endpoint and polling interval
///
/// Immutable once acquisition has started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Host name to resolve (takes precedence over `address`)
    #[serde(default)]
    pub hostname: Option<String>,

    /// Literal IPv4 address, used when no host name is given
    /// or after resolution has failed permanently
    #[serde(default)]
    pub address: Option<String>,

    /// Remote TCP port
    pub port: u16,

    /// Request path
    #[serde(default = "default_path")]
    pub path: String,

    /// Polling interval (ms)
    pub interval_ms: u64,
}

impl EndpointConfig {
    /// Endpoint reached through a host name
    pub fn with_hostname(hostname: impl Into<String>, port: u16, path: impl Into<String>, interval_ms: u64) -> Self {
        Self {
            hostname: Some(hostname.into()),
            address: None,
            port,
            path: path.into(),
            interval_ms,
        }
    }

    /// Endpoint reached through a literal address
    pub fn with_address(address: impl Into<String>, port: u16, path: impl Into<String>, interval_ms: u64) -> Self {
        Self {
            hostname: None,
            address: Some(address.into()),
            port,
            path: path.into(),
            interval_ms,
        }
    }

    /// Add a literal fallback address
    pub fn with_fallback_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Polling interval as a [`Duration`]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Parsed literal address, if one is configured
    pub fn literal_address(&self) -> Result<Option<Ipv4Addr>, crate::Error> {
        match &self.address {
            Some(addr) => addr
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| crate::Error::config(format!("Invalid IPv4 address: {}", addr))),
            None => Ok(None),
        }
    }

    /// Name used in the `Host:` header
    pub fn host(&self) -> &str {
        self.hostname
            .as_deref()
            .or(self.address.as_deref())
            .unwrap_or_default()
    }

    /// Validate the endpoint configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match (&self.hostname, &self.address) {
            (None, None) => {
                return Err(crate::Error::config(
                    "Either a host name or a literal address is required",
                ));
            }
            (Some(host), _) if host.trim().is_empty() => {
                return Err(crate::Error::config("Host name cannot be empty"));
            }
            _ => {}
        }

        self.literal_address()?;

        if self.port == 0 {
            return Err(crate::Error::config("Port must be > 0"));
        }
        if !self.path.starts_with('/') {
            return Err(crate::Error::config(format!(
                "Request path must start with '/': {}",
                self.path
            )));
        }
        if self.interval_ms == 0 {
            return Err(crate::Error::config("Acquisition interval must be > 0"));
        }

        Ok(())
    }
}

/// DNS resolution policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsConfig {
    /// Resolution attempts before giving up
    #[serde(default = "default_dns_max_tries")]
    pub max_tries: u16,

    /// Watchdog bounding each attempt (ms)
    #[serde(default = "default_dns_watchdog_ms")]
    pub watchdog_ms: u64,

    /// Explicit DNS servers (at most two); empty means the system resolver
    #[serde(default)]
    pub servers: Vec<Ipv4Addr>,
}

impl DnsConfig {
    /// Watchdog period as a [`Duration`]
    pub fn watchdog(&self) -> Duration {
        Duration::from_millis(self.watchdog_ms)
    }

    /// Validate the DNS configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.max_tries == 0 {
            return Err(crate::Error::config("DNS max tries must be > 0"));
        }
        if self.watchdog_ms == 0 {
            return Err(crate::Error::config("DNS watchdog must be > 0"));
        }
        if self.servers.len() > 2 {
            return Err(crate::Error::config(format!(
                "At most 2 DNS servers are supported, got {}",
                self.servers.len()
            )));
        }
        Ok(())
    }
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            max_tries: default_dns_max_tries(),
            watchdog_ms: default_dns_watchdog_ms(),
            servers: Vec::new(),
        }
    }
}

fn default_dns_max_tries() -> u16 {
    5
}

fn default_dns_watchdog_ms() -> u64 {
    1000
}

fn default_reply_timeout_ms() -> u64 {
    5000
}

fn default_request_buffer_size() -> usize {
    4096
}

fn default_path() -> String {
    "/".to_string()
}
