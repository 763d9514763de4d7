//! Host name resolution
//!
//! [`TokioResolver`] runs one lookup at a time through a [`NameService`]
//! and posts the answer as [`Event::DnsAnswer`]. Issuing a new lookup
//! abandons the previous one, so a late answer from an attempt the
//! controller has already given up on never reaches the queue.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use async_trait::async_trait;
use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::error::ResolveErrorKind;
use tcpget_core::{DnsConfig, Error, Event, EventSender, Resolver, Result};
use tokio::task::JoinHandle;

const DNS_PORT: u16 = 53;

/// Async IPv4 lookup backend
#[async_trait]
pub trait NameService: Send + Sync {
    /// First IPv4 address of `hostname`, `None` if it has none
    async fn lookup_ipv4(&self, hostname: &str) -> Result<Option<Ipv4Addr>>;

    /// Human-readable name for logging
    fn name(&self) -> &str;
}

/// The operating system resolver via `tokio::net::lookup_host`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemNameService;

#[async_trait]
impl NameService for SystemNameService {
    async fn lookup_ipv4(&self, hostname: &str) -> Result<Option<Ipv4Addr>> {
        let addrs = tokio::net::lookup_host((hostname, 0)).await?;

        Ok(addrs.into_iter().find_map(|addr| match addr.ip() {
            IpAddr::V4(v4) => Some(v4),
            IpAddr::V6(_) => None,
        }))
    }

    fn name(&self) -> &str {
        "system"
    }
}

/// Explicit DNS servers queried with `hickory-resolver`
pub struct ServerListNameService {
    resolver: TokioAsyncResolver,
    servers: Vec<Ipv4Addr>,
}

impl ServerListNameService {
    /// Query `servers` (in order) over UDP with TCP fallback
    pub fn new(servers: &[Ipv4Addr]) -> Result<Self> {
        if servers.is_empty() {
            return Err(Error::config("At least one DNS server is required"));
        }

        let ips: Vec<IpAddr> = servers.iter().copied().map(IpAddr::V4).collect();
        let group = NameServerConfigGroup::from_ips_clear(&ips, DNS_PORT, true);
        let config = ResolverConfig::from_parts(None, vec![], group);

        let mut opts = ResolverOpts::default();
        // the controller's watchdog owns retries
        opts.attempts = 1;

        Ok(Self {
            resolver: TokioAsyncResolver::tokio(config, opts),
            servers: servers.to_vec(),
        })
    }

    /// Configured servers
    pub fn servers(&self) -> &[Ipv4Addr] {
        &self.servers
    }
}

#[async_trait]
impl NameService for ServerListNameService {
    async fn lookup_ipv4(&self, hostname: &str) -> Result<Option<Ipv4Addr>> {
        match self.resolver.ipv4_lookup(hostname).await {
            Ok(lookup) => Ok(lookup.iter().next().map(|a| a.0)),
            Err(e) if matches!(e.kind(), ResolveErrorKind::NoRecordsFound { .. }) => Ok(None),
            Err(e) => Err(Error::resolver(e.to_string())),
        }
    }

    fn name(&self) -> &str {
        "server-list"
    }
}

/// [`Resolver`] running lookups on spawned tasks
pub struct TokioResolver {
    service: Arc<dyn NameService>,
    events: EventSender,
    pending: Option<JoinHandle<()>>,
}

impl TokioResolver {
    pub fn new(service: Arc<dyn NameService>, events: EventSender) -> Self {
        Self {
            service,
            events,
            pending: None,
        }
    }

    /// Use the explicit servers in `dns`, or the system resolver when none
    /// are configured
    pub fn from_config(dns: &DnsConfig, events: EventSender) -> Result<Self> {
        let service: Arc<dyn NameService> = if dns.servers.is_empty() {
            Arc::new(SystemNameService)
        } else {
            Arc::new(ServerListNameService::new(&dns.servers)?)
        };
        Ok(Self::new(service, events))
    }

    /// Backend in use
    pub fn service_name(&self) -> &str {
        self.service.name()
    }
}

impl Resolver for TokioResolver {
    fn resolve(&mut self, hostname: &str) -> Result<()> {
        if self.events.is_closed() {
            return Err(Error::resolver("Event queue closed"));
        }

        if let Some(previous) = self.pending.take() {
            previous.abort();
        }

        let service = Arc::clone(&self.service);
        let events = self.events.clone();
        let hostname = hostname.to_string();

        self.pending = Some(tokio::spawn(async move {
            let answer = match service.lookup_ipv4(&hostname).await {
                Ok(answer) => answer,
                Err(e) => {
                    tracing::warn!("Lookup of {} via {} failed: {}", hostname, service.name(), e);
                    None
                }
            };
            let _ = events.send(Event::DnsAnswer(answer));
        }));

        Ok(())
    }
}

impl Drop for TokioResolver {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }
}
