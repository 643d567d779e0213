//! Outbound target safety checks
//!
//! Every host the crawler is about to contact is resolved and each resulting
//! address checked against the private, loopback, link-local and multicast
//! ranges. A host with any forbidden address, or no address at all, is
//! rejected.

use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use thiserror::Error;
use url::{Host, Url};

/// A URL the crawler refuses to contact
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unsafe target {host}: {reason}")]
pub struct UnsafeTarget {
    pub host: String,
    pub reason: String,
}

impl UnsafeTarget {
    fn new(host: &str, reason: impl Into<String>) -> Self {
        Self {
            host: host.to_string(),
            reason: reason.into(),
        }
    }
}

/// Resolves hostnames to addresses
///
/// IP literals are passed through the resolver as well, so an implementation
/// sees every host the crawler checks.
#[async_trait]
pub trait HostResolver: Send + Sync {
    async fn resolve(&self, host: &str, port: u16) -> io::Result<Vec<IpAddr>>;
}

/// Resolver backed by the operating system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl HostResolver for SystemResolver {
    async fn resolve(&self, host: &str, port: u16) -> io::Result<Vec<IpAddr>> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(vec![ip]);
        }

        let addrs = tokio::net::lookup_host((host, port)).await?;
        Ok(addrs.map(|addr| addr.ip()).collect())
    }
}

/// Resolver with a fixed host table
///
/// Hosts missing from the table fail to resolve.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    hosts: HashMap<String, Vec<IpAddr>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `host` to `addr`, replacing any previous mapping
    pub fn with_host(mut self, host: &str, addr: IpAddr) -> Self {
        self.hosts.insert(host.to_ascii_lowercase(), vec![addr]);
        self
    }
}

#[async_trait]
impl HostResolver for StaticResolver {
    async fn resolve(&self, host: &str, _port: u16) -> io::Result<Vec<IpAddr>> {
        self.hosts
            .get(&host.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("unknown host {}", host)))
    }
}

/// Names the forbidden range an address falls in, if any
///
/// IPv4-mapped IPv6 addresses are judged by their IPv4 form.
pub fn forbidden_range(ip: &IpAddr) -> Option<&'static str> {
    match ip {
        IpAddr::V4(v4) => forbidden_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => forbidden_v4(&v4),
            None => forbidden_v6(v6),
        },
    }
}

fn forbidden_v4(ip: &Ipv4Addr) -> Option<&'static str> {
    if ip.is_unspecified() {
        Some("unspecified address")
    } else if ip.is_loopback() {
        Some("loopback address")
    } else if ip.is_private() {
        Some("private address")
    } else if ip.is_link_local() {
        Some("link-local address")
    } else if ip.is_multicast() {
        Some("multicast address")
    } else if ip.is_broadcast() {
        Some("broadcast address")
    } else {
        None
    }
}

fn forbidden_v6(ip: &Ipv6Addr) -> Option<&'static str> {
    let first = ip.segments()[0];

    if ip.is_unspecified() {
        Some("unspecified address")
    } else if ip.is_loopback() {
        Some("loopback address")
    } else if ip.is_multicast() {
        Some("multicast address")
    } else if first & 0xfe00 == 0xfc00 {
        Some("unique-local address")
    } else if first & 0xffc0 == 0xfe80 {
        Some("link-local address")
    } else {
        None
    }
}

/// Host string suitable for resolution (IPv6 literals without brackets)
fn resolvable_host(url: &Url) -> Option<String> {
    match url.host()? {
        Host::Domain(domain) => Some(domain.to_string()),
        Host::Ipv4(addr) => Some(addr.to_string()),
        Host::Ipv6(addr) => Some(addr.to_string()),
    }
}

/// Checks that `url` points at a publicly routable host
///
/// # Arguments
///
/// * `url` - The URL about to be fetched
/// * `resolver` - Resolver used for the host lookup
///
/// # Returns
///
/// * `Ok(())` - Every resolved address is public
/// * `Err(UnsafeTarget)` - The host is missing, unresolvable, or resolves to a forbidden range
pub async fn check_target(url: &Url, resolver: &dyn HostResolver) -> Result<(), UnsafeTarget> {
    let host = resolvable_host(url).ok_or_else(|| UnsafeTarget::new("", "URL has no host"))?;
    let port = url.port_or_known_default().unwrap_or(80);

    let addrs = resolver
        .resolve(&host, port)
        .await
        .map_err(|e| UnsafeTarget::new(&host, format!("could not resolve host: {}", e)))?;

    if addrs.is_empty() {
        return Err(UnsafeTarget::new(&host, "host resolved to no addresses"));
    }

    for addr in &addrs {
        if let Some(range) = forbidden_range(addr) {
            return Err(UnsafeTarget::new(&host, format!("{} is a {}", addr, range)));
        }
    }

    Ok(())
}
