//! Network transport for photo bytes.

use super::address::{resolve_any, resolve_global, HostResolver};
use crate::error::{EngineError, TransportError, ValidationError};
use reqwest::blocking::Client;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use reqwest::redirect::Policy;
use std::collections::HashSet;
use std::io::{self, Read};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use url::Url;

/// Largest photo body accepted from a media host
pub const MAX_PHOTO_BYTES: u64 = 64 * 1024 * 1024;

/// Fetches the bytes behind an already-validated URL
pub trait ByteFetcher: Send + Sync {
    fn fetch(&self, url: &Url) -> Result<Vec<u8>, TransportError>;
}

/// DNS for the HTTP client, held to the validation address rules.
///
/// Validation resolves a host once; the connection resolves it again.
/// Both answers must be global unicast, so a host cannot pass the check
/// and then point the connection somewhere internal. Override targets are
/// resolved without the address rule.
pub struct GlobalOnlyResolver {
    resolver: Arc<dyn HostResolver>,
    exempt_hosts: HashSet<String>,
}

impl GlobalOnlyResolver {
    pub fn new(resolver: Arc<dyn HostResolver>, exempt_hosts: HashSet<String>) -> Self {
        Self {
            resolver,
            exempt_hosts,
        }
    }

    /// Addresses the client may connect to for `host`
    pub fn connect_addresses(&self, host: &str) -> Result<Vec<IpAddr>, ValidationError> {
        if self.exempt_hosts.contains(&host.to_lowercase()) {
            return resolve_any(host, self.resolver.as_ref());
        }
        resolve_global(host, self.resolver.as_ref()).inspect_err(|_| {
            warn!(host = %host.to_lowercase(), "Refused connection to non-global address");
        })
    }
}

impl Resolve for GlobalOnlyResolver {
    fn resolve(&self, name: Name) -> Resolving {
        // port 0 is replaced with the URL's port by the connector
        let outcome = self
            .connect_addresses(name.as_str())
            .map(|addresses| {
                Box::new(addresses.into_iter().map(|ip| SocketAddr::new(ip, 0))) as Addrs
            })
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>);
        Box::pin(std::future::ready(outcome))
    }
}

/// Blocking HTTP fetcher with a fixed per-request timeout.
///
/// Redirects are not followed: a 3xx answer is a transport failure, so an
/// allowed host cannot hand the request to one that was never validated.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, resolver: GlobalOnlyResolver) -> Result<Self, EngineError> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .dns_resolver(Arc::new(resolver))
            .user_agent(concat!("photo-prune/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| EngineError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl ByteFetcher for HttpFetcher {
    fn fetch(&self, url: &Url) -> Result<Vec<u8>, TransportError> {
        let host = url.host_str().unwrap_or("unknown").to_lowercase();

        let response = self.client.get(url.clone()).send().map_err(|e| {
            warn!(host = %host, timeout = e.is_timeout(), "Download transport failure");
            TransportError {
                host: host.clone(),
                status: e.status().map(|status| status.as_u16()),
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(host = %host, status = status.as_u16(), "Download rejected by host");
            return Err(TransportError {
                host,
                status: Some(status.as_u16()),
            });
        }

        let too_large = || {
            warn!(host = %host, limit = MAX_PHOTO_BYTES, "Download body too large");
            TransportError {
                host: host.clone(),
                status: None,
            }
        };
        if response.content_length().is_some_and(|len| len > MAX_PHOTO_BYTES) {
            return Err(too_large());
        }
        match read_capped(response, MAX_PHOTO_BYTES) {
            Ok(Some(bytes)) => Ok(bytes),
            Ok(None) => Err(too_large()),
            Err(_) => Err(TransportError {
                host: host.clone(),
                status: Some(status.as_u16()),
            }),
        }
    }
}

/// Read at most `limit` bytes; `None` if the body is longer
pub fn read_capped(reader: impl Read, limit: u64) -> io::Result<Option<Vec<u8>>> {
    let mut bytes = Vec::new();
    reader.take(limit.saturating_add(1)).read_to_end(&mut bytes)?;
    if bytes.len() as u64 > limit {
        return Ok(None);
    }
    Ok(Some(bytes))
}
