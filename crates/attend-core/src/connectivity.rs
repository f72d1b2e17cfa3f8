//! Network reachability checks run before any sync step.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::{lookup_host, TcpStream};
use tokio::time::timeout;

/// Answers "is the network there?" without ever failing.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn is_reachable(&self) -> bool;
}

/// Public DNS resolvers used as reachability targets.
pub const DEFAULT_PROBE_ENDPOINTS: [&str; 3] = ["8.8.8.8:53", "1.1.1.1:53", "208.67.222.222:53"];

/// Host resolved as a last resort when every TCP probe fails.
pub const DEFAULT_FALLBACK_HOST: &str = "www.google.com";

/// Probes reachability with short TCP connects to well-known DNS servers,
/// then a name lookup.
#[derive(Debug, Clone)]
pub struct DnsProbe {
    endpoints: Vec<SocketAddr>,
    fallback_host: Option<String>,
    timeout: Duration,
}

impl DnsProbe {
    pub const fn new(
        endpoints: Vec<SocketAddr>,
        fallback_host: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            endpoints,
            fallback_host,
            timeout,
        }
    }

    async fn connect(&self, endpoint: SocketAddr) -> bool {
        match timeout(self.timeout, TcpStream::connect(endpoint)).await {
            Ok(Ok(_)) => true,
            Ok(Err(err)) => {
                tracing::debug!("Probe {endpoint} failed: {err}");
                false
            }
            Err(_) => {
                tracing::debug!("Probe {endpoint} timed out after {:?}", self.timeout);
                false
            }
        }
    }

    async fn resolve(&self, host: &str) -> bool {
        match timeout(self.timeout, lookup_host((host, 80))).await {
            Ok(Ok(mut addrs)) => addrs.next().is_some(),
            Ok(Err(err)) => {
                tracing::debug!("Resolving {host} failed: {err}");
                false
            }
            Err(_) => false,
        }
    }
}

impl Default for DnsProbe {
    fn default() -> Self {
        let endpoints = DEFAULT_PROBE_ENDPOINTS
            .iter()
            .filter_map(|endpoint| endpoint.parse().ok())
            .collect();
        Self::new(
            endpoints,
            Some(DEFAULT_FALLBACK_HOST.to_string()),
            Duration::from_secs(2),
        )
    }
}

#[async_trait]
impl ConnectivityProbe for DnsProbe {
    async fn is_reachable(&self) -> bool {
        for endpoint in &self.endpoints {
            if self.connect(*endpoint).await {
                return true;
            }
        }

        if let Some(host) = &self.fallback_host {
            if self.resolve(host).await {
                return true;
            }
        }

        tracing::debug!("No connectivity: every probe failed");
        false
    }
}
