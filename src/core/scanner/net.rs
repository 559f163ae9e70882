// src/core/scanner/net.rs

use std::net::IpAddr;
use std::time::Duration;

use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use tracing::{debug, error, warn};

use crate::core::models::ProbeFailure;

/// Builds a short-lived client carrying the scanner's identifying user agent.
///
/// Clients are built per probe call so no connection outlives a scan. The
/// redirect policy is reqwest's default (at most 10 hops).
pub fn build_client(user_agent: &str, timeout: Duration) -> Result<reqwest::Client, ProbeFailure> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .pool_max_idle_per_host(0)
        .build()
        .map_err(|e| {
            error!(error = %e, "Failed to build HTTP client.");
            ProbeFailure::unknown(format!("Failed to build HTTP client: {}", e))
        })
}

/// Resolves a host name (or literal address) to the first address returned.
///
/// Uses the system resolver configuration, including the hosts file, and falls
/// back to the resolver defaults when no system configuration is readable.
pub async fn resolve_host(host: &str) -> Result<IpAddr, ProbeFailure> {
    let host = host.trim().trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return Err(ProbeFailure::invalid_input("Host is empty"));
    }
    if let Ok(addr) = host.parse::<IpAddr>() {
        debug!(host, "Host is a literal address, skipping resolution.");
        return Ok(addr);
    }

    let resolver = TokioAsyncResolver::tokio_from_system_conf().unwrap_or_else(|e| {
        warn!(error = %e, "System resolver configuration unavailable, using defaults.");
        TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
    });

    let lookup = resolver.lookup_ip(host).await.map_err(|e| {
        warn!(host, error = %e, "Host resolution failed.");
        ProbeFailure::connection(format!("Could not resolve host '{}': {}", host, e))
    })?;

    let addr = lookup
        .iter()
        .next()
        .ok_or_else(|| ProbeFailure::connection(format!("No addresses found for host '{}'", host)))?;
    debug!(host, address = %addr, "Host resolved.");
    Ok(addr)
}
