// src/core/scanner/port_scanner.rs

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::net::resolve_host;
use crate::config::DEFAULT_PORTS;
use crate::core::models::{PortScanOutcome, ProbeFailure, ProbePayload, ProbeResult};

/// Probes TCP reachability of `ports` on `host`.
///
/// An empty port list means [`DEFAULT_PORTS`]. At most `max_concurrency`
/// connection attempts are in flight at any time (0 is treated as 1). Every
/// attempt runs to completion; `open_ports` keeps the input order no matter
/// which attempts finish first.
pub async fn probe_ports(
    host: &str,
    ports: &[u16],
    per_attempt_timeout: Duration,
    max_concurrency: usize,
) -> ProbeResult {
    scan_ports(host, ports, per_attempt_timeout, max_concurrency)
        .await
        .map(ProbePayload::Ports)
        .into()
}

async fn scan_ports(
    host: &str,
    ports: &[u16],
    per_attempt_timeout: Duration,
    max_concurrency: usize,
) -> Result<PortScanOutcome, ProbeFailure> {
    let started = Instant::now();
    let ports: Vec<u16> = if ports.is_empty() {
        DEFAULT_PORTS.to_vec()
    } else {
        ports.to_vec()
    };
    let max_concurrency = max_concurrency.max(1);
    info!(host, ports = ports.len(), max_concurrency, "Starting port scan.");

    // A resolution failure aborts the whole probe.
    let address = resolve_host(host).await?;

    let semaphore = Arc::new(Semaphore::new(max_concurrency));
    let mut attempts = spawn_attempts(address, &ports, per_attempt_timeout, semaphore);

    // Attempts finish in any order; the index puts each one back in its slot.
    let mut states = vec![false; ports.len()];
    while let Some(joined) = attempts.join_next().await {
        match joined {
            Ok((index, open)) => states[index] = open,
            Err(e) => warn!(error = %e, "Port attempt task failed, counting as closed."),
        }
    }
    let open_ports: Vec<u16> = ports
        .iter()
        .zip(states)
        .filter_map(|(&port, open)| open.then_some(port))
        .collect();

    let scan_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    info!(host, address = %address, open = ?open_ports, scan_time_ms, "Port scan finished.");

    Ok(PortScanOutcome {
        host: host.to_string(),
        address,
        ports,
        open_ports,
        scan_time_ms,
    })
}

/// Spawns one task per port, each waiting for a permit before connecting.
///
/// Dropping the returned set aborts every attempt still pending, so a scan
/// cut off by its caller leaves no sockets behind.
fn spawn_attempts(
    address: IpAddr,
    ports: &[u16],
    per_attempt_timeout: Duration,
    semaphore: Arc<Semaphore>,
) -> JoinSet<(usize, bool)> {
    let mut attempts = JoinSet::new();
    for (index, &port) in ports.iter().enumerate() {
        let semaphore = semaphore.clone();
        attempts.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return (index, false);
            };
            (index, is_port_open(SocketAddr::new(address, port), per_attempt_timeout).await)
        });
    }
    attempts
}

/// A completed connect is "open"; refused, unreachable and timed out are not.
async fn is_port_open(addr: SocketAddr, per_attempt_timeout: Duration) -> bool {
    match timeout(per_attempt_timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_stream)) => {
            debug!(%addr, "Port open.");
            true
        }
        Ok(Err(e)) => {
            debug!(%addr, error = %e, "Port closed.");
            false
        }
        Err(_elapsed) => {
            debug!(%addr, "Port attempt timed out.");
            false
        }
    }
}
