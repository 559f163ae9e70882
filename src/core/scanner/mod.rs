// src/core/scanner/mod.rs

// This file acts as the public interface for the `scanner` module.
// It declares the probe modules and hosts the orchestrator that runs them.
pub mod fingerprint_scanner;
pub mod headers_scanner;
pub mod net;
pub mod port_scanner;
pub mod robots_scanner;
pub mod ssl_scanner;

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use strum::IntoEnumIterator;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::ScanConfig;
use crate::core::models::{ProbeFailure, ProbeName, ProbeResult, ScanReport, Target};
use crate::core::scoring::score;
use self::fingerprint_scanner::{probe_cms, CmsProbeOptions};
use self::headers_scanner::probe_headers;
use self::port_scanner::probe_ports;
use self::robots_scanner::probe_robots;
use self::ssl_scanner::probe_tls;

/// A network check that can be run against a target.
///
/// Implementations report every expected problem as `ProbeResult::Failure`.
/// The orchestrator still guards against panics and overruns.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn run(&self, target: &Target) -> ProbeResult;
}

struct TlsProbe {
    timeout: Duration,
}

#[async_trait]
impl Probe for TlsProbe {
    async fn run(&self, target: &Target) -> ProbeResult {
        probe_tls(target, self.timeout).await
    }
}

struct HeadersProbe {
    user_agent: String,
    timeout: Duration,
}

#[async_trait]
impl Probe for HeadersProbe {
    async fn run(&self, target: &Target) -> ProbeResult {
        probe_headers(target, &self.user_agent, self.timeout).await
    }
}

struct RobotsProbe {
    user_agent: String,
    timeout: Duration,
}

#[async_trait]
impl Probe for RobotsProbe {
    async fn run(&self, target: &Target) -> ProbeResult {
        probe_robots(target, &self.user_agent, self.timeout).await
    }
}

struct CmsProbe {
    options: CmsProbeOptions,
}

#[async_trait]
impl Probe for CmsProbe {
    async fn run(&self, target: &Target) -> ProbeResult {
        probe_cms(target, &self.options).await
    }
}

struct PortProbe {
    ports: Vec<u16>,
    timeout: Duration,
    max_concurrency: usize,
}

#[async_trait]
impl Probe for PortProbe {
    async fn run(&self, target: &Target) -> ProbeResult {
        probe_ports(&target.host(), &self.ports, self.timeout, self.max_concurrency).await
    }
}

/// Builds the adapter for a probe name from the scan configuration.
fn build_probe(name: ProbeName, config: &ScanConfig) -> Arc<dyn Probe> {
    match name {
        ProbeName::Tls => Arc::new(TlsProbe { timeout: config.tls_timeout }),
        ProbeName::Headers => Arc::new(HeadersProbe {
            user_agent: config.user_agent.clone(),
            timeout: config.http_timeout,
        }),
        ProbeName::Robots => Arc::new(RobotsProbe {
            user_agent: config.user_agent.clone(),
            timeout: config.robots_timeout,
        }),
        ProbeName::Cms => Arc::new(CmsProbe {
            options: CmsProbeOptions {
                user_agent: config.user_agent.clone(),
                page_timeout: config.http_timeout,
                path_timeout: config.cms_path_timeout,
                path_probing: config.cms_path_probing,
            },
        }),
        ProbeName::Ports => Arc::new(PortProbe {
            ports: config.ports.clone(),
            timeout: config.port_timeout,
            max_concurrency: config.max_concurrency,
        }),
    }
}

/// Runs a selection of probes against one target and scores the outcome.
pub struct Scanner {
    probes: BTreeMap<ProbeName, Arc<dyn Probe>>,
    probe_deadline: Duration,
}

impl Scanner {
    pub fn new(config: &ScanConfig) -> Self {
        let probes = ProbeName::iter()
            .map(|name| (name, build_probe(name, config)))
            .collect();
        Self {
            probes,
            probe_deadline: config.probe_deadline,
        }
    }

    /// Replaces the adapter used for `name`.
    pub fn with_probe(mut self, name: ProbeName, probe: Arc<dyn Probe>) -> Self {
        self.probes.insert(name, probe);
        self
    }

    /// Keeps the recognized probe names, dropping anything else.
    pub fn accepted_probes<I, S>(requested: I) -> BTreeSet<ProbeName>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        requested
            .into_iter()
            .filter_map(|raw| match ProbeName::from_str(raw.as_ref().trim()) {
                Ok(name) => Some(name),
                Err(_) => {
                    debug!(probe = raw.as_ref(), "Dropping unrecognized probe name.");
                    None
                }
            })
            .collect()
    }

    /// Runs the recognized subset of `requested` probe names.
    pub async fn run_scan<I, S>(&self, target: &Target, requested: I) -> ScanReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let accepted = Self::accepted_probes(requested);
        self.run_scan_with(target, &accepted).await
    }

    /// Runs each probe as an independent task and collects every outcome.
    ///
    /// A probe that panics or overruns the deadline only loses its own slot;
    /// the report always has exactly one entry per requested probe.
    pub async fn run_scan_with(&self, target: &Target, probes: &BTreeSet<ProbeName>) -> ScanReport {
        info!(target = %target, probes = ?probes, "Starting scan.");

        let handles: Vec<_> = probes
            .iter()
            .filter_map(|name| self.probes.get(name).map(|probe| (*name, probe.clone())))
            .map(|(name, probe)| {
                let target = target.clone();
                let deadline = self.probe_deadline;
                let handle = tokio::spawn(async move { timeout(deadline, probe.run(&target)).await });
                (name, handle)
            })
            .collect();

        let mut results = BTreeMap::new();
        for (name, handle) in handles {
            let result = match handle.await {
                Ok(Ok(result)) => result,
                Ok(Err(_elapsed)) => {
                    warn!(probe = %name, deadline = ?self.probe_deadline, "Probe exceeded its deadline.");
                    ProbeResult::Failure(ProbeFailure::timeout(format!(
                        "Probe '{}' did not finish within {:?}",
                        name, self.probe_deadline
                    )))
                }
                Err(e) if e.is_panic() => {
                    let message = panic_message(e.into_panic());
                    error!(probe = %name, panic = %message, "Probe panicked.");
                    ProbeResult::Failure(ProbeFailure::unknown(format!(
                        "Probe '{}' failed unexpectedly: {}",
                        name, message
                    )))
                }
                Err(e) => {
                    error!(probe = %name, error = %e, "Probe task was cancelled.");
                    ProbeResult::Failure(ProbeFailure::unknown(format!(
                        "Probe '{}' was cancelled: {}",
                        name, e
                    )))
                }
            };
            results.insert(name, result);
        }

        let score = score(&results);
        info!(score, failures = results.values().filter(|r| !r.is_success()).count(), "Scan finished.");

        ScanReport {
            target: target.clone(),
            results,
            score,
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
