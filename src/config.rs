// src/config.rs

use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::logging::PROJECT_NAME;

/// Ports probed when the caller does not supply a list.
pub const DEFAULT_PORTS: &[u16] = &[21, 22, 23, 25, 53, 80, 110, 143, 443, 3306, 8080];

pub const DEFAULT_USER_AGENT: &str = "SentinelRS/0.1 (+security-posture-scanner)";

/// Tunables for a scan. Every network operation gets its own bound from here.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Timeout of a single TCP connect attempt in the port prober.
    pub port_timeout: Duration,
    /// Upper bound on simultaneously open sockets in the port prober.
    pub max_concurrency: usize,
    pub ports: Vec<u16>,
    /// Timeout for the header and CMS page fetches.
    pub http_timeout: Duration,
    pub robots_timeout: Duration,
    /// Timeout for each well-known CMS path request.
    pub cms_path_timeout: Duration,
    pub tls_timeout: Duration,
    /// Overall budget for one probe, enforced by the orchestrator.
    pub probe_deadline: Duration,
    pub cms_path_probing: bool,
    pub user_agent: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            port_timeout: Duration::from_secs(1),
            max_concurrency: 20,
            ports: DEFAULT_PORTS.to_vec(),
            http_timeout: Duration::from_secs(7),
            robots_timeout: Duration::from_secs(5),
            cms_path_timeout: Duration::from_secs(5),
            tls_timeout: Duration::from_secs(5),
            probe_deadline: Duration::from_secs(30),
            cms_path_probing: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ScanConfig {
    /// Defaults overridden by `<PROJECT>_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let var = |suffix: &str| {
            let key = format!("{}_{}", PROJECT_NAME.as_str(), suffix);
            lookup(&key).map(|value| (key, value))
        };

        if let Some(ms) = var("PORT_TIMEOUT_MS").and_then(|(k, v)| parse_or_warn::<u64>(&k, &v)) {
            config.port_timeout = Duration::from_millis(ms);
        }
        if let Some(n) = var("MAX_CONCURRENCY").and_then(|(k, v)| parse_or_warn::<usize>(&k, &v)) {
            config.max_concurrency = n;
        }
        if let Some((key, value)) = var("PORTS") {
            match parse_port_list(&value) {
                Ok(ports) => config.ports = ports,
                Err(e) => warn!(key = %key, value = %value, error = %e, "Ignoring malformed port list."),
            }
        }
        if let Some(secs) = var("HTTP_TIMEOUT_SECS").and_then(|(k, v)| parse_or_warn::<u64>(&k, &v)) {
            config.http_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = var("PROBE_DEADLINE_SECS").and_then(|(k, v)| parse_or_warn::<u64>(&k, &v)) {
            config.probe_deadline = Duration::from_secs(secs);
        }
        if let Some(flag) = var("CMS_PATH_PROBING").and_then(|(k, v)| parse_or_warn::<bool>(&k, &v)) {
            config.cms_path_probing = flag;
        }
        config
    }
}

fn parse_or_warn<T: FromStr>(key: &str, value: &str) -> Option<T> {
    match value.trim().parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!(key, value, "Ignoring malformed configuration value.");
            None
        }
    }
}

/// Parses `"22,80, 443"` into a port list.
fn parse_port_list(raw: &str) -> Result<Vec<u16>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<u16>().map_err(|e| format!("invalid port '{}': {}", s, e)))
        .collect()
}
