// src/core/models.rs

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use url::Url;

pub use crate::core::error::{FailureKind, ProbeFailure};

// --- Target ---

/// A validated absolute `http`/`https` URL with a host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Target(Url);

impl Target {
    /// Parses an already-normalized URL. Only `http` and `https` URLs with a
    /// host are accepted.
    pub fn parse(raw: &str) -> Result<Self, ProbeFailure> {
        let url = Url::parse(raw)
            .map_err(|e| ProbeFailure::invalid_input(format!("Invalid URL '{}': {}", raw, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ProbeFailure::invalid_input(format!(
                "Unsupported scheme '{}', expected http or https",
                url.scheme()
            )));
        }
        match url.host_str() {
            Some(host) if !host.is_empty() => Ok(Self(url)),
            _ => Err(ProbeFailure::invalid_input(format!("URL '{}' has no host", raw))),
        }
    }

    /// Trims user input and defaults to `https://` when no scheme was given.
    pub fn normalize(raw: &str) -> Result<Self, ProbeFailure> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ProbeFailure::invalid_input("Empty target"));
        }
        if has_scheme(trimmed) {
            Self::parse(trimmed)
        } else {
            Self::parse(&format!("https://{}", trimmed))
        }
    }

    pub fn url(&self) -> &Url {
        &self.0
    }

    pub fn is_secure(&self) -> bool {
        self.0.scheme() == "https"
    }

    /// The host without IPv6 brackets, suitable for sockets and SNI.
    pub fn host(&self) -> String {
        match self.0.host() {
            Some(url::Host::Ipv6(addr)) => addr.to_string(),
            Some(host) => host.to_string(),
            None => String::new(),
        }
    }

    /// The explicitly given port, if any.
    pub fn port(&self) -> Option<u16> {
        self.0.port()
    }
}

/// True when `raw` starts with `<scheme>://`. A `://` further along, say in a
/// query string, does not count.
fn has_scheme(raw: &str) -> bool {
    let Some((scheme, rest)) = raw.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid && rest.starts_with("//")
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl TryFrom<String> for Target {
    type Error = ProbeFailure;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Target> for String {
    fn from(target: Target) -> Self {
        target.0.into()
    }
}

// --- Probe identifiers ---

/// The closed set of probes the scanner knows how to run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum ProbeName {
    #[strum(to_string = "tls", serialize = "ssl")]
    Tls,
    #[strum(to_string = "headers")]
    Headers,
    #[strum(to_string = "robots")]
    Robots,
    #[strum(to_string = "cms")]
    Cms,
    #[strum(to_string = "ports")]
    Ports,
}

// --- Probe outcomes ---

/// The outcome of a single probe: a payload or a classified failure, never both.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ProbeResult {
    Success(ProbePayload),
    Failure(ProbeFailure),
}

impl ProbeResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ProbeResult::Success(_))
    }

    pub fn payload(&self) -> Option<&ProbePayload> {
        match self {
            ProbeResult::Success(payload) => Some(payload),
            ProbeResult::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&ProbeFailure> {
        match self {
            ProbeResult::Success(_) => None,
            ProbeResult::Failure(failure) => Some(failure),
        }
    }
}

impl From<Result<ProbePayload, ProbeFailure>> for ProbeResult {
    fn from(result: Result<ProbePayload, ProbeFailure>) -> Self {
        match result {
            Ok(payload) => ProbeResult::Success(payload),
            Err(failure) => ProbeResult::Failure(failure),
        }
    }
}

/// Probe-specific success data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ProbePayload {
    Tls(TlsData),
    Headers(SecurityHeaders),
    Robots(RobotsData),
    Cms(CmsData),
    Ports(PortScanOutcome),
}

// --- TLS ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TlsStatus {
    Secure,
    Warning,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TlsData {
    pub status: TlsStatus,
    pub issuer: String,
    pub subject: String,
    /// Expiry date formatted as `YYYY-MM-DD`.
    pub expires: String,
    pub days_to_expire: i64,
}

// --- Headers ---

/// The four tracked security headers. `None` means the header was absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecurityHeaders {
    #[serde(rename = "X-Frame-Options")]
    pub x_frame_options: Option<String>,
    #[serde(rename = "Content-Security-Policy")]
    pub content_security_policy: Option<String>,
    #[serde(rename = "Strict-Transport-Security")]
    pub strict_transport_security: Option<String>,
    #[serde(rename = "Referrer-Policy")]
    pub referrer_policy: Option<String>,
}

impl SecurityHeaders {
    pub const TRACKED: [&'static str; 4] = [
        "X-Frame-Options",
        "Content-Security-Policy",
        "Strict-Transport-Security",
        "Referrer-Policy",
    ];

    /// Header name and value pairs in tracking order.
    pub fn entries(&self) -> [(&'static str, Option<&str>); 4] {
        [
            (Self::TRACKED[0], self.x_frame_options.as_deref()),
            (Self::TRACKED[1], self.content_security_policy.as_deref()),
            (Self::TRACKED[2], self.strict_transport_security.as_deref()),
            (Self::TRACKED[3], self.referrer_policy.as_deref()),
        ]
    }

    /// Number of tracked headers present with a non-empty value.
    pub fn present_count(&self) -> usize {
        self.entries()
            .iter()
            .filter(|(_, value)| value.is_some_and(|v| !v.trim().is_empty()))
            .count()
    }
}

// --- Robots ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
pub enum RobotsStatus {
    #[serde(rename = "found")]
    #[strum(to_string = "found")]
    Found,
    #[serde(rename = "not found")]
    #[strum(to_string = "not found")]
    NotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RobotsData {
    pub status: RobotsStatus,
    /// The URL that produced this outcome (after any scheme fallback).
    pub url: String,
    pub risky_paths: Vec<String>,
    pub content_snippet: Option<String>,
}

// --- CMS ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
pub enum CmsName {
    WordPress,
    Joomla,
    Drupal,
    Unknown,
}

/// Which stage of the fingerprinting identified the CMS.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DetectionSource {
    Body,
    Header,
    Path,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CmsData {
    pub name: CmsName,
    pub detected_by: DetectionSource,
}

// --- Ports ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PortScanOutcome {
    pub host: String,
    pub address: IpAddr,
    /// Every port attempted, in input order.
    pub ports: Vec<u16>,
    /// The reachable subset of `ports`, in input order.
    pub open_ports: Vec<u16>,
    pub scan_time_ms: u64,
}

// --- Main Report ---

/// Per-probe outcomes for one target plus the aggregated score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub target: Target,
    pub results: BTreeMap<ProbeName, ProbeResult>,
    pub score: u8,
}
