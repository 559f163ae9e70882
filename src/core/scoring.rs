//! Folds per-probe outcomes into a single 0–100 security score.
//!
//! Each signal is evaluated on its own and contributes a fixed number of
//! points. A probe that was not requested, or that failed, contributes nothing:
//! failures cost the opportunity for points and are never penalized further.

use std::collections::BTreeMap;
use std::fmt;

use crate::core::models::{
    CmsName, ProbeName, ProbePayload, ProbeResult, RobotsStatus, TlsData, TlsStatus,
};

pub const MAX_SCORE: u8 = 100;

const TLS_TRUSTED_POINTS: u32 = 20;
const TLS_SELF_SIGNED_POINTS: u32 = 10;
const HEADER_POINTS: u32 = 5;
const CMS_POINTS: u32 = 10;
const ROBOTS_POINTS: u32 = 10;
const PORTS_POINTS: u32 = 20;

/// Ports whose exposure indicates legacy or administrative services.
pub const RISKY_PORTS: &[u16] = &[21, 22, 23, 3306];

/// Computes the score for a set of probe results. Pure; no I/O.
pub fn score(results: &BTreeMap<ProbeName, ProbeResult>) -> u8 {
    let total: u32 = results
        .values()
        .filter_map(ProbeResult::payload)
        .map(signal_points)
        .sum();
    total.min(u32::from(MAX_SCORE)) as u8
}

fn signal_points(payload: &ProbePayload) -> u32 {
    match payload {
        ProbePayload::Tls(tls) => tls_points(tls),
        ProbePayload::Headers(headers) => headers.present_count() as u32 * HEADER_POINTS,
        ProbePayload::Cms(cms) if cms.name != CmsName::Unknown => CMS_POINTS,
        ProbePayload::Cms(_) => 0,
        ProbePayload::Robots(robots)
            if robots.status == RobotsStatus::Found && robots.risky_paths.is_empty() =>
        {
            ROBOTS_POINTS
        }
        ProbePayload::Robots(_) => 0,
        ProbePayload::Ports(ports) if !ports.open_ports.iter().any(|p| RISKY_PORTS.contains(p)) => {
            PORTS_POINTS
        }
        ProbePayload::Ports(_) => 0,
    }
}

fn tls_points(tls: &TlsData) -> u32 {
    if tls.status != TlsStatus::Secure {
        return 0;
    }
    if looks_self_signed(&tls.issuer) {
        TLS_SELF_SIGNED_POINTS
    } else {
        TLS_TRUSTED_POINTS
    }
}

/// Substring heuristic: an issuer mentioning "self", or no issuer name at all.
fn looks_self_signed(issuer: &str) -> bool {
    let issuer = issuer.trim().to_lowercase();
    issuer.is_empty() || issuer == "unknown" || issuer.contains("self")
}

/// Coarse rating used when presenting a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rating {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rating::Excellent => write!(f, "Excellent"),
            Rating::Good => write!(f, "Good"),
            Rating::Fair => write!(f, "Fair"),
            Rating::Poor => write!(f, "Poor"),
        }
    }
}

pub fn rating(score: u8) -> Rating {
    match score {
        80.. => Rating::Excellent,
        60..=79 => Rating::Good,
        40..=59 => Rating::Fair,
        _ => Rating::Poor,
    }
}
