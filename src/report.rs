// src/report.rs

use std::fmt::Write;

use crossterm::style::{style, Color, Stylize};

use crate::core::models::{ProbeName, ProbePayload, ProbeResult, ScanReport, TlsStatus};
use crate::core::scoring::{rating, Rating, RISKY_PORTS};

/// Renders a `ScanReport` as human-readable text, one section per probe.
///
/// With `colored` set, statuses are wrapped in ANSI colors for terminals.
pub fn render_report(report: &ScanReport, colored: bool) -> String {
    let paint = |text: &str, color: Color| -> String {
        if colored {
            style(text).with(color).to_string()
        } else {
            text.to_string()
        }
    };

    let mut out = String::new();
    let _ = writeln!(out, "Target: {}", report.target);

    let grade = rating(report.score);
    let grade_color = match grade {
        Rating::Excellent => Color::Green,
        Rating::Good => Color::Cyan,
        Rating::Fair => Color::Yellow,
        Rating::Poor => Color::Red,
    };
    let _ = writeln!(
        out,
        "Overall Score: {}",
        paint(&format!("{}/100 ({})", report.score, grade), grade_color)
    );

    if report.results.is_empty() {
        let _ = writeln!(out, "\nNo recognized probes were requested.");
        return out;
    }

    for (name, result) in &report.results {
        let _ = writeln!(out, "\n[{}] {}", name, section_title(*name));
        match result {
            ProbeResult::Failure(failure) => {
                let _ = writeln!(out, "  {} ({}) {}", paint("✗ failed", Color::Red), failure.kind, failure.message);
            }
            ProbeResult::Success(payload) => render_payload(&mut out, payload, &paint),
        }
    }
    out
}

fn section_title(name: ProbeName) -> &'static str {
    match name {
        ProbeName::Tls => "SSL/TLS Certificate",
        ProbeName::Headers => "HTTP Security Headers",
        ProbeName::Robots => "robots.txt Exposure",
        ProbeName::Cms => "CMS Fingerprint",
        ProbeName::Ports => "Open Ports",
    }
}

fn render_payload(out: &mut String, payload: &ProbePayload, paint: &dyn Fn(&str, Color) -> String) {
    match payload {
        ProbePayload::Tls(tls) => {
            let color = match tls.status {
                TlsStatus::Secure => Color::Green,
                TlsStatus::Warning => Color::Yellow,
                TlsStatus::Expired => Color::Red,
            };
            let _ = writeln!(out, "  Status: {}", paint(&tls.status.to_string(), color));
            let _ = writeln!(out, "  Issuer: {}", tls.issuer);
            let _ = writeln!(out, "  Expires: {} ({} days)", tls.expires, tls.days_to_expire);
        }
        ProbePayload::Headers(headers) => {
            for (name, value) in headers.entries() {
                match value {
                    Some(v) => {
                        let _ = writeln!(out, "  {} {}: {}", paint("✓", Color::Green), name, v);
                    }
                    None => {
                        let _ = writeln!(out, "  {} {}: missing", paint("✗", Color::Red), name);
                    }
                }
            }
        }
        ProbePayload::Robots(robots) => {
            let _ = writeln!(out, "  Status: {} ({})", robots.status, robots.url);
            if robots.risky_paths.is_empty() {
                let _ = writeln!(out, "  Sensitive paths: none");
            } else {
                let _ = writeln!(
                    out,
                    "  Sensitive paths: {}",
                    paint(&robots.risky_paths.join(", "), Color::Yellow)
                );
            }
        }
        ProbePayload::Cms(cms) => {
            let _ = writeln!(out, "  Detected: {} (by {})", cms.name, cms.detected_by);
        }
        ProbePayload::Ports(ports) => {
            let _ = writeln!(out, "  Host: {} ({})", ports.host, ports.address);
            if ports.open_ports.is_empty() {
                let _ = writeln!(out, "  Open: none of {} ports", ports.ports.len());
            } else {
                let listed: Vec<String> = ports
                    .open_ports
                    .iter()
                    .map(|p| {
                        if RISKY_PORTS.contains(p) {
                            paint(&p.to_string(), Color::Red)
                        } else {
                            p.to_string()
                        }
                    })
                    .collect();
                let _ = writeln!(out, "  Open: {}", listed.join(", "));
            }
            let _ = writeln!(out, "  Scan time: {} ms", ports.scan_time_ms);
        }
    }
}
