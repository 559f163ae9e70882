// src/core/scanner/ssl_scanner.rs

use tracing::{debug, error, info, warn};

use super::net::resolve_host;
use crate::core::models::{ProbeFailure, ProbePayload, ProbeResult, Target, TlsData, TlsStatus};
use chrono::{DateTime, Utc};
use native_tls::TlsConnector;
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;
use tokio::task::spawn_blocking;
use tokio::time::timeout;
use x509_parser::prelude::*;

const DEFAULT_TLS_PORT: u16 = 443;
/// Certificates expiring within this many days are reported as `warning`.
const EXPIRY_WARNING_DAYS: i64 = 30;
const UNKNOWN_ISSUER: &str = "unknown";

/// Handshakes with the target and reports on its leaf certificate.
///
/// The connection uses the platform trust store and the target host as SNI.
/// Any explicit port on the target is honored, otherwise 443.
pub async fn probe_tls(target: &Target, tls_timeout: Duration) -> ProbeResult {
    let host = target.host();
    let port = target.port().unwrap_or(DEFAULT_TLS_PORT);
    info!(host = %host, port, "Starting TLS scan.");

    let result = scan_tls(host, port, tls_timeout).await;
    match &result {
        Ok(data) => info!(status = %data.status, days_to_expire = data.days_to_expire, "TLS scan finished."),
        Err(e) => warn!(kind = %e.kind, error = %e.message, "TLS scan failed."),
    }
    result.map(ProbePayload::Tls).into()
}

async fn scan_tls(host: String, port: u16, tls_timeout: Duration) -> Result<TlsData, ProbeFailure> {
    let address = resolve_host(&host).await?;
    let socket_addr = SocketAddr::new(address, port);

    debug!("Spawning blocking task for TLS connection.");
    let handshake = spawn_blocking(move || perform_tls_scan(&host, socket_addr, tls_timeout));

    // The socket timeouts bound each read and write; this bounds the whole exchange.
    match timeout(tls_timeout * 2, handshake).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            error!(panic = %e, "Blocking TLS scan task panicked!");
            Err(ProbeFailure::unknown(format!("Task panicked: {}", e)))
        }
        Err(_) => Err(ProbeFailure::timeout(format!(
            "TLS handshake with {} did not complete in time",
            socket_addr
        ))),
    }
}

fn perform_tls_scan(host: &str, addr: SocketAddr, tls_timeout: Duration) -> Result<TlsData, ProbeFailure> {
    let connector = TlsConnector::new().map_err(|e| {
        error!(error = %e, "Failed to create TlsConnector");
        ProbeFailure::unknown(format!("TlsConnector Error: {}", e))
    })?;

    debug!(%addr, "Connecting TCP stream.");
    let stream = TcpStream::connect_timeout(&addr, tls_timeout).map_err(|e| {
        debug!(error = %e, "TCP connection failed");
        ProbeFailure::from(e)
    })?;
    stream.set_read_timeout(Some(tls_timeout))?;
    stream.set_write_timeout(Some(tls_timeout))?;

    debug!(host, "Performing TLS handshake.");
    let stream = connector.connect(host, stream).map_err(|e| {
        debug!(error = %e, "TLS handshake failed");
        ProbeFailure::protocol(format!("TLS Handshake Error: {}", e))
    })?;

    let cert = match stream.peer_certificate() {
        Ok(Some(c)) => c,
        Ok(None) => return Err(ProbeFailure::protocol("Server did not provide a certificate")),
        Err(e) => return Err(ProbeFailure::protocol(format!("Could not get peer certificate: {}", e))),
    };

    let cert_der = cert
        .to_der()
        .map_err(|e| ProbeFailure::protocol(format!("Could not convert certificate to DER: {}", e)))?;

    certificate_facts(&cert_der, Utc::now())
}

/// Extracts the reported facts from a DER-encoded leaf certificate.
fn certificate_facts(cert_der: &[u8], now: DateTime<Utc>) -> Result<TlsData, ProbeFailure> {
    let (_, x509) = parse_x509_certificate(cert_der)
        .map_err(|e| ProbeFailure::protocol(format!("X.509 Parse Error: {}", e)))?;

    info!(subject = %x509.subject(), issuer = %x509.issuer(), "Successfully parsed certificate.");

    let not_after = asn1_time_to_chrono_utc(&x509.validity().not_after);
    let days_to_expire = not_after.signed_duration_since(now).num_days();

    Ok(TlsData {
        status: classify_expiry(days_to_expire),
        issuer: issuer_common_name(&x509),
        subject: x509.subject().to_string(),
        expires: not_after.format("%Y-%m-%d").to_string(),
        days_to_expire,
    })
}

fn issuer_common_name(x509: &X509Certificate<'_>) -> String {
    x509.issuer()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(str::to_string)
        .filter(|cn| !cn.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_ISSUER.to_string())
}

fn asn1_time_to_chrono_utc(time: &ASN1Time) -> DateTime<Utc> {
    DateTime::from_timestamp(time.timestamp(), 0).unwrap_or_default()
}

/// Maps days until expiry onto the reported status tier.
pub fn classify_expiry(days_to_expire: i64) -> TlsStatus {
    if days_to_expire > EXPIRY_WARNING_DAYS {
        TlsStatus::Secure
    } else if days_to_expire >= 0 {
        TlsStatus::Warning
    } else {
        TlsStatus::Expired
    }
}
