// src/core/scanner/headers_scanner.rs

use std::time::Duration;

use tracing::{debug, info, warn};
use crate::core::models::{ProbeFailure, ProbePayload, ProbeResult, SecurityHeaders, Target};
use super::net::build_client;
use reqwest::header::HeaderMap;

/// Reads a single header from a `HeaderMap`.
///
/// Returns `Some(value)` if the header is present and `None` otherwise. Values
/// that are not valid UTF-8 still count as present and are reported with a
/// placeholder.
fn check_header(headers: &HeaderMap, name: &str) -> Option<String> {
    debug!(header_name = name, "Checking for header.");
    match headers.get(name).map(|value| value.to_str()) {
        Some(Ok(s)) => {
            debug!(header_name = name, value = s, "Header found.");
            Some(s.to_string())
        }
        Some(Err(_)) => {
            warn!(header_name = name, "Header found but contained invalid UTF-8.");
            Some("[Invalid UTF-8]".to_string())
        }
        None => {
            debug!(header_name = name, "Header not found.");
            None
        }
    }
}

/// Collects the four tracked security headers from a response header map.
pub fn collect_security_headers(headers: &HeaderMap) -> SecurityHeaders {
    SecurityHeaders {
        x_frame_options: check_header(headers, "x-frame-options"),
        content_security_policy: check_header(headers, "content-security-policy"),
        strict_transport_security: check_header(headers, "strict-transport-security"),
        referrer_policy: check_header(headers, "referrer-policy"),
    }
}

/// Fetches the target once and reports which security headers it sends.
///
/// An HTTP error status (4xx/5xx) fails the probe rather than being reported
/// as "no headers".
pub async fn probe_headers(target: &Target, user_agent: &str, http_timeout: Duration) -> ProbeResult {
    info!(target = %target, "Starting headers scan.");

    let result = fetch_headers(target, user_agent, http_timeout).await;
    match &result {
        Ok(headers) => info!(present = headers.present_count(), "Headers scan finished."),
        Err(e) => warn!(kind = %e.kind, error = %e.message, "Headers scan failed."),
    }
    result.map(ProbePayload::Headers).into()
}

async fn fetch_headers(
    target: &Target,
    user_agent: &str,
    http_timeout: Duration,
) -> Result<SecurityHeaders, ProbeFailure> {
    let client = build_client(user_agent, http_timeout)?;
    let response = client.get(target.url().clone()).send().await?;
    info!(status = %response.status(), "Received HTTP response for headers scan.");

    let response = response.error_for_status()?;
    Ok(collect_security_headers(response.headers()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::FailureKind;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const UA: &str = "test-agent/1.0";

    fn headers_of(result: ProbeResult) -> SecurityHeaders {
        match result {
            ProbeResult::Success(ProbePayload::Headers(headers)) => headers,
            other => panic!("expected headers, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn reports_present_and_absent_headers() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .and(header("user-agent", UA))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-Frame-Options", "DENY")
                    .insert_header("Referrer-Policy", "no-referrer"),
            )
            .mount(&mock_server)
            .await;

        let target = Target::parse(&mock_server.uri()).unwrap();
        let headers = headers_of(probe_headers(&target, UA, Duration::from_secs(5)).await);

        assert_eq!(headers.x_frame_options.as_deref(), Some("DENY"));
        assert_eq!(headers.referrer_policy.as_deref(), Some("no-referrer"));
        assert_eq!(headers.content_security_policy, None);
        assert_eq!(headers.strict_transport_security, None);
        assert_eq!(headers.present_count(), 2);
    }

    #[tokio::test]
    async fn error_status_fails_the_probe() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).insert_header("X-Frame-Options", "DENY"))
            .mount(&mock_server)
            .await;

        let target = Target::parse(&mock_server.uri()).unwrap();
        let result = probe_headers(&target, UA, Duration::from_secs(5)).await;
        assert_eq!(result.failure().map(|f| f.kind), Some(FailureKind::Protocol));
    }

    #[tokio::test]
    async fn slow_server_times_out() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&mock_server)
            .await;

        let target = Target::parse(&mock_server.uri()).unwrap();
        let result = probe_headers(&target, UA, Duration::from_millis(200)).await;
        assert_eq!(result.failure().map(|f| f.kind), Some(FailureKind::Timeout));
    }
}
