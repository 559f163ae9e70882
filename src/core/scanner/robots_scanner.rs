// src/core/scanner/robots_scanner.rs

use std::time::Duration;

use reqwest::StatusCode;
use tracing::{debug, info, warn};
use url::Url;

use super::net::build_client;
use crate::core::models::{ProbeFailure, ProbePayload, ProbeResult, RobotsData, RobotsStatus, Target};

/// Path fragments that should not be advertised in a public `robots.txt`.
pub const SENSITIVE_PATHS: &[&str] = &[
    "/admin",
    "/login",
    "/config",
    "/.env",
    "/backup",
    "/private",
    "/database",
];

const SNIPPET_CHARS: usize = 500;
const TRUNCATION_MARKER: &str = "...";

/// Fetches `robots.txt` from the target's origin and looks for sensitive paths.
///
/// For `https` targets a failed attempt (error status or transport error) is
/// retried once over plain `http`. A 404 is a normal outcome and reported as
/// `not found`, even when the retry cannot connect.
pub async fn probe_robots(target: &Target, user_agent: &str, robots_timeout: Duration) -> ProbeResult {
    info!(target = %target, "Starting robots.txt scan.");

    let result = scan_robots(target, user_agent, robots_timeout).await;
    match &result {
        Ok(data) => info!(
            status = %data.status,
            risky = data.risky_paths.len(),
            "robots.txt scan finished."
        ),
        Err(e) => warn!(kind = %e.kind, error = %e.message, "robots.txt scan failed."),
    }
    result.map(ProbePayload::Robots).into()
}

async fn scan_robots(
    target: &Target,
    user_agent: &str,
    robots_timeout: Duration,
) -> Result<RobotsData, ProbeFailure> {
    let client = build_client(user_agent, robots_timeout)?;

    let mut candidates = vec![robots_url(target.url())?];
    if target.is_secure() {
        candidates.push(insecure_robots_url(target.url())?);
    }
    fetch_first_available(&client, candidates).await
}

/// Tries each candidate in order, moving on only while attempts fail with a
/// transport error or a non-2xx status.
///
/// The latest HTTP response decides the outcome. A later transport error
/// never overrides an earlier HTTP response, so a 404 stays `not found`.
async fn fetch_first_available(
    client: &reqwest::Client,
    candidates: Vec<Url>,
) -> Result<RobotsData, ProbeFailure> {
    let mut response = None;
    let mut last_error = ProbeFailure::invalid_input("No robots.txt location to fetch");

    for url in candidates {
        match fetch_robots(client, url).await {
            Ok(fetched) => {
                let succeeded = fetched.1.is_success();
                response = Some(fetched);
                if succeeded {
                    break;
                }
            }
            Err(e) => {
                debug!(kind = %e.kind, error = %e.message, "robots.txt attempt failed.");
                last_error = e;
            }
        }
    }

    match response {
        Some((url, status, body)) => interpret_response(url, status, body),
        None => Err(last_error),
    }
}

async fn fetch_robots(
    client: &reqwest::Client,
    url: Url,
) -> Result<(Url, StatusCode, Option<String>), ProbeFailure> {
    debug!(url = %url, "Fetching robots.txt.");
    let response = client.get(url.clone()).send().await?;
    let status = response.status();
    info!(url = %url, status = %status, "Received robots.txt response.");

    let body = if status == StatusCode::OK {
        Some(response.text().await?)
    } else {
        None
    };
    Ok((url, status, body))
}

fn interpret_response(
    url: Url,
    status: StatusCode,
    body: Option<String>,
) -> Result<RobotsData, ProbeFailure> {
    match (status, body) {
        (StatusCode::OK, Some(body)) => {
            let risky_paths = find_risky_paths(&body);
            Ok(RobotsData {
                status: RobotsStatus::Found,
                url: url.to_string(),
                risky_paths,
                content_snippet: Some(snippet(&body)),
            })
        }
        (StatusCode::NOT_FOUND, _) => Ok(RobotsData {
            status: RobotsStatus::NotFound,
            url: url.to_string(),
            risky_paths: Vec::new(),
            content_snippet: None,
        }),
        (status, _) => Err(ProbeFailure::protocol(format!(
            "Unexpected status {} for {}",
            status, url
        ))),
    }
}

/// `scheme://host[:port]/robots.txt` for the target's origin.
fn robots_url(url: &Url) -> Result<Url, ProbeFailure> {
    url.join("/robots.txt")
        .map_err(|e| ProbeFailure::invalid_input(format!("Cannot build robots.txt URL: {}", e)))
}

/// The plain-http fallback, on the default http port.
fn insecure_robots_url(url: &Url) -> Result<Url, ProbeFailure> {
    let mut fallback = robots_url(url)?;
    fallback
        .set_scheme("http")
        .map_err(|_| ProbeFailure::invalid_input("Cannot downgrade robots.txt URL to http"))?;
    fallback
        .set_port(None)
        .map_err(|_| ProbeFailure::invalid_input("Cannot reset robots.txt URL port"))?;
    Ok(fallback)
}

/// Sensitive paths mentioned anywhere in the (case-folded) body, in list order.
pub fn find_risky_paths(body: &str) -> Vec<String> {
    let content = body.to_lowercase();
    SENSITIVE_PATHS
        .iter()
        .filter(|path| content.contains(*path))
        .map(|path| path.to_string())
        .collect()
}

fn snippet(body: &str) -> String {
    let mut chars = body.chars();
    let head: String = chars.by_ref().take(SNIPPET_CHARS).collect();
    if chars.next().is_some() {
        format!("{}{}", head, TRUNCATION_MARKER)
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::FailureKind;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const UA: &str = "test-agent/1.0";

    fn robots_of(result: ProbeResult) -> RobotsData {
        match result {
            ProbeResult::Success(ProbePayload::Robots(data)) => data,
            other => panic!("expected robots data, got {:?}", other),
        }
    }

    async fn serve_robots(status: u16, body: &str) -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&mock_server)
            .await;
        mock_server
    }

    #[test]
    fn risky_paths_are_case_insensitive_and_ordered() {
        let body = "User-agent: *\nDisallow: /Database/\nDisallow: /ADMIN\nDisallow: /public";
        assert_eq!(find_risky_paths(body), vec!["/admin", "/database"]);
        assert!(find_risky_paths("User-agent: *\nDisallow:").is_empty());
    }

    #[test]
    fn snippet_is_truncated_with_marker() {
        let long = "a".repeat(SNIPPET_CHARS + 10);
        let cut = snippet(&long);
        assert_eq!(cut.chars().count(), SNIPPET_CHARS + TRUNCATION_MARKER.len());
        assert!(cut.ends_with(TRUNCATION_MARKER));

        let exact = "é".repeat(SNIPPET_CHARS);
        assert_eq!(snippet(&exact), exact);
    }

    #[test]
    fn fallback_url_drops_port_and_path() {
        let url = Url::parse("https://example.com:8443/some/page?q=1").unwrap();
        assert_eq!(robots_url(&url).unwrap().as_str(), "https://example.com:8443/robots.txt");
        assert_eq!(insecure_robots_url(&url).unwrap().as_str(), "http://example.com/robots.txt");
    }

    #[tokio::test]
    async fn found_with_risky_paths() {
        let mock_server = serve_robots(200, "User-agent: *\nDisallow: /admin\nDisallow: /.env\n").await;
        let target = Target::parse(&format!("{}/blog/post", mock_server.uri())).unwrap();

        let data = robots_of(probe_robots(&target, UA, Duration::from_secs(5)).await);
        assert_eq!(data.status, RobotsStatus::Found);
        assert_eq!(data.risky_paths, vec!["/admin", "/.env"]);
        assert_eq!(data.url, format!("{}/robots.txt", mock_server.uri()));
        assert!(data.content_snippet.unwrap().starts_with("User-agent"));
    }

    #[tokio::test]
    async fn missing_file_is_not_a_failure() {
        let mock_server = serve_robots(404, "").await;
        let target = Target::parse(&mock_server.uri()).unwrap();

        let data = robots_of(probe_robots(&target, UA, Duration::from_secs(5)).await);
        assert_eq!(data.status, RobotsStatus::NotFound);
        assert!(data.risky_paths.is_empty());
        assert_eq!(data.content_snippet, None);
    }

    #[tokio::test]
    async fn unexpected_status_is_a_protocol_failure() {
        let mock_server = serve_robots(500, "oops").await;
        let target = Target::parse(&mock_server.uri()).unwrap();

        let result = probe_robots(&target, UA, Duration::from_secs(5)).await;
        assert_eq!(result.failure().map(|f| f.kind), Some(FailureKind::Protocol));
    }

    #[tokio::test]
    async fn network_error_is_a_failure_unlike_404() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let target = Target::parse(&format!("http://127.0.0.1:{}", port)).unwrap();
        let result = probe_robots(&target, UA, Duration::from_secs(2)).await;
        assert_eq!(result.failure().map(|f| f.kind), Some(FailureKind::Connection));
    }

    #[tokio::test]
    async fn failed_first_location_falls_back_once() {
        let primary = serve_robots(503, "").await;
        let fallback = serve_robots(200, "User-agent: *\nAllow: /\n").await;
        let client = build_client(UA, Duration::from_secs(5)).unwrap();

        let candidates = vec![
            Url::parse(&format!("{}/robots.txt", primary.uri())).unwrap(),
            Url::parse(&format!("{}/robots.txt", fallback.uri())).unwrap(),
        ];
        let data = fetch_first_available(&client, candidates).await.unwrap();
        assert_eq!(data.status, RobotsStatus::Found);
        assert!(data.risky_paths.is_empty());
        assert_eq!(data.url, format!("{}/robots.txt", fallback.uri()));
    }

    #[tokio::test]
    async fn successful_first_location_skips_fallback() {
        let primary = serve_robots(200, "Disallow: /login").await;
        let fallback = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&fallback)
            .await;
        let client = build_client(UA, Duration::from_secs(5)).unwrap();

        let candidates = vec![
            Url::parse(&format!("{}/robots.txt", primary.uri())).unwrap(),
            Url::parse(&format!("{}/robots.txt", fallback.uri())).unwrap(),
        ];
        let data = fetch_first_available(&client, candidates).await.unwrap();
        assert_eq!(data.risky_paths, vec!["/login"]);
    }

    #[tokio::test]
    async fn missing_file_survives_unreachable_fallback() {
        let primary = serve_robots(404, "").await;
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let closed = listener.local_addr().unwrap().port();
        drop(listener);
        let client = build_client(UA, Duration::from_secs(2)).unwrap();

        let candidates = vec![
            Url::parse(&format!("{}/robots.txt", primary.uri())).unwrap(),
            Url::parse(&format!("http://127.0.0.1:{}/robots.txt", closed)).unwrap(),
        ];
        let data = fetch_first_available(&client, candidates).await.unwrap();
        assert_eq!(data.status, RobotsStatus::NotFound);
        assert_eq!(data.url, format!("{}/robots.txt", primary.uri()));
    }

    #[tokio::test]
    async fn fallback_response_overrides_primary_status() {
        let primary = serve_robots(503, "").await;
        let fallback = serve_robots(404, "").await;
        let client = build_client(UA, Duration::from_secs(5)).unwrap();

        let candidates = vec![
            Url::parse(&format!("{}/robots.txt", primary.uri())).unwrap(),
            Url::parse(&format!("{}/robots.txt", fallback.uri())).unwrap(),
        ];
        let data = fetch_first_available(&client, candidates).await.unwrap();
        assert_eq!(data.status, RobotsStatus::NotFound);
        assert_eq!(data.url, format!("{}/robots.txt", fallback.uri()));
    }
}
