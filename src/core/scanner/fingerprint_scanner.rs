// src/core/scanner/fingerprint_scanner.rs

use std::time::Duration;

use tracing::{debug, info, warn};
use crate::core::models::{CmsData, CmsName, DetectionSource, ProbeFailure, ProbePayload, ProbeResult, Target};
use super::net::build_client;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use scraper::{Html, Selector};
use regex::Regex;
use once_cell::sync::Lazy;

/// Defines the different places a CMS marker can be looked for.
enum Check<'a> {
    /// Check for a pattern anywhere in the HTML body.
    Body(&'a Lazy<Regex>),
    /// Check for a pattern in the `content` of `<meta name="generator">`.
    Generator(&'a Lazy<Regex>),
    /// Check for a pattern in a specific HTTP header.
    Header(&'a str, &'a Lazy<Regex>),
}

/// A rule that identifies a CMS from the landing page.
struct CmsRule<'a> {
    cms: CmsName,
    check: Check<'a>,
}

static RE_WP_PATHS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)wp-content|wp-includes").unwrap());
static RE_WORDPRESS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)wordpress").unwrap());
static RE_JOOMLA: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)joomla").unwrap());
static RE_DRUPAL_BODY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)drupal|sites/default").unwrap());
static RE_DRUPAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)drupal").unwrap());

/// Page rules in evaluation order: every body rule comes before any header rule.
static RULES: &[CmsRule] = &[
    CmsRule { cms: CmsName::WordPress, check: Check::Body(&RE_WP_PATHS) },
    CmsRule { cms: CmsName::WordPress, check: Check::Generator(&RE_WORDPRESS) },
    CmsRule { cms: CmsName::Joomla, check: Check::Body(&RE_JOOMLA) },
    CmsRule { cms: CmsName::Drupal, check: Check::Body(&RE_DRUPAL_BODY) },
    CmsRule { cms: CmsName::WordPress, check: Check::Header("x-powered-by", &RE_WORDPRESS) },
    CmsRule { cms: CmsName::Joomla, check: Check::Header("x-powered-by", &RE_JOOMLA) },
    CmsRule { cms: CmsName::Drupal, check: Check::Header("x-powered-by", &RE_DRUPAL) },
    CmsRule { cms: CmsName::WordPress, check: Check::Header("server", &RE_WORDPRESS) },
    CmsRule { cms: CmsName::Joomla, check: Check::Header("server", &RE_JOOMLA) },
    CmsRule { cms: CmsName::Drupal, check: Check::Header("server", &RE_DRUPAL) },
];

/// Admin and login locations probed when the page itself gives nothing away.
static WELL_KNOWN_PATHS: &[(CmsName, &[&str])] = &[
    (CmsName::WordPress, &["/wp-login.php", "/wp-admin/"]),
    (CmsName::Joomla, &["/administrator/", "/index.php?option=com_"]),
    (CmsName::Drupal, &["/user/login", "/node/"]),
];

/// Settings for the CMS probe.
#[derive(Debug, Clone)]
pub struct CmsProbeOptions {
    pub user_agent: String,
    pub page_timeout: Duration,
    pub path_timeout: Duration,
    pub path_probing: bool,
}

/// Identifies the CMS behind the target.
///
/// Markers are looked for in the page body first, then in the `X-Powered-By`
/// and `Server` headers, then (optionally) by requesting well-known admin
/// paths. Only a failure to fetch the page fails the probe; nothing matching
/// is reported as `Unknown`.
pub async fn probe_cms(target: &Target, options: &CmsProbeOptions) -> ProbeResult {
    info!(target = %target, "Starting CMS fingerprint scan.");

    let result = fingerprint(target, options).await;
    match &result {
        Ok(data) => info!(cms = %data.name, detected_by = %data.detected_by, "CMS fingerprint scan finished."),
        Err(e) => warn!(kind = %e.kind, error = %e.message, "CMS fingerprint scan failed."),
    }
    result.map(ProbePayload::Cms).into()
}

async fn fingerprint(target: &Target, options: &CmsProbeOptions) -> Result<CmsData, ProbeFailure> {
    let client = build_client(&options.user_agent, options.page_timeout)?;
    let response = client.get(target.url().clone()).send().await?;
    info!(status = %response.status(), "Received HTTP response.");

    let headers = response.headers().clone();
    let body = response.text().await?;
    debug!(bytes = %body.len(), "Successfully read response body.");

    if let Some(found) = match_page(&body, &headers) {
        return Ok(found);
    }

    if options.path_probing {
        if let Some(cms) = probe_well_known_paths(target, options).await {
            return Ok(CmsData { name: cms, detected_by: DetectionSource::Path });
        }
    }

    Ok(CmsData { name: CmsName::Unknown, detected_by: DetectionSource::None })
}

/// Applies the page rules in order and returns the first match.
fn match_page(body: &str, headers: &HeaderMap) -> Option<CmsData> {
    let document = Html::parse_document(body);
    debug!(total_rules = %RULES.len(), "Applying CMS rules.");

    RULES.iter().find_map(|rule| {
        let (matched, source) = match &rule.check {
            Check::Body(re) => (re.is_match(body), DetectionSource::Body),
            Check::Generator(re) => (check_generator(&document, re), DetectionSource::Body),
            Check::Header(name, re) => (
                headers
                    .get(*name)
                    .and_then(|v| v.to_str().ok())
                    .is_some_and(|v| re.is_match(v)),
                DetectionSource::Header,
            ),
        };
        matched.then(|| {
            debug!(cms = %rule.cms, source = %source, "Rule matched.");
            CmsData { name: rule.cms, detected_by: source }
        })
    })
}

fn check_generator(doc: &Html, re: &Regex) -> bool {
    match Selector::parse("meta[name='generator']") {
        Ok(selector) => doc
            .select(&selector)
            .filter_map(|el| el.value().attr("content"))
            .any(|content| re.is_match(content)),
        Err(_) => false,
    }
}

/// Requests each well-known path in order; the first 200 identifies the CMS.
/// Errors here are swallowed and simply do not count as a match.
async fn probe_well_known_paths(target: &Target, options: &CmsProbeOptions) -> Option<CmsName> {
    let client = match build_client(&options.user_agent, options.path_timeout) {
        Ok(c) => c,
        Err(_) => return None,
    };

    for (cms, paths) in WELL_KNOWN_PATHS {
        for path in paths.iter() {
            let Ok(url) = target.url().join(path) else {
                continue;
            };
            match client.get(url.clone()).send().await {
                Ok(res) if res.status() == StatusCode::OK => {
                    debug!(cms = %cms, url = %url, "Well-known path answered 200.");
                    return Some(*cms);
                }
                Ok(res) => debug!(url = %url, status = %res.status(), "Well-known path not present."),
                Err(e) => debug!(url = %url, error = %e, "Well-known path request failed."),
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::FailureKind;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn options(path_probing: bool) -> CmsProbeOptions {
        CmsProbeOptions {
            user_agent: "test-agent/1.0".to_string(),
            page_timeout: Duration::from_secs(5),
            path_timeout: Duration::from_secs(2),
            path_probing,
        }
    }

    fn cms_of(result: ProbeResult) -> CmsData {
        match result {
            ProbeResult::Success(ProbePayload::Cms(data)) => data,
            other => panic!("expected CMS data, got {:?}", other),
        }
    }

    async fn serve_page(template: ResponseTemplate) -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(template)
            .mount(&mock_server)
            .await;
        mock_server
    }

    #[tokio::test]
    async fn body_marker_identifies_wordpress() {
        let page = r#"<html><link rel="stylesheet" href="/wp-content/themes/x/style.css"></html>"#;
        let mock_server = serve_page(ResponseTemplate::new(200).set_body_string(page)).await;
        let target = Target::parse(&mock_server.uri()).unwrap();

        let data = cms_of(probe_cms(&target, &options(true)).await);
        assert_eq!(data.name, CmsName::WordPress);
        assert_eq!(data.detected_by, DetectionSource::Body);
    }

    #[tokio::test]
    async fn generator_meta_identifies_wordpress() {
        let page = r#"<html><head><meta name="generator" content="WordPress 6.4.2"></head></html>"#;
        let mock_server = serve_page(ResponseTemplate::new(200).set_body_string(page)).await;
        let target = Target::parse(&mock_server.uri()).unwrap();

        let data = cms_of(probe_cms(&target, &options(false)).await);
        assert_eq!(data.name, CmsName::WordPress);
    }

    #[tokio::test]
    async fn body_is_checked_before_headers() {
        let template = ResponseTemplate::new(200)
            .insert_header("X-Powered-By", "WordPress")
            .set_body_string("<p>Powered by Joomla!</p>");
        let mock_server = serve_page(template).await;
        let target = Target::parse(&mock_server.uri()).unwrap();

        let data = cms_of(probe_cms(&target, &options(false)).await);
        assert_eq!(data.name, CmsName::Joomla);
        assert_eq!(data.detected_by, DetectionSource::Body);
    }

    #[tokio::test]
    async fn header_identifies_drupal() {
        let template = ResponseTemplate::new(200)
            .insert_header("X-Powered-By", "Drupal 10")
            .set_body_string("<p>hello</p>");
        let mock_server = serve_page(template).await;
        let target = Target::parse(&mock_server.uri()).unwrap();

        let data = cms_of(probe_cms(&target, &options(true)).await);
        assert_eq!(data.name, CmsName::Drupal);
        assert_eq!(data.detected_by, DetectionSource::Header);
    }

    #[tokio::test]
    async fn admin_path_identifies_joomla() {
        let mock_server = serve_page(ResponseTemplate::new(200).set_body_string("<p>hello</p>")).await;
        Mock::given(method("GET"))
            .and(path("/administrator/"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;
        let target = Target::parse(&mock_server.uri()).unwrap();

        let data = cms_of(probe_cms(&target, &options(true)).await);
        assert_eq!(data.name, CmsName::Joomla);
        assert_eq!(data.detected_by, DetectionSource::Path);
    }

    #[tokio::test]
    async fn path_probing_can_be_disabled() {
        let mock_server = serve_page(ResponseTemplate::new(200).set_body_string("<p>hello</p>")).await;
        Mock::given(method("GET"))
            .and(path("/wp-login.php"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;
        let target = Target::parse(&mock_server.uri()).unwrap();

        let data = cms_of(probe_cms(&target, &options(false)).await);
        assert_eq!(data.name, CmsName::Unknown);
        assert_eq!(data.detected_by, DetectionSource::None);
    }

    #[tokio::test]
    async fn no_markers_is_unknown_not_failure() {
        let mock_server = serve_page(ResponseTemplate::new(200).set_body_string("<p>plain</p>")).await;
        let target = Target::parse(&mock_server.uri()).unwrap();

        let data = cms_of(probe_cms(&target, &options(true)).await);
        assert_eq!(data.name, CmsName::Unknown);
    }

    #[tokio::test]
    async fn error_pages_are_still_fingerprinted() {
        let template = ResponseTemplate::new(403).set_body_string("<a href=\"/sites/default/files\">x</a>");
        let mock_server = serve_page(template).await;
        let target = Target::parse(&mock_server.uri()).unwrap();

        let data = cms_of(probe_cms(&target, &options(false)).await);
        assert_eq!(data.name, CmsName::Drupal);
    }

    #[tokio::test]
    async fn unreachable_page_fails_the_probe() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let target = Target::parse(&format!("http://127.0.0.1:{}", port)).unwrap();
        let result = probe_cms(&target, &options(true)).await;
        assert_eq!(result.failure().map(|f| f.kind), Some(FailureKind::Connection));
    }
}
