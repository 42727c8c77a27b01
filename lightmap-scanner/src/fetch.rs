use crate::error::{Result, ScanError, is_transient_status};
use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, HeaderMap, HeaderValue, PRAGMA};
use std::time::Duration;
use tracing::{debug, warn};

/// A realistic desktop browser UA. Some listing hosts serve block pages to
/// anything that looks like a library client.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Connection and retry settings shared by the listing crawler and the
/// HTTP-backed geocoders.
#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub user_agent: String,
    pub timeout: Duration,
    /// Extra attempts after the first one, only for transient failures.
    pub retries: u32,
    /// Linear backoff step: attempt `n` waits `n * backoff`.
    pub backoff: Duration,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(25),
            retries: 3,
            backoff: Duration::from_millis(600),
        }
    }
}

pub fn build_client(options: &HttpOptions) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));

    let client = Client::builder()
        .user_agent(options.user_agent.clone())
        .default_headers(headers)
        .timeout(options.timeout)
        .connect_timeout(options.timeout / 2)
        .pool_idle_timeout(Duration::from_secs(90))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()?;

    Ok(client)
}

/// Fetch a page, retrying transient failures (connection errors, 408, 429, 5xx)
/// up to `options.retries` times.
pub async fn fetch_html(client: &Client, url: &str, options: &HttpOptions) -> Result<String> {
    let mut attempt: u32 = 0;
    loop {
        match fetch_once(client, url).await {
            Ok(body) => return Ok(body),
            Err(e) if e.is_transient() && attempt < options.retries => {
                attempt += 1;
                let delay = options.backoff * attempt;
                warn!(
                    "Attempt {}/{} for {} failed ({}), retrying in {:?}",
                    attempt,
                    options.retries + 1,
                    url,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Single GET with no retries. Non-2xx statuses and CDN block pages become errors.
pub async fn fetch_once(client: &Client, url: &str) -> Result<String> {
    debug!("Fetching {}", url);

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|source| request_error(url, source))?;

    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .map_err(|source| request_error(url, source))?;

    // Some CDNs answer 200 with an "Access Denied" page
    if status == 403 || (body.contains("Access Denied") && body.contains("Akamai")) {
        return Err(ScanError::Blocked {
            url: url.to_string(),
        });
    }

    if !(200..300).contains(&status) {
        if is_transient_status(status) {
            debug!("Transient status {} from {}", status, url);
        }
        return Err(ScanError::Status {
            url: url.to_string(),
            status,
        });
    }

    Ok(body)
}

fn request_error(url: &str, source: reqwest::Error) -> ScanError {
    if source.is_builder() {
        ScanError::InvalidUrl(format!("{}: {}", url, source))
    } else {
        ScanError::Network {
            url: url.to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    fn fast_options() -> HttpOptions {
        HttpOptions {
            retries: 2,
            backoff: Duration::from_millis(1),
            ..HttpOptions::default()
        }
    }

    #[tokio::test]
    async fn test_fetch_html_ok() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/list"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&mock_server)
            .await;

        let options = fast_options();
        let client = build_client(&options).unwrap();
        let body = fetch_html(&client, &format!("{}/list", mock_server.uri()), &options)
            .await
            .unwrap();
        assert_eq!(body, "<html>ok</html>");
    }

    #[tokio::test]
    async fn test_fetch_html_retries_transient_status() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&mock_server)
            .await;

        let options = fast_options();
        let client = build_client(&options).unwrap();
        let err = fetch_html(&client, &format!("{}/flaky", mock_server.uri()), &options)
            .await
            .unwrap_err();

        assert!(matches!(err, ScanError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_fetch_html_does_not_retry_not_found() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&mock_server)
            .await;

        let options = fast_options();
        let client = build_client(&options).unwrap();
        let err = fetch_html(&client, &format!("{}/missing", mock_server.uri()), &options)
            .await
            .unwrap_err();

        assert!(matches!(err, ScanError::Status { status: 404, .. }));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_fetch_detects_block_page() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/blocked"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<html><h1>Access Denied</h1>Reference Akamai</html>"),
            )
            .mount(&mock_server)
            .await;

        let options = fast_options();
        let client = build_client(&options).unwrap();
        let err = fetch_once(&client, &format!("{}/blocked", mock_server.uri()))
            .await
            .unwrap_err();

        assert!(matches!(err, ScanError::Blocked { .. }));
    }

    #[tokio::test]
    async fn test_fetch_unreachable_host_is_network_error() {
        let options = HttpOptions {
            retries: 0,
            timeout: Duration::from_secs(2),
            ..HttpOptions::default()
        };
        let client = build_client(&options).unwrap();
        // Port 9 (discard) on localhost is closed on any sane test machine
        let err = fetch_html(&client, "http://127.0.0.1:9/", &options)
            .await
            .unwrap_err();

        assert!(matches!(err, ScanError::Network { .. }));
        assert!(err.is_transient());
    }
}
