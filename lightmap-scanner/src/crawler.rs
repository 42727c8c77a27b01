use crate::error::{Result, ScanError};
use crate::fetch::{HttpOptions, build_client, fetch_html};
use crate::listing::{ListingEntry, ListingLayout, dedupe_by_name, parse_listing};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Called before each page fetch with (page index, page count, url).
pub type PageCallback = Arc<dyn Fn(usize, usize, String) + Send + Sync>;

/// 50 states + DC, for `{state}` URL templates.
pub const DEFAULT_STATE_CODES: [&str; 51] = [
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "DC", "FL", "GA", "HI", "ID", "IL", "IN", "IA",
    "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ", "NM",
    "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT", "VA", "WA",
    "WV", "WI", "WY",
];

pub const STATE_PLACEHOLDER: &str = "{state}";

/// Result of crawling every page of a listing.
#[derive(Debug, Default)]
pub struct CrawlOutcome {
    /// Entries in page order, deduplicated by name.
    pub entries: Vec<ListingEntry>,
    pub pages_fetched: usize,
    /// Pages skipped under `keep_going`, with the error message.
    pub failed_pages: Vec<(String, String)>,
    pub duplicates_dropped: usize,
}

/// Fetches listing pages one after another and extracts their entries.
pub struct ListingCrawler {
    client: Client,
    http: HttpOptions,
    layout: ListingLayout,
    page_delay: Duration,
    keep_going: bool,
    progress_callback: Option<PageCallback>,
}

impl ListingCrawler {
    pub fn new() -> Result<Self> {
        Self::with_http_options(HttpOptions::default())
    }

    pub fn with_http_options(http: HttpOptions) -> Result<Self> {
        let client = build_client(&http)?;
        Ok(Self {
            client,
            http,
            layout: ListingLayout::Auto,
            page_delay: Duration::from_millis(500),
            keep_going: false,
            progress_callback: None,
        })
    }

    pub fn with_layout(mut self, layout: ListingLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Polite pause between consecutive page fetches.
    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    /// Log and skip failing pages instead of aborting the crawl.
    pub fn with_keep_going(mut self, keep_going: bool) -> Self {
        self.keep_going = keep_going;
        self
    }

    pub fn with_progress_callback(mut self, callback: PageCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub async fn crawl(&self, pages: &[String]) -> Result<CrawlOutcome> {
        info!("Scraping {} listing page(s)", pages.len());

        let mut outcome = CrawlOutcome::default();
        let mut collected = Vec::new();
        let mut last_error: Option<ScanError> = None;

        for (idx, page) in pages.iter().enumerate() {
            if idx > 0 && !self.page_delay.is_zero() {
                tokio::time::sleep(self.page_delay).await;
            }

            if let Some(ref callback) = self.progress_callback {
                callback(idx, pages.len(), page.clone());
            }

            match self.scrape_page(page).await {
                Ok(entries) => {
                    info!("Found {} entries on {}", entries.len(), page);
                    if entries.is_empty() {
                        warn!("No listing entries extracted from {}; page structure may have changed", page);
                    }
                    outcome.pages_fetched += 1;
                    collected.extend(entries);
                }
                Err(e) if self.keep_going => {
                    warn!("Failed to scrape {}: {}", page, e);
                    outcome.failed_pages.push((page.clone(), e.to_string()));
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        // Nothing succeeded: surface the failure rather than an empty list
        if outcome.pages_fetched == 0
            && let Some(e) = last_error
        {
            return Err(e);
        }

        let total = collected.len();
        outcome.entries = dedupe_by_name(collected);
        outcome.duplicates_dropped = total - outcome.entries.len();
        if outcome.duplicates_dropped > 0 {
            debug!("Dropped {} duplicate names", outcome.duplicates_dropped);
        }

        info!(
            "Scrape complete. {} unique entries from {} page(s)",
            outcome.entries.len(),
            outcome.pages_fetched
        );
        Ok(outcome)
    }

    async fn scrape_page(&self, page: &str) -> Result<Vec<ListingEntry>> {
        let page_url =
            Url::parse(page).map_err(|e| ScanError::InvalidUrl(format!("{}: {}", page, e)))?;
        let html = fetch_html(&self.client, page_url.as_str(), &self.http).await?;
        parse_listing(&html, &page_url, self.layout)
    }
}

/// Expand a `{state}` URL template into one URL per state code. URLs without
/// the placeholder are returned unchanged.
pub fn expand_state_template(url: &str, states: &[String]) -> Vec<String> {
    if !url.contains(STATE_PLACEHOLDER) {
        return vec![url.to_string()];
    }

    if states.is_empty() {
        DEFAULT_STATE_CODES
            .iter()
            .map(|code| url.replace(STATE_PLACEHOLDER, code))
            .collect()
    } else {
        states
            .iter()
            .map(|code| url.replace(STATE_PLACEHOLDER, &code.trim().to_uppercase()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path, query_param},
    };

    fn test_crawler() -> ListingCrawler {
        let http = HttpOptions {
            retries: 0,
            backoff: Duration::from_millis(1),
            ..HttpOptions::default()
        };
        ListingCrawler::with_http_options(http)
            .unwrap()
            .with_page_delay(Duration::ZERO)
            .with_layout(ListingLayout::LighthouseFriends)
    }

    fn state_page(entries: &[(&str, &str)]) -> String {
        let mut html = String::from(r#"<html><body><div id="Light List"><div class="w3-row">"#);
        for (i, (name, loc)) in entries.iter().enumerate() {
            html.push_str(&format!(
                r#"<a href="light.asp?ID={}"><span>{}</span><span>{}</span></a>"#,
                i, name, loc
            ));
        }
        html.push_str("</div></div></body></html>");
        html
    }

    #[test]
    fn test_expand_state_template_default_states() {
        let urls = expand_state_template("https://example.com/pull-state.asp?state={state}", &[]);
        assert_eq!(urls.len(), 51);
        assert_eq!(urls[0], "https://example.com/pull-state.asp?state=AL");
        assert_eq!(urls[50], "https://example.com/pull-state.asp?state=WY");
    }

    #[test]
    fn test_expand_state_template_explicit_states() {
        let states = vec!["me".to_string(), " MA ".to_string()];
        let urls = expand_state_template("https://example.com/s?state={state}", &states);
        assert_eq!(
            urls,
            vec!["https://example.com/s?state=ME", "https://example.com/s?state=MA"]
        );
    }

    #[test]
    fn test_expand_without_placeholder() {
        let urls = expand_state_template("https://example.com/all", &["ME".to_string()]);
        assert_eq!(urls, vec!["https://example.com/all"]);
    }

    #[tokio::test]
    async fn test_crawl_concatenates_and_dedupes_pages() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/pull-state.asp"))
            .and(query_param("state", "ME"))
            .respond_with(ResponseTemplate::new(200).set_body_string(state_page(&[
                ("Portland Head", "Cape Elizabeth, ME"),
                ("West Quoddy Head", "Lubec, ME"),
            ])))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/pull-state.asp"))
            .and(query_param("state", "NH"))
            .respond_with(ResponseTemplate::new(200).set_body_string(state_page(&[
                ("Portsmouth Harbor", "New Castle, NH"),
                ("West Quoddy Head", "Lubec, ME"),
            ])))
            .mount(&mock_server)
            .await;

        let template = format!("{}/pull-state.asp?state={{state}}", mock_server.uri());
        let pages = expand_state_template(&template, &["ME".to_string(), "NH".to_string()]);

        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let crawler = test_crawler().with_progress_callback(Arc::new(move |_idx, _total, url| {
            seen_clone.lock().unwrap().push(url);
        }));

        let outcome = crawler.crawl(&pages).await.unwrap();

        let names: Vec<&str> = outcome.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Portland Head", "West Quoddy Head", "Portsmouth Harbor"]);
        assert_eq!(outcome.pages_fetched, 2);
        assert_eq!(outcome.duplicates_dropped, 1);
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_crawl_aborts_on_failed_page() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_string(state_page(&[("A", "B, ME")])))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let pages = vec![
            format!("{}/ok", mock_server.uri()),
            format!("{}/gone", mock_server.uri()),
        ];
        let err = test_crawler().crawl(&pages).await.unwrap_err();
        assert!(matches!(err, ScanError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_crawl_keep_going_skips_failed_page() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_string(state_page(&[("A", "B, ME")])))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/moved"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>new design</html>"))
            .mount(&mock_server)
            .await;

        let pages = vec![
            format!("{}/moved", mock_server.uri()),
            format!("{}/ok", mock_server.uri()),
        ];
        let outcome = test_crawler().with_keep_going(true).crawl(&pages).await.unwrap();

        assert_eq!(outcome.entries.len(), 1);
        assert_eq!(outcome.pages_fetched, 1);
        assert_eq!(outcome.failed_pages.len(), 1);
        assert!(outcome.failed_pages[0].1.contains("Unexpected page structure"));
    }

    #[tokio::test]
    async fn test_crawl_keep_going_all_failed_is_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let pages = vec![format!("{}/a", mock_server.uri())];
        let err = test_crawler().with_keep_going(true).crawl(&pages).await.unwrap_err();
        assert!(matches!(err, ScanError::Status { .. }));
    }

    #[tokio::test]
    async fn test_crawl_invalid_url() {
        let err = test_crawler()
            .crawl(&["not a url".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::InvalidUrl(_)));
    }
}
