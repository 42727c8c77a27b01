use crate::model::RawNameList;
use indicatif::{ProgressBar, ProgressStyle};
use lightmap_scanner::crawler::STATE_PLACEHOLDER;
use lightmap_scanner::error::Result;
use lightmap_scanner::{
    HttpOptions, ListingCrawler, ListingLayout, PageCallback, expand_state_template,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Options for configuring a scrape operation
pub struct ScrapeOptions {
    /// Listing URL, optionally containing `{state}`
    pub url: String,
    /// State codes substituted into the URL; empty means every state
    pub states: Vec<String>,
    pub layout: ListingLayout,
    pub page_delay: Duration,
    pub keep_going: bool,
    pub http: HttpOptions,
    pub show_progress_bars: bool,
}

impl ScrapeOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            states: Vec::new(),
            layout: ListingLayout::Auto,
            page_delay: Duration::from_millis(500),
            keep_going: false,
            http: HttpOptions::default(),
            show_progress_bars: false,
        }
    }

    /// Every page URL this scrape will visit, in order.
    pub fn pages(&self) -> Vec<String> {
        expand_state_template(&self.url, &self.states)
    }
}

#[derive(Debug)]
pub struct ScrapeResult {
    pub names: RawNameList,
    pub pages_fetched: usize,
    /// `(url, error)` for pages skipped under `keep_going`
    pub failed_pages: Vec<(String, String)>,
    pub duplicates_dropped: usize,
}

/// Execute a scrape with the given options
pub async fn execute_scrape(options: ScrapeOptions) -> Result<ScrapeResult> {
    let pages = options.pages();
    if !options.states.is_empty() && !options.url.contains(STATE_PLACEHOLDER) {
        warn!(
            "--state given but {} has no {} placeholder; ignoring",
            options.url, STATE_PLACEHOLDER
        );
    }
    info!("Scraping {} page(s) from {}", pages.len(), options.url);

    let progress_bar = if options.show_progress_bars {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message("Starting scrape...");
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(Arc::new(pb))
    } else {
        None
    };

    let mut crawler = ListingCrawler::with_http_options(options.http)?
        .with_layout(options.layout)
        .with_page_delay(options.page_delay)
        .with_keep_going(options.keep_going);

    if let Some(ref pb) = progress_bar {
        let pb = pb.clone();
        let callback: PageCallback = Arc::new(move |index: usize, total: usize, url: String| {
            pb.set_message(format!("[{}/{}] {}", index + 1, total, url));
        });
        crawler = crawler.with_progress_callback(callback);
    }

    let outcome = crawler.crawl(&pages).await;

    if let Some(pb) = progress_bar {
        pb.finish_and_clear();
    }
    let outcome = outcome?;

    if outcome.entries.is_empty() {
        warn!("No lighthouse names found at {}", options.url);
    }

    Ok(ScrapeResult {
        names: RawNameList::new(options.url, outcome.entries),
        pages_fetched: outcome.pages_fetched,
        failed_pages: outcome.failed_pages,
        duplicates_dropped: outcome.duplicates_dropped,
    })
}
