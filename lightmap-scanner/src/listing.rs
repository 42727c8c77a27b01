// Listing page extraction for the known page layouts

use crate::error::{Result, ScanError};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::debug;
use url::Url;

static PARAGRAPH: LazyLock<Selector> = LazyLock::new(|| selector("p"));
static ROW: LazyLock<Selector> = LazyLock::new(|| selector("div.w3-row"));
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| selector("a[href]"));
static SPAN: LazyLock<Selector> = LazyLock::new(|| selector("span"));
static LIGHT_LIST: LazyLock<Selector> = LazyLock::new(|| selector(r#"div[id="Light List"]"#));
static USCG_CONTAINERS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    vec![
        selector("#dnn_ctr22881_HtmlModule_lblContent"),
        selector("div[id*=HtmlModule_lblContent]"),
        selector("div.DNNModuleContent"),
    ]
});

static ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([^()]+?)\s*\(([^()]*)\)").expect("valid entry pattern")
});
static YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(1[6-9]\d{2}|20\d{2})\b").expect("valid year pattern"));

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

/// One lighthouse as listed on a source page, before geocoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Detail page for the lighthouse, when the listing links to one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_built: Option<u16>,
}

impl ListingEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            city: None,
            state: None,
            url: None,
            year_built: None,
        }
    }
}

/// Markup structure of a listing page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingLayout {
    /// Pick by host name.
    #[default]
    Auto,
    /// history.uscg.mil asset page: paragraphs of `Name (Location)` entries.
    Uscg,
    /// lighthousefriends.com state pages: anchor cards with name/location spans.
    #[serde(rename = "lighthousefriends")]
    LighthouseFriends,
}

impl ListingLayout {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Some(ListingLayout::Auto),
            "uscg" => Some(ListingLayout::Uscg),
            "lighthousefriends" | "lighthouse-friends" => Some(ListingLayout::LighthouseFriends),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ListingLayout::Auto => "auto",
            ListingLayout::Uscg => "uscg",
            ListingLayout::LighthouseFriends => "lighthousefriends",
        }
    }

    /// Replace `Auto` with a concrete layout for the given page.
    pub fn resolve(self, page_url: &Url) -> Self {
        match self {
            ListingLayout::Auto => {
                let host = page_url.host_str().unwrap_or_default();
                if host == "lighthousefriends.com" || host.ends_with(".lighthousefriends.com") {
                    ListingLayout::LighthouseFriends
                } else {
                    ListingLayout::Uscg
                }
            }
            concrete => concrete,
        }
    }
}

/// Extract listing entries from one page.
///
/// Fails with [`ScanError::Parse`] when the page lacks the layout's container;
/// a container with no recognisable entries yields an empty list.
pub fn parse_listing(html: &str, page_url: &Url, layout: ListingLayout) -> Result<Vec<ListingEntry>> {
    let document = Html::parse_document(html);
    match layout.resolve(page_url) {
        ListingLayout::LighthouseFriends => parse_lighthousefriends(&document, page_url),
        _ => parse_uscg(&document, page_url),
    }
}

fn parse_uscg(document: &Html, page_url: &Url) -> Result<Vec<ListingEntry>> {
    let container = USCG_CONTAINERS
        .iter()
        .find_map(|sel| document.select(sel).next())
        .ok_or_else(|| ScanError::Parse {
            url: page_url.to_string(),
            reason: "content container not found".to_string(),
        })?;

    let paragraphs: Vec<String> = container
        .select(&PARAGRAPH)
        .map(element_text)
        .filter(|text| !text.is_empty() && !is_index_heading(text))
        .collect();

    // Prose before the first entry carries no parentheses
    let body = paragraphs
        .iter()
        .skip_while(|p| !p.contains('('))
        .map(|p| close_unbalanced(p))
        .collect::<Vec<_>>()
        .join(" ");

    let entries = ENTRY
        .captures_iter(&body)
        .filter_map(|caps| {
            let name = clean_name(&caps[1]);
            if name.is_empty() {
                return None;
            }
            let location = caps[2].trim();
            let (city, state) = split_location(location);
            let mut entry = ListingEntry::new(name);
            entry.city = city;
            entry.state = state;
            entry.year_built = find_year(&caps[0]);
            Some(entry)
        })
        .collect::<Vec<_>>();

    debug!("USCG layout: {} paragraphs, {} entries", paragraphs.len(), entries.len());
    Ok(entries)
}

fn parse_lighthousefriends(document: &Html, page_url: &Url) -> Result<Vec<ListingEntry>> {
    let container = document
        .select(&LIGHT_LIST)
        .next()
        .ok_or_else(|| ScanError::Parse {
            url: page_url.to_string(),
            reason: "\"Light List\" container not found".to_string(),
        })?;

    let fallback_state = page_url
        .query_pairs()
        .find(|(key, _)| key == "state")
        .map(|(_, value)| value.to_uppercase());

    let mut rows: Vec<ElementRef> = container.select(&ROW).collect();
    if rows.is_empty() {
        rows.push(container);
    }

    let mut entries = Vec::new();
    for row in rows {
        for anchor in row.select(&ANCHOR) {
            let href = anchor.value().attr("href").unwrap_or_default().trim();
            if href.is_empty() {
                continue;
            }

            let spans: Vec<ElementRef> = anchor.select(&SPAN).collect();
            if spans.len() < 2 {
                debug!("Skipping anchor {} without name/location spans", href);
                continue;
            }

            let name = element_text(spans[0]);
            if name.is_empty() {
                continue;
            }
            let (city, state) = split_city_state(&element_text(spans[1]), fallback_state.as_deref());

            let mut entry = ListingEntry::new(name);
            entry.city = city;
            entry.state = state;
            entry.url = page_url.join(href).ok().map(|u| u.to_string());
            entries.push(entry);
        }
    }

    debug!("lighthousefriends layout: {} entries", entries.len());
    Ok(entries)
}

/// Keep the first entry per name, comparing case-insensitively with collapsed whitespace.
pub fn dedupe_by_name(entries: Vec<ListingEntry>) -> Vec<ListingEntry> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|entry| seen.insert(name_key(&entry.name)))
        .collect()
}

pub fn name_key(name: &str) -> String {
    collapse_whitespace(name).to_lowercase()
}

fn element_text(element: ElementRef) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Alphabetical index letters ("A", "B", ...) between groups of entries.
fn is_index_heading(text: &str) -> bool {
    let trimmed = text.trim_matches(|c: char| c == '[' || c == ']' || c.is_whitespace());
    trimmed.chars().count() <= 3 && trimmed.chars().all(|c| c.is_ascii_uppercase() || c == '-')
}

/// Close any parenthesis left open at the end of a paragraph.
fn close_unbalanced(text: &str) -> String {
    let mut depth: usize = 0;
    for c in text.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    let mut closed = text.to_string();
    closed.push_str(&")".repeat(depth));
    closed
}

fn clean_name(raw: &str) -> String {
    collapse_whitespace(
        raw.trim_matches(|c: char| c.is_whitespace() || ",;:•·-–".contains(c)),
    )
}

/// `"Little Brewster Island, Boston, MA"` -> (`"Little Brewster Island, Boston"`, `"MA"`).
/// A location with no comma is taken to be the state. Parts carrying a year
/// ("est. 1716") are dropped; the year is recorded separately.
fn split_location(location: &str) -> (Option<String>, Option<String>) {
    let parts: Vec<&str> = location
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty() && !YEAR.is_match(p))
        .collect();
    match parts.as_slice() {
        [] => (None, None),
        [only] => (None, Some(normalize_state(only))),
        [rest @ .., last] => (Some(rest.join(", ")), Some(normalize_state(last))),
    }
}

fn split_city_state(location: &str, fallback_state: Option<&str>) -> (Option<String>, Option<String>) {
    let parts: Vec<&str> = location.split(',').map(str::trim).collect();
    if parts.len() >= 2 {
        let city = parts[..parts.len() - 1].join(",").trim().to_string();
        let state = normalize_state(parts[parts.len() - 1]);
        (non_empty(city), non_empty(state))
    } else {
        (
            non_empty(location.trim().to_string()),
            fallback_state.map(str::to_string),
        )
    }
}

fn normalize_state(state: &str) -> String {
    let state = state.trim();
    if state.len() == 2 && state.chars().all(|c| c.is_ascii_alphabetic()) {
        state.to_uppercase()
    } else {
        state.to_string()
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

fn find_year(text: &str) -> Option<u16> {
    YEAR.captures(text).and_then(|caps| caps[1].parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    const USCG_PAGE: &str = r#"<html><body>
        <div id="dnn_ctr22881_HtmlModule_lblContent">
            <p>The following is a list of lighthouses with histories on file.</p>
            <p>Click a name for more information.</p>
            <p>A</p>
            <p>Alcatraz Island Light (San Francisco Bay, CA) Ambrose Channel Light (New York)</p>
            <p>B</p>
            <p>Boston Light (Little Brewster Island, Boston, MA, est. 1716)</p>
            <p>Brandywine Shoal Light (Delaware Bay, DE</p>
            <p>Boston Light (Boston, MA)</p>
        </div>
    </body></html>"#;

    const FRIENDS_PAGE: &str = r#"<html><body>
        <div id="Light List"><center>
            <div class="w3-row">
                <a href="light.asp?ID=1"><span>Mobile Point</span><span>Mobile, al</span></a>
                <a href="/light.asp?ID=2"><span>Sand Island</span><span>Dauphin Island</span></a>
                <a href="light.asp?ID=3"><span>Broken card</span></a>
            </div>
            <div class="w3-row">
                <a href="light.asp?ID=4"><span> Middle   Bay </span><span>Mobile Bay, AL</span></a>
            </div>
        </center></div>
    </body></html>"#;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_layout_resolve_by_host() {
        let friends = url("https://www.lighthousefriends.com/pull-state.asp?state=AL");
        let uscg = url("https://www.history.uscg.mil/Browse-by-Topic/Assets/Land/All/Lighthouses/");

        assert_eq!(ListingLayout::Auto.resolve(&friends), ListingLayout::LighthouseFriends);
        assert_eq!(ListingLayout::Auto.resolve(&uscg), ListingLayout::Uscg);
        assert_eq!(ListingLayout::Uscg.resolve(&friends), ListingLayout::Uscg);
    }

    #[test]
    fn test_layout_from_str() {
        assert_eq!(ListingLayout::from_str("USCG"), Some(ListingLayout::Uscg));
        assert_eq!(
            ListingLayout::from_str("lighthouse-friends"),
            Some(ListingLayout::LighthouseFriends)
        );
        assert_eq!(ListingLayout::from_str("pdf"), None);
    }

    #[test]
    fn test_parse_uscg_entries() {
        let page = url("https://www.history.uscg.mil/lighthouses/");
        let entries = parse_listing(USCG_PAGE, &page, ListingLayout::Uscg).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();

        assert_eq!(
            names,
            vec![
                "Alcatraz Island Light",
                "Ambrose Channel Light",
                "Boston Light",
                "Brandywine Shoal Light",
                "Boston Light",
            ]
        );

        assert_eq!(entries[0].city.as_deref(), Some("San Francisco Bay"));
        assert_eq!(entries[0].state.as_deref(), Some("CA"));
        assert_eq!(entries[1].city, None);
        assert_eq!(entries[1].state.as_deref(), Some("New York"));
        assert_eq!(entries[2].city.as_deref(), Some("Little Brewster Island, Boston"));
        assert_eq!(entries[2].state.as_deref(), Some("MA"));
        assert_eq!(entries[2].year_built, Some(1716));
        // Unclosed parenthesis: the rest of the paragraph is the location
        assert_eq!(entries[3].city.as_deref(), Some("Delaware Bay"));
        assert_eq!(entries[3].state.as_deref(), Some("DE"));
    }

    #[test]
    fn test_parse_uscg_fallback_container() {
        let html = r#"<div class="DNNModuleContent"><p>Fire Island Light (Long Island, NY)</p></div>"#;
        let page = url("https://www.history.uscg.mil/x");
        let entries = parse_listing(html, &page, ListingLayout::Uscg).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "Fire Island Light");
    }

    #[test]
    fn test_parse_uscg_missing_container_is_parse_error() {
        let page = url("https://www.history.uscg.mil/x");
        let err = parse_listing("<html><body><p>moved</p></body></html>", &page, ListingLayout::Uscg)
            .unwrap_err();
        assert!(matches!(err, ScanError::Parse { .. }));
    }

    #[test]
    fn test_parse_lighthousefriends_entries() {
        let page = url("https://www.lighthousefriends.com/pull-state.asp?state=AL");
        let entries = parse_listing(FRIENDS_PAGE, &page, ListingLayout::Auto).unwrap();

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].name, "Mobile Point");
        assert_eq!(entries[0].city.as_deref(), Some("Mobile"));
        assert_eq!(entries[0].state.as_deref(), Some("AL"));
        assert_eq!(
            entries[0].url.as_deref(),
            Some("https://www.lighthousefriends.com/light.asp?ID=1")
        );

        // No comma: falls back to the page's state query value
        assert_eq!(entries[1].city.as_deref(), Some("Dauphin Island"));
        assert_eq!(entries[1].state.as_deref(), Some("AL"));

        assert_eq!(entries[2].name, "Middle Bay");
        assert_eq!(entries[2].city.as_deref(), Some("Mobile Bay"));
    }

    #[test]
    fn test_parse_lighthousefriends_missing_container() {
        let page = url("https://www.lighthousefriends.com/pull-state.asp?state=AL");
        let err = parse_listing("<html></html>", &page, ListingLayout::LighthouseFriends).unwrap_err();
        assert!(matches!(err, ScanError::Parse { .. }));
    }

    #[test]
    fn test_empty_container_yields_no_entries() {
        let page = url("https://www.lighthousefriends.com/pull-state.asp?state=AK");
        let html = r#"<div id="Light List"><center></center></div>"#;
        let entries = parse_listing(html, &page, ListingLayout::LighthouseFriends).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_dedupe_by_name_keeps_first() {
        let mut first = ListingEntry::new("Boston Light");
        first.state = Some("MA".to_string());
        let entries = vec![
            first.clone(),
            ListingEntry::new("Fire Island Light"),
            ListingEntry::new("boston  light"),
        ];

        let deduped = dedupe_by_name(entries);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0], first);
    }

    #[test]
    fn test_close_unbalanced() {
        assert_eq!(close_unbalanced("A (B"), "A (B)");
        assert_eq!(close_unbalanced("A (B)"), "A (B)");
        assert_eq!(close_unbalanced("A ((B"), "A ((B))");
    }

    #[test]
    fn test_index_heading() {
        assert!(is_index_heading("A"));
        assert!(is_index_heading("[M]"));
        assert!(!is_index_heading("Boston Light (MA)"));
    }
}
