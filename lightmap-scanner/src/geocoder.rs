// Name -> coordinate lookup services

use crate::error::ScanError;
use crate::fetch::fetch_once;
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use reqwest::header::ACCEPT;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use thiserror::Error;
use tracing::debug;

pub const NOMINATIM_ENDPOINT: &str = "https://nominatim.openstreetmap.org/search";

static MAP_SECTION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"div[id="Map"]"#).expect("valid selector"));
static LATLON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Latitude:\s*([+-]?\d+(?:\.\d+)?)\s*,\s*Longitude:\s*([+-]?\d+(?:\.\d+)?)")
        .expect("valid lat/long pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// `None` unless latitude is within [-90, 90] and longitude within [-180, 180].
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        let valid = (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude);
        valid.then_some(Self {
            latitude,
            longitude,
        })
    }
}

/// What a geocoder gets to work with for one lighthouse.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeocodeQuery {
    pub name: String,
    pub city: Option<String>,
    pub state: Option<String>,
    /// Detail page, used by [`DetailPageGeocoder`].
    pub url: Option<String>,
}

impl GeocodeQuery {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    /// Free-text search string: `"name, city, state"` with missing parts left out.
    pub fn search_text(&self) -> String {
        [Some(&self.name), self.city.as_ref(), self.state.as_ref()]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup {
    Found(Coordinates),
    NotFound,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeocodeError {
    /// Worth retrying: timeouts, connection resets, 429, 5xx.
    #[error("transient geocoding failure: {0}")]
    Transient(String),

    #[error("geocoding failed: {0}")]
    Permanent(String),
}

impl GeocodeError {
    pub fn is_transient(&self) -> bool {
        matches!(self, GeocodeError::Transient(_))
    }
}

impl From<ScanError> for GeocodeError {
    fn from(e: ScanError) -> Self {
        if e.is_transient() {
            GeocodeError::Transient(e.to_string())
        } else {
            GeocodeError::Permanent(e.to_string())
        }
    }
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    fn name(&self) -> &'static str;

    async fn lookup(&self, query: &GeocodeQuery) -> Result<Lookup, GeocodeError>;
}

#[derive(Debug, Deserialize)]
struct NominatimResult {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: String,
}

/// OpenStreetMap Nominatim search API.
pub struct NominatimGeocoder {
    client: Client,
    endpoint: String,
}

impl NominatimGeocoder {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            endpoint: NOMINATIM_ENDPOINT.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    fn name(&self) -> &'static str {
        "nominatim"
    }

    async fn lookup(&self, query: &GeocodeQuery) -> Result<Lookup, GeocodeError> {
        let text = query.search_text();
        debug!("Geocoding '{}' via {}", text, self.endpoint);

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("q", text.as_str()),
                ("format", "json"),
                ("limit", "1"),
                ("countrycodes", "us"),
            ])
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_builder() {
                    GeocodeError::Permanent(format!("invalid request: {}", e))
                } else {
                    GeocodeError::Transient(format!("request failed: {}", e))
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() || status.as_u16() == 408 {
            return Err(GeocodeError::Transient(format!("HTTP {}", status.as_u16())));
        }
        if !status.is_success() {
            return Err(GeocodeError::Permanent(format!("HTTP {}", status.as_u16())));
        }

        let results: Vec<NominatimResult> = response
            .json()
            .await
            .map_err(|e| GeocodeError::Permanent(format!("malformed response: {}", e)))?;

        let Some(first) = results.into_iter().next() else {
            return Ok(Lookup::NotFound);
        };

        let latitude: f64 = first
            .lat
            .parse()
            .map_err(|e| GeocodeError::Permanent(format!("invalid latitude '{}': {}", first.lat, e)))?;
        let longitude: f64 = first
            .lon
            .parse()
            .map_err(|e| GeocodeError::Permanent(format!("invalid longitude '{}': {}", first.lon, e)))?;

        let coordinates = Coordinates::new(latitude, longitude).ok_or_else(|| {
            GeocodeError::Permanent(format!("coordinates out of range: ({}, {})", latitude, longitude))
        })?;

        debug!("Geocoded '{}' -> {} ({}, {})", text, first.display_name, latitude, longitude);
        Ok(Lookup::Found(coordinates))
    }
}

/// Reads the `Latitude: .., Longitude: ..` line from a lighthouse's detail page.
pub struct DetailPageGeocoder {
    client: Client,
}

impl DetailPageGeocoder {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Geocoder for DetailPageGeocoder {
    fn name(&self) -> &'static str {
        "detail-page"
    }

    async fn lookup(&self, query: &GeocodeQuery) -> Result<Lookup, GeocodeError> {
        let Some(url) = query.url.as_deref() else {
            debug!("'{}' has no detail page", query.name);
            return Ok(Lookup::NotFound);
        };

        let html = match fetch_once(&self.client, url).await {
            Ok(html) => html,
            Err(ScanError::Status { status: 404, .. }) => return Ok(Lookup::NotFound),
            Err(e) => return Err(e.into()),
        };

        let Some((latitude, longitude)) = parse_detail_coordinates(&html) else {
            return Ok(Lookup::NotFound);
        };

        Coordinates::new(latitude, longitude)
            .map(Lookup::Found)
            .ok_or_else(|| {
                GeocodeError::Permanent(format!(
                    "coordinates out of range on {}: ({}, {})",
                    url, latitude, longitude
                ))
            })
    }
}

/// Find the coordinate line in the page's Map section, or anywhere in the page
/// when the section is missing.
pub fn parse_detail_coordinates(html: &str) -> Option<(f64, f64)> {
    let document = Html::parse_document(html);
    let text = match document.select(&MAP_SECTION).next() {
        Some(section) => section.text().collect::<Vec<_>>().join(" "),
        None => document.root_element().text().collect::<Vec<_>>().join(" "),
    };

    let caps = LATLON.captures(&text)?;
    let latitude = caps[1].parse().ok()?;
    let longitude = caps[2].parse().ok()?;
    Some((latitude, longitude))
}
