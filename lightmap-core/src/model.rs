use chrono::{DateTime, Utc};
use lightmap_scanner::{Coordinates, GeocodeQuery, ListingEntry};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LighthouseStatus {
    Active,
    Inactive,
    Unknown,
}

/// Geocoding outcome carried on every record, so unresolved entries stay in
/// the dataset instead of disappearing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Resolution {
    #[default]
    Pending,
    Resolved,
    /// The service had no match for the name.
    NotFound,
    /// The service kept failing (or answered with garbage).
    Failed { reason: String },
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Pending => "pending",
            Resolution::Resolved => "resolved",
            Resolution::NotFound => "not_found",
            Resolution::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LighthouseRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_built: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<LighthouseStatus>,
    #[serde(default)]
    pub resolution: Resolution,
}

impl LighthouseRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            city: None,
            state: None,
            url: None,
            latitude: None,
            longitude: None,
            year_built: None,
            status: None,
            resolution: Resolution::Pending,
        }
    }

    pub fn from_entry(entry: &ListingEntry) -> Self {
        Self {
            city: entry.city.clone(),
            state: entry.state.clone(),
            url: entry.url.clone(),
            year_built: entry.year_built,
            ..Self::new(entry.name.clone())
        }
    }

    pub fn query(&self) -> GeocodeQuery {
        GeocodeQuery {
            name: self.name.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
            url: self.url.clone(),
        }
    }

    /// Coordinates of a resolved record. `None` for anything unresolved or
    /// carrying out-of-range values.
    pub fn coordinates(&self) -> Option<Coordinates> {
        if self.resolution != Resolution::Resolved {
            return None;
        }
        Coordinates::new(self.latitude?, self.longitude?)
    }

    pub fn is_resolved(&self) -> bool {
        self.coordinates().is_some()
    }

    pub fn resolve(&mut self, coordinates: Coordinates) {
        self.latitude = Some(coordinates.latitude);
        self.longitude = Some(coordinates.longitude);
        self.resolution = Resolution::Resolved;
    }

    pub fn mark_not_found(&mut self) {
        self.latitude = None;
        self.longitude = None;
        self.resolution = Resolution::NotFound;
    }

    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        self.latitude = None;
        self.longitude = None;
        self.resolution = Resolution::Failed {
            reason: reason.into(),
        };
    }
}

/// Scraper output: the names found on the source page(s), in page order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawNameList {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
    pub entries: Vec<ListingEntry>,
}

impl RawNameList {
    pub fn new(source: impl Into<String>, entries: Vec<ListingEntry>) -> Self {
        Self {
            source: Some(source.into()),
            fetched_at: Some(Utc::now()),
            entries,
        }
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            source: None,
            fetched_at: None,
            entries: names.into_iter().map(ListingEntry::new).collect(),
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Geocoder output, serialized with a top-level `lighthouses` array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LighthouseDataset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub lighthouses: Vec<LighthouseRecord>,
}

impl LighthouseDataset {
    pub fn new(source: Option<String>, lighthouses: Vec<LighthouseRecord>) -> Self {
        Self {
            source,
            lighthouses,
        }
    }

    pub fn resolved(&self) -> impl Iterator<Item = &LighthouseRecord> {
        self.lighthouses.iter().filter(|r| r.is_resolved())
    }

    pub fn unresolved(&self) -> impl Iterator<Item = &LighthouseRecord> {
        self.lighthouses.iter().filter(|r| !r.is_resolved())
    }

    pub fn len(&self) -> usize {
        self.lighthouses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lighthouses.is_empty()
    }
}
