pub mod crawler;
pub mod error;
pub mod fetch;
pub mod geocoder;
pub mod listing;

pub use crawler::{CrawlOutcome, ListingCrawler, PageCallback, expand_state_template};
pub use error::ScanError;
pub use fetch::{HttpOptions, build_client};
pub use geocoder::{
    Coordinates, DetailPageGeocoder, GeocodeError, GeocodeQuery, Geocoder, Lookup,
    NominatimGeocoder,
};
pub use listing::{ListingEntry, ListingLayout};
