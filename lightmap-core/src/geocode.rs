// Batch geocoding: throttled, retried lookups over a raw name list

use crate::model::{LighthouseDataset, LighthouseRecord, RawNameList};
use futures::future::join_all;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use indicatif::{ProgressBar, ProgressStyle};
use lightmap_scanner::{
    Coordinates, DetailPageGeocoder, GeocodeError, Geocoder, Lookup, NominatimGeocoder,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GeocodeProvider {
    #[default]
    Nominatim,
    DetailPage,
}

impl GeocodeProvider {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "nominatim" | "osm" => Some(GeocodeProvider::Nominatim),
            "detail-page" | "detail" | "lighthousefriends" => Some(GeocodeProvider::DetailPage),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GeocodeProvider::Nominatim => "nominatim",
            GeocodeProvider::DetailPage => "detail-page",
        }
    }

    /// Request spacing each service tolerates. Nominatim's usage policy
    /// allows one request per second.
    pub fn default_delay(&self) -> Duration {
        match self {
            GeocodeProvider::Nominatim => Duration::from_millis(1100),
            GeocodeProvider::DetailPage => Duration::from_millis(500),
        }
    }
}

pub fn build_geocoder(
    provider: GeocodeProvider,
    client: Client,
    endpoint: Option<&str>,
) -> Arc<dyn Geocoder> {
    match provider {
        GeocodeProvider::Nominatim => {
            let geocoder = NominatimGeocoder::new(client);
            match endpoint {
                Some(endpoint) => Arc::new(geocoder.with_endpoint(endpoint)),
                None => Arc::new(geocoder),
            }
        }
        GeocodeProvider::DetailPage => Arc::new(DetailPageGeocoder::new(client)),
    }
}

/// Options for a geocoding run
#[derive(Debug, Clone)]
pub struct GeocodeOptions {
    pub workers: usize,
    /// Retries after the first attempt, for transient errors only.
    pub max_retries: u32,
    /// Minimum spacing between request starts, shared by all workers.
    pub delay: Duration,
    /// First retry wait; doubles on each further retry.
    pub backoff: Duration,
    pub show_progress_bars: bool,
}

impl Default for GeocodeOptions {
    fn default() -> Self {
        Self {
            workers: 1,
            max_retries: 3,
            delay: GeocodeProvider::Nominatim.default_delay(),
            backoff: Duration::from_millis(800),
            show_progress_bars: false,
        }
    }
}

type RequestLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// One request start per `delay`, shared by every worker. A zero delay
/// disables throttling.
fn build_limiter(delay: Duration) -> Option<Arc<RequestLimiter>> {
    Quota::with_period(delay).map(|quota| Arc::new(RateLimiter::direct(quota)))
}

fn retry_wait(backoff: Duration, retry: u32) -> Duration {
    backoff.saturating_mul(1u32 << retry.saturating_sub(1).min(16))
}

/// Look up one record, retrying transient failures. Always returns the
/// record with a terminal resolution.
async fn resolve_record(
    geocoder: &dyn Geocoder,
    limiter: Option<&RequestLimiter>,
    mut record: LighthouseRecord,
    options: &GeocodeOptions,
) -> LighthouseRecord {
    let query = record.query();
    let mut retries = 0;

    loop {
        if let Some(limiter) = limiter {
            limiter.until_ready().await;
        }
        match geocoder.lookup(&query).await {
            Ok(Lookup::Found(found)) => {
                match Coordinates::new(found.latitude, found.longitude) {
                    Some(coordinates) => {
                        debug!(
                            "{} -> ({}, {})",
                            record.name, coordinates.latitude, coordinates.longitude
                        );
                        record.resolve(coordinates);
                    }
                    None => record.mark_failed(format!(
                        "coordinates out of range: ({}, {})",
                        found.latitude, found.longitude
                    )),
                }
                return record;
            }
            Ok(Lookup::NotFound) => {
                debug!("No match for '{}'", record.name);
                record.mark_not_found();
                return record;
            }
            Err(e) if e.is_transient() && retries < options.max_retries => {
                retries += 1;
                let wait = retry_wait(options.backoff, retries);
                warn!(
                    "'{}': {} (retry {}/{} in {:?})",
                    record.name, e, retries, options.max_retries, wait
                );
                sleep(wait).await;
            }
            Err(e) => {
                let reason = match e {
                    GeocodeError::Transient(msg) => {
                        format!("{} (gave up after {} retries)", msg, retries)
                    }
                    GeocodeError::Permanent(msg) => msg,
                };
                warn!("Could not geocode '{}': {}", record.name, reason);
                record.mark_failed(reason);
                return record;
            }
        }
    }
}

/// Geocode every entry of `names`. The dataset holds exactly one record per
/// entry, in input order; per-record failures are recorded on the record and
/// never abort the batch.
pub async fn geocode_entries(
    names: &RawNameList,
    geocoder: Arc<dyn Geocoder>,
    options: &GeocodeOptions,
) -> LighthouseDataset {
    let records: Vec<LighthouseRecord> = names
        .entries
        .iter()
        .map(LighthouseRecord::from_entry)
        .collect();
    let total = records.len();
    let workers = options.workers.max(1);

    info!(
        "Geocoding {} names via {} with {} worker(s)",
        total,
        geocoder.name(),
        workers
    );

    let progress_bar = if options.show_progress_bars && total > 0 {
        let pb = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar().template("[{bar:40.cyan/blue}] {pos}/{len} {msg}") {
            pb.set_style(style.progress_chars("=>-"));
        }
        Some(pb)
    } else {
        None
    };

    let limiter = build_limiter(options.delay);
    let records_per_worker = total.div_ceil(workers).max(1);
    let chunks: Vec<&[LighthouseRecord]> = records.chunks(records_per_worker).collect();
    let mut worker_tasks = Vec::with_capacity(chunks.len());

    for chunk in &chunks {
        let worker_records = chunk.to_vec();
        let geocoder = geocoder.clone();
        let limiter = limiter.clone();
        let options = options.clone();
        let pb = progress_bar.clone();

        let task = tokio::spawn(async move {
            let mut resolved = Vec::with_capacity(worker_records.len());
            for record in worker_records {
                if let Some(ref pb) = pb {
                    pb.set_message(record.name.clone());
                }
                resolved.push(
                    resolve_record(geocoder.as_ref(), limiter.as_deref(), record, &options).await,
                );
                if let Some(ref pb) = pb {
                    pb.inc(1);
                }
            }
            resolved
        });

        worker_tasks.push(task);
    }

    // join_all yields in spawn order, so contiguous chunks keep input order
    let mut lighthouses = Vec::with_capacity(total);
    for (chunk, joined) in chunks.iter().zip(join_all(worker_tasks).await) {
        match joined {
            Ok(resolved) => lighthouses.extend(resolved),
            Err(e) => {
                warn!("Geocoding worker failed: {}", e);
                lighthouses.extend(chunk.iter().cloned().map(|mut record| {
                    record.mark_failed(format!("worker failed: {}", e));
                    record
                }));
            }
        }
    }

    if let Some(pb) = progress_bar {
        pb.finish_and_clear();
    }

    let dataset = LighthouseDataset::new(names.source.clone(), lighthouses);
    info!(
        "Resolved {} of {} names",
        dataset.resolved().count(),
        dataset.len()
    );
    dataset
}
