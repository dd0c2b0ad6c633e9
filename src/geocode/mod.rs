//! Geocoding side-channel
//!
//! Birth and death places are geocoded best-effort while crawling and in
//! bulk by the `geocode` command. Results are cached by normalized location
//! key, so each distinct place costs at most one remote lookup.
//!
//! # Components
//!
//! - `Geocoder`: the provider seam
//! - `MapboxGeocoder`: the Mapbox places API implementation
//! - `DisabledGeocoder`: used when geocoding is turned off
//! - `geocode_location`: cache-first lookup that never fails the caller
//! - `run_geocode_workflow`: bulk geocoding of every stored location

mod mapbox;
mod workflow;

pub use mapbox::MapboxGeocoder;
pub use workflow::{run_geocode_workflow, GeocodeReport};

use crate::storage::{GeocodeCache, LocationRecord};
use crate::transform::normalize_location_key;
use crate::GeocodeError;
use chrono::{SecondsFormat, Utc};
use tracing::{debug, info};

/// A resolved place
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeResult {
    pub latitude: f64,
    pub longitude: f64,
    /// Provider's canonical name for the place
    pub normalized_name: String,
    pub country: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
}

/// Resolves free-text place names to coordinates
#[allow(async_fn_in_trait)]
pub trait Geocoder {
    /// False when the provider cannot be used (e.g. no credentials)
    fn is_available(&self) -> bool;

    /// Looks up one place
    ///
    /// # Returns
    ///
    /// * `Ok(Some(result))` - The place was found
    /// * `Ok(None)` - The provider has no match
    /// * `Err(GeocodeError)` - The lookup failed
    async fn lookup(&self, raw_location: &str) -> Result<Option<GeocodeResult>, GeocodeError>;
}

/// Geocoder that is never available
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledGeocoder;

impl Geocoder for DisabledGeocoder {
    fn is_available(&self) -> bool {
        false
    }

    async fn lookup(&self, _raw_location: &str) -> Result<Option<GeocodeResult>, GeocodeError> {
        Ok(None)
    }
}

/// Geocodes a place unless its key is already cached
///
/// Never fails: provider and cache errors are logged at debug level and
/// swallowed, since geocoding must not interrupt a crawl.
///
/// # Returns
///
/// The newly saved cache entry, or None when nothing was saved (blank
/// input, unavailable geocoder, already cached, no match, or an error).
pub async fn geocode_location<G, C>(
    geocoder: &G,
    cache: &mut C,
    raw_location: Option<&str>,
) -> Option<LocationRecord>
where
    G: Geocoder,
    C: GeocodeCache + ?Sized,
{
    let raw = raw_location?.trim();
    let key = normalize_location_key(Some(raw))?;

    if !geocoder.is_available() {
        return None;
    }

    match cache.has_location(&key) {
        Ok(true) => return None,
        Ok(false) => {}
        Err(e) => {
            debug!(location = raw, "Failed to check geocode cache: {}", e);
            return None;
        }
    }

    let result = match geocoder.lookup(raw).await {
        Ok(Some(result)) => result,
        Ok(None) => {
            debug!(location = raw, "No geocoding match");
            return None;
        }
        Err(e) => {
            debug!(location = raw, "Geocoding failed: {}", e);
            return None;
        }
    };

    let entry = location_record(key, raw, result);
    match cache.save_location(&entry) {
        Ok(_) => {
            info!(
                location = raw,
                "Geocoded → {}",
                entry
                    .state
                    .as_deref()
                    .or(entry.country.as_deref())
                    .unwrap_or("found")
            );
            Some(entry)
        }
        Err(e) => {
            debug!(location = raw, "Failed to save geocoded location: {}", e);
            None
        }
    }
}

/// Builds the cache entry for a lookup result
pub(crate) fn location_record(key: String, raw: &str, result: GeocodeResult) -> LocationRecord {
    LocationRecord {
        location_key: key,
        raw_location: raw.to_string(),
        latitude: result.latitude,
        longitude: result.longitude,
        normalized_name: Some(result.normalized_name),
        country: result.country,
        state: result.state,
        city: result.city,
        geocoded_at: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
    }
}
