use crate::geocode::{location_record, Geocoder};
use crate::storage::{GeocodeCache, PersonStore};
use crate::transform::normalize_location_key;
use crate::{CrawlerError, GeocodeError};
use tracing::{info, warn};

/// Outcome of a bulk geocoding pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeocodeReport {
    /// Locations geocoded and cached by this pass
    pub success: u64,
    /// Locations the provider had no match for
    pub not_found: u64,
    /// Lookups that failed
    pub failed: u64,
    /// Locations already cached (or with an empty key)
    pub skipped: u64,
    /// Distinct location strings considered
    pub total: u64,
}

/// Geocodes every stored birth or death location not yet in the cache
///
/// Provider failures are counted and logged; storage failures abort the
/// pass.
///
/// # Errors
///
/// * `GeocodeError::MissingToken` - The geocoder is unavailable
/// * `StorageError` - Reading locations or writing the cache failed
pub async fn run_geocode_workflow<S, G>(
    store: &mut S,
    geocoder: &G,
) -> Result<GeocodeReport, CrawlerError>
where
    S: PersonStore + GeocodeCache + ?Sized,
    G: Geocoder,
{
    if !geocoder.is_available() {
        return Err(GeocodeError::MissingToken.into());
    }

    let locations = store.distinct_locations()?;
    let mut report = GeocodeReport {
        total: locations.len() as u64,
        ..GeocodeReport::default()
    };

    info!(
        total = report.total,
        cached = store.count_locations()?,
        "Starting geocoding workflow"
    );

    for (index, raw) in locations.iter().enumerate() {
        let Some(key) = normalize_location_key(Some(raw.as_str())) else {
            report.skipped += 1;
            continue;
        };

        // Several raw spellings can share one key
        if store.has_location(&key)? {
            report.skipped += 1;
            continue;
        }

        info!(
            "[{}/{}] Geocoding: \"{}\"",
            index + 1,
            report.total,
            raw
        );

        match geocoder.lookup(raw).await {
            Ok(Some(result)) => {
                store.save_location(&location_record(key, raw, result))?;
                report.success += 1;
            }
            Ok(None) => {
                report.not_found += 1;
            }
            Err(e) => {
                warn!(location = %raw, "Geocoding failed: {}", e);
                report.failed += 1;
            }
        }
    }

    info!(
        success = report.success,
        not_found = report.not_found,
        failed = report.failed,
        skipped = report.skipped,
        "Geocoding workflow finished"
    );

    Ok(report)
}
