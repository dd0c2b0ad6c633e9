//! Mapbox places geocoder

use crate::api::RateLimiter;
use crate::config::{ApiConfig, GeocodingConfig};
use crate::geocode::{GeocodeResult, Geocoder};
use crate::{ConfigError, CrawlerError, GeocodeError};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Retries for transport failures
const MAX_RETRIES: u32 = 2;

/// First retry delay; doubles on each retry
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Feature types Mapbox is asked to match
const FEATURE_TYPES: &str = "place,locality,region,address";

#[derive(Debug, Deserialize)]
struct MapboxResponse {
    features: Vec<MapboxFeature>,
}

#[derive(Debug, Deserialize)]
struct MapboxFeature {
    /// `[longitude, latitude]`
    center: (f64, f64),
    place_name: String,
    #[serde(default)]
    context: Vec<MapboxContext>,
}

#[derive(Debug, Deserialize)]
struct MapboxContext {
    id: String,
    text: String,
}

/// Geocoder backed by the Mapbox places API
#[derive(Debug)]
pub struct MapboxGeocoder {
    http: Client,
    endpoint: Url,
    token: Option<String>,
    country: String,
    enabled: bool,
    limiter: RateLimiter,
}

impl MapboxGeocoder {
    /// Creates a geocoder from the geocoding section of the config
    ///
    /// The user agent and timeout are shared with the WikiTree client.
    pub fn new(config: &GeocodingConfig, api: &ApiConfig) -> Result<Self, CrawlerError> {
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid geocoding.endpoint: {}", e)))?;
        if endpoint.cannot_be_a_base() {
            return Err(ConfigError::InvalidUrl(format!(
                "geocoding.endpoint cannot take a path: {}",
                config.endpoint
            ))
            .into());
        }

        let http = Client::builder()
            .user_agent(api.user_agent.clone())
            .timeout(Duration::from_secs(api.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .gzip(true)
            .build()?;

        Ok(Self {
            http,
            endpoint,
            token: config
                .mapbox_token
                .clone()
                .filter(|token| !token.trim().is_empty()),
            country: config.country.clone(),
            enabled: config.enabled,
            limiter: RateLimiter::new(Duration::from_millis(config.rate_limit_ms)),
        })
    }

    fn build_url(&self, raw_location: &str, token: &str) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push(&format!("{}.json", raw_location));
        }
        url.query_pairs_mut()
            .append_pair("access_token", token)
            .append_pair("country", &self.country)
            .append_pair("types", FEATURE_TYPES)
            .append_pair("limit", "1");
        url
    }

    async fn lookup_once(
        &self,
        raw_location: &str,
        token: &str,
    ) -> Result<Option<GeocodeResult>, GeocodeError> {
        self.limiter.acquire().await;

        let url = self.build_url(raw_location, token);
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| GeocodeError::Request {
                location: raw_location.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::Status {
                location: raw_location.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| GeocodeError::Request {
            location: raw_location.to_string(),
            message: e.to_string(),
        })?;

        parse_response(raw_location, &body)
    }
}

/// Parses a Mapbox forward-geocoding response
fn parse_response(raw_location: &str, body: &str) -> Result<Option<GeocodeResult>, GeocodeError> {
    let parsed: MapboxResponse =
        serde_json::from_str(body).map_err(|e| GeocodeError::InvalidResponse {
            location: raw_location.to_string(),
            message: e.to_string(),
        })?;

    let Some(feature) = parsed.features.into_iter().next() else {
        return Ok(None);
    };

    let (longitude, latitude) = feature.center;
    let mut result = GeocodeResult {
        latitude,
        longitude,
        normalized_name: feature.place_name,
        country: None,
        state: None,
        city: None,
    };

    for context in feature.context {
        if context.id.starts_with("country") {
            result.country = Some(context.text);
        } else if context.id.starts_with("region") {
            result.state = Some(context.text);
        } else if context.id.starts_with("place") {
            result.city = Some(context.text);
        }
    }

    Ok(Some(result))
}

impl Geocoder for MapboxGeocoder {
    fn is_available(&self) -> bool {
        self.enabled && self.token.is_some()
    }

    async fn lookup(&self, raw_location: &str) -> Result<Option<GeocodeResult>, GeocodeError> {
        let Some(token) = self.token.as_deref() else {
            return Err(GeocodeError::MissingToken);
        };

        let mut attempt = 0;
        loop {
            match self.lookup_once(raw_location, token).await {
                Err(e) if e.is_retryable() && attempt < MAX_RETRIES => {
                    let delay = RETRY_BASE_DELAY * 2u32.pow(attempt);
                    attempt += 1;
                    warn!(
                        location = raw_location,
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Geocoding request failed: {}",
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
                other => {
                    debug!(
                        location = raw_location,
                        found = matches!(other, Ok(Some(_))),
                        "Geocoding lookup finished"
                    );
                    return other;
                }
            }
        }
    }
}
