//! Address to coordinate resolution.
//!
//! Two providers are supported: the Google Geocoding API (needs an API key)
//! and OpenStreetMap's Nominatim (keyless, subject to its usage policy).
//! Each resolve makes exactly one request and never retries.

use std::future::Future;
use anyhow::{anyhow, Context};
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use url::Url;
use crate::config::{Config, GeocoderKind};
use crate::models::place::Coordinates;
use crate::services::http_transport::{HttpResponse, HttpTransport, TransportError};

pub const GOOGLE_GEOCODE_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/geocode/json";
pub const NOMINATIM_SEARCH_ENDPOINT: &str = "https://nominatim.openstreetmap.org/search";

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("no address given")]
    EmptyAddress,
    #[error("no match found for address '{0}'")]
    NoMatch(String),
    #[error("geocoding provider answered {status}: {message}")]
    Provider { status: String, message: String },
    #[error("malformed geocoding response: {0}")]
    Malformed(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub trait Geocoder: Send + Sync {
    fn resolve(&self, address: &str) -> impl Future<Output = Result<Coordinates, GeocodeError>> + Send;
}

fn ensure_ok(response: &HttpResponse) -> Result<(), GeocodeError> {
    if response.status == StatusCode::OK {
        Ok(())
    } else {
        Err(GeocodeError::Provider {
            status: response.status.to_string(),
            message: response.body.chars().take(200).collect(),
        })
    }
}

#[derive(Deserialize, Debug)]
struct GoogleGeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GoogleGeocodeResult>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Deserialize, Debug)]
struct GoogleGeocodeResult {
    geometry: GoogleGeometry,
}

#[derive(Deserialize, Debug)]
struct GoogleGeometry {
    location: Coordinates,
}

pub struct GoogleGeocoder<T> {
    transport: T,
    endpoint: Url,
    api_key: String,
}

impl<T: HttpTransport> GoogleGeocoder<T> {
    pub fn new(transport: T, endpoint: Url, api_key: String) -> Self {
        Self {
            transport,
            endpoint,
            api_key,
        }
    }
}

impl<T: HttpTransport> Geocoder for GoogleGeocoder<T> {
    async fn resolve(&self, address: &str) -> Result<Coordinates, GeocodeError> {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("address", address)
            .append_pair("key", &self.api_key);

        let response = self.transport.get(url).await?;
        ensure_ok(&response)?;
        let body: GoogleGeocodeResponse = serde_json::from_str(&response.body)
            .map_err(|e| GeocodeError::Malformed(e.to_string()))?;

        match body.status.as_str() {
            "OK" => body
                .results
                .into_iter()
                .next()
                .map(|result| result.geometry.location)
                .ok_or_else(|| GeocodeError::NoMatch(address.to_string())),
            "ZERO_RESULTS" => Err(GeocodeError::NoMatch(address.to_string())),
            _ => Err(GeocodeError::Provider {
                message: body.error_message.unwrap_or_default(),
                status: body.status,
            }),
        }
    }
}

#[derive(Deserialize, Debug)]
struct NominatimPlace {
    lat: String,
    lon: String,
}

pub struct NominatimGeocoder<T> {
    transport: T,
    endpoint: Url,
}

impl<T: HttpTransport> NominatimGeocoder<T> {
    pub fn new(transport: T, endpoint: Url) -> Self {
        Self { transport, endpoint }
    }
}

impl<T: HttpTransport> Geocoder for NominatimGeocoder<T> {
    async fn resolve(&self, address: &str) -> Result<Coordinates, GeocodeError> {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("q", address)
            .append_pair("format", "json")
            .append_pair("limit", "1");

        let response = self.transport.get(url).await?;
        ensure_ok(&response)?;
        let places: Vec<NominatimPlace> = serde_json::from_str(&response.body)
            .map_err(|e| GeocodeError::Malformed(e.to_string()))?;

        let place = places
            .into_iter()
            .next()
            .ok_or_else(|| GeocodeError::NoMatch(address.to_string()))?;
        let lat = place.lat.parse::<f64>()
            .map_err(|_| GeocodeError::Malformed(format!("latitude '{}'", place.lat)))?;
        let lng = place.lon.parse::<f64>()
            .map_err(|_| GeocodeError::Malformed(format!("longitude '{}'", place.lon)))?;

        Ok(Coordinates::new(lat, lng))
    }
}

/// The geocoder picked at startup.
pub enum GeocodingProvider<T> {
    Google(GoogleGeocoder<T>),
    Nominatim(NominatimGeocoder<T>),
}

impl<T: HttpTransport> GeocodingProvider<T> {
    pub fn from_config(config: &Config, transport: T) -> anyhow::Result<Self> {
        match config.geocoder {
            GeocoderKind::Google => {
                let api_key = config
                    .google_api_key
                    .clone()
                    .filter(|key| !key.trim().is_empty())
                    .ok_or_else(|| anyhow!("GOOGLE_API_KEY must be set to use the google geocoder"))?;
                let endpoint = Url::parse(GOOGLE_GEOCODE_ENDPOINT)
                    .context("Invalid google geocode endpoint")?;
                Ok(Self::Google(GoogleGeocoder::new(transport, endpoint, api_key)))
            }
            GeocoderKind::Nominatim => {
                let endpoint = Url::parse(NOMINATIM_SEARCH_ENDPOINT)
                    .context("Invalid nominatim endpoint")?;
                Ok(Self::Nominatim(NominatimGeocoder::new(transport, endpoint)))
            }
        }
    }
}

impl<T: HttpTransport> Geocoder for GeocodingProvider<T> {
    async fn resolve(&self, address: &str) -> Result<Coordinates, GeocodeError> {
        let resolved = match self {
            Self::Google(geocoder) => geocoder.resolve(address).await,
            Self::Nominatim(geocoder) => geocoder.resolve(address).await,
        };
        if let Ok(coordinates) = &resolved {
            debug!("Resolved '{}' to {}, {}", address, coordinates.lat, coordinates.lng);
        }
        resolved
    }
}
