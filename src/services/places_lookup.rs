//! Nearby places: geocode an address, ask the geosearch API what is around
//! it and annotate every hit with an estimated walking time.

use anyhow::Context;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;
use crate::config::Config;
use crate::models::place::{Coordinates, NearbyPlaces, PlaceResult};
use crate::services::geocoder::{GeocodeError, Geocoder};
use crate::services::http_transport::{HttpTransport, TransportError};

pub const SEARCH_RADIUS_METERS: u32 = 5000;
pub const RESULT_LIMIT: u32 = 20;
/// 80 meters is one minute of walking.
pub const METERS_PER_MINUTE: f64 = 80.0;

pub const DEFAULT_GEOSEARCH_ENDPOINT: &str = "https://en.wikipedia.org/w/api.php";
pub const DEFAULT_REFERENCE_BASE_URL: &str = "https://en.wikipedia.org/wiki/";

#[derive(Debug, Error)]
pub enum LookupError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("geosearch answered with status {0}")]
    Status(StatusCode),
    #[error("malformed geosearch response: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum PlacesError {
    #[error("could not resolve address: {0}")]
    Geocode(#[from] GeocodeError),
    #[error("could not look up nearby places: {0}")]
    Lookup(#[from] LookupError),
}

#[derive(Deserialize, Debug)]
struct GeosearchResponse {
    query: GeosearchQuery,
}

#[derive(Deserialize, Debug)]
struct GeosearchQuery {
    geosearch: Vec<GeosearchCandidate>,
}

#[derive(Deserialize, Debug)]
struct GeosearchCandidate {
    title: String,
    dist: f64,
    lat: f64,
    lon: f64,
}

#[derive(Clone, Debug)]
pub struct LookupSettings {
    pub geosearch_endpoint: Url,
    pub reference_base_url: Url,
}

impl LookupSettings {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            geosearch_endpoint: Url::parse(&config.geosearch_endpoint)
                .context("Invalid GEOSEARCH_ENDPOINT")?,
            reference_base_url: Url::parse(&config.reference_base_url)
                .context("Invalid REFERENCE_BASE_URL")?,
        })
    }
}

#[cfg(test)]
impl Default for LookupSettings {
    fn default() -> Self {
        Self {
            geosearch_endpoint: Url::parse(DEFAULT_GEOSEARCH_ENDPOINT).expect("valid default endpoint"),
            reference_base_url: Url::parse(DEFAULT_REFERENCE_BASE_URL).expect("valid default base url"),
        }
    }
}

pub struct PlacesLookup<G, T> {
    geocoder: G,
    transport: T,
    settings: LookupSettings,
}

impl<G: Geocoder, T: HttpTransport> PlacesLookup<G, T> {
    pub fn new(geocoder: G, transport: T, settings: LookupSettings) -> Self {
        Self {
            geocoder,
            transport,
            settings,
        }
    }

    pub async fn resolve_coordinates(&self, address: &str) -> Result<Coordinates, GeocodeError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(GeocodeError::EmptyAddress);
        }
        self.geocoder.resolve(address).await
    }

    pub async fn lookup_nearby(&self, coordinates: Coordinates) -> Result<Vec<PlaceResult>, LookupError> {
        let url = geosearch_url(&self.settings.geosearch_endpoint, coordinates);
        let response = self.transport.get(url).await?;
        if response.status != StatusCode::OK {
            return Err(LookupError::Status(response.status));
        }

        let body: GeosearchResponse = serde_json::from_str(&response.body)?;
        let places = body
            .query
            .geosearch
            .into_iter()
            .map(|candidate| PlaceResult {
                reference_url: reference_url(&self.settings.reference_base_url, &candidate.title),
                walking_time_minutes: meters_to_walking_time(candidate.dist),
                name: candidate.title,
                lat: candidate.lat,
                lng: candidate.lon,
            })
            .collect::<Vec<PlaceResult>>();

        debug!(
            "Geosearch around {}, {} returned {} places",
            coordinates.lat,
            coordinates.lng,
            places.len()
        );
        Ok(places)
    }

    pub async fn query(&self, address: &str) -> Result<Vec<PlaceResult>, PlacesError> {
        Ok(self.search(address).await?.places)
    }

    /// Like `query`, but keeps the resolved coordinates for the caller.
    pub async fn search(&self, address: &str) -> Result<NearbyPlaces, PlacesError> {
        let coordinates = self.resolve_coordinates(address).await?;
        let places = self.lookup_nearby(coordinates).await?;
        info!("Found {} places near '{}'", places.len(), address.trim());

        Ok(NearbyPlaces { coordinates, places })
    }
}

pub fn meters_to_walking_time(meters: f64) -> u32 {
    if !meters.is_finite() || meters <= 0.0 {
        return 0;
    }
    (meters / METERS_PER_MINUTE).floor() as u32
}

/// Appends the title to `base` as one percent-encoded path segment, with
/// spaces turned into underscores.
pub fn reference_url(base: &Url, title: &str) -> String {
    let slug = title.replace(' ', "_");
    let mut url = base.clone();
    match url.path_segments_mut() {
        Ok(mut segments) => {
            segments.pop_if_empty().push(&slug);
        }
        // cannot-be-a-base urls such as `mailto:` have no path to append to
        Err(()) => return format!("{}{}", base, slug),
    }
    url.to_string()
}

fn geosearch_url(endpoint: &Url, coordinates: Coordinates) -> Url {
    let mut url = endpoint.clone();
    url.query_pairs_mut()
        .append_pair("action", "query")
        .append_pair("list", "geosearch")
        .append_pair("gsradius", &SEARCH_RADIUS_METERS.to_string())
        .append_pair("gscoord", &format!("{}|{}", coordinates.lat, coordinates.lng))
        .append_pair("gslimit", &RESULT_LIMIT.to_string())
        .append_pair("format", "json");
    url
}
