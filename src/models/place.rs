use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    /// Where the map is centred before the user has searched for anything.
    pub const DEFAULT_HOME: Coordinates = Coordinates {
        lat: 37.4221,
        lng: -122.0844,
    };

    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct PlaceResult {
    pub name: String,
    pub reference_url: String,
    pub walking_time_minutes: u32,
    pub lat: f64,
    pub lng: f64,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct NearbyPlaces {
    pub coordinates: Coordinates,
    pub places: Vec<PlaceResult>,
}
