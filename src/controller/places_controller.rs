use std::sync::Arc;
use axum::extract::rejection::JsonRejection;
use axum::extract::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Router};
use serde_json::json;
use tracing::warn;
use crate::models::forms::AddressForm;
use crate::models::place::{Coordinates, NearbyPlaces};
use crate::services::geocoder::{GeocodeError, Geocoder};
use crate::services::http_transport::HttpTransport;
use crate::services::places_lookup::{PlacesError, PlacesLookup};

pub fn router<G, T>(lookup: Arc<PlacesLookup<G, T>>) -> Router
where
    G: Geocoder + 'static,
    T: HttpTransport + 'static,
{
    Router::new()
        .route("/", get(home).post(search_places::<G, T>))
        .route_layer(Extension(lookup))
}

/// Nothing searched yet: an empty list around the default map centre.
pub async fn home() -> Json<NearbyPlaces> {
    Json(NearbyPlaces {
        coordinates: Coordinates::DEFAULT_HOME,
        places: Vec::new(),
    })
}

pub async fn search_places<G, T>(
    Extension(lookup): Extension<Arc<PlacesLookup<G, T>>>,
    payload: Result<Json<AddressForm>, JsonRejection>,
) -> Response
where
    G: Geocoder + 'static,
    T: HttpTransport + 'static,
{
    let form = match payload {
        Ok(Json(form)) => form,
        Err(rejection) => {
            warn!("Rejected places search body due to: {}", rejection);
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "errors": { "body": [rejection.body_text()] }, "places": [] })),
            ).into_response();
        }
    };
    if let Err(errors) = form.validate() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "errors": errors, "places": [] })),
        ).into_response();
    }

    match lookup.search(&form.address).await {
        Ok(nearby) => (StatusCode::OK, Json(nearby)).into_response(),
        Err(e) => {
            warn!("Places lookup for '{}' failed due to: {}", form.address, e);
            let (status, message) = failure_message(&e);
            (status, Json(json!({ "error": message, "places": [] }))).into_response()
        }
    }
}

fn failure_message(error: &PlacesError) -> (StatusCode, &'static str) {
    match error {
        PlacesError::Geocode(GeocodeError::EmptyAddress) => {
            (StatusCode::UNPROCESSABLE_ENTITY, "Please enter an address.")
        }
        PlacesError::Geocode(GeocodeError::NoMatch(_)) => {
            (StatusCode::UNPROCESSABLE_ENTITY, "We could not find that address, please try another one.")
        }
        PlacesError::Geocode(_) => {
            (StatusCode::BAD_GATEWAY, "The address lookup service is unavailable, please try again.")
        }
        PlacesError::Lookup(_) => {
            (StatusCode::BAD_GATEWAY, "Could not look up nearby places, please try again.")
        }
    }
}
