pub mod geocoder;
pub mod http_transport;
pub mod places_lookup;
