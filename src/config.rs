use clap::{Parser, ValueEnum};
use crate::services::places_lookup::{DEFAULT_GEOSEARCH_ENDPOINT, DEFAULT_REFERENCE_BASE_URL};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeocoderKind {
    Google,
    Nominatim,
}

#[derive(Parser, Clone, Debug)]
pub struct Config {
    #[clap(env, long, default_value = "development")]
    pub environment: String,

    #[clap(env, long)]
    pub database_url: String,

    #[clap(env, long, default_value = "16")]
    pub max_db_connections: u32,

    /// Comma separated list of origins allowed by CORS
    #[clap(env, long, default_value = "http://localhost:8080")]
    pub origin_urls: String,

    #[clap(env, long, default_value = "127.0.0.1:3000")]
    pub bind_address: String,

    #[clap(env, long, value_enum, default_value = "nominatim")]
    pub geocoder: GeocoderKind,

    /// Required when `geocoder` is `google`
    #[clap(env, long)]
    pub google_api_key: Option<String>,

    #[clap(env, long, default_value = DEFAULT_GEOSEARCH_ENDPOINT)]
    pub geosearch_endpoint: String,

    #[clap(env, long, default_value = DEFAULT_REFERENCE_BASE_URL)]
    pub reference_base_url: String,

    #[clap(env, long, default_value = "10")]
    pub http_timeout_secs: u64,

    #[clap(env, long, default_value = "24")]
    pub session_ttl_hours: i64,
}
