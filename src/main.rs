use std::time::Duration;
use anyhow::Context;
use bb8_postgres::bb8::Pool;
use bb8_postgres::tokio_postgres::NoTls;
use bb8_postgres::PostgresConnectionManager;
use clap::Parser;
use dotenv::dotenv;
use tracing::info;
use crate::config::Config;
use crate::controller::AppState;
use crate::repositories::postgres_repo::PostgresConnectionRepo;
use crate::repositories::SessionRepo;
use crate::services::geocoder::GeocodingProvider;
use crate::services::http_transport::ReqwestTransport;
use crate::services::places_lookup::{LookupSettings, PlacesLookup};

pub mod config;
pub mod controller;
pub mod helpers;
pub mod models;
pub mod repositories;
pub mod services;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Config::parse();
    info!("Starting up in {} mode", config.environment);

    let manager = PostgresConnectionManager::new_from_stringlike(&config.database_url, NoTls)
        .context("Invalid DATABASE_URL")?;
    let postgres_connection = Pool::builder()
        .max_size(config.max_db_connections)
        .build(manager)
        .await
        .context("Failed to build postgres connection pool")?;

    let repo = PostgresConnectionRepo::new(postgres_connection);
    repo.migrate().await?;
    let purged = repo.delete_expired_sessions().await?;
    info!("Purged {} expired sessions", purged);

    let transport = ReqwestTransport::new(Duration::from_secs(config.http_timeout_secs))
        .context("Failed to build http client")?;
    let geocoder = GeocodingProvider::from_config(&config, transport.clone())?;
    info!("Geocoding addresses with {:?}", config.geocoder);
    let lookup = PlacesLookup::new(geocoder, transport, LookupSettings::from_config(&config)?);

    let app_state = AppState::new(repo, lookup, &config);
    controller::serve(app_state, &config).await
}
