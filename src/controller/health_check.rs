use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::Serialize;

#[derive(Clone, Serialize, Debug)]
pub struct Health {
    pub status: &'static str,
    pub environment: String,
    pub version: &'static str,
}

pub fn router(environment: String) -> Router {
    let health = Health {
        status: "ok",
        environment,
        version: env!("CARGO_PKG_VERSION"),
    };

    Router::new()
        .route("/health", get(get_health_check))
        .route_layer(Extension(health))
}

/// Liveness probe, does not touch the database or upstream APIs
async fn get_health_check(
    Extension(health): Extension<Health>,
) -> Json<Health> {
    Json(health)
}
