use std::net::SocketAddr;
use std::sync::Arc;
use anyhow::Context;
use axum::http::HeaderValue;
use axum::middleware;
use axum::Router;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use time::Duration;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tracing::info;
use crate::config::Config;
use crate::controller::auth::require_session;
use crate::controller::auth_controller::AuthSettings;
use crate::helpers::handler_404::page_not_found_handler;
use crate::repositories::{SessionRepo, UserRepo};
use crate::services::geocoder::Geocoder;
use crate::services::http_transport::HttpTransport;
use crate::services::places_lookup::PlacesLookup;

pub mod auth;
pub mod auth_controller;
pub mod health_check;
pub mod places_controller;

pub struct AppState<R, G, T> {
    pub repo: Arc<R>,
    pub lookup: Arc<PlacesLookup<G, T>>,
    pub auth: AuthSettings,
    pub environment: String,
}

impl<R, G, T> Clone for AppState<R, G, T> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
            lookup: Arc::clone(&self.lookup),
            auth: self.auth,
            environment: self.environment.clone(),
        }
    }
}

impl<R, G, T> AppState<R, G, T> {
    pub fn new(repo: R, lookup: PlacesLookup<G, T>, config: &Config) -> Self {
        Self {
            repo: Arc::new(repo),
            lookup: Arc::new(lookup),
            auth: AuthSettings {
                session_ttl: Duration::hours(config.session_ttl_hours),
            },
            environment: config.environment.clone(),
        }
    }
}

pub async fn serve<R, G, T>(
    app_state: AppState<R, G, T>,
    config: &Config,
) -> anyhow::Result<()>
where
    R: UserRepo + SessionRepo + 'static,
    G: Geocoder + 'static,
    T: HttpTransport + 'static,
{
    let origins = config
        .origin_urls
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<HeaderValue>().with_context(|| format!("Invalid origin url: {}", s)))
        .collect::<anyhow::Result<Vec<HeaderValue>>>()?;

    let application = router_endpoints(app_state)
        .layer(
            ServiceBuilder::new()
                .layer(CompressionLayer::new())
                .layer(
                    CorsLayer::new()
                        .allow_methods([
                            Method::GET,
                            Method::POST,
                            Method::OPTIONS
                        ])
                        .allow_origin(origins)
                        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
                )
        );

    let address: SocketAddr = config
        .bind_address
        .parse()
        .with_context(|| format!("Invalid bind address: {}", config.bind_address))?;
    info!("API server listening on: {}", address);
    axum::Server::bind(&address)
        .serve(application.into_make_service())
        .await
        .context("Error spinning up the API server")
}

pub fn router_endpoints<R, G, T>(app_state: AppState<R, G, T>) -> Router
where
    R: UserRepo + SessionRepo + 'static,
    G: Geocoder + 'static,
    T: HttpTransport + 'static,
{
    let session_layer = middleware::from_fn_with_state(
        Arc::clone(&app_state.repo),
        require_session::<R, _>,
    );

    let auth = auth_controller::router(Arc::clone(&app_state.repo), app_state.auth)
        .merge(
            auth_controller::session_router(Arc::clone(&app_state.repo))
                .route_layer(session_layer.clone())
        );
    let places = places_controller::router(app_state.lookup)
        .route_layer(session_layer);

    health_check::router(app_state.environment)
        .nest("/auth", auth)
        .nest("/places", places)
        .fallback(page_not_found_handler)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use url::Url;
    use super::*;
    use crate::repositories::memory_repo::MemoryRepo;
    use crate::services::geocoder::NominatimGeocoder;
    use crate::services::http_transport::mock::MockTransport;
    use crate::services::places_lookup::LookupSettings;

    type TestState = AppState<MemoryRepo, NominatimGeocoder<Arc<MockTransport>>, Arc<MockTransport>>;

    fn test_state(geocode: &Arc<MockTransport>, geosearch: &Arc<MockTransport>) -> TestState {
        let geocoder = NominatimGeocoder::new(
            Arc::clone(geocode),
            Url::parse("https://nominatim.test/search").unwrap(),
        );
        AppState {
            repo: Arc::new(MemoryRepo::default()),
            lookup: Arc::new(PlacesLookup::new(geocoder, Arc::clone(geosearch), LookupSettings::default())),
            auth: AuthSettings {
                session_ttl: Duration::hours(1),
            },
            environment: "test".to_string(),
        }
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Vec<u8>) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = app.clone().oneshot(request.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        (status, bytes.to_vec())
    }

    fn json_body(bytes: &[u8]) -> Value {
        serde_json::from_slice(bytes).unwrap()
    }

    fn signup_body() -> Value {
        json!({
            "first_name": "ada",
            "last_name": "lovelace",
            "email": "Ada@Example.com",
            "password": "engine1"
        })
    }

    #[tokio::test]
    async fn health_check_is_public() {
        let app = router_endpoints(test_state(&Default::default(), &Default::default()));
        let (status, body) = send(&app, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_body(&body)["status"], "ok");
        assert_eq!(json_body(&body)["environment"], "test");
    }

    #[tokio::test]
    async fn unknown_route_falls_back_to_404() {
        let app = router_endpoints(test_state(&Default::default(), &Default::default()));
        let (status, _) = send(&app, Method::GET, "/nope", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn places_require_a_session() {
        let geocode = Arc::new(MockTransport::default());
        let geosearch = Arc::new(MockTransport::default());
        let app = router_endpoints(test_state(&geocode, &geosearch));

        let (status, _) = send(&app, Method::POST, "/places", None, Some(json!({ "address": "Main St" }))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&app, Method::GET, "/places", Some("bogus"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(geocode.calls(), 0);
    }

    #[tokio::test]
    async fn signup_search_logout_flow() {
        let geocode = Arc::new(MockTransport::with_json(json!([{ "lat": "37.422", "lon": "-122.084" }])));
        let geosearch = Arc::new(MockTransport::with_json(json!({
            "query": { "geosearch": [
                { "title": "Example Park", "dist": 240, "lat": 37.42, "lon": -122.08 }
            ] }
        })));
        let state = test_state(&geocode, &geosearch);
        let repo = Arc::clone(&state.repo);
        let app = router_endpoints(state);

        let (status, body) = send(&app, Method::POST, "/auth/signup", None, Some(signup_body())).await;
        assert_eq!(status, StatusCode::CREATED);
        let body = json_body(&body);
        assert_eq!(body["user"]["first_name"], "Ada");
        assert_eq!(body["user"]["email"], "ada@example.com");
        assert!(body["user"].get("password").is_none());
        let token = body["token"].as_str().unwrap().to_string();

        let (status, body) = send(&app, Method::GET, "/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_body(&body)["last_name"], "Lovelace");

        let (status, body) = send(
            &app,
            Method::POST,
            "/places",
            Some(&token),
            Some(json!({ "address": "1600 Amphitheatre Parkway" })),
        ).await;
        assert_eq!(status, StatusCode::OK);
        let body = json_body(&body);
        assert_eq!(body["places"][0]["name"], "Example Park");
        assert_eq!(body["places"][0]["walking_time_minutes"], 3);

        let (status, _) = send(&app, Method::POST, "/auth/logout", Some(&token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(repo.session_count(), 0);

        let (status, _) = send(&app, Method::GET, "/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn duplicate_signup_conflicts() {
        let app = router_endpoints(test_state(&Default::default(), &Default::default()));

        let (status, _) = send(&app, Method::POST, "/auth/signup", None, Some(signup_body())).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, body) = send(&app, Method::POST, "/auth/signup", None, Some(signup_body())).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(
            json_body(&body)["errors"]["email"][0],
            "An account with that email already exists."
        );
    }

    #[tokio::test]
    async fn invalid_signup_lists_field_errors() {
        let app = router_endpoints(test_state(&Default::default(), &Default::default()));
        let (status, body) = send(
            &app,
            Method::POST,
            "/auth/signup",
            None,
            Some(json!({ "email": "nope", "password": "123" })),
        ).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let errors = &json_body(&body)["errors"];
        assert_eq!(errors["first_name"][0], "Please enter your first name.");
        assert_eq!(errors["email"][0], "Please enter a valid email address.");
        assert_eq!(errors["password"][0], "Password must be at least 6 characters.");
    }

    #[tokio::test]
    async fn malformed_auth_bodies_get_form_errors() {
        let app = router_endpoints(test_state(&Default::default(), &Default::default()));

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/auth/login")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        assert!(json_body(&bytes)["errors"]["body"][0].is_string());

        let (status, body) = send(&app, Method::POST, "/auth/signup", None, None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(json_body(&body)["errors"]["body"][0].is_string());
    }

    #[tokio::test]
    async fn login_checks_password() {
        let app = router_endpoints(test_state(&Default::default(), &Default::default()));
        send(&app, Method::POST, "/auth/signup", None, Some(signup_body())).await;

        let (status, _) = send(
            &app,
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "ada@example.com", "password": "wrong-one" })),
        ).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(
            &app,
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "nobody@example.com", "password": "engine1" })),
        ).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(
            &app,
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "ADA@example.com", "password": "engine1" })),
        ).await;
        assert_eq!(status, StatusCode::OK);
        assert!(json_body(&body)["token"].as_str().is_some());
    }
}
