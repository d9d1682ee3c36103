use std::sync::Arc;
use axum::extract::rejection::JsonRejection;
use axum::extract::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Router};
use serde::Serialize;
use serde_json::json;
use time::{Duration, OffsetDateTime};
use tracing::{info, warn};
use crate::controller::auth::CurrentUser;
use crate::models::forms::{LoginForm, SignupForm, ValidationErrors};
use crate::models::user::{NewUser, User};
use crate::repositories::{SessionRepo, UserRepo};

#[derive(Clone, Copy, Debug)]
pub struct AuthSettings {
    pub session_ttl: Duration,
}

pub fn router<R>(repo: Arc<R>, settings: AuthSettings) -> Router
where
    R: UserRepo + SessionRepo + 'static,
{
    Router::new()
        .route("/signup", post(signup::<R>))
        .route("/login", post(login::<R>))
        .route_layer(Extension(settings))
        .route_layer(Extension(repo))
}

/// Routes that only make sense with a session, gated by the caller.
pub fn session_router<R>(repo: Arc<R>) -> Router
where
    R: SessionRepo + 'static,
{
    Router::new()
        .route("/logout", post(logout::<R>))
        .route("/me", get(me))
        .route_layer(Extension(repo))
}

#[derive(Serialize, Debug)]
pub struct AuthResponse {
    pub token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    pub user: User,
}

fn invalid_form(errors: ValidationErrors) -> Response {
    (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "errors": errors }))).into_response()
}

fn rejected_body(rejection: JsonRejection) -> Response {
    warn!("Rejected request body due to: {}", rejection);
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({ "errors": { "body": [rejection.body_text()] } })),
    ).into_response()
}

fn internal_error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong, please try again").into_response()
}

async fn start_session<R: SessionRepo>(repo: &R, user: User, ttl: Duration, status: StatusCode) -> Response {
    match repo.create_session(user.uid, ttl).await {
        Ok(session) => (
            status,
            Json(AuthResponse {
                token: session.token,
                expires_at: session.expires_at,
                user,
            }),
        ).into_response(),
        Err(e) => {
            warn!("Failed to create session for user: {}, due to: {}", user.email, e);
            internal_error()
        }
    }
}

pub async fn signup<R>(
    Extension(repo): Extension<Arc<R>>,
    Extension(settings): Extension<AuthSettings>,
    payload: Result<Json<SignupForm>, JsonRejection>,
) -> Response
where
    R: UserRepo + SessionRepo + 'static,
{
    let Json(form) = match payload {
        Ok(form) => form,
        Err(rejection) => return rejected_body(rejection),
    };
    if let Err(errors) = form.validate() {
        return invalid_form(errors);
    }

    // argon2 blocks for tens of milliseconds
    let new_user = tokio::task::spawn_blocking(move || {
        NewUser::new(&form.first_name, &form.last_name, &form.email, &form.password)
    }).await;
    let new_user = match new_user {
        Ok(Ok(new_user)) => new_user,
        Ok(Err(e)) => {
            warn!("Failed to hash password due to: {}", e);
            return internal_error();
        }
        Err(e) => {
            warn!("Password hashing task failed due to: {}", e);
            return internal_error();
        }
    };

    match repo.create_user(&new_user).await {
        Ok(Some(user)) => {
            info!("Created account for user: {}", user.email);
            start_session(repo.as_ref(), user, settings.session_ttl, StatusCode::CREATED).await
        }
        Ok(None) => (
            StatusCode::CONFLICT,
            Json(json!({ "errors": { "email": ["An account with that email already exists."] } })),
        ).into_response(),
        Err(e) => {
            warn!("Something went wrong creating user: {}, due to: {}", new_user.email, e);
            internal_error()
        }
    }
}

pub async fn login<R>(
    Extension(repo): Extension<Arc<R>>,
    Extension(settings): Extension<AuthSettings>,
    payload: Result<Json<LoginForm>, JsonRejection>,
) -> Response
where
    R: UserRepo + SessionRepo + 'static,
{
    let Json(form) = match payload {
        Ok(form) => form,
        Err(rejection) => return rejected_body(rejection),
    };
    if let Err(errors) = form.validate() {
        return invalid_form(errors);
    }

    let user = match repo.try_get_user_by_email(&form.email).await {
        Ok(user) => user,
        Err(e) => {
            warn!("Something went wrong retrieving user: {}, due to: {}", form.email, e);
            return internal_error();
        }
    };

    let Some(user) = user else {
        return (StatusCode::UNAUTHORIZED, "Invalid email or password").into_response();
    };

    let password = form.password;
    let verified = tokio::task::spawn_blocking(move || {
        let ok = user.check_password(&password);
        (user, ok)
    }).await;

    match verified {
        Ok((user, true)) => start_session(repo.as_ref(), user, settings.session_ttl, StatusCode::OK).await,
        Ok((_, false)) => (StatusCode::UNAUTHORIZED, "Invalid email or password").into_response(),
        Err(e) => {
            warn!("Password verification task failed due to: {}", e);
            internal_error()
        }
    }
}

pub async fn logout<R>(
    Extension(repo): Extension<Arc<R>>,
    Extension(current): Extension<CurrentUser>,
) -> Response
where
    R: SessionRepo + 'static,
{
    match repo.delete_session(&current.token).await {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            warn!("Failed to end session for user: {}, due to: {}", current.user.email, e);
            internal_error()
        }
    }
}

pub async fn me(
    Extension(current): Extension<CurrentUser>,
) -> Json<User> {
    Json(current.user)
}
