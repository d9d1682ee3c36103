use std::sync::Arc;
use axum::extract::State;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use reqwest::header::AUTHORIZATION;
use tracing::warn;
use crate::models::user::User;
use crate::repositories::SessionRepo;

/// The logged in user, put into request extensions by `require_session`.
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub user: User,
    pub token: String,
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    if scheme.eq_ignore_ascii_case("Bearer") && !token.is_empty() && !token.contains(' ') {
        Some(token)
    } else {
        None
    }
}

pub async fn require_session<R, B>(
    State(repo): State<Arc<R>>,
    mut request: Request<B>,
    next: Next<B>,
) -> Response
where
    R: SessionRepo + 'static,
    B: Send + 'static,
{
    let Some(token) = bearer_token(request.headers()).map(str::to_owned) else {
        return (StatusCode::UNAUTHORIZED, "Please log in first").into_response();
    };

    match repo.try_get_session_user(&token).await {
        Ok(Some(user)) => {
            request.extensions_mut().insert(CurrentUser { user, token });
            next.run(request).await
        }
        Ok(None) => (StatusCode::UNAUTHORIZED, "Your session has expired, please log in again").into_response(),
        Err(e) => {
            warn!("Failed to look up session due to: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong, please try again").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn parses_bearer_tokens() {
        assert_eq!(bearer_token(&headers("Bearer abc123")), Some("abc123"));
        assert_eq!(bearer_token(&headers("bearer abc123")), Some("abc123"));
    }

    #[test]
    fn rejects_other_schemes_and_garbage() {
        assert_eq!(bearer_token(&HeaderMap::new()), None);
        assert_eq!(bearer_token(&headers("Basic dXNlcjpwYXNz")), None);
        assert_eq!(bearer_token(&headers("Bearer")), None);
        assert_eq!(bearer_token(&headers("Bearer a b")), None);
        assert_eq!(bearer_token(&headers("abc123")), None);
    }
}
