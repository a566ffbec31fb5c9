//! # Authentication and Authorization
//!
//! End users are authenticated by the identity-aware proxy in front of the service,
//! which forwards the signed-in user as `X-User-Id` / `X-User-Email` headers.
//! Operator endpoints use bearer tokens from configuration.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use serde::Serialize;
use subtle::ConstantTimeEq;
use utoipa::ToSchema;

use crate::config::AppConfig;
use crate::error::{ApiError, unauthorized};
use crate::server::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";

/// The signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct UserIdentity {
    #[schema(example = "185804764220139124118")]
    pub id: String,
    #[schema(example = "mentor@example.com")]
    pub email: Option<String>,
}

/// Optional user extractor; never rejects.
#[derive(Debug, Clone, Default)]
pub struct CurrentUser(pub Option<UserIdentity>);

/// User extractor that rejects anonymous requests with 401.
#[derive(Debug, Clone)]
pub struct RequireUser(pub UserIdentity);

impl FromRef<AppState> for Arc<AppConfig> {
    fn from_ref(app_state: &AppState) -> Self {
        Arc::clone(&app_state.config)
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn identity_from_headers(headers: &HeaderMap) -> Option<UserIdentity> {
    let id = header_str(headers, USER_ID_HEADER)?;
    Some(UserIdentity {
        id: id.to_string(),
        email: header_str(headers, USER_EMAIL_HEADER).map(str::to_string),
    })
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(identity_from_headers(&parts.headers)))
    }
}

impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        identity_from_headers(&parts.headers)
            .map(Self)
            .ok_or_else(|| unauthorized(Some("Sign in to continue")))
    }
}

/// Operator bearer authentication middleware
pub async fn operator_auth(
    State(config): State<Arc<AppConfig>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(request.headers())?;
    validate_token(&config, token)?;

    tracing::info!(path = %request.uri().path(), "Authenticated operator request");
    Ok(next.run(request).await)
}

fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| unauthorized(Some("Missing Authorization header")))?
        .to_str()
        .map_err(|_| unauthorized(Some("Invalid Authorization header")))?;

    header
        .strip_prefix("Bearer ")
        .ok_or_else(|| unauthorized(Some("Authorization header must use Bearer scheme")))
}

fn validate_token(config: &AppConfig, token: &str) -> Result<(), ApiError> {
    let is_valid = config
        .operator_tokens
        .iter()
        .any(|configured| ConstantTimeEq::ct_eq(token.as_bytes(), configured.as_bytes()).into());

    if is_valid {
        Ok(())
    } else {
        Err(unauthorized(Some("Invalid bearer token")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode},
        routing::get,
    };
    use tower::ServiceExt;

    fn create_test_config() -> Arc<AppConfig> {
        Arc::new(AppConfig {
            operator_tokens: vec!["test-token-123".to_string(), "test-token-456".to_string()],
            ..Default::default()
        })
    }

    async fn run_operator_route(config: Arc<AppConfig>, request: Request<Body>) -> Response {
        async fn handler() -> &'static str {
            "OK"
        }

        Router::new()
            .route("/admin", get(handler))
            .layer(axum::middleware::from_fn_with_state(
                Arc::clone(&config),
                operator_auth,
            ))
            .with_state(config)
            .oneshot(request)
            .await
            .unwrap()
    }

    async fn run_user_route(request: Request<Body>) -> Response {
        async fn whoami(RequireUser(user): RequireUser) -> String {
            user.id
        }
        async fn maybe(CurrentUser(user): CurrentUser) -> String {
            user.map(|u| u.id).unwrap_or_else(|| "anonymous".to_string())
        }

        Router::new()
            .route("/whoami", get(whoami))
            .route("/maybe", get(maybe))
            .oneshot(request)
            .await
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn missing_auth_header_returns_401() {
        let request = Request::builder().uri("/admin").body(Body::empty()).unwrap();

        let response = run_operator_route(create_test_config(), request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn invalid_auth_scheme_returns_401() {
        let request = Request::builder()
            .uri("/admin")
            .header("Authorization", "Basic dGVzdDoxMjM=")
            .body(Body::empty())
            .unwrap();

        let response = run_operator_route(create_test_config(), request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn invalid_token_returns_401() {
        let request = Request::builder()
            .uri("/admin")
            .header("Authorization", "Bearer wrong-token")
            .body(Body::empty())
            .unwrap();

        let response = run_operator_route(create_test_config(), request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn every_configured_token_is_accepted() {
        let config = create_test_config();
        for candidate in ["test-token-123", "test-token-456"] {
            let request = Request::builder()
                .uri("/admin")
                .header("Authorization", format!("Bearer {}", candidate))
                .body(Body::empty())
                .unwrap();

            let response = run_operator_route(Arc::clone(&config), request).await;
            assert_eq!(response.status(), StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn anonymous_user_is_rejected_where_required() {
        let request = Request::builder().uri("/whoami").body(Body::empty()).unwrap();

        let response = run_user_route(request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn forwarded_user_is_extracted() {
        let request = Request::builder()
            .uri("/whoami")
            .header("X-User-Id", "user-1")
            .header("X-User-Email", "user@example.com")
            .body(Body::empty())
            .unwrap();

        let response = run_user_route(request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "user-1");
    }

    #[tokio::test]
    async fn blank_user_header_counts_as_anonymous() {
        let request = Request::builder()
            .uri("/maybe")
            .header("X-User-Id", "   ")
            .body(Body::empty())
            .unwrap();

        let response = run_user_route(request).await;
        assert_eq!(body_text(response).await, "anonymous");
    }

    #[test]
    fn email_is_optional() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, "user-2".parse().unwrap());

        let identity = identity_from_headers(&headers).unwrap();
        assert_eq!(identity.id, "user-2");
        assert!(identity.email.is_none());
    }
}
