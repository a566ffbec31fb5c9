//! # Auth API Handlers
//!
//! Reports whether the caller is signed in and, if so, who they are.

use axum::response::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::{CurrentUser, UserIdentity};

/// Sign-in status of the caller
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthStatus {
    pub authorized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserIdentity>,
}

#[utoipa::path(
    get,
    path = "/auth",
    responses(
        (status = 200, description = "Sign-in status", body = AuthStatus, example = json!({
            "authorized": true,
            "user": {"id": "185804764220139124118", "email": "mentor@example.com"}
        }))
    ),
    tag = "auth"
)]
pub async fn auth_status(CurrentUser(user): CurrentUser) -> Json<AuthStatus> {
    Json(AuthStatus {
        authorized: user.is_some(),
        user,
    })
}
