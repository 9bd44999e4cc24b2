// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User endpoints.

use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::{Auth, Identity, Role};

/// Response for GET /v1/users/me
#[derive(Debug, Serialize, ToSchema)]
pub struct UserMeResponse {
    /// Stable user id (the token subject)
    pub user_id: String,
    /// Issuer that authenticated the user
    pub issuer: String,
    /// Effective marketplace role
    pub role: Role,
    /// Whether the user may sell
    pub is_seller: bool,
    /// Granted scopes, sorted
    pub scopes: Vec<String>,
    /// Token expiry (Unix timestamp)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl From<&Identity> for UserMeResponse {
    fn from(identity: &Identity) -> Self {
        Self {
            user_id: identity.subject().to_string(),
            issuer: identity.issuer().to_string(),
            role: identity.role(),
            is_seller: identity.is_seller(),
            scopes: identity
                .scopes()
                .iter()
                .map(|scope| scope.to_string())
                .collect(),
            expires_at: identity.expires_at(),
        }
    }
}

/// Get the current authenticated user's information.
///
/// Returns the identity, role and effective scopes of the caller.
#[utoipa::path(
    get,
    path = "/v1/users/me",
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "User information", body = UserMeResponse),
        (status = 401, description = "Unauthorized - invalid or missing token"),
    )
)]
pub async fn get_current_user(Auth(identity): Auth) -> Json<UserMeResponse> {
    Json((&identity).into())
}
