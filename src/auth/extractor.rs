// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors over the identity attached by the request gate.
//!
//! Use the `Auth` extractor in handlers to require authentication:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(identity): Auth) -> Result<impl IntoResponse, AuthError> {
//!     identity.require_scope("orders.read")?;
//!     // ...
//! }
//! ```
//!
//! These extractors never validate tokens themselves. They only read what
//! the gate inserted, so routes without the gate layer see every caller as
//! anonymous.

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, Extensions},
};

use super::claims::Identity;
use super::error::AuthError;

/// The identity attached to a request, if any.
pub fn current_identity(extensions: &Extensions) -> Option<&Identity> {
    extensions.get::<Identity>()
}

/// Extractor for authenticated callers. Rejects anonymous requests with 401.
pub struct Auth(pub Identity);

impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        current_identity(&parts.extensions)
            .cloned()
            .map(Auth)
            .ok_or(AuthError::Unauthorized)
    }
}

/// Optional authentication extractor.
///
/// Returns `None` for anonymous requests instead of rejecting.
pub struct OptionalAuth(pub Option<Identity>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalAuth(current_identity(&parts.extensions).cloned()))
    }
}
