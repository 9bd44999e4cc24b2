// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication and authorization errors.
//!
//! Three layers, from the inside out:
//!
//! - [`KeySourceError`]: discovery / JWKS retrieval faults.
//! - [`ValidationError`]: why a bearer token did not produce an identity.
//!   These never reach the client; the gate degrades them to "anonymous".
//! - [`AuthError`]: the HTTP-visible outcome of an authorization check.
//!   Only this type implements `IntoResponse`.

use std::time::Duration;

use axum::{
    http::{header::WWW_AUTHENTICATE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Failure to obtain signing keys for an issuer.
#[derive(Debug, thiserror::Error)]
pub enum KeySourceError {
    /// The key source is misconfigured (e.g. a plaintext discovery URL).
    #[error("invalid key source configuration: {0}")]
    Config(String),
    /// Network or HTTP error while fetching metadata.
    #[error("metadata fetch failed: {0}")]
    Fetch(String),
    /// The fetch did not finish within the configured bound.
    #[error("metadata fetch timed out after {0:?}")]
    Timeout(Duration),
    /// The discovery document or key set could not be used.
    #[error("invalid metadata document: {0}")]
    InvalidDocument(String),
    /// No usable cache: never populated, or older than the staleness ceiling.
    #[error("signing keys unavailable for {0}")]
    Unavailable(String),
}

/// Why a bearer token failed to authenticate.
///
/// Variants are coarse on purpose: [`ValidationError::InvalidToken`] covers
/// every signature / issuer / audience / expiry failure. The specific check
/// that failed is only written to the debug log.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// Token lacks the header.payload structure or the payload is not JSON.
    #[error("token is malformed")]
    MalformedToken,
    /// No registered validator handles the token's issuer.
    #[error("no validator accepts the token issuer")]
    UnrecognizedIssuer,
    /// A validator recognized the issuer but rejected the token.
    #[error("token is invalid")]
    InvalidToken,
    /// Signing keys for the recognized issuer could not be obtained.
    #[error("signing keys unavailable: {0}")]
    KeySourceUnavailable(#[from] KeySourceError),
}

impl ValidationError {
    /// Short label used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::MalformedToken => "malformed_token",
            ValidationError::UnrecognizedIssuer => "unrecognized_issuer",
            ValidationError::InvalidToken => "invalid_token",
            ValidationError::KeySourceUnavailable(_) => "key_source_unavailable",
        }
    }
}

/// HTTP-visible authorization failure.
///
/// `Unauthorized` means "no identity". Both `Forbidden*` variants mean the
/// caller is known but lacks the permission.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No authenticated identity is attached to the request.
    #[error("Authentication is required")]
    Unauthorized,
    /// Identity lacks the required scope.
    #[error("Missing required scope '{required}'")]
    ForbiddenByScope { required: String },
    /// Identity failed a resource-level requirement.
    #[error("Requirement '{requirement}' is not satisfied")]
    ForbiddenByRequirement { requirement: &'static str },
    /// Internal error
    #[error("Internal authentication error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::Unauthorized => "unauthorized",
            AuthError::ForbiddenByScope { .. } => "insufficient_scope",
            AuthError::ForbiddenByRequirement { .. } => "requirement_not_met",
            AuthError::Internal(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
            AuthError::ForbiddenByScope { .. } | AuthError::ForbiddenByRequirement { .. } => {
                StatusCode::FORBIDDEN
            }
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// RFC 6750 challenge for the `WWW-Authenticate` header.
    fn challenge(&self) -> Option<String> {
        match self {
            AuthError::Unauthorized => Some("Bearer".to_string()),
            AuthError::ForbiddenByScope { required } => Some(format!(
                "Bearer error=\"insufficient_scope\", scope=\"{required}\""
            )),
            _ => None,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let challenge = self.challenge();
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        let mut response = (status, body).into_response();
        if let Some(value) = challenge.and_then(|c| HeaderValue::from_str(&c).ok()) {
            response.headers_mut().insert(WWW_AUTHENTICATE, value);
        }
        response
    }
}
