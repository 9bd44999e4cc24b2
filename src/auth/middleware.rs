// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request gate: per-request authentication middleware for Axum.
//!
//! The gate reads `Authorization: Bearer <token>`, asks the registry for an
//! identity and, on success, inserts the [`Identity`] into the request
//! extensions. It never rejects a request. Anonymous requests flow through
//! and handlers decide whether anonymous access is allowed.
//!
//! ```rust,ignore
//! let app = Router::new()
//!     .route("/protected", get(handler))
//!     .layer(axum::middleware::from_fn_with_state(gate, request_gate));
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::claims::Identity;
use super::registry::AuthenticatorRegistry;

/// Default bound on authenticating one request.
pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(15);

const BEARER_SCHEME: &str = "bearer";

/// What the `Authorization` header held.
#[derive(Debug, PartialEq, Eq)]
pub enum BearerToken<'a> {
    /// No `Authorization` header.
    Missing,
    /// Header present but not a usable bearer credential.
    Malformed,
    Present(&'a str),
}

/// Extract the bearer token from request headers.
///
/// The scheme is matched case-insensitively. Other schemes, non-ASCII
/// values and empty tokens are reported as malformed.
pub fn extract_bearer(headers: &HeaderMap) -> BearerToken<'_> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return BearerToken::Missing;
    };
    let Ok(value) = value.to_str() else {
        return BearerToken::Malformed;
    };
    let Some((scheme, token)) = value.trim().split_once(' ') else {
        return BearerToken::Malformed;
    };
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) || token.is_empty() {
        return BearerToken::Malformed;
    }
    BearerToken::Present(token)
}

/// Shared state for [`request_gate`].
#[derive(Clone)]
pub struct RequestGate {
    registry: Arc<AuthenticatorRegistry>,
    timeout: Duration,
}

impl RequestGate {
    pub fn new(registry: Arc<AuthenticatorRegistry>) -> Self {
        Self {
            registry,
            timeout: DEFAULT_AUTH_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn registry(&self) -> &Arc<AuthenticatorRegistry> {
        &self.registry
    }

    /// Resolve the caller's identity from request headers.
    ///
    /// Bounded by the gate timeout and by `cancel` when given. Any failure,
    /// including a timeout, yields `None`.
    pub async fn identify(
        &self,
        headers: &HeaderMap,
        cancel: Option<&CancellationToken>,
    ) -> Option<Identity> {
        let token = match extract_bearer(headers) {
            BearerToken::Present(token) => token,
            BearerToken::Missing => return None,
            BearerToken::Malformed => {
                debug!("Malformed Authorization header, continuing anonymously");
                return None;
            }
        };

        let cancel = cancel.cloned().unwrap_or_default();
        let attempt = self.registry.authenticate_cancellable(token, &cancel);
        match tokio::time::timeout(self.timeout, attempt).await {
            Ok(identity) => identity,
            Err(_) => {
                debug!(timeout_ms = self.timeout.as_millis() as u64, "Authentication timed out");
                None
            }
        }
    }
}

/// Authentication middleware. Attaches an [`Identity`] when the bearer token
/// validates; otherwise passes the request through untouched.
///
/// A [`CancellationToken`] found in the request extensions aborts
/// authentication early.
pub async fn request_gate(
    State(gate): State<RequestGate>,
    mut request: Request,
    next: Next,
) -> Response {
    // Never trust an identity that arrived from outside the gate.
    request.extensions_mut().remove::<Identity>();

    let cancel = request.extensions().get::<CancellationToken>().cloned();
    if let Some(identity) = gate.identify(request.headers(), cancel.as_ref()).await {
        request.extensions_mut().insert(identity);
    }

    next.run(request).await
}
