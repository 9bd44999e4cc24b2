// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Generic OIDC validator.
//!
//! Handles any token whose issuer equals the configured authority or lives
//! under it (`<authority>/...`), which covers multi-tenant providers that
//! put a tenant path in `iss`.

use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::Algorithm;
use tracing::debug;

use super::claims::{normalize_subject, Identity};
use super::error::ValidationError;
use super::jwks::SigningKeySource;
use super::validator::{IssuerMatch, JwtVerifier, TokenValidator};

/// Claims tried, in order, when a token has no `sub`.
pub const DEFAULT_SUBJECT_FALLBACKS: [&str; 1] = ["user_id"];

pub struct OidcValidator {
    verifier: JwtVerifier,
    subject_fallbacks: Vec<String>,
}

impl OidcValidator {
    pub fn new(authority: &str, audience: Option<String>, keys: Arc<SigningKeySource>) -> Self {
        let authority = authority.trim().trim_end_matches('/');
        Self {
            verifier: JwtVerifier::new(
                format!("oidc:{authority}"),
                keys,
                authority,
                IssuerMatch::Prefix,
            )
            .with_audience(audience),
            subject_fallbacks: DEFAULT_SUBJECT_FALLBACKS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    /// Replace the claims used to synthesize a missing `sub`.
    pub fn with_subject_fallbacks(mut self, claims: Vec<String>) -> Self {
        self.subject_fallbacks = claims;
        self
    }

    /// Restrict the accepted signature algorithms. Symmetric ones are ignored.
    pub fn with_algorithms(mut self, algorithms: Vec<Algorithm>) -> Self {
        self.verifier = self.verifier.with_algorithms(algorithms);
        self
    }

    pub fn authority(&self) -> &str {
        self.verifier.issuer()
    }
}

#[async_trait]
impl TokenValidator for OidcValidator {
    fn name(&self) -> &str {
        self.verifier.name()
    }

    fn handles_issuer(&self, issuer: &str) -> bool {
        self.verifier.handles_issuer(issuer)
    }

    async fn validate(&self, token: &str) -> Result<Identity, ValidationError> {
        let mut claims = self.verifier.verify(token).await?;

        if normalize_subject(&mut claims, &self.subject_fallbacks).is_none() {
            debug!(validator = %self.name(), "Token has no usable subject claim");
            return Err(ValidationError::InvalidToken);
        }

        Identity::from_claims(claims).ok_or(ValidationError::InvalidToken)
    }

    fn key_source(&self) -> &Arc<SigningKeySource> {
        self.verifier.keys()
    }
}
