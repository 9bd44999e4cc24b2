// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Firebase Authentication ID token validator.
//!
//! Firebase ID tokens are issued by `https://securetoken.google.com/<project>`
//! with the project id as audience, are always RS256, and carry the user id
//! in `user_id` (mirrored into `sub`).

use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::Algorithm;
use serde_json::Value;
use tracing::debug;

use super::claims::{normalize_subject, Identity};
use super::error::ValidationError;
use super::jwks::SigningKeySource;
use super::validator::{is_in_future, IssuerMatch, JwtVerifier, TokenValidator};

/// Issuer prefix for Firebase projects.
pub const FIREBASE_ISSUER_PREFIX: &str = "https://securetoken.google.com/";

/// Claim holding the Firebase user id.
const FIREBASE_UID_CLAIM: &str = "user_id";

/// Firebase caps uids at 128 characters.
const MAX_UID_LEN: usize = 128;

/// Issuer (and authority) for a Firebase project.
pub fn firebase_issuer(project_id: &str) -> String {
    format!("{FIREBASE_ISSUER_PREFIX}{}", project_id.trim())
}

pub struct FirebaseValidator {
    project_id: String,
    verifier: JwtVerifier,
}

impl FirebaseValidator {
    pub fn new(project_id: &str, keys: Arc<SigningKeySource>) -> Self {
        let project_id = project_id.trim().to_string();
        let verifier = JwtVerifier::new(
            format!("firebase:{project_id}"),
            keys,
            firebase_issuer(&project_id),
            IssuerMatch::Exact,
        )
        .with_audience(Some(project_id.clone()))
        .with_algorithms(vec![Algorithm::RS256]);

        Self {
            project_id,
            verifier,
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }
}

#[async_trait]
impl TokenValidator for FirebaseValidator {
    fn name(&self) -> &str {
        self.verifier.name()
    }

    fn handles_issuer(&self, issuer: &str) -> bool {
        self.verifier.handles_issuer(issuer)
    }

    async fn validate(&self, token: &str) -> Result<Identity, ValidationError> {
        let mut claims = self.verifier.verify(token).await?;

        if let Some(auth_time) = claims.get("auth_time").and_then(Value::as_f64) {
            if is_in_future(auth_time) {
                return Err(self.verifier.reject("auth_time in the future", &auth_time));
            }
        }

        let Some(subject) = normalize_subject(&mut claims, &[FIREBASE_UID_CLAIM]) else {
            debug!(validator = %self.name(), "Firebase token has no user id");
            return Err(ValidationError::InvalidToken);
        };
        if subject.len() > MAX_UID_LEN {
            return Err(self.verifier.reject("uid too long", &subject.len()));
        }

        Identity::from_claims(claims).ok_or(ValidationError::InvalidToken)
    }

    fn key_source(&self) -> &Arc<SigningKeySource> {
        self.verifier.keys()
    }
}
