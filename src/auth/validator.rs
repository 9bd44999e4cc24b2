// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token validator trait and the shared JWT verification pipeline.
//!
//! Each concrete validator (generic OIDC, Firebase) owns a [`JwtVerifier`]
//! configured for its issuer and adds provider-specific claim checks and
//! normalization on top.

use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::jwk::{AlgorithmParameters, EllipticCurve, Jwk, KeyAlgorithm, PublicKeyUse};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde_json::Value;
use tracing::debug;

use super::claims::{Claims, Identity};
use super::error::ValidationError;
use super::issuer::peek_issuer;
use super::jwks::SigningKeySource;

/// Clock skew tolerance (60 seconds).
pub const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Algorithms accepted by generic OIDC validators unless configured otherwise.
pub const DEFAULT_ALGORITHMS: [Algorithm; 6] = [
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::ES256,
    Algorithm::ES384,
    Algorithm::PS256,
];

/// A strategy that authenticates tokens from one issuer.
///
/// The registry asks validators in order whether they handle a token's
/// (unverified) issuer and hands the token to the first that does.
#[async_trait]
pub trait TokenValidator: Send + Sync {
    /// Label used in logs and health output.
    fn name(&self) -> &str;

    /// Whether this validator is responsible for the given issuer string.
    fn handles_issuer(&self, issuer: &str) -> bool;

    /// Routing check based on the unverified `iss` claim.
    fn can_handle(&self, token: &str) -> bool {
        peek_issuer(token).is_some_and(|issuer| self.handles_issuer(&issuer))
    }

    /// Verify the token and build the caller's identity.
    async fn validate(&self, token: &str) -> Result<Identity, ValidationError>;

    /// Key source backing this validator.
    fn key_source(&self) -> &Arc<SigningKeySource>;
}

/// How the `iss` claim is compared with the configured issuer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IssuerMatch {
    /// `iss` must equal the issuer.
    Exact,
    /// `iss` must equal the issuer or continue it after a `/`.
    Prefix,
}

impl IssuerMatch {
    pub(crate) fn matches(self, expected: &str, actual: &str) -> bool {
        match self {
            IssuerMatch::Exact => actual == expected,
            IssuerMatch::Prefix => {
                let base = expected.trim_end_matches('/');
                actual == base
                    || actual
                        .strip_prefix(base)
                        .is_some_and(|rest| rest.starts_with('/'))
            }
        }
    }
}

/// Signature, issuer, audience and lifetime checks shared by validators.
pub(crate) struct JwtVerifier {
    name: String,
    keys: Arc<SigningKeySource>,
    issuer: String,
    issuer_match: IssuerMatch,
    audience: Option<String>,
    algorithms: Vec<Algorithm>,
}

impl JwtVerifier {
    pub(crate) fn new(
        name: impl Into<String>,
        keys: Arc<SigningKeySource>,
        issuer: impl Into<String>,
        issuer_match: IssuerMatch,
    ) -> Self {
        Self {
            name: name.into(),
            keys,
            issuer: issuer.into(),
            issuer_match,
            audience: None,
            algorithms: DEFAULT_ALGORITHMS.to_vec(),
        }
    }

    pub(crate) fn with_audience(mut self, audience: Option<String>) -> Self {
        self.audience = audience;
        self
    }

    pub(crate) fn with_algorithms(mut self, algorithms: Vec<Algorithm>) -> Self {
        self.algorithms = algorithms
            .into_iter()
            .filter(|alg| is_asymmetric(*alg))
            .collect();
        self
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn issuer(&self) -> &str {
        &self.issuer
    }

    pub(crate) fn keys(&self) -> &Arc<SigningKeySource> {
        &self.keys
    }

    pub(crate) fn handles_issuer(&self, issuer: &str) -> bool {
        self.issuer_match.matches(&self.issuer, issuer)
    }

    /// Verify `token` and return its claims.
    ///
    /// Every rejection collapses to [`ValidationError::InvalidToken`]; the
    /// failing check is only logged. Key-source failures surface as
    /// [`ValidationError::KeySourceUnavailable`] so validation fails closed.
    pub(crate) async fn verify(&self, token: &str) -> Result<Claims, ValidationError> {
        let header = decode_header(token).map_err(|e| self.reject("malformed header", &e))?;

        if !self.algorithms.contains(&header.alg) {
            return Err(self.reject("algorithm not accepted", &format!("{:?}", header.alg)));
        }

        let mut keys = self.keys.get_keys().await?;
        if let Some(kid) = header.kid.as_deref() {
            if keys.find(kid).is_none() {
                debug!(validator = %self.name, kid, "Unknown key id, refreshing signing keys");
                keys = self.keys.refresh_for_unknown_key().await?;
            }
        }

        let candidates: Vec<&Jwk> = match header.kid.as_deref() {
            Some(kid) => keys.find(kid).into_iter().collect(),
            None => keys.keys.keys.iter().collect(),
        };
        let candidates: Vec<&Jwk> = candidates
            .into_iter()
            .filter(|jwk| key_supports(jwk, header.alg))
            .collect();
        if candidates.is_empty() {
            return Err(self.reject("no compatible signing key", &header.kid.unwrap_or_default()));
        }

        let validation = self.validation(header.alg);
        let mut last_error = None;
        for jwk in candidates {
            let key = match DecodingKey::from_jwk(jwk) {
                Ok(key) => key,
                Err(e) => {
                    last_error = Some(e);
                    continue;
                }
            };
            match decode::<Claims>(token, &key, &validation) {
                Ok(data) => return self.check_claims(data.claims),
                Err(e) => last_error = Some(e),
            }
        }

        let reason = last_error.map(|e| e.to_string()).unwrap_or_default();
        Err(self.reject("signature or claim check failed", &reason))
    }

    fn validation(&self, alg: Algorithm) -> Validation {
        let mut validation = Validation::new(alg);
        validation.leeway = CLOCK_SKEW_LEEWAY;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "iss"]);

        if self.issuer_match == IssuerMatch::Exact {
            validation.set_issuer(&[&self.issuer]);
        }

        match &self.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }
        validation
    }

    /// Checks `jsonwebtoken` does not cover: issuer prefix and `iat`.
    fn check_claims(&self, claims: Claims) -> Result<Claims, ValidationError> {
        let issuer = claims.get("iss").and_then(Value::as_str).unwrap_or_default();
        if !self.handles_issuer(issuer) {
            return Err(self.reject("issuer mismatch", &issuer));
        }

        if let Some(iat) = claims.get("iat").and_then(Value::as_f64) {
            if is_in_future(iat) {
                return Err(self.reject("issued in the future", &iat.to_string()));
            }
        }

        Ok(claims)
    }

    /// Log the reason and return the uniform rejection.
    pub(crate) fn reject(&self, reason: &str, detail: &dyn std::fmt::Display) -> ValidationError {
        debug!(validator = %self.name, reason, detail = %detail, "Token rejected");
        ValidationError::InvalidToken
    }
}

/// Whether a Unix timestamp lies beyond now plus the clock skew leeway.
pub(crate) fn is_in_future(timestamp: f64) -> bool {
    let now = chrono::Utc::now().timestamp() as f64;
    timestamp > now + CLOCK_SKEW_LEEWAY as f64
}

fn is_asymmetric(alg: Algorithm) -> bool {
    !matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)
}

fn key_algorithm(alg: Algorithm) -> Option<KeyAlgorithm> {
    match alg {
        Algorithm::RS256 => Some(KeyAlgorithm::RS256),
        Algorithm::RS384 => Some(KeyAlgorithm::RS384),
        Algorithm::RS512 => Some(KeyAlgorithm::RS512),
        Algorithm::PS256 => Some(KeyAlgorithm::PS256),
        Algorithm::PS384 => Some(KeyAlgorithm::PS384),
        Algorithm::PS512 => Some(KeyAlgorithm::PS512),
        Algorithm::ES256 => Some(KeyAlgorithm::ES256),
        Algorithm::ES384 => Some(KeyAlgorithm::ES384),
        Algorithm::EdDSA => Some(KeyAlgorithm::EdDSA),
        _ => None,
    }
}

/// Whether a JWK may verify a signature made with `alg`.
///
/// The key type has to fit the algorithm, a declared `alg` has to equal it
/// and encryption-only keys are skipped. Symmetric keys never qualify.
fn key_supports(jwk: &Jwk, alg: Algorithm) -> bool {
    if matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption)) {
        return false;
    }
    if let Some(declared) = jwk.common.key_algorithm {
        if Some(declared) != key_algorithm(alg) {
            return false;
        }
    }
    match (&jwk.algorithm, alg) {
        (
            AlgorithmParameters::RSA(_),
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512,
        ) => true,
        (AlgorithmParameters::EllipticCurve(params), Algorithm::ES256) => {
            params.curve == EllipticCurve::P256
        }
        (AlgorithmParameters::EllipticCurve(params), Algorithm::ES384) => {
            params.curve == EllipticCurve::P384
        }
        (AlgorithmParameters::OctetKeyPair(_), Algorithm::EdDSA) => true,
        _ => false,
    }
}
