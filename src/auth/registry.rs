// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ordered collection of token validators.
//!
//! A token is dispatched to the first validator whose `can_handle` accepts
//! its (unverified) issuer. Register specific validators (an exact Firebase
//! issuer) before general ones (an OIDC authority prefix) when their issuer
//! spaces could overlap.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::claims::Identity;
use super::error::{KeySourceError, ValidationError};
use super::firebase::{firebase_issuer, FirebaseValidator};
use super::issuer::peek_claims;
use super::jwks::{discovery_url, KeySetFetcher, KeySourceSettings, SigningKeySource};
use super::oidc::OidcValidator;
use super::validator::TokenValidator;
use crate::config::IssuerConfig;

#[derive(Clone, Default)]
pub struct AuthenticatorRegistry {
    validators: Vec<Arc<dyn TokenValidator>>,
}

impl AuthenticatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a validator; it is tried after every one added before it.
    pub fn with_validator(mut self, validator: Arc<dyn TokenValidator>) -> Self {
        self.validators.push(validator);
        self
    }

    /// Build validators from issuer configuration, preserving its order.
    ///
    /// Issuers that resolve to the same discovery URL share one
    /// [`SigningKeySource`], refreshed at the shortest interval any of them
    /// asks for.
    pub fn from_config(
        issuers: &[IssuerConfig],
        defaults: &KeySourceSettings,
        fetcher: Arc<dyn KeySetFetcher>,
    ) -> Result<Self, KeySourceError> {
        let mut resolved = Vec::with_capacity(issuers.len());
        let mut settings_by_url: HashMap<String, KeySourceSettings> = HashMap::new();
        for issuer in issuers {
            let authority = match issuer {
                IssuerConfig::Firebase { project_id, .. } => firebase_issuer(project_id),
                IssuerConfig::Oidc { authority, .. } => authority.clone(),
            };
            let url = discovery_url(&authority)?;

            let mut settings = *defaults;
            if let Some(secs) = issuer.refresh_interval_secs() {
                settings.refresh_interval = Duration::from_secs(secs);
            }
            settings_by_url
                .entry(url.to_string())
                .and_modify(|shared| {
                    shared.refresh_interval = shared.refresh_interval.min(settings.refresh_interval)
                })
                .or_insert(settings);
            resolved.push((issuer, url));
        }

        let mut sources: HashMap<String, Arc<SigningKeySource>> = HashMap::new();
        let mut registry = Self::new();
        for (issuer, url) in resolved {
            let keys = match sources.get(url.as_str()) {
                Some(existing) => Arc::clone(existing),
                None => {
                    let settings = settings_by_url
                        .get(url.as_str())
                        .copied()
                        .unwrap_or(*defaults);
                    let source = Arc::new(SigningKeySource::new(
                        url.clone(),
                        settings,
                        Arc::clone(&fetcher),
                    )?);
                    sources.insert(url.to_string(), Arc::clone(&source));
                    source
                }
            };

            let validator: Arc<dyn TokenValidator> = match issuer {
                IssuerConfig::Firebase { project_id, .. } => {
                    Arc::new(FirebaseValidator::new(project_id, keys))
                }
                IssuerConfig::Oidc {
                    authority,
                    audience,
                    subject_fallback_claims,
                    algorithms,
                    ..
                } => {
                    let mut oidc = OidcValidator::new(authority, audience.clone(), keys);
                    if let Some(fallbacks) = subject_fallback_claims {
                        oidc = oidc.with_subject_fallbacks(fallbacks.clone());
                    }
                    if let Some(algorithms) = algorithms {
                        oidc = oidc.with_algorithms(algorithms.clone());
                    }
                    Arc::new(oidc)
                }
            };
            registry = registry.with_validator(validator);
        }

        Ok(registry)
    }

    pub fn validators(&self) -> &[Arc<dyn TokenValidator>] {
        &self.validators
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Distinct key sources, in registration order.
    pub fn key_sources(&self) -> Vec<(String, Arc<SigningKeySource>)> {
        let mut seen = Vec::<Arc<SigningKeySource>>::new();
        let mut out = Vec::new();
        for validator in &self.validators {
            let source = validator.key_source();
            if seen.iter().any(|s| Arc::ptr_eq(s, source)) {
                continue;
            }
            seen.push(Arc::clone(source));
            out.push((validator.name().to_string(), Arc::clone(source)));
        }
        out
    }

    /// Authenticate a token, keeping the reason on failure.
    pub async fn try_authenticate(&self, token: &str) -> Result<Identity, ValidationError> {
        let claims = peek_claims(token).ok_or(ValidationError::MalformedToken)?;
        let issuer = claims
            .get("iss")
            .and_then(|v| v.as_str())
            .ok_or(ValidationError::UnrecognizedIssuer)?;

        let validator = self
            .validators
            .iter()
            .find(|v| v.handles_issuer(issuer))
            .ok_or(ValidationError::UnrecognizedIssuer)?;

        validator.validate(token).await
    }

    /// Authenticate a token. Every failure yields `None` (anonymous).
    pub async fn authenticate(&self, token: &str) -> Option<Identity> {
        match self.try_authenticate(token).await {
            Ok(identity) => {
                debug!(
                    subject = %identity.subject(),
                    issuer = %identity.issuer(),
                    "Token authenticated"
                );
                Some(identity)
            }
            Err(err) => {
                debug!(reason = err.kind(), error = %err, "Token not authenticated");
                None
            }
        }
    }

    /// [`AuthenticatorRegistry::authenticate`] that gives up when `cancel`
    /// fires. A cancelled call yields `None`.
    pub async fn authenticate_cancellable(
        &self,
        token: &str,
        cancel: &CancellationToken,
    ) -> Option<Identity> {
        tokio::select! {
            identity = self.authenticate(token) => identity,
            _ = cancel.cancelled() => {
                debug!("Authentication cancelled with the request");
                None
            }
        }
    }
}
