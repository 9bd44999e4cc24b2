// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//! | `FIREBASE_PROJECT_ID` | Enables the Firebase validator | Optional |
//! | `OIDC_AUTHORITY` | Enables a generic OIDC validator (https URL) | Optional |
//! | `OIDC_AUDIENCE` | Expected audience for the OIDC validator | Optional |
//! | `AUTH_ISSUERS` | JSON array of issuer configs, replaces the two above | Optional |
//! | `AUTH_KEY_REFRESH_SECS` | Signing key refresh interval | `300` |
//! | `AUTH_KEY_MAX_STALENESS_SECS` | Max age of keys served after failed refreshes | `86400` |
//! | `AUTH_FETCH_TIMEOUT_SECS` | Bound on one discovery + JWKS fetch | `10` |
//! | `AUTH_TIMEOUT_MS` | Bound on authenticating one request | `15000` |
//! | `MESSAGE_EDIT_WINDOW_MINUTES` | How long authors may edit a message | `15` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | Serve HTTPS when both are set | Optional |
//!
//! `AUTH_ISSUERS` example:
//!
//! ```json
//! [
//!   { "kind": "firebase", "project_id": "shop-prod" },
//!   { "kind": "oidc", "authority": "https://login.example.com", "audience": "api" }
//! ]
//! ```

use std::time::Duration;

use jsonwebtoken::Algorithm;
use serde::Deserialize;
use url::Url;

use crate::auth::jwks::{
    KeySourceSettings, DEFAULT_FETCH_TIMEOUT, DEFAULT_MAX_STALENESS, DEFAULT_REFRESH_INTERVAL,
    DEFAULT_RETRY_COOLDOWN,
};
use crate::auth::middleware::DEFAULT_AUTH_TIMEOUT;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";
pub const FIREBASE_PROJECT_ID_ENV: &str = "FIREBASE_PROJECT_ID";
pub const OIDC_AUTHORITY_ENV: &str = "OIDC_AUTHORITY";
pub const OIDC_AUDIENCE_ENV: &str = "OIDC_AUDIENCE";
pub const AUTH_ISSUERS_ENV: &str = "AUTH_ISSUERS";
pub const AUTH_KEY_REFRESH_SECS_ENV: &str = "AUTH_KEY_REFRESH_SECS";
pub const AUTH_KEY_MAX_STALENESS_SECS_ENV: &str = "AUTH_KEY_MAX_STALENESS_SECS";
pub const AUTH_FETCH_TIMEOUT_SECS_ENV: &str = "AUTH_FETCH_TIMEOUT_SECS";
pub const AUTH_TIMEOUT_MS_ENV: &str = "AUTH_TIMEOUT_MS";
pub const MESSAGE_EDIT_WINDOW_MINUTES_ENV: &str = "MESSAGE_EDIT_WINDOW_MINUTES";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";

/// Default log filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

/// Default message edit window (15 minutes).
pub const DEFAULT_MESSAGE_EDIT_WINDOW_MINUTES: i64 = 15;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidVar { var: &'static str, reason: String },

    #[error("invalid issuer configuration: {0}")]
    InvalidIssuer(String),

    #[error("{0} and {1} must be set together")]
    Incomplete(&'static str, &'static str),
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

/// One trusted token issuer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum IssuerConfig {
    /// Firebase Authentication project.
    Firebase {
        project_id: String,
        #[serde(default)]
        refresh_interval_secs: Option<u64>,
    },
    /// Any OpenID Connect provider with a discovery document.
    Oidc {
        authority: String,
        #[serde(default)]
        audience: Option<String>,
        #[serde(default)]
        subject_fallback_claims: Option<Vec<String>>,
        #[serde(default)]
        refresh_interval_secs: Option<u64>,
        #[serde(default)]
        algorithms: Option<Vec<Algorithm>>,
    },
}

impl IssuerConfig {
    pub fn refresh_interval_secs(&self) -> Option<u64> {
        match self {
            IssuerConfig::Firebase {
                refresh_interval_secs,
                ..
            }
            | IssuerConfig::Oidc {
                refresh_interval_secs,
                ..
            } => *refresh_interval_secs,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_interval_secs() == Some(0) {
            return Err(ConfigError::InvalidIssuer(
                "refresh_interval_secs must be positive".to_string(),
            ));
        }
        match self {
            IssuerConfig::Firebase { project_id, .. } => {
                if project_id.trim().is_empty() || project_id.contains('/') {
                    return Err(ConfigError::InvalidIssuer(format!(
                        "invalid Firebase project id {project_id:?}"
                    )));
                }
            }
            IssuerConfig::Oidc {
                authority,
                algorithms,
                ..
            } => {
                let url = Url::parse(authority).map_err(|e| {
                    ConfigError::InvalidIssuer(format!("authority {authority:?}: {e}"))
                })?;
                if url.scheme() != "https" {
                    return Err(ConfigError::InvalidIssuer(format!(
                        "authority {authority} must use https"
                    )));
                }
                if let Some(algorithms) = algorithms {
                    if algorithms.is_empty() {
                        return Err(ConfigError::InvalidIssuer(
                            "algorithms must not be empty".to_string(),
                        ));
                    }
                    if let Some(alg) = algorithms.iter().find(|alg| {
                        matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)
                    }) {
                        return Err(ConfigError::InvalidIssuer(format!(
                            "symmetric algorithm {alg:?} cannot be used with published keys"
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Certificate and key for HTTPS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: String,
    pub key: String,
}

/// Complete runtime configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub log_format: LogFormat,
    pub issuers: Vec<IssuerConfig>,
    pub key_source: KeySourceSettings,
    pub auth_timeout: Duration,
    pub message_edit_window: chrono::Duration,
    pub tls: Option<TlsPaths>,
}

impl Settings {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let log_format = match get(LOG_FORMAT_ENV).as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::InvalidVar {
                    var: LOG_FORMAT_ENV,
                    reason: format!("expected json or pretty, got {other:?}"),
                })
            }
        };

        let issuers = match get(AUTH_ISSUERS_ENV) {
            Some(raw) => serde_json::from_str::<Vec<IssuerConfig>>(&raw).map_err(|e| {
                ConfigError::InvalidVar {
                    var: AUTH_ISSUERS_ENV,
                    reason: e.to_string(),
                }
            })?,
            None => {
                let mut issuers = Vec::new();
                // Exact-issuer validators go first.
                if let Some(project_id) = get(FIREBASE_PROJECT_ID_ENV) {
                    issuers.push(IssuerConfig::Firebase {
                        project_id,
                        refresh_interval_secs: None,
                    });
                }
                if let Some(authority) = get(OIDC_AUTHORITY_ENV) {
                    issuers.push(IssuerConfig::Oidc {
                        authority,
                        audience: get(OIDC_AUDIENCE_ENV),
                        subject_fallback_claims: None,
                        refresh_interval_secs: None,
                        algorithms: None,
                    });
                }
                issuers
            }
        };
        for issuer in &issuers {
            issuer.validate()?;
        }

        let key_source = KeySourceSettings {
            refresh_interval: seconds(
                &get,
                AUTH_KEY_REFRESH_SECS_ENV,
                DEFAULT_REFRESH_INTERVAL,
            )?,
            max_staleness: seconds(
                &get,
                AUTH_KEY_MAX_STALENESS_SECS_ENV,
                DEFAULT_MAX_STALENESS,
            )?,
            fetch_timeout: seconds(&get, AUTH_FETCH_TIMEOUT_SECS_ENV, DEFAULT_FETCH_TIMEOUT)?,
            retry_cooldown: DEFAULT_RETRY_COOLDOWN,
        };
        if key_source.max_staleness < key_source.refresh_interval {
            return Err(ConfigError::InvalidVar {
                var: AUTH_KEY_MAX_STALENESS_SECS_ENV,
                reason: "must not be shorter than the refresh interval".to_string(),
            });
        }

        let auth_timeout = match get(AUTH_TIMEOUT_MS_ENV) {
            Some(raw) => Duration::from_millis(parse_positive(AUTH_TIMEOUT_MS_ENV, &raw)?),
            None => DEFAULT_AUTH_TIMEOUT,
        };

        let edit_minutes = match get(MESSAGE_EDIT_WINDOW_MINUTES_ENV) {
            Some(raw) => parse_positive(MESSAGE_EDIT_WINDOW_MINUTES_ENV, &raw)? as i64,
            None => DEFAULT_MESSAGE_EDIT_WINDOW_MINUTES,
        };

        let port = match get(PORT_ENV) {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::InvalidVar {
                var: PORT_ENV,
                reason: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };

        let tls = match (get(TLS_CERT_PATH_ENV), get(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths { cert, key }),
            (None, None) => None,
            _ => return Err(ConfigError::Incomplete(TLS_CERT_PATH_ENV, TLS_KEY_PATH_ENV)),
        };

        Ok(Self {
            host: get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            log_format,
            issuers,
            key_source,
            auth_timeout,
            message_edit_window: chrono::Duration::minutes(edit_minutes),
            tls,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn seconds<G>(get: &G, var: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        Some(raw) => Ok(Duration::from_secs(parse_positive(var, &raw)?)),
        None => Ok(default),
    }
}

fn parse_positive(var: &'static str, raw: &str) -> Result<u64, ConfigError> {
    match raw.parse::<u64>() {
        Ok(0) => Err(ConfigError::InvalidVar {
            var,
            reason: "must be positive".to_string(),
        }),
        Ok(value) => Ok(value),
        Err(e) => Err(ConfigError::InvalidVar {
            var,
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let settings = load(&[]).unwrap();
        assert_eq!(settings.bind_address(), "0.0.0.0:8080");
        assert_eq!(settings.log_format, LogFormat::Pretty);
        assert!(settings.issuers.is_empty());
        assert_eq!(settings.key_source, KeySourceSettings::default());
        assert_eq!(settings.auth_timeout, Duration::from_millis(15_000));
        assert_eq!(settings.message_edit_window, chrono::Duration::minutes(15));
        assert!(settings.tls.is_none());
    }

    #[test]
    fn convenience_variables_register_firebase_first() {
        let settings = load(&[
            (OIDC_AUTHORITY_ENV, "https://login.example.com"),
            (OIDC_AUDIENCE_ENV, "api"),
            (FIREBASE_PROJECT_ID_ENV, "shop-prod"),
        ])
        .unwrap();
        assert!(matches!(
            &settings.issuers[0],
            IssuerConfig::Firebase { project_id, .. } if project_id == "shop-prod"
        ));
        assert!(matches!(
            &settings.issuers[1],
            IssuerConfig::Oidc { audience: Some(aud), .. } if aud == "api"
        ));
    }

    #[test]
    fn auth_issuers_json_overrides_and_keeps_order() {
        let settings = load(&[
            (FIREBASE_PROJECT_ID_ENV, "ignored"),
            (
                AUTH_ISSUERS_ENV,
                r#"[
                    {"kind":"oidc","authority":"https://a.example.com","algorithms":["RS256"],"refresh_interval_secs":60},
                    {"kind":"firebase","project_id":"shop-prod"}
                ]"#,
            ),
        ])
        .unwrap();
        assert_eq!(settings.issuers.len(), 2);
        assert_eq!(settings.issuers[0].refresh_interval_secs(), Some(60));
        assert!(matches!(
            &settings.issuers[0],
            IssuerConfig::Oidc { algorithms: Some(algs), .. } if algs == &vec![Algorithm::RS256]
        ));
        assert!(matches!(&settings.issuers[1], IssuerConfig::Firebase { .. }));
    }

    #[test]
    fn plaintext_authority_is_rejected() {
        let err = load(&[(OIDC_AUTHORITY_ENV, "http://login.example.com")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidIssuer(_)));
    }

    #[test]
    fn symmetric_algorithms_are_rejected() {
        let err = load(&[(
            AUTH_ISSUERS_ENV,
            r#"[{"kind":"oidc","authority":"https://a.example.com","algorithms":["HS256"]}]"#,
        )])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidIssuer(_)));
    }

    #[test]
    fn unknown_issuer_kind_is_rejected() {
        let err = load(&[(AUTH_ISSUERS_ENV, r#"[{"kind":"saml"}]"#)]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidVar { var: AUTH_ISSUERS_ENV, .. }));
    }

    #[test]
    fn numeric_overrides_are_parsed() {
        let settings = load(&[
            (AUTH_KEY_REFRESH_SECS_ENV, "120"),
            (AUTH_KEY_MAX_STALENESS_SECS_ENV, "3600"),
            (AUTH_FETCH_TIMEOUT_SECS_ENV, "3"),
            (AUTH_TIMEOUT_MS_ENV, "2500"),
            (MESSAGE_EDIT_WINDOW_MINUTES_ENV, "5"),
            (PORT_ENV, "9443"),
            (LOG_FORMAT_ENV, "json"),
        ])
        .unwrap();
        assert_eq!(settings.key_source.refresh_interval, Duration::from_secs(120));
        assert_eq!(settings.key_source.max_staleness, Duration::from_secs(3600));
        assert_eq!(settings.key_source.fetch_timeout, Duration::from_secs(3));
        assert_eq!(settings.auth_timeout, Duration::from_millis(2500));
        assert_eq!(settings.message_edit_window, chrono::Duration::minutes(5));
        assert_eq!(settings.port, 9443);
        assert_eq!(settings.log_format, LogFormat::Json);
    }

    #[test]
    fn invalid_values_are_reported() {
        assert!(load(&[(AUTH_KEY_REFRESH_SECS_ENV, "0")]).is_err());
        assert!(load(&[(AUTH_TIMEOUT_MS_ENV, "soon")]).is_err());
        assert!(load(&[(LOG_FORMAT_ENV, "xml")]).is_err());
        assert!(load(&[(AUTH_KEY_MAX_STALENESS_SECS_ENV, "10")]).is_err());
    }

    #[test]
    fn tls_paths_must_come_in_pairs() {
        let err = load(&[(TLS_CERT_PATH_ENV, "/etc/tls/cert.pem")]).unwrap_err();
        assert!(matches!(err, ConfigError::Incomplete(..)));

        let settings = load(&[
            (TLS_CERT_PATH_ENV, "/etc/tls/cert.pem"),
            (TLS_KEY_PATH_ENV, "/etc/tls/key.pem"),
        ])
        .unwrap();
        assert_eq!(settings.tls.unwrap().key, "/etc/tls/key.pem");
    }
}
