// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Validated identity and claim normalization.

use serde_json::{Map, Value};

use super::error::AuthError;
use super::roles::Role;
use super::scopes::{parse_scope_claims, scopes_for_role, ScopeSet};

/// Raw claim map as decoded from a verified token.
pub type Claims = Map<String, Value>;

/// Claim carrying the marketplace role.
pub const ROLE_CLAIM: &str = "role";

/// Claims that may carry the seller capability flag.
pub const SELLER_FLAG_CLAIMS: [&str; 2] = ["is_seller", "isSeller"];

/// Identity produced by a successful token validation.
///
/// Owned by the request that produced it and never cached. The scope set is
/// computed once at construction (role scopes plus token-embedded scopes)
/// and cannot change afterwards.
#[derive(Debug, Clone)]
pub struct Identity {
    subject: String,
    issuer: String,
    role: Role,
    is_seller: bool,
    raw_scope: Option<String>,
    scopes: ScopeSet,
    expires_at: Option<i64>,
    claims: Claims,
}

impl Identity {
    /// Build an identity from verified, subject-normalized claims.
    ///
    /// Returns `None` when `sub` or `iss` is missing or blank.
    pub fn from_claims(claims: Claims) -> Option<Self> {
        let subject = non_blank(&claims, "sub")?;
        let issuer = non_blank(&claims, "iss")?;
        let role_name = claims.get(ROLE_CLAIM).and_then(Value::as_str);
        let is_seller = SELLER_FLAG_CLAIMS
            .iter()
            .any(|name| claims.get(*name).and_then(Value::as_bool) == Some(true));

        let role = Role::resolve(role_name, is_seller);
        let scopes = scopes_for_role(role_name, is_seller).union(&parse_scope_claims(&claims));

        Some(Self {
            subject,
            issuer,
            role,
            is_seller,
            raw_scope: claims
                .get("scope")
                .and_then(Value::as_str)
                .map(str::to_owned),
            scopes,
            expires_at: claims.get("exp").and_then(Value::as_i64),
            claims,
        })
    }

    /// Stable subject identifier (the `sub` claim after normalization).
    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_seller(&self) -> bool {
        self.is_seller
    }

    /// The token's `scope` claim exactly as issued.
    pub fn raw_scope(&self) -> Option<&str> {
        self.raw_scope.as_deref()
    }

    pub fn scopes(&self) -> &ScopeSet {
        &self.scopes
    }

    /// Token expiration (Unix timestamp).
    pub fn expires_at(&self) -> Option<i64> {
        self.expires_at
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Wildcard-aware scope check.
    pub fn has_scope(&self, required: &str) -> bool {
        self.scopes.allows(required)
    }

    /// Like [`Identity::has_scope`], but yields the 403 error on failure.
    pub fn require_scope(&self, required: &str) -> Result<(), AuthError> {
        if self.has_scope(required) {
            Ok(())
        } else {
            Err(AuthError::ForbiddenByScope {
                required: required.to_string(),
            })
        }
    }
}

/// Ensure `sub` holds the provider's stable user id.
///
/// Some providers put the id under another claim (`user_id` for Firebase).
/// When `sub` is missing or blank, the first non-blank fallback claim is
/// copied into `sub`. Returns the resulting subject, or `None` if no claim
/// supplied one.
pub fn normalize_subject<S: AsRef<str>>(claims: &mut Claims, fallbacks: &[S]) -> Option<String> {
    if let Some(subject) = non_blank(claims, "sub") {
        return Some(subject);
    }
    let subject = fallbacks
        .iter()
        .find_map(|name| non_blank(claims, name.as_ref()))?;
    claims.insert("sub".to_string(), Value::String(subject.clone()));
    Some(subject)
}

fn non_blank(claims: &Claims, name: &str) -> Option<String> {
    claims
        .get(name)
        .and_then(Value::as_str)
        .filter(|value| !value.trim().is_empty())
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims(value: Value) -> Claims {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn sample_claims() -> Claims {
        claims(json!({
            "sub": "user_123",
            "iss": "https://id.example.com",
            "exp": 1_700_003_600,
            "role": "support",
            "scope": "support.tickets.read",
        }))
    }

    #[test]
    fn from_claims_extracts_subject_and_issuer() {
        let identity = Identity::from_claims(sample_claims()).unwrap();
        assert_eq!(identity.subject(), "user_123");
        assert_eq!(identity.issuer(), "https://id.example.com");
        assert_eq!(identity.expires_at(), Some(1_700_003_600));
    }

    #[test]
    fn scopes_combine_role_and_token_scopes() {
        let identity = Identity::from_claims(sample_claims()).unwrap();
        assert_eq!(identity.role(), Role::Support);
        assert!(identity.has_scope("messages.moderate"));
        assert!(identity.scopes().contains("support.tickets.read"));
        assert_eq!(identity.raw_scope(), Some("support.tickets.read"));
    }

    #[test]
    fn defaults_to_buyer_role() {
        let mut c = sample_claims();
        c.remove("role");
        let identity = Identity::from_claims(c).unwrap();
        assert_eq!(identity.role(), Role::Buyer);
        assert!(!identity.has_scope("listings.write"));
    }

    #[test]
    fn seller_flag_claim_grants_seller_scopes() {
        let mut c = sample_claims();
        c.insert("role".into(), json!("buyer"));
        c.insert("isSeller".into(), json!(true));
        let identity = Identity::from_claims(c).unwrap();
        assert!(identity.is_seller());
        assert_eq!(identity.role(), Role::Seller);
        assert!(identity.has_scope("listings.write"));
    }

    #[test]
    fn require_scope_reports_missing_scope() {
        let mut c = sample_claims();
        c.insert("role".into(), json!("buyer"));
        let identity = Identity::from_claims(c).unwrap();
        let err = identity.require_scope("listings.write").unwrap_err();
        assert!(
            matches!(err, AuthError::ForbiddenByScope { required } if required == "listings.write")
        );
    }

    #[test]
    fn missing_subject_is_rejected() {
        let mut c = sample_claims();
        c.insert("sub".into(), json!("  "));
        assert!(Identity::from_claims(c).is_none());
    }

    #[test]
    fn normalize_subject_prefers_standard_claim() {
        let mut c = claims(json!({ "sub": "abc", "user_id": "xyz" }));
        assert_eq!(normalize_subject(&mut c, &["user_id"]).as_deref(), Some("abc"));
        assert_eq!(c["sub"], "abc");
    }

    #[test]
    fn normalize_subject_synthesizes_from_fallback() {
        let mut c = claims(json!({ "user_id": "fb-user" }));
        assert_eq!(
            normalize_subject(&mut c, &["uid", "user_id"]).as_deref(),
            Some("fb-user")
        );
        assert_eq!(c["sub"], "fb-user");
    }

    #[test]
    fn normalize_subject_fails_without_any_id() {
        let mut c = claims(json!({ "sub": "", "email": "a@b.c" }));
        assert_eq!(normalize_subject(&mut c, &["user_id"]), None);
    }
}
