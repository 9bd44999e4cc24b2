// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Permission scopes: role table, claim parsing and wildcard matching.
//!
//! ## Scope Grammar
//!
//! - `resource.action` - a single permission, e.g. `orders.read`
//! - `resource:*` - every action on a resource
//! - `admin:*` and `*` - everything
//!
//! Comparison is case-insensitive; scopes are stored lowercased.
//!
//! ## Matching
//!
//! A granted scope covers a required scope when, in order:
//!
//! 1. they are equal;
//! 2. the grant is `admin:*`;
//! 3. the grant is `*`;
//! 4. the grant is `prefix:*` and the requirement is `prefix` itself or
//!    continues after `prefix` with `.` or `:`.
//!
//! Nothing else matches, so `orders:*` never covers `order.read` or
//! `ordersarchive.read`.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{Map, Value};

use super::roles::Role;

/// Grant that covers every scope.
pub const UNIVERSAL_WILDCARD: &str = "admin:*";

/// Literal catch-all grant.
pub const ANY_SCOPE: &str = "*";

/// Claims that may carry scope strings, in the order they are read.
pub const SCOPE_CLAIMS: [&str; 3] = ["scope", "scp", "permissions"];

const RESOURCE_WILDCARD_SUFFIX: &str = ":*";

const BUYER_SCOPES: &[&str] = &[
    "listings.read",
    "cart.read",
    "cart.write",
    "orders.read",
    "orders.write",
    "messages.read",
    "messages.write",
    "reviews.read",
    "reviews.write",
    "addresses.read",
    "addresses.write",
    "profile.read",
    "profile.write",
];

const SELLER_ONLY_SCOPES: &[&str] = &[
    "listings.write",
    "listings.delete",
    "orders.fulfill",
    "sales.read",
];

const SUPPORT_SCOPES: &[&str] = &[
    "listings.read",
    "orders.read",
    "orders.refund",
    "messages.read",
    "messages.moderate",
    "reviews.read",
    "reviews.moderate",
    "users.read",
    "support:*",
];

const ADMIN_SCOPES: &[&str] = &[UNIVERSAL_WILDCARD];

/// A single normalized scope token.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Scope(String);

impl Scope {
    /// Normalize a raw token. Returns `None` when it is blank.
    pub fn new(raw: &str) -> Option<Scope> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Scope(trimmed.to_lowercase()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this granted scope covers `required` (already normalized).
    fn covers(&self, required: &str) -> bool {
        let granted = self.as_str();
        if granted == required {
            return true;
        }
        if granted == UNIVERSAL_WILDCARD || granted == ANY_SCOPE {
            return true;
        }
        match granted.strip_suffix(RESOURCE_WILDCARD_SUFFIX) {
            Some(prefix) if !prefix.is_empty() => {
                required == prefix
                    || required
                        .strip_prefix(prefix)
                        .is_some_and(|rest| rest.starts_with(['.', ':']))
            }
            _ => false,
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable set of scopes granted to one identity.
///
/// There are no mutating methods; combining sets yields a new set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ScopeSet(BTreeSet<Scope>);

impl ScopeSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Exact (case-insensitive) membership, no wildcard expansion.
    pub fn contains(&self, scope: &str) -> bool {
        Scope::new(scope).is_some_and(|s| self.0.contains(&s))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scope> {
        self.0.iter()
    }

    /// New set holding the scopes of both.
    pub fn union(&self, other: &ScopeSet) -> ScopeSet {
        ScopeSet(self.0.union(&other.0).cloned().collect())
    }

    /// Wildcard-aware check, see [`matches`].
    pub fn allows(&self, required: &str) -> bool {
        matches(self, required)
    }
}

impl<'a> FromIterator<&'a str> for ScopeSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        ScopeSet(iter.into_iter().filter_map(Scope::new).collect())
    }
}

impl FromIterator<Scope> for ScopeSet {
    fn from_iter<I: IntoIterator<Item = Scope>>(iter: I) -> Self {
        ScopeSet(iter.into_iter().collect())
    }
}

impl Role {
    /// Canonical scope set for this role.
    pub fn scopes(&self) -> ScopeSet {
        match self {
            Role::Admin => ADMIN_SCOPES.iter().copied().collect(),
            Role::Support => SUPPORT_SCOPES.iter().copied().collect(),
            Role::Seller => BUYER_SCOPES
                .iter()
                .chain(SELLER_ONLY_SCOPES)
                .copied()
                .collect(),
            Role::Buyer => BUYER_SCOPES.iter().copied().collect(),
        }
    }
}

/// Scopes granted to a role claim and seller flag.
///
/// Total: every input maps to a non-empty set, unknown roles fall back to
/// the buyer set (or the seller set when `is_seller`).
pub fn scopes_for_role(role: Option<&str>, is_seller: bool) -> ScopeSet {
    Role::resolve(role, is_seller).scopes()
}

/// Collect scopes embedded in token claims.
///
/// Reads every claim in [`SCOPE_CLAIMS`]. String values are split on
/// whitespace and commas; arrays contribute each string element the same
/// way. Blank tokens are dropped and all claims are unioned.
pub fn parse_scope_claims(claims: &Map<String, Value>) -> ScopeSet {
    let mut scopes = BTreeSet::new();
    for name in SCOPE_CLAIMS {
        match claims.get(name) {
            Some(Value::String(raw)) => scopes.extend(split_scopes(raw)),
            Some(Value::Array(items)) => {
                for raw in items.iter().filter_map(Value::as_str) {
                    scopes.extend(split_scopes(raw));
                }
            }
            _ => {}
        }
    }
    ScopeSet(scopes)
}

fn split_scopes(raw: &str) -> impl Iterator<Item = Scope> + '_ {
    raw.split(|c: char| c.is_whitespace() || c == ',')
        .filter_map(Scope::new)
}

/// Whether any scope in `granted` covers `required`.
pub fn matches(granted: &ScopeSet, required: &str) -> bool {
    let Some(required) = Scope::new(required) else {
        return false;
    };
    granted.iter().any(|scope| scope.covers(required.as_str()))
}
