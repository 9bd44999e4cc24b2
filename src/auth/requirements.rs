// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authorization requirements evaluated against an identity and a resource.
//!
//! Requirements are stateless predicates parameterized at construction.
//! Role scopes and resource requirements compose independently: a handler
//! that needs both checks both, and neither bypasses the other.

use chrono::{DateTime, Duration, Utc};

use super::claims::Identity;
use super::error::AuthError;

/// Ownership and timing metadata of the resource being acted on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceContext {
    pub owner_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl ResourceContext {
    pub fn owned_by(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: Some(owner_id.into()),
            created_at: None,
        }
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    fn is_owned_by(&self, identity: &Identity) -> bool {
        self.owner_id.as_deref() == Some(identity.subject())
    }
}

/// Trait for authorization checks beyond plain role membership.
pub trait Requirement: Send + Sync {
    /// Stable name reported in 403 responses and logs.
    fn name(&self) -> &'static str;

    fn is_satisfied(&self, identity: &Identity, resource: &ResourceContext) -> bool;

    /// Error returned when the requirement is not met.
    fn denial(&self) -> AuthError {
        AuthError::ForbiddenByRequirement {
            requirement: self.name(),
        }
    }

    fn check(&self, identity: &Identity, resource: &ResourceContext) -> Result<(), AuthError> {
        if self.is_satisfied(identity, resource) {
            Ok(())
        } else {
            Err(self.denial())
        }
    }
}

/// Holds when the identity's scope set covers one scope.
#[derive(Debug, Clone)]
pub struct ScopeRequirement {
    scope: String,
}

impl ScopeRequirement {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
        }
    }
}

impl Requirement for ScopeRequirement {
    fn name(&self) -> &'static str {
        "scope"
    }

    fn is_satisfied(&self, identity: &Identity, _resource: &ResourceContext) -> bool {
        identity.has_scope(&self.scope)
    }

    fn denial(&self) -> AuthError {
        AuthError::ForbiddenByScope {
            required: self.scope.clone(),
        }
    }
}

/// Holds when the identity owns the resource.
#[derive(Debug, Clone, Copy, Default)]
pub struct OwnerRequirement;

impl Requirement for OwnerRequirement {
    fn name(&self) -> &'static str {
        "owner"
    }

    fn is_satisfied(&self, identity: &Identity, resource: &ResourceContext) -> bool {
        resource.is_owned_by(identity)
    }
}

/// Holds when the identity owns the resource *and* it is still inside the
/// editable window measured from its creation time.
///
/// The window bound is inclusive. A creation time slightly in the future
/// (clock skew between writers) counts as age zero. A resource without a
/// creation time never satisfies the requirement.
#[derive(Debug, Clone, Copy)]
pub struct OwnerWithinWindow {
    window: Duration,
}

impl OwnerWithinWindow {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Evaluate against an explicit clock.
    pub fn is_satisfied_at(
        &self,
        identity: &Identity,
        resource: &ResourceContext,
        now: DateTime<Utc>,
    ) -> bool {
        if !resource.is_owned_by(identity) {
            return false;
        }
        let Some(created_at) = resource.created_at else {
            return false;
        };
        let age = (now - created_at).max(Duration::zero());
        age <= self.window
    }
}

impl Requirement for OwnerWithinWindow {
    fn name(&self) -> &'static str {
        "owner_within_window"
    }

    fn is_satisfied(&self, identity: &Identity, resource: &ResourceContext) -> bool {
        self.is_satisfied_at(identity, resource, Utc::now())
    }
}

/// Holds when every inner requirement holds. Reports the first failure.
#[derive(Default)]
pub struct AllOf {
    requirements: Vec<Box<dyn Requirement>>,
}

impl AllOf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and(mut self, requirement: impl Requirement + 'static) -> Self {
        self.requirements.push(Box::new(requirement));
        self
    }
}

impl Requirement for AllOf {
    fn name(&self) -> &'static str {
        "all_of"
    }

    fn is_satisfied(&self, identity: &Identity, resource: &ResourceContext) -> bool {
        self.requirements
            .iter()
            .all(|r| r.is_satisfied(identity, resource))
    }

    fn check(&self, identity: &Identity, resource: &ResourceContext) -> Result<(), AuthError> {
        self.requirements
            .iter()
            .try_for_each(|r| r.check(identity, resource))
    }
}

/// Evaluate a requirement for a possibly anonymous caller.
///
/// Anonymous callers get [`AuthError::Unauthorized`]; known callers that
/// fail get the requirement's 403 error.
pub fn authorize(
    identity: Option<&Identity>,
    requirement: &dyn Requirement,
    resource: &ResourceContext,
) -> Result<(), AuthError> {
    let identity = identity.ok_or(AuthError::Unauthorized)?;
    requirement.check(identity, resource)
}
