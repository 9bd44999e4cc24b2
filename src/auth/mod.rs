// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Multi-issuer bearer-token authentication and scope-based authorization.
//!
//! ## Auth Flow
//!
//! 1. Client sends `Authorization: Bearer <JWT>` issued by any configured
//!    provider (Firebase, or a generic OIDC authority)
//! 2. The request gate:
//!    - Peeks the unverified `iss` claim to pick a validator
//!    - The validator fetches the issuer's keys via OIDC discovery (HTTPS only)
//!    - Verifies signature, issuer, audience, expiry
//!    - Normalizes the subject (`user_id` fallback) and resolves scopes
//!      from the role claim, seller flag and token scope claims
//! 3. Handlers check scopes (`Identity::require_scope`) and resource
//!    requirements (`requirements::authorize`)
//!
//! ## Security
//!
//! - Authentication failures never fail the request; they leave it anonymous
//! - Anonymous callers get 401 at the point of authorization, known callers
//!   lacking a permission get 403
//! - Signing keys are cached per issuer, stale keys are served for a bounded
//!   time only
//! - Clock skew tolerance is 60 seconds

pub mod claims;
pub mod error;
pub mod extractor;
pub mod firebase;
pub mod issuer;
pub mod jwks;
pub mod middleware;
pub mod oidc;
pub mod registry;
pub mod requirements;
pub mod roles;
pub mod scopes;
pub mod validator;

pub use claims::Identity;
pub use error::{AuthError, KeySourceError, ValidationError};
pub use extractor::{current_identity, Auth, OptionalAuth};
pub use jwks::{HttpKeySetFetcher, KeySetFetcher, KeySourceSettings, SigningKeySource};
pub use middleware::{request_gate, RequestGate};
pub use registry::AuthenticatorRegistry;
pub use requirements::{authorize, Requirement, ResourceContext};
pub use roles::Role;
pub use scopes::{Scope, ScopeSet};
pub use validator::TokenValidator;
