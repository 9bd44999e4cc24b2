// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Marketplace Auth - Multi-issuer bearer authentication for the marketplace API
//!
//! Validates bearer tokens from every configured identity provider (Firebase
//! and generic OIDC authorities), resolves them into an [`auth::Identity`]
//! with role-derived scopes, and gates handlers on scopes and resource
//! requirements.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Token validation, signing key caches, scopes and requirements
//! - `config` - Environment configuration
//! - `store` - In-memory marketplace data used by the demo routes

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod state;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;
