// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Marketplace roles.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Marketplace roles.
///
/// ## Role Set
///
/// - `Admin` - Full access to every resource
/// - `Support` - Read access plus moderation of messages and reviews
/// - `Seller` - Buyer privileges plus listing management and fulfilment
/// - `Buyer` - Browsing, cart, orders, own messages and reviews
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full administrative access
    Admin,
    /// Customer support staff
    Support,
    /// Buyer who also sells
    Seller,
    /// Default authenticated user
    Buyer,
}

impl Role {
    /// Parse a role name (case-insensitive, surrounding whitespace ignored).
    pub fn from_name(name: &str) -> Option<Role> {
        match name.trim().to_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "support" => Some(Role::Support),
            "seller" => Some(Role::Seller),
            "buyer" => Some(Role::Buyer),
            _ => None,
        }
    }

    /// Resolve the effective role from a role claim and the seller flag.
    ///
    /// Total over every input. Selling is a capability: a buyer, an
    /// unrecognized role or a missing role with `is_seller` set resolves to
    /// [`Role::Seller`]. Admin and support keep their role regardless.
    pub fn resolve(name: Option<&str>, is_seller: bool) -> Role {
        match name.and_then(Role::from_name) {
            Some(Role::Admin) => Role::Admin,
            Some(Role::Support) => Role::Support,
            Some(Role::Seller) => Role::Seller,
            Some(Role::Buyer) | None if is_seller => Role::Seller,
            Some(Role::Buyer) | None => Role::Buyer,
        }
    }

    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Support => "support",
            Role::Seller => "seller",
            Role::Buyer => "buyer",
        }
    }
}

impl Default for Role {
    /// Default role is Buyer (least privilege for authenticated users).
    fn default() -> Self {
        Role::Buyer
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_name_parses_case_insensitively() {
        assert_eq!(Role::from_name("admin"), Some(Role::Admin));
        assert_eq!(Role::from_name("ADMIN"), Some(Role::Admin));
        assert_eq!(Role::from_name(" Seller "), Some(Role::Seller));
        assert_eq!(Role::from_name("unknown"), None);
        assert_eq!(Role::from_name(""), None);
    }

    #[test]
    fn seller_flag_upgrades_buyer_and_unknown() {
        assert_eq!(Role::resolve(Some("buyer"), true), Role::Seller);
        assert_eq!(Role::resolve(Some("unknown-role"), true), Role::Seller);
        assert_eq!(Role::resolve(None, true), Role::Seller);
        assert_eq!(Role::resolve(Some(""), true), Role::Seller);
    }

    #[test]
    fn seller_flag_does_not_demote_staff() {
        assert_eq!(Role::resolve(Some("admin"), true), Role::Admin);
        assert_eq!(Role::resolve(Some("support"), true), Role::Support);
    }

    #[test]
    fn unknown_role_without_flag_is_buyer() {
        assert_eq!(Role::resolve(Some("unknown-role"), false), Role::Buyer);
        assert_eq!(Role::resolve(None, false), Role::Buyer);
        assert_eq!(Role::default(), Role::Buyer);
    }

    #[test]
    fn display_matches_wire_name() {
        assert_eq!(Role::Support.to_string(), "support");
    }
}
