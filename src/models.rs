// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response structures for the marketplace endpoints that sit
//! behind the authorization layer. All types derive `Serialize` /
//! `Deserialize` and `ToSchema` for JSON handling and OpenAPI output.
//!
//! ## Model Categories
//!
//! - **Listings**: Items offered by sellers
//! - **Orders**: Purchases made by buyers
//! - **Messages**: Buyer/seller conversation messages, editable by their
//!   author for a short window after posting

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::requirements::ResourceContext;

// =============================================================================
// Listings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Listing {
    pub id: String,
    pub seller_id: String,
    pub title: String,
    pub price_cents: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateListingRequest {
    pub title: String,
    /// Price in the smallest currency unit
    pub price_cents: u64,
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Paid,
    Shipped,
    Delivered,
    Refunded,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: String,
    pub buyer_id: String,
    pub listing_id: String,
    pub quantity: u32,
    pub total_cents: u64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderList {
    pub orders: Vec<Order>,
}

// =============================================================================
// Messages
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub author_id: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<DateTime<Utc>>,
}

impl Message {
    /// Ownership metadata for requirement checks.
    pub fn resource(&self) -> ResourceContext {
        ResourceContext::owned_by(self.author_id.clone()).created_at(self.created_at)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateMessageRequest {
    pub conversation_id: String,
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateMessageRequest {
    pub body: String,
}
