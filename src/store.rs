// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory marketplace store.
//!
//! Stands in for the listing, order and message repositories. It performs
//! no authorization; callers check scopes and requirements first.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{
    CreateListingRequest, CreateMessageRequest, Listing, Message, Order, OrderStatus,
};

/// Upper bound on message bodies, in characters.
pub const MAX_MESSAGE_LEN: usize = 4000;

#[derive(Default)]
pub struct InMemoryStore {
    listings: HashMap<String, Listing>,
    orders: HashMap<String, Order>,
    messages: HashMap<String, Message>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_listing(
        &mut self,
        seller_id: &str,
        request: CreateListingRequest,
    ) -> Result<Listing, ApiError> {
        let title = request.title.trim();
        if title.is_empty() {
            return Err(ApiError::bad_request("Listing title is required"));
        }
        if request.price_cents == 0 {
            return Err(ApiError::bad_request("Listing price must be positive"));
        }

        let listing = Listing {
            id: Uuid::new_v4().to_string(),
            seller_id: seller_id.to_string(),
            title: title.to_string(),
            price_cents: request.price_cents,
            created_at: Utc::now(),
        };
        self.listings.insert(listing.id.clone(), listing.clone());
        Ok(listing)
    }

    pub fn listing(&self, listing_id: &str) -> Result<Listing, ApiError> {
        self.listings
            .get(listing_id)
            .cloned()
            .ok_or_else(|| ApiError::not_found("Listing not found"))
    }

    /// Record an order for an existing listing.
    pub fn place_order(
        &mut self,
        buyer_id: &str,
        listing_id: &str,
        quantity: u32,
    ) -> Result<Order, ApiError> {
        if quantity == 0 {
            return Err(ApiError::bad_request("Quantity must be positive"));
        }
        let listing = self.listing(listing_id)?;
        let order = Order {
            id: Uuid::new_v4().to_string(),
            buyer_id: buyer_id.to_string(),
            listing_id: listing.id,
            quantity,
            total_cents: listing.price_cents.saturating_mul(u64::from(quantity)),
            status: OrderStatus::Pending,
            created_at: Utc::now(),
        };
        self.orders.insert(order.id.clone(), order.clone());
        Ok(order)
    }

    /// Orders placed by one buyer, newest first.
    pub fn orders_for_buyer(&self, buyer_id: &str) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .orders
            .values()
            .filter(|order| order.buyer_id == buyer_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders
    }

    pub fn create_message(
        &mut self,
        author_id: &str,
        request: CreateMessageRequest,
    ) -> Result<Message, ApiError> {
        self.insert_message_at(author_id, request, Utc::now())
    }

    /// Insert a message with an explicit creation time.
    pub fn insert_message_at(
        &mut self,
        author_id: &str,
        request: CreateMessageRequest,
        created_at: DateTime<Utc>,
    ) -> Result<Message, ApiError> {
        if request.conversation_id.trim().is_empty() {
            return Err(ApiError::bad_request("Conversation id is required"));
        }
        let body = validate_body(&request.body)?;
        let message = Message {
            id: Uuid::new_v4().to_string(),
            conversation_id: request.conversation_id,
            author_id: author_id.to_string(),
            body,
            created_at,
            edited_at: None,
        };
        self.messages.insert(message.id.clone(), message.clone());
        Ok(message)
    }

    pub fn message(&self, message_id: &str) -> Result<Message, ApiError> {
        self.messages
            .get(message_id)
            .cloned()
            .ok_or_else(|| ApiError::not_found("Message not found"))
    }

    pub fn update_message_body(
        &mut self,
        message_id: &str,
        body: &str,
    ) -> Result<Message, ApiError> {
        let body = validate_body(body)?;
        let message = self
            .messages
            .get_mut(message_id)
            .ok_or_else(|| ApiError::not_found("Message not found"))?;
        message.body = body;
        message.edited_at = Some(Utc::now());
        Ok(message.clone())
    }
}

fn validate_body(body: &str) -> Result<String, ApiError> {
    let body = body.trim();
    if body.is_empty() {
        return Err(ApiError::bad_request("Message body is required"));
    }
    if body.chars().count() > MAX_MESSAGE_LEN {
        return Err(ApiError::unprocessable(format!(
            "Message body exceeds {MAX_MESSAGE_LEN} characters"
        )));
    }
    Ok(body.to_string())
}
