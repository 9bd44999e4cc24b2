// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Listing endpoints.

use axum::{extract::State, http::StatusCode, Json};
use tracing::info;

use crate::auth::Auth;
use crate::error::ApiError;
use crate::models::{CreateListingRequest, Listing};
use crate::state::AppState;

pub const LISTINGS_WRITE: &str = "listings.write";

/// Create a listing owned by the caller.
#[utoipa::path(
    post,
    path = "/v1/listings",
    tag = "Listings",
    security(("bearer" = [])),
    request_body = CreateListingRequest,
    responses(
        (status = 201, description = "Listing created", body = Listing),
        (status = 400, description = "Invalid listing"),
        (status = 401, description = "No authenticated identity"),
        (status = 403, description = "Missing scope listings.write"),
    )
)]
pub async fn create_listing(
    Auth(identity): Auth,
    State(state): State<AppState>,
    Json(request): Json<CreateListingRequest>,
) -> Result<(StatusCode, Json<Listing>), ApiError> {
    identity.require_scope(LISTINGS_WRITE)?;

    let mut store = state.store.write().await;
    let listing = store.create_listing(identity.subject(), request)?;
    info!(listing_id = %listing.id, seller_id = %listing.seller_id, "Listing created");
    Ok((StatusCode::CREATED, Json(listing)))
}
