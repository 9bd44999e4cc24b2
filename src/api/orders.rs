// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Order endpoints.

use axum::{extract::State, Json};

use crate::auth::Auth;
use crate::error::ApiError;
use crate::models::OrderList;
use crate::state::AppState;

pub const ORDERS_READ: &str = "orders.read";

/// List the caller's orders, newest first.
#[utoipa::path(
    get,
    path = "/v1/orders",
    tag = "Orders",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Orders placed by the caller", body = OrderList),
        (status = 401, description = "No authenticated identity"),
        (status = 403, description = "Missing scope orders.read"),
    )
)]
pub async fn list_orders(
    Auth(identity): Auth,
    State(state): State<AppState>,
) -> Result<Json<OrderList>, ApiError> {
    identity.require_scope(ORDERS_READ)?;
    let store = state.store.read().await;
    Ok(Json(OrderList {
        orders: store.orders_for_buyer(identity.subject()),
    }))
}
