// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    middleware::from_fn_with_state,
    routing::{get, patch, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{middleware::request_gate, Role},
    models::{
        CreateListingRequest, CreateMessageRequest, Listing, Message, Order, OrderList,
        OrderStatus, UpdateMessageRequest,
    },
    state::AppState,
};

pub mod health;
pub mod listings;
pub mod messages;
pub mod orders;
pub mod users;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/users/me", get(users::get_current_user))
        .route("/orders", get(orders::list_orders))
        .route("/listings", post(listings::create_listing))
        .route("/messages", post(messages::create_message))
        .route("/messages/{message_id}", patch(messages::update_message));

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .nest("/v1", v1_routes)
        .layer(from_fn_with_state(state.gate.clone(), request_gate))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        users::get_current_user,
        orders::list_orders,
        listings::create_listing,
        messages::create_message,
        messages::update_message
    ),
    components(
        schemas(
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse,
            users::UserMeResponse,
            Role,
            Listing,
            CreateListingRequest,
            Order,
            OrderList,
            OrderStatus,
            Message,
            CreateMessageRequest,
            UpdateMessageRequest
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness, readiness and issuer key status"),
        (name = "Users", description = "Caller identity"),
        (name = "Orders", description = "Buyer orders"),
        (name = "Listings", description = "Seller listings"),
        (name = "Messages", description = "Conversation messages")
    )
)]
struct ApiDoc;
