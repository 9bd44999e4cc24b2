// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Conversation message endpoints.
//!
//! Editing combines a role scope (`messages.write`) with a resource
//! requirement (author, within the edit window). Both must pass; staff
//! roles get no bypass.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;

use crate::auth::requirements::{AllOf, ScopeRequirement};
use crate::auth::{authorize, Auth};
use crate::error::ApiError;
use crate::models::{CreateMessageRequest, Message, UpdateMessageRequest};
use crate::state::AppState;

pub const MESSAGES_WRITE: &str = "messages.write";

/// Post a message as the caller.
#[utoipa::path(
    post,
    path = "/v1/messages",
    tag = "Messages",
    security(("bearer" = [])),
    request_body = CreateMessageRequest,
    responses(
        (status = 201, description = "Message posted", body = Message),
        (status = 400, description = "Invalid message"),
        (status = 401, description = "No authenticated identity"),
        (status = 403, description = "Missing scope messages.write"),
    )
)]
pub async fn create_message(
    Auth(identity): Auth,
    State(state): State<AppState>,
    Json(request): Json<CreateMessageRequest>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    identity.require_scope(MESSAGES_WRITE)?;

    let mut store = state.store.write().await;
    let message = store.create_message(identity.subject(), request)?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// Edit one of the caller's own messages while the edit window is open.
#[utoipa::path(
    patch,
    path = "/v1/messages/{message_id}",
    tag = "Messages",
    security(("bearer" = [])),
    params(("message_id" = String, Path, description = "Message id")),
    request_body = UpdateMessageRequest,
    responses(
        (status = 200, description = "Message updated", body = Message),
        (status = 401, description = "No authenticated identity"),
        (status = 403, description = "Missing scope, not the author, or edit window closed"),
        (status = 404, description = "Message not found"),
    )
)]
pub async fn update_message(
    Auth(identity): Auth,
    State(state): State<AppState>,
    Path(message_id): Path<String>,
    Json(request): Json<UpdateMessageRequest>,
) -> Result<Json<Message>, ApiError> {
    let mut store = state.store.write().await;
    let message = store.message(&message_id)?;

    let rule = AllOf::new()
        .and(ScopeRequirement::new(MESSAGES_WRITE))
        .and(state.message_edit);
    authorize(Some(&identity), &rule, &message.resource())?;

    let updated = store.update_message_body(&message_id, &request.body)?;
    info!(message_id = %updated.id, "Message edited");
    Ok(Json(updated))
}
