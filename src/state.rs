// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::auth::middleware::RequestGate;
use crate::auth::registry::AuthenticatorRegistry;
use crate::auth::requirements::OwnerWithinWindow;
use crate::config::DEFAULT_MESSAGE_EDIT_WINDOW_MINUTES;
use crate::store::InMemoryStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RwLock<InMemoryStore>>,
    pub gate: RequestGate,
    /// Who may edit a message, and for how long after posting.
    pub message_edit: OwnerWithinWindow,
}

impl AppState {
    pub fn new(store: InMemoryStore, gate: RequestGate) -> Self {
        Self {
            store: Arc::new(RwLock::new(store)),
            gate,
            message_edit: OwnerWithinWindow::new(chrono::Duration::minutes(
                DEFAULT_MESSAGE_EDIT_WINDOW_MINUTES,
            )),
        }
    }

    pub fn with_message_edit_window(mut self, window: chrono::Duration) -> Self {
        self.message_edit = OwnerWithinWindow::new(window);
        self
    }

    pub fn registry(&self) -> &Arc<AuthenticatorRegistry> {
        self.gate.registry()
    }
}

impl Default for AppState {
    /// State with no trusted issuers: every caller is anonymous.
    fn default() -> Self {
        Self::new(
            InMemoryStore::new(),
            RequestGate::new(Arc::new(AuthenticatorRegistry::new())),
        )
    }
}
