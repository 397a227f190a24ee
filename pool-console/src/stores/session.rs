// SPDX-License-Identifier: GPL-3.0-only

use std::cell::RefCell;

use pool_contracts::{Action, AuthState};

use super::{ChangeListeners, Store};

/// Connection and authentication state of the middleware session
#[derive(Debug, Default)]
pub struct SessionStore {
    auth: RefCell<AuthState>,
    listeners: ChangeListeners,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth.borrow().authenticated
    }

    pub fn username(&self) -> Option<String> {
        self.auth.borrow().username.clone()
    }
}

impl Store for SessionStore {
    fn name(&self) -> &'static str {
        "SessionStore"
    }

    fn handle(&self, action: &Action) -> bool {
        let Action::UpdateAuthState { auth_state } = action else {
            return false;
        };

        let mut auth = self.auth.borrow_mut();
        if *auth == *auth_state {
            return false;
        }
        if auth.authenticated != auth_state.authenticated {
            tracing::info!(authenticated = auth_state.authenticated, "middleware session changed");
        }
        *auth = auth_state.clone();
        true
    }

    fn listeners(&self) -> &ChangeListeners {
        &self.listeners
    }
}
