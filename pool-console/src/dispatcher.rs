// SPDX-License-Identifier: GPL-3.0-only

//! Synchronous fan-out of actions to stores

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use pool_contracts::{Action, ActionSink, DispatchError};

use crate::stores::Store;

#[derive(Default)]
pub struct Dispatcher {
    stores: RefCell<Vec<Rc<dyn Store>>>,
    dispatching: Cell<bool>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&'static str> = self.stores.borrow().iter().map(|s| s.name()).collect();
        f.debug_struct("Dispatcher")
            .field("stores", &names)
            .field("dispatching", &self.dispatching.get())
            .finish()
    }
}

/// Clears the in-dispatch flag even if a store panics.
struct DispatchGuard<'a>(&'a Cell<bool>);

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores see actions in registration order
    pub fn register(&self, store: Rc<dyn Store>) {
        tracing::debug!(store = store.name(), "store registered");
        self.stores.borrow_mut().push(store);
    }

    pub fn is_dispatching(&self) -> bool {
        self.dispatching.get()
    }

    /// Deliver `action` to every store, then notify listeners of the stores it
    /// changed. Listeners run inside the dispatch and may not dispatch again.
    pub fn dispatch(&self, action: &Action) -> Result<(), DispatchError> {
        if self.dispatching.replace(true) {
            tracing::error!(action = %action.action_type(), "re-entrant dispatch rejected");
            return Err(DispatchError::Reentrant(action.action_type()));
        }
        let _guard = DispatchGuard(&self.dispatching);

        tracing::trace!(action = %action.action_type(), "dispatch");

        let stores: Vec<Rc<dyn Store>> = self.stores.borrow().clone();
        let changed: Vec<&Rc<dyn Store>> =
            stores.iter().filter(|store| store.handle(action)).collect();

        for store in changed {
            store.emit_change();
        }

        Ok(())
    }
}

impl ActionSink for Dispatcher {
    fn handle_middleware_action(&self, action: Action) -> Result<(), DispatchError> {
        self.dispatch(&action)
    }
}
