// SPDX-License-Identifier: GPL-3.0-only

//! Canonical client-side state
//!
//! Stores are registered with the dispatcher and see every action in dispatch
//! order. They expose synchronous getters and notify change listeners once per
//! dispatched action that changed them.

mod schema;
mod session;
mod subscriptions;
mod volume;

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use pool_contracts::Action;

pub use schema::SchemaStore;
pub use session::SessionStore;
pub use subscriptions::SubscriptionStore;
pub use volume::VolumeStore;

/// Handle returned when a change listener is registered; removes exactly that listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Rc<dyn Fn()>;

#[derive(Default)]
pub struct ChangeListeners {
    next_id: Cell<u64>,
    entries: RefCell<Vec<(ListenerId, Listener)>>,
}

impl fmt::Debug for ChangeListeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeListeners")
            .field("count", &self.len())
            .finish()
    }
}

impl ChangeListeners {
    pub fn add(&self, listener: Box<dyn Fn()>) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.entries.borrow_mut().push((id, Rc::from(listener)));
        id
    }

    /// Returns false when `id` was not registered (already removed).
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|(entry, _)| *entry != id);
        entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn emit(&self) {
        // Snapshot so listeners may add or remove listeners while being notified.
        let listeners: Vec<Listener> = self
            .entries
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();

        for listener in listeners {
            listener();
        }
    }
}

pub trait Store {
    fn name(&self) -> &'static str;

    /// Apply an action. Returns true when observable state changed.
    fn handle(&self, action: &Action) -> bool;

    fn listeners(&self) -> &ChangeListeners;

    fn add_change_listener(&self, listener: Box<dyn Fn()>) -> ListenerId {
        self.listeners().add(listener)
    }

    fn remove_change_listener(&self, id: ListenerId) -> bool {
        self.listeners().remove(id)
    }

    fn emit_change(&self) {
        self.listeners().emit();
    }
}
