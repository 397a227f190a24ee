// SPDX-License-Identifier: GPL-3.0-only

use std::cell::RefCell;
use std::collections::BTreeMap;

use pool_contracts::Action;

use super::{ChangeListeners, Store};

#[derive(Debug, Default)]
struct SchemaState {
    services: Vec<String>,
    methods: BTreeMap<String, Vec<String>>,
}

/// RPC services and methods advertised by the middleware
#[derive(Debug, Default)]
pub struct SchemaStore {
    state: RefCell<SchemaState>,
    listeners: ChangeListeners,
}

impl SchemaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn services(&self) -> Vec<String> {
        self.state.borrow().services.clone()
    }

    pub fn methods(&self, service: &str) -> Vec<String> {
        self.state
            .borrow()
            .methods
            .get(service)
            .cloned()
            .unwrap_or_default()
    }

    /// Whether `method` (e.g. "volume.create") was advertised
    pub fn has_method(&self, method: &str) -> bool {
        let Some((service, name)) = method.split_once('.') else {
            return false;
        };
        self.state
            .borrow()
            .methods
            .get(service)
            .is_some_and(|methods| methods.iter().any(|known| known == name || known == method))
    }
}

impl Store for SchemaStore {
    fn name(&self) -> &'static str {
        "SchemaStore"
    }

    fn handle(&self, action: &Action) -> bool {
        let mut state = self.state.borrow_mut();

        match action {
            Action::ReceiveRpcServices { services } => {
                if state.services == *services {
                    return false;
                }
                state.services = services.clone();
                let SchemaState { services, methods } = &mut *state;
                methods.retain(|service, _| services.contains(service));
                true
            }
            Action::ReceiveRpcServiceMethods { service, methods } => {
                if state.methods.get(service) == Some(methods) {
                    return false;
                }
                state.methods.insert(service.clone(), methods.clone());
                true
            }
            _ => false,
        }
    }

    fn listeners(&self) -> &ChangeListeners {
        &self.listeners
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn methods_are_kept_per_service() {
        let store = SchemaStore::new();
        assert!(store.handle(&Action::ReceiveRpcServices {
            services: names(&["volume", "disk"]),
        }));
        assert!(store.handle(&Action::ReceiveRpcServiceMethods {
            service: "volume".to_string(),
            methods: names(&["query", "create"]),
        }));

        assert_eq!(store.services(), names(&["volume", "disk"]));
        assert_eq!(store.methods("volume"), names(&["query", "create"]));
        assert!(store.has_method("volume.create"));
        assert!(!store.has_method("disk.wipe"));
        assert!(store.methods("disk").is_empty());
    }

    #[test]
    fn unchanged_payload_is_not_a_change() {
        let store = SchemaStore::new();
        let action = Action::ReceiveRpcServices {
            services: names(&["volume"]),
        };
        assert!(store.handle(&action));
        assert!(!store.handle(&action));
    }

    #[test]
    fn dropped_service_forgets_its_methods() {
        let store = SchemaStore::new();
        store.handle(&Action::ReceiveRpcServices {
            services: names(&["volume", "disk"]),
        });
        store.handle(&Action::ReceiveRpcServiceMethods {
            service: "disk".to_string(),
            methods: names(&["query"]),
        });
        store.handle(&Action::ReceiveRpcServices {
            services: names(&["volume"]),
        });

        assert!(store.methods("disk").is_empty());
    }
}
