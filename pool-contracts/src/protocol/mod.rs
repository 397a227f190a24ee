// SPDX-License-Identifier: GPL-3.0-only

pub mod action;
pub mod error;
pub mod events;
pub mod id;

pub use action::{Action, ActionType, AuthState, SubscriptionMask};
pub use error::{MiddlewareError, MiddlewareErrorKind};
pub use events::{EntityChange, EntityOperation, EventData};
pub use id::{RequestId, RequestKind};

/// RPC method names understood by the middleware
pub mod methods {
    pub const VOLUME_QUERY: &str = "volume.query";
    pub const VOLUME_AVAILABLE_DISKS: &str = "volume.get_available_disks";
    pub const VOLUME_CREATE: &str = "volume.create";
    pub const DISCOVERY_SERVICES: &str = "discovery.get_services";
    pub const DISCOVERY_METHODS: &str = "discovery.get_methods";
}

/// Event masks pushed by the middleware's entity subscriber
pub mod masks {
    pub const VOLUME_CHANGED: &str = "entity-subscriber.volume.changed";
    pub const DISK_CHANGED: &str = "entity-subscriber.disk.changed";
}
