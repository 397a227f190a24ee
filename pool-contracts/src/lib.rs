// SPDX-License-Identifier: GPL-3.0-only

pub mod actions;
pub mod client;
pub mod protocol;
pub mod subscriptions;
pub mod traits;

pub use actions::{ActionSender, ActionSink, DispatchError, MiddlewareActions};
pub use protocol::{
    Action, ActionType, AuthState, EntityChange, EntityOperation, EventData, MiddlewareError,
    MiddlewareErrorKind, RequestId, RequestKind, SubscriptionMask,
};
pub use subscriptions::{SubscriptionDelta, SubscriptionRegistry};
pub use traits::{MiddlewareTransport, ZfsMiddleware};
