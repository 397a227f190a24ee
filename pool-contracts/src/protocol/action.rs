// SPDX-License-Identifier: GPL-3.0-only

//! The dispatch envelope
//!
//! Every change that reaches the stores arrives as one `Action`. The enum is
//! closed so stores match on it exhaustively instead of inspecting payload
//! shapes at runtime.

use std::fmt;

use pool_types::{ConfirmedVolume, DiskId};
use serde::{Deserialize, Serialize};

use super::{EventData, MiddlewareError, RequestId, RequestKind};

/// Identifier of a class of server-pushed events
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionMask(String);

impl SubscriptionMask {
    pub fn new(mask: impl Into<String>) -> Self {
        Self(mask.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubscriptionMask {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Session state reported by the middleware connection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthState {
    pub authenticated: bool,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    UpdateAuthState {
        auth_state: AuthState,
    },
    SubscribeToMask {
        mask: SubscriptionMask,
    },
    UnsubscribeFromMask {
        mask: SubscriptionMask,
    },
    MiddlewareEvent {
        event: EventData,
    },
    ReceiveRpcServices {
        services: Vec<String>,
    },
    ReceiveRpcServiceMethods {
        service: String,
        methods: Vec<String>,
    },
    RequestIssued {
        request_id: RequestId,
        kind: RequestKind,
    },
    ReceiveVolumes {
        request_id: RequestId,
        volumes: Vec<ConfirmedVolume>,
    },
    ReceiveAvailableDisks {
        request_id: RequestId,
        disks: Vec<DiskId>,
    },
    RequestFailed {
        request_id: RequestId,
        kind: RequestKind,
        error: MiddlewareError,
    },
}

/// Fieldless mirror of `Action`, for logging and diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionType {
    UpdateAuthState,
    SubscribeToMask,
    UnsubscribeFromMask,
    MiddlewareEvent,
    ReceiveRpcServices,
    ReceiveRpcServiceMethods,
    RequestIssued,
    ReceiveVolumes,
    ReceiveAvailableDisks,
    RequestFailed,
}

impl ActionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UpdateAuthState => "UPDATE_AUTH_STATE",
            Self::SubscribeToMask => "SUBSCRIBE_TO_MASK",
            Self::UnsubscribeFromMask => "UNSUBSCRIBE_FROM_MASK",
            Self::MiddlewareEvent => "MIDDLEWARE_EVENT",
            Self::ReceiveRpcServices => "RECEIVE_RPC_SERVICES",
            Self::ReceiveRpcServiceMethods => "RECEIVE_RPC_SERVICE_METHODS",
            Self::RequestIssued => "REQUEST_ISSUED",
            Self::ReceiveVolumes => "RECEIVE_VOLUMES",
            Self::ReceiveAvailableDisks => "RECEIVE_AVAILABLE_DISKS",
            Self::RequestFailed => "REQUEST_FAILED",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Action {
    pub fn action_type(&self) -> ActionType {
        match self {
            Self::UpdateAuthState { .. } => ActionType::UpdateAuthState,
            Self::SubscribeToMask { .. } => ActionType::SubscribeToMask,
            Self::UnsubscribeFromMask { .. } => ActionType::UnsubscribeFromMask,
            Self::MiddlewareEvent { .. } => ActionType::MiddlewareEvent,
            Self::ReceiveRpcServices { .. } => ActionType::ReceiveRpcServices,
            Self::ReceiveRpcServiceMethods { .. } => ActionType::ReceiveRpcServiceMethods,
            Self::RequestIssued { .. } => ActionType::RequestIssued,
            Self::ReceiveVolumes { .. } => ActionType::ReceiveVolumes,
            Self::ReceiveAvailableDisks { .. } => ActionType::ReceiveAvailableDisks,
            Self::RequestFailed { .. } => ActionType::RequestFailed,
        }
    }
}
