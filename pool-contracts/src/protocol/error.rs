// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MiddlewareErrorKind {
    InvalidInput,
    NotFound,
    PermissionDenied,
    Conflict,
    Unsupported,
    Busy,
    Timeout,
    Unavailable,
    /// A subscribe/unsubscribe request was refused or could not be sent
    Subscription,
    Internal,
}

impl MiddlewareErrorKind {
    pub fn code(self) -> u16 {
        match self {
            Self::InvalidInput => 400,
            Self::NotFound => 404,
            Self::PermissionDenied => 403,
            Self::Conflict => 409,
            Self::Unsupported => 501,
            Self::Busy => 423,
            Self::Timeout => 504,
            Self::Unavailable => 503,
            Self::Subscription => 502,
            Self::Internal => 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind:?}: {message}")]
pub struct MiddlewareError {
    pub kind: MiddlewareErrorKind,
    pub message: String,
}

impl MiddlewareError {
    pub fn new(kind: MiddlewareErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn subscription(message: impl Into<String>) -> Self {
        Self::new(MiddlewareErrorKind::Subscription, message)
    }

    pub fn is_subscription(&self) -> bool {
        self.kind == MiddlewareErrorKind::Subscription
    }
}

impl From<serde_json::Error> for MiddlewareError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(
            MiddlewareErrorKind::Internal,
            format!("malformed middleware payload: {err}"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn middleware_error_roundtrips() {
        let error = MiddlewareError::subscription("mask rejected");
        let json = serde_json::to_string(&error).expect("serialize error");
        let parsed: MiddlewareError = serde_json::from_str(&json).expect("deserialize error");
        assert_eq!(parsed, error);
        assert!(parsed.is_subscription());
    }

    #[test]
    fn error_kind_http_family_codes_are_stable() {
        assert_eq!(MiddlewareErrorKind::InvalidInput.code(), 400);
        assert_eq!(MiddlewareErrorKind::NotFound.code(), 404);
        assert_eq!(MiddlewareErrorKind::Subscription.code(), 502);
        assert_eq!(MiddlewareErrorKind::Unavailable.code(), 503);
        assert_eq!(MiddlewareErrorKind::Internal.code(), 500);
    }
}
