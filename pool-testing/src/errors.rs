// SPDX-License-Identifier: GPL-3.0-only

use pool_contracts::{DispatchError, MiddlewareError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TestingError {
    #[error("invalid fixture '{name}': {reason}")]
    FixtureInvalid { name: String, reason: String },
    #[error("live middleware tests are disabled: set {variable}=1")]
    LiveDisabled { variable: &'static str },
    #[error("middleware call failed: {0}")]
    Middleware(#[from] MiddlewareError),
    #[error("dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),
}

pub type Result<T> = std::result::Result<T, TestingError>;
