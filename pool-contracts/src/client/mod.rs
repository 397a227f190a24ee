// SPDX-License-Identifier: GPL-3.0-only

//! D-Bus client for the middleware service

pub mod connection;
pub mod error;
pub mod middleware;
pub mod zfs;

pub use connection::BusKind;
pub use error::ClientError;
pub use middleware::DbusTransport;
pub use zfs::{STORAGE_MASKS, ZfsMiddlewareClient};
