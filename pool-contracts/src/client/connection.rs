// SPDX-License-Identifier: GPL-3.0-only

//! Shared D-Bus connection management
//!
//! One connection per bus is established lazily and reused by every client
//! instance.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use zbus::Connection;

use super::error::ClientError;

static SYSTEM_CONNECTION: OnceLock<Connection> = OnceLock::new();
static SESSION_CONNECTION: OnceLock<Connection> = OnceLock::new();

/// Which message bus the middleware is registered on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusKind {
    #[default]
    System,
    Session,
}

/// Get or create the shared connection for `bus`
pub async fn shared_connection(bus: BusKind) -> Result<&'static Connection, ClientError> {
    let cell = match bus {
        BusKind::System => &SYSTEM_CONNECTION,
        BusKind::Session => &SESSION_CONNECTION,
    };

    if let Some(conn) = cell.get() {
        return Ok(conn);
    }

    let conn = match bus {
        BusKind::System => Connection::system().await,
        BusKind::Session => Connection::session().await,
    }
    .map_err(|e| ClientError::Connection(format!("Failed to connect to {bus:?} bus: {e}")))?;

    // Another task may have won the race; the OnceLock keeps only one.
    let _ = cell.set(conn);

    cell.get().ok_or_else(|| {
        ClientError::Connection(format!("Failed to initialize shared {bus:?} bus connection"))
    })
}
