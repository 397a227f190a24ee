// SPDX-License-Identifier: GPL-3.0-only

//! Test support for the ZFS pool console
//!
//! - [`fixtures`] builds pools, disks and middleware events
//! - [`middleware::RecordingMiddleware`] stands in for the middleware client on the UI thread
//! - [`transport::ScriptedTransport`] stands in for the D-Bus transport under the real client

pub mod errors;
pub mod fixtures;
pub mod middleware;
pub mod transport;
