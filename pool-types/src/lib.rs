// SPDX-License-Identifier: GPL-3.0-only

//! Canonical domain models for the ZFS pool console
//!
//! This crate defines the single source of truth for pool topology types.
//! They are used throughout the stack:
//!
//! - **pool-contracts**: Serializes/deserializes these types for middleware transport
//! - **pool-console**: Mirrors confirmed pools and edits draft pools in the Storage view
//!
//! ## Architecture
//!
//! A pool exists in two forms:
//!
//! - `ConfirmedVolume` → server-owned state, read-only on the client
//! - `DraftVolume` → a pool being assembled locally, never sent until submit
//!
//! The two meet only in `DraftVolume::to_create_request`, which validates the
//! draft and produces the `CreateVolumeRequest` handed to the middleware.

pub mod common;
pub mod disk;
pub mod error;
pub mod request;
pub mod topology;
pub mod vdev;
pub mod volume;

pub use common::bytes_to_pretty;
pub use disk::DiskId;
pub use error::{DraftError, TopologyError};
pub use request::CreateVolumeRequest;
pub use topology::{Topology, TopologyGroup};
pub use vdev::{DraftVdev, ReportedVdevType, Vdev, VdevType};
pub use volume::{
    ConfirmedProperties, ConfirmedVolume, Dataset, DraftVolume, PoolProperties, PropertyValue,
    ZFS_VOLUME_TYPE,
};
