// SPDX-License-Identifier: GPL-3.0-only

use thiserror::Error;

use crate::{DiskId, TopologyGroup, VdevType};

/// Errors raised while editing a draft pool's topology
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    #[error("no {group} vdev at index {index}")]
    VdevNotFound { group: TopologyGroup, index: usize },

    #[error("no disk at index {index} in {group} vdev {vdev}")]
    DiskNotFound {
        group: TopologyGroup,
        vdev: usize,
        index: usize,
    },

    #[error("disk {0} is already part of this pool")]
    DiskAlreadyMember(DiskId),

    #[error("{vdev_type} vdevs are not allowed in the {group} group")]
    TypeNotAllowed {
        group: TopologyGroup,
        vdev_type: VdevType,
    },

    #[error("{group} vdevs hold a single disk")]
    VdevFull { group: TopologyGroup },

    #[error("a {vdev_type} vdev cannot hold {have} disks")]
    TooManyDisks { vdev_type: VdevType, have: usize },
}

/// Reasons a draft pool cannot be turned into a create request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DraftError {
    #[error("pool name is required")]
    MissingName,

    #[error("invalid pool name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("a pool needs at least one data vdev")]
    NoDataVdevs,

    #[error("{group} vdev {index} ({vdev_type}) needs {need} disks, has {have}")]
    IncompleteVdev {
        group: TopologyGroup,
        index: usize,
        vdev_type: VdevType,
        have: usize,
        need: usize,
    },
}
