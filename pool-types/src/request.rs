// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};

use crate::{Topology, Vdev};

/// Payload of a `volume.create` call, built from a validated draft
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateVolumeRequest {
    pub name: String,

    #[serde(rename = "type")]
    pub volume_type: String,

    pub topology: Topology<Vdev>,
}

impl CreateVolumeRequest {
    /// Disk paths the new pool will consume
    pub fn disk_paths(&self) -> Vec<&str> {
        self.topology
            .groups()
            .flat_map(|(_, vdevs)| vdevs.iter())
            .flat_map(Vdev::disk_paths)
            .collect()
    }
}
