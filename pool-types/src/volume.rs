// SPDX-License-Identifier: GPL-3.0-only

//! Pool ("volume") models
//!
//! `ConfirmedVolume` is what the middleware reports and the volume store owns.
//! `DraftVolume` is a pool being assembled in the Storage view; it is edited in
//! place and only leaves the client through `to_create_request`.

use serde::{Deserialize, Serialize};

use crate::{
    CreateVolumeRequest, DiskId, DraftError, DraftVdev, Topology, TopologyError, TopologyGroup,
    Vdev, VdevType,
};

/// Volume type reported for every ZFS pool
pub const ZFS_VOLUME_TYPE: &str = "zfs";

/// Datasets are passed through to the views untouched
pub type Dataset = serde_json::Value;

fn zfs_volume_type() -> String {
    ZFS_VOLUME_TYPE.to_string()
}

/// A ZFS property as reported by the middleware
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyValue {
    pub value: u64,

    #[serde(default)]
    pub rawvalue: Option<String>,

    /// Where the value comes from (e.g. "NONE", "DEFAULT", "LOCAL")
    #[serde(default)]
    pub source: Option<String>,
}

impl PropertyValue {
    pub fn new(value: u64) -> Self {
        Self {
            value,
            rawvalue: Some(value.to_string()),
            source: None,
        }
    }
}

/// Capacity properties of a confirmed pool, still wrapped in value containers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmedProperties {
    #[serde(default)]
    pub free: PropertyValue,
    #[serde(default)]
    pub allocated: PropertyValue,
    #[serde(default)]
    pub size: PropertyValue,
}

impl ConfirmedProperties {
    pub fn unwrap_values(&self) -> PoolProperties {
        PoolProperties {
            free: self.free.value,
            allocated: self.allocated.value,
            size: self.size.value,
        }
    }
}

/// Plain capacity numbers in bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolProperties {
    pub free: u64,
    pub allocated: u64,
    pub size: u64,
}

impl PoolProperties {
    /// Allocated share of the pool in percent (0-100)
    pub fn percent_used(&self) -> u32 {
        if self.size == 0 {
            return 0;
        }
        ((self.allocated as u128 * 100) / self.size as u128).min(100) as u32
    }
}

/// A pool that exists on the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmedVolume {
    #[serde(default)]
    pub id: Option<String>,

    pub name: String,

    #[serde(rename = "type", default = "zfs_volume_type")]
    pub volume_type: String,

    #[serde(default)]
    pub topology: Topology<Vdev>,

    #[serde(default)]
    pub properties: ConfirmedProperties,

    #[serde(default)]
    pub datasets: Vec<Dataset>,

    /// Pool health as reported by ZFS
    #[serde(default)]
    pub status: Option<String>,
}

impl ConfirmedVolume {
    /// Identity used to match store updates: the server id when present, else the name
    pub fn key(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.name)
    }
}

/// A pool being assembled locally, not yet on the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftVolume {
    pub name: String,

    #[serde(rename = "type")]
    pub volume_type: String,

    pub topology: Topology<DraftVdev>,

    pub properties: PoolProperties,
}

impl Default for DraftVolume {
    fn default() -> Self {
        Self::fresh()
    }
}

impl DraftVolume {
    /// An empty ZFS pool: no vdevs, zero capacity, no name
    pub fn fresh() -> Self {
        Self {
            name: String::new(),
            volume_type: zfs_volume_type(),
            topology: Topology::default(),
            properties: PoolProperties::default(),
        }
    }

    /// Every disk currently placed in this draft
    pub fn claimed_disks(&self) -> impl Iterator<Item = &DiskId> {
        self.topology
            .groups()
            .flat_map(|(_, vdevs)| vdevs.iter())
            .flat_map(|vdev| vdev.disks.iter())
    }

    pub fn contains_disk(&self, disk: &DiskId) -> bool {
        self.claimed_disks().any(|claimed| claimed == disk)
    }

    /// Append an empty vdev to `group`, returning its index
    pub fn add_vdev(&mut self, group: TopologyGroup) -> usize {
        let vdevs = self.topology.group_mut(group);
        vdevs.push(DraftVdev::new(VdevType::Disk));
        vdevs.len() - 1
    }

    /// Remove a vdev, handing back its disks
    pub fn remove_vdev(
        &mut self,
        group: TopologyGroup,
        index: usize,
    ) -> Result<DraftVdev, TopologyError> {
        let vdevs = self.topology.group_mut(group);
        if index >= vdevs.len() {
            return Err(TopologyError::VdevNotFound { group, index });
        }
        Ok(vdevs.remove(index))
    }

    pub fn set_vdev_type(
        &mut self,
        group: TopologyGroup,
        index: usize,
        vdev_type: VdevType,
    ) -> Result<(), TopologyError> {
        if !group.allows(vdev_type) {
            return Err(TopologyError::TypeNotAllowed { group, vdev_type });
        }
        self.vdev_mut(group, index)?.retype(vdev_type)
    }

    pub fn add_disk(
        &mut self,
        group: TopologyGroup,
        index: usize,
        disk: DiskId,
    ) -> Result<(), TopologyError> {
        if self.contains_disk(&disk) {
            return Err(TopologyError::DiskAlreadyMember(disk));
        }
        self.vdev_mut(group, index)?.push_disk(disk, group)
    }

    pub fn remove_disk(
        &mut self,
        group: TopologyGroup,
        vdev: usize,
        disk_index: usize,
    ) -> Result<DiskId, TopologyError> {
        self.vdev_mut(group, vdev)?
            .take_disk(disk_index)
            .ok_or(TopologyError::DiskNotFound {
                group,
                vdev,
                index: disk_index,
            })
    }

    fn vdev_mut(
        &mut self,
        group: TopologyGroup,
        index: usize,
    ) -> Result<&mut DraftVdev, TopologyError> {
        self.topology
            .group_mut(group)
            .get_mut(index)
            .ok_or(TopologyError::VdevNotFound { group, index })
    }

    /// Validate the draft and build the request sent to the middleware
    pub fn to_create_request(&self) -> Result<CreateVolumeRequest, DraftError> {
        validate_pool_name(&self.name)?;

        if self.topology.data.is_empty() {
            return Err(DraftError::NoDataVdevs);
        }

        for (group, vdevs) in self.topology.groups() {
            for (index, vdev) in vdevs.iter().enumerate() {
                if !vdev.is_complete() {
                    return Err(DraftError::IncompleteVdev {
                        group,
                        index,
                        vdev_type: vdev.vdev_type,
                        have: vdev.disks.len(),
                        need: vdev.vdev_type.min_disks(),
                    });
                }
            }
        }

        Ok(CreateVolumeRequest {
            name: self.name.clone(),
            volume_type: self.volume_type.clone(),
            topology: self.topology.map(DraftVdev::to_vdev),
        })
    }
}

const RESERVED_PREFIXES: [&str; 4] = ["mirror", "raidz", "draid", "spare"];

fn validate_pool_name(name: &str) -> Result<(), DraftError> {
    if name.is_empty() {
        return Err(DraftError::MissingName);
    }

    let invalid = |reason| DraftError::InvalidName {
        name: name.to_string(),
        reason,
    };

    if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return Err(invalid("must start with a letter"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'))
    {
        return Err(invalid("only letters, digits, '_', '-', '.' and ':' are allowed"));
    }
    if name == "log" || RESERVED_PREFIXES.iter().any(|prefix| name.starts_with(prefix)) {
        return Err(invalid("name is reserved by ZFS"));
    }

    Ok(())
}
