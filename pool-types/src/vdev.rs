// SPDX-License-Identifier: GPL-3.0-only

//! Virtual device models
//!
//! `Vdev` mirrors the nested shape the middleware reports for an existing pool,
//! while `DraftVdev` is the flat form edited while a new pool is assembled.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{DiskId, TopologyError, TopologyGroup};

/// Redundancy layout of a vdev
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VdevType {
    #[default]
    Disk,
    Mirror,
    Raidz1,
    Raidz2,
    Raidz3,
}

impl VdevType {
    pub const ALL: [VdevType; 5] = [
        VdevType::Disk,
        VdevType::Mirror,
        VdevType::Raidz1,
        VdevType::Raidz2,
        VdevType::Raidz3,
    ];

    /// Smallest number of member disks a vdev of this type can be created with
    pub fn min_disks(self) -> usize {
        match self {
            Self::Disk => 1,
            Self::Mirror => 2,
            Self::Raidz1 => 3,
            Self::Raidz2 => 4,
            Self::Raidz3 => 5,
        }
    }

    pub fn max_disks(self) -> Option<usize> {
        match self {
            Self::Disk => Some(1),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disk => "disk",
            Self::Mirror => "mirror",
            Self::Raidz1 => "raidz1",
            Self::Raidz2 => "raidz2",
            Self::Raidz3 => "raidz3",
        }
    }
}

impl fmt::Display for VdevType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vdev type of an existing pool
///
/// ZFS reports layouts a draft can never hold, such as `replacing` while a
/// disk resilvers or `spare` while a hot spare is in use. Those are kept
/// verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReportedVdevType {
    Known(VdevType),
    Other(String),
}

impl ReportedVdevType {
    pub fn known(&self) -> Option<VdevType> {
        match self {
            Self::Known(vdev_type) => Some(*vdev_type),
            Self::Other(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Known(vdev_type) => vdev_type.as_str(),
            Self::Other(name) => name,
        }
    }
}

impl From<VdevType> for ReportedVdevType {
    fn from(vdev_type: VdevType) -> Self {
        Self::Known(vdev_type)
    }
}

impl PartialEq<VdevType> for ReportedVdevType {
    fn eq(&self, other: &VdevType) -> bool {
        self.known() == Some(*other)
    }
}

impl fmt::Display for ReportedVdevType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A vdev as reported by the middleware for an existing pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vdev {
    #[serde(rename = "type")]
    pub vdev_type: ReportedVdevType,

    /// Device path, set on leaf (`disk`) vdevs
    #[serde(default)]
    pub path: Option<String>,

    #[serde(default)]
    pub guid: Option<String>,

    /// Health as reported by ZFS (e.g. "ONLINE", "DEGRADED")
    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub children: Vec<Vdev>,
}

impl Vdev {
    /// Leaf vdev backed by a single disk
    pub fn disk(disk: &DiskId) -> Self {
        Self {
            vdev_type: VdevType::Disk.into(),
            path: Some(disk.as_str().to_string()),
            guid: None,
            status: None,
            children: Vec::new(),
        }
    }

    /// Device paths of every leaf below (and including) this vdev
    pub fn disk_paths(&self) -> Vec<&str> {
        let mut paths = Vec::new();
        self.collect_paths(&mut paths);
        paths
    }

    fn collect_paths<'a>(&'a self, out: &mut Vec<&'a str>) {
        if let Some(path) = self.path.as_deref()
            && self.children.is_empty()
        {
            out.push(path);
        }
        for child in &self.children {
            child.collect_paths(out);
        }
    }
}

/// A vdev being assembled in a draft pool
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftVdev {
    pub vdev_type: VdevType,
    pub disks: Vec<DiskId>,
}

impl DraftVdev {
    pub fn new(vdev_type: VdevType) -> Self {
        Self {
            vdev_type,
            disks: Vec::new(),
        }
    }

    pub fn contains(&self, disk: &DiskId) -> bool {
        self.disks.contains(disk)
    }

    /// Whether the vdev has enough disks for its type
    pub fn is_complete(&self) -> bool {
        let count = self.disks.len();
        count >= self.vdev_type.min_disks()
            && self.vdev_type.max_disks().is_none_or(|max| count <= max)
    }

    /// Append a disk. A single-disk vdev that gains a second disk becomes a
    /// mirror when the group allows mirrors.
    pub(crate) fn push_disk(
        &mut self,
        disk: DiskId,
        group: TopologyGroup,
    ) -> Result<(), TopologyError> {
        if self.vdev_type == VdevType::Disk && !self.disks.is_empty() {
            if !group.allows(VdevType::Mirror) {
                return Err(TopologyError::VdevFull { group });
            }
            self.vdev_type = VdevType::Mirror;
        }
        self.disks.push(disk);
        Ok(())
    }

    /// Remove the disk at `index`. A mirror left with one disk becomes a plain disk vdev.
    pub(crate) fn take_disk(&mut self, index: usize) -> Option<DiskId> {
        if index >= self.disks.len() {
            return None;
        }
        let disk = self.disks.remove(index);
        if self.vdev_type == VdevType::Mirror && self.disks.len() == 1 {
            self.vdev_type = VdevType::Disk;
        }
        Some(disk)
    }

    pub(crate) fn retype(&mut self, vdev_type: VdevType) -> Result<(), TopologyError> {
        if let Some(max) = vdev_type.max_disks()
            && self.disks.len() > max
        {
            return Err(TopologyError::TooManyDisks {
                vdev_type,
                have: self.disks.len(),
            });
        }
        self.vdev_type = vdev_type;
        Ok(())
    }

    /// Convert into the nested layout the middleware expects
    pub fn to_vdev(&self) -> Vdev {
        if self.vdev_type == VdevType::Disk
            && let [disk] = self.disks.as_slice()
        {
            return Vdev::disk(disk);
        }

        Vdev {
            vdev_type: self.vdev_type.into(),
            path: None,
            guid: None,
            status: None,
            children: self.disks.iter().map(Vdev::disk).collect(),
        }
    }
}
