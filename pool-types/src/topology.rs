// SPDX-License-Identifier: GPL-3.0-only

//! Pool topology: vdevs grouped by purpose

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::{Vdev, VdevType};

/// Functionally distinct vdev categories within a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopologyGroup {
    Data,
    Logs,
    Cache,
    Spare,
}

impl TopologyGroup {
    pub const ALL: [TopologyGroup; 4] = [
        TopologyGroup::Data,
        TopologyGroup::Logs,
        TopologyGroup::Cache,
        TopologyGroup::Spare,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::Logs => "logs",
            Self::Cache => "cache",
            Self::Spare => "spare",
        }
    }

    /// Whether ZFS accepts a vdev of `vdev_type` in this group
    pub fn allows(self, vdev_type: VdevType) -> bool {
        match self {
            Self::Data => true,
            Self::Logs => matches!(vdev_type, VdevType::Disk | VdevType::Mirror),
            Self::Cache | Self::Spare => vdev_type == VdevType::Disk,
        }
    }
}

impl fmt::Display for TopologyGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four vdev groups of a pool.
///
/// Groups that are absent or `null` in a payload deserialize as empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(deserialize = "V: Deserialize<'de>"))]
pub struct Topology<V = Vdev> {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub data: Vec<V>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub logs: Vec<V>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub cache: Vec<V>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub spare: Vec<V>,
}

impl<V> Default for Topology<V> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            logs: Vec::new(),
            cache: Vec::new(),
            spare: Vec::new(),
        }
    }
}

impl<V> Topology<V> {
    pub fn group(&self, group: TopologyGroup) -> &[V] {
        match group {
            TopologyGroup::Data => &self.data,
            TopologyGroup::Logs => &self.logs,
            TopologyGroup::Cache => &self.cache,
            TopologyGroup::Spare => &self.spare,
        }
    }

    pub fn group_mut(&mut self, group: TopologyGroup) -> &mut Vec<V> {
        match group {
            TopologyGroup::Data => &mut self.data,
            TopologyGroup::Logs => &mut self.logs,
            TopologyGroup::Cache => &mut self.cache,
            TopologyGroup::Spare => &mut self.spare,
        }
    }

    pub fn groups(&self) -> impl Iterator<Item = (TopologyGroup, &[V])> {
        TopologyGroup::ALL
            .into_iter()
            .map(move |group| (group, self.group(group)))
    }

    pub fn is_empty(&self) -> bool {
        self.groups().all(|(_, vdevs)| vdevs.is_empty())
    }

    pub fn vdev_count(&self) -> usize {
        self.groups().map(|(_, vdevs)| vdevs.len()).sum()
    }

    /// Apply `f` to every vdev, keeping the grouping
    pub fn map<U>(&self, mut f: impl FnMut(&V) -> U) -> Topology<U> {
        Topology {
            data: self.data.iter().map(&mut f).collect(),
            logs: self.logs.iter().map(&mut f).collect(),
            cache: self.cache.iter().map(&mut f).collect(),
            spare: self.spare.iter().map(&mut f).collect(),
        }
    }
}

fn null_as_empty<'de, D, V>(deserializer: D) -> Result<Vec<V>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    Ok(Option::<Vec<V>>::deserialize(deserializer)?.unwrap_or_default())
}
