// SPDX-License-Identifier: GPL-3.0-only

use pool_contracts::protocol::masks;
use pool_contracts::{EntityOperation, EventData};
use pool_types::{
    ConfirmedProperties, ConfirmedVolume, DiskId, PropertyValue, Topology, TopologyGroup, Vdev,
    VdevType, ZFS_VOLUME_TYPE,
};
use serde_json::json;

use crate::errors::{Result, TestingError};

pub fn disks(names: &[&str]) -> Vec<DiskId> {
    names.iter().copied().map(DiskId::from).collect()
}

/// Builder for pools as the middleware reports them
#[derive(Debug, Clone)]
pub struct VolumeFixture {
    volume: ConfirmedVolume,
}

impl VolumeFixture {
    pub fn new(name: &str) -> Self {
        Self {
            volume: ConfirmedVolume {
                id: None,
                name: name.to_string(),
                volume_type: ZFS_VOLUME_TYPE.to_string(),
                topology: Topology::default(),
                properties: ConfirmedProperties::default(),
                datasets: Vec::new(),
                status: Some("ONLINE".to_string()),
            },
        }
    }

    pub fn id(mut self, id: &str) -> Self {
        self.volume.id = Some(id.to_string());
        self
    }

    pub fn status(mut self, status: &str) -> Self {
        self.volume.status = Some(status.to_string());
        self
    }

    /// Add a vdev of `vdev_type` over `disks` to `group`
    pub fn vdev(mut self, group: TopologyGroup, vdev_type: VdevType, disks: &[&str]) -> Self {
        let leaves: Vec<Vdev> = disks
            .iter()
            .map(|disk| Vdev::disk(&DiskId::from(format!("/dev/{disk}"))))
            .collect();

        let vdev = match (vdev_type, leaves.as_slice()) {
            (VdevType::Disk, [leaf]) => leaf.clone(),
            _ => Vdev {
                vdev_type: vdev_type.into(),
                path: None,
                guid: None,
                status: Some("ONLINE".to_string()),
                children: leaves,
            },
        };
        self.volume.topology.group_mut(group).push(vdev);
        self
    }

    pub fn mirror(self, disks: &[&str]) -> Self {
        self.vdev(TopologyGroup::Data, VdevType::Mirror, disks)
    }

    pub fn capacity(mut self, free: u64, allocated: u64, size: u64) -> Self {
        self.volume.properties = ConfirmedProperties {
            free: PropertyValue::new(free),
            allocated: PropertyValue::new(allocated),
            size: PropertyValue::new(size),
        };
        self
    }

    pub fn dataset(mut self, name: &str) -> Self {
        self.volume.datasets.push(json!({ "name": name }));
        self
    }

    pub fn build(self) -> ConfirmedVolume {
        self.volume
    }
}

pub fn volume(name: &str) -> ConfirmedVolume {
    VolumeFixture::new(name).build()
}

/// Decode a pool from a raw middleware payload
pub fn volume_from_json(name: &str, payload: serde_json::Value) -> Result<ConfirmedVolume> {
    serde_json::from_value(payload).map_err(|error| TestingError::FixtureInvalid {
        name: name.to_string(),
        reason: error.to_string(),
    })
}

fn operation_name(operation: EntityOperation) -> &'static str {
    match operation {
        EntityOperation::Create => "create",
        EntityOperation::Update => "update",
        EntityOperation::Delete => "delete",
    }
}

pub fn volume_event(operation: EntityOperation, volumes: &[ConfirmedVolume]) -> EventData {
    let ids: Vec<&str> = volumes.iter().map(ConfirmedVolume::key).collect();
    let entities = match operation {
        EntityOperation::Delete => json!([]),
        _ => json!(volumes),
    };

    EventData::new(
        masks::VOLUME_CHANGED,
        json!({
            "operation": operation_name(operation),
            "ids": ids,
            "entities": entities,
        }),
    )
}

pub fn disk_event(operation: EntityOperation, ids: &[&str]) -> EventData {
    EventData::new(
        masks::DISK_CHANGED,
        json!({ "operation": operation_name(operation), "ids": ids }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_nests_disks_under_the_vdev() {
        let volume = VolumeFixture::new("tank").mirror(&["ada0", "ada1"]).build();
        let data = &volume.topology.data;

        assert_eq!(data.len(), 1);
        assert_eq!(data[0].vdev_type, VdevType::Mirror);
        assert_eq!(data[0].disk_paths(), vec!["/dev/ada0", "/dev/ada1"]);
    }

    #[test]
    fn single_disk_vdev_is_a_leaf() {
        let volume = VolumeFixture::new("tank")
            .vdev(TopologyGroup::Cache, VdevType::Disk, &["nvd0"])
            .build();
        assert_eq!(volume.topology.cache[0].path.as_deref(), Some("/dev/nvd0"));
    }

    #[test]
    fn malformed_payload_names_the_fixture() {
        let error = volume_from_json("broken", json!({ "topology": 3 })).unwrap_err();
        assert!(error.to_string().contains("broken"));
    }
}
