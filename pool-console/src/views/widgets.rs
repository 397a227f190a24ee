// SPDX-License-Identifier: GPL-3.0-only

//! Widget tree produced by the Storage view

use pool_types::{Dataset, DiskId, DraftVdev, ReportedVdevType, Topology, Vdev};

/// One vdev as shown inside a pool widget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VdevWidget {
    pub vdev_type: ReportedVdevType,
    /// Member disk paths, leaves only
    pub disks: Vec<String>,
    pub status: Option<String>,
}

impl VdevWidget {
    pub fn from_vdev(vdev: &Vdev) -> Self {
        Self {
            vdev_type: vdev.vdev_type.clone(),
            disks: vdev.disk_paths().into_iter().map(str::to_string).collect(),
            status: vdev.status.clone(),
        }
    }

    pub fn from_draft(vdev: &DraftVdev) -> Self {
        Self {
            vdev_type: vdev.vdev_type.into(),
            disks: vdev.disks.iter().map(|disk| disk.as_str().to_string()).collect(),
            status: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PoolWidget {
    /// Existing pools are keyed from 1; 0 belongs to the new-pool placeholder
    pub key: usize,
    pub name: String,
    pub exists_on_server: bool,
    /// Index into the view's drafts for pools that are still being edited
    pub draft_index: Option<usize>,
    pub topology: Topology<VdevWidget>,
    pub free: u64,
    pub allocated: u64,
    pub size: u64,
    pub datasets: Vec<Dataset>,
    pub status: Option<String>,
    /// Disks that can still be added: available on the server and unclaimed
    pub available_disks: Vec<DiskId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPoolPlaceholder {
    pub key: usize,
    pub prompt: String,
    pub first_pool: bool,
    /// Disks a new pool could be built from
    pub available_disks: Vec<DiskId>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StoragePage {
    /// Loading or empty-state message
    pub status: Option<String>,
    /// Non-fatal failure notices, one per distinct failure
    pub banners: Vec<String>,
    pub pools: Vec<PoolWidget>,
    pub placeholder: Option<NewPoolPlaceholder>,
}

impl StoragePage {
    pub fn existing_pools(&self) -> impl Iterator<Item = &PoolWidget> {
        self.pools.iter().filter(|pool| pool.exists_on_server)
    }

    pub fn draft_pools(&self) -> impl Iterator<Item = &PoolWidget> {
        self.pools.iter().filter(|pool| !pool.exists_on_server)
    }

    /// Keys of every widget in render order, placeholder last
    pub fn keys(&self) -> Vec<usize> {
        self.pools
            .iter()
            .map(|pool| pool.key)
            .chain(self.placeholder.as_ref().map(|placeholder| placeholder.key))
            .collect()
    }
}
