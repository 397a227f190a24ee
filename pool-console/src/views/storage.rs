// SPDX-License-Identifier: GPL-3.0-only

//! The Storage view
//!
//! Mirrors the volume store while mounted, renders one widget per pool plus a
//! new-pool placeholder, and edits draft pools locally until they are
//! submitted. Confirmed pools are never edited here.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::{Rc, Weak};

use pool_contracts::{MiddlewareError, RequestId, ZfsMiddleware};
use pool_types::{
    ConfirmedVolume, DiskId, DraftError, DraftVolume, TopologyError, TopologyGroup, VdevType,
};
use thiserror::Error;

use crate::fl;
use crate::stores::{ListenerId, Store, VolumeStore};
use crate::views::widgets::{NewPoolPlaceholder, PoolWidget, StoragePage, VdevWidget};

/// Display name, also the key the view subscribes under
pub const DISPLAY_NAME: &str = "Storage";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Lifecycle {
    #[default]
    Unmounted,
    Mounting,
    Mounted,
    Unmounting,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("no draft pool at index {0}")]
    DraftNotFound(usize),

    #[error("disk {0} is not available")]
    DiskUnavailable(DiskId),

    #[error("disk {0} is already used by a draft pool")]
    DiskClaimed(DiskId),

    #[error("a pool named '{0}' already exists")]
    NameTaken(String),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    Draft(#[from] DraftError),

    #[error(transparent)]
    Middleware(#[from] MiddlewareError),
}

#[derive(Debug, Default)]
struct ViewState {
    lifecycle: Lifecycle,
    volumes: Vec<ConfirmedVolume>,
    available_disks: Vec<DiskId>,
    initialized: bool,
    request_error: Option<MiddlewareError>,
    subscription_error: Option<MiddlewareError>,
    /// First failure of the last mount; survives store changes
    mount_error: Option<MiddlewareError>,
    drafts: Vec<DraftVolume>,
    /// Disks claimed by drafts
    selected_disks: BTreeSet<DiskId>,
    /// Drafts sent to the server and not yet confirmed, by name
    submitted: BTreeMap<String, RequestId>,
}

impl ViewState {
    fn accepts_changes(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Mounting | Lifecycle::Mounted)
    }

    fn sync_from(&mut self, store: &VolumeStore) {
        self.volumes = store.list_volumes().to_vec();
        self.available_disks = store.available_disks().to_vec();
        self.initialized = store.is_initialized();
        self.request_error = store.last_error();
        self.subscription_error = store.subscription_error();
        self.submitted.retain(|name, request_id| match store.create_failure(*request_id) {
            Some(error) => {
                tracing::warn!(%name, %error, "pool creation failed, draft kept");
                false
            }
            None => true,
        });
        self.drop_confirmed_drafts();
    }

    fn banners(&self) -> Vec<String> {
        let errors = [&self.mount_error, &self.subscription_error, &self.request_error];

        let mut banners: Vec<String> = Vec::new();
        for error in errors.into_iter().flatten() {
            let message = error.message.clone();
            let banner = if error.is_subscription() {
                fl!("subscription-failed", error = message)
            } else {
                fl!("request-failed", error = message)
            };
            if !banners.contains(&banner) {
                banners.push(banner);
            }
        }
        banners
    }

    fn drop_confirmed_drafts(&mut self) {
        if self.submitted.is_empty() {
            return;
        }

        let Self {
            volumes,
            drafts,
            selected_disks,
            submitted,
            ..
        } = self;

        drafts.retain(|draft| {
            let confirmed = submitted.contains_key(&draft.name)
                && volumes.iter().any(|volume| volume.name == draft.name);
            if confirmed {
                tracing::info!(name = %draft.name, "draft pool confirmed by the server");
                for disk in draft.claimed_disks() {
                    selected_disks.remove(disk);
                }
                submitted.remove(&draft.name);
            }
            !confirmed
        });
    }

    fn draft(&self, index: usize) -> Result<&DraftVolume, EditError> {
        self.drafts.get(index).ok_or(EditError::DraftNotFound(index))
    }

    fn draft_mut(&mut self, index: usize) -> Result<&mut DraftVolume, EditError> {
        self.drafts
            .get_mut(index)
            .ok_or(EditError::DraftNotFound(index))
    }

    fn release<'a>(&mut self, disks: impl IntoIterator<Item = &'a DiskId>) {
        for disk in disks {
            self.selected_disks.remove(disk);
        }
    }

    fn unclaimed_disks(&self) -> Vec<DiskId> {
        self.available_disks
            .iter()
            .filter(|disk| !self.selected_disks.contains(*disk))
            .cloned()
            .collect()
    }
}

fn on_store_change(state: &Weak<RefCell<ViewState>>, store: &Weak<VolumeStore>) {
    let (Some(state), Some(store)) = (state.upgrade(), store.upgrade()) else {
        return;
    };
    let Ok(mut view) = state.try_borrow_mut() else {
        tracing::warn!("volume store changed while the Storage view was busy");
        return;
    };
    if !view.accepts_changes() {
        tracing::trace!("ignoring volume store change while unmounted");
        return;
    }
    view.sync_from(&store);
}

fn logged<T>(operation: &'static str, result: Result<T, EditError>) -> Result<T, EditError> {
    if let Err(error) = &result {
        tracing::warn!(%error, operation, "storage edit rejected");
    }
    result
}

pub struct StorageView<M> {
    state: Rc<RefCell<ViewState>>,
    store: Rc<VolumeStore>,
    middleware: Rc<M>,
    listener: Option<ListenerId>,
}

impl<M> std::fmt::Debug for StorageView<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageView")
            .field("lifecycle", &self.state.borrow().lifecycle)
            .field("listener", &self.listener)
            .finish_non_exhaustive()
    }
}

impl<M: ZfsMiddleware> StorageView<M> {
    pub fn new(store: Rc<VolumeStore>, middleware: Rc<M>) -> Self {
        Self {
            state: Rc::new(RefCell::new(ViewState::default())),
            store,
            middleware,
            listener: None,
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.state.borrow().lifecycle
    }

    pub fn is_mounted(&self) -> bool {
        self.lifecycle() == Lifecycle::Mounted
    }

    pub fn is_initialized(&self) -> bool {
        self.state.borrow().initialized
    }

    pub fn drafts(&self) -> Vec<DraftVolume> {
        self.state.borrow().drafts.clone()
    }

    pub fn selected_disks(&self) -> Vec<DiskId> {
        self.state.borrow().selected_disks.iter().cloned().collect()
    }

    fn set_lifecycle(&self, lifecycle: Lifecycle) {
        tracing::debug!(?lifecycle, view = DISPLAY_NAME, "lifecycle");
        self.state.borrow_mut().lifecycle = lifecycle;
    }

    /// Start listening to the volume store, request pools and disks, and
    /// subscribe to their events.
    ///
    /// The view ends up mounted even when a middleware call fails; the first
    /// failure is returned and shown in the banner. Mounting twice is a no-op.
    pub fn mount(&mut self) -> Result<(), MiddlewareError> {
        if self.lifecycle() != Lifecycle::Unmounted {
            tracing::debug!(view = DISPLAY_NAME, "already mounted");
            return Ok(());
        }
        self.set_lifecycle(Lifecycle::Mounting);
        self.state.borrow_mut().mount_error = None;

        let state = Rc::downgrade(&self.state);
        let store = Rc::downgrade(&self.store);
        self.listener = Some(
            self.store
                .add_change_listener(Box::new(move || on_store_change(&state, &store))),
        );
        self.state.borrow_mut().sync_from(&self.store);

        // No view state borrow may be held here: the middleware can feed the
        // dispatcher synchronously, which re-enters the listener.
        let results = [
            self.middleware.request_volumes().map(drop),
            self.middleware.request_available_disks().map(drop),
            self.middleware.subscribe(DISPLAY_NAME),
        ];

        self.set_lifecycle(Lifecycle::Mounted);

        match results.into_iter().find_map(Result::err) {
            Some(error) => {
                tracing::error!(%error, view = DISPLAY_NAME, "mount incomplete");
                self.state.borrow_mut().mount_error = Some(error.clone());
                Err(error)
            }
            None => Ok(()),
        }
    }

    /// Stop listening and release the subscription taken at mount.
    /// Unmounting a view that is not mounted is a no-op.
    pub fn unmount(&mut self) -> Result<(), MiddlewareError> {
        if self.lifecycle() != Lifecycle::Mounted {
            tracing::debug!(view = DISPLAY_NAME, "not mounted");
            return Ok(());
        }
        self.set_lifecycle(Lifecycle::Unmounting);

        if let Some(listener) = self.listener.take()
            && !self.store.remove_change_listener(listener)
        {
            tracing::warn!(?listener, "volume store listener was already removed");
        }

        let result = self.middleware.unsubscribe(DISPLAY_NAME);
        self.set_lifecycle(Lifecycle::Unmounted);

        if let Err(error) = &result {
            tracing::error!(%error, view = DISPLAY_NAME, "unsubscribe failed");
        }
        result
    }

    pub fn render(&self) -> StoragePage {
        let state = self.state.borrow();
        let banners = state.banners();

        if !state.initialized {
            return StoragePage {
                status: Some(fl!("looking-for-pools")),
                banners,
                ..StoragePage::default()
            };
        }

        let available = state.unclaimed_disks();

        let mut pools: Vec<PoolWidget> = state
            .volumes
            .iter()
            .enumerate()
            .map(|(index, volume)| {
                let properties = volume.properties.unwrap_values();
                PoolWidget {
                    key: index + 1,
                    name: volume.name.clone(),
                    exists_on_server: true,
                    draft_index: None,
                    topology: volume.topology.map(VdevWidget::from_vdev),
                    free: properties.free,
                    allocated: properties.allocated,
                    size: properties.size,
                    datasets: volume.datasets.clone(),
                    status: volume.status.clone(),
                    available_disks: available.clone(),
                }
            })
            .collect();

        let first_draft_key = pools.len() + 1;
        pools.extend(state.drafts.iter().enumerate().map(|(index, draft)| PoolWidget {
            key: first_draft_key + index,
            name: draft.name.clone(),
            exists_on_server: false,
            draft_index: Some(index),
            topology: draft.topology.map(VdevWidget::from_draft),
            free: draft.properties.free,
            allocated: draft.properties.allocated,
            size: draft.properties.size,
            datasets: Vec::new(),
            status: None,
            available_disks: available.clone(),
        }));

        let first_pool = state.volumes.is_empty();
        let prompt = if first_pool {
            fl!("create-first-pool")
        } else {
            fl!("create-new-pool")
        };

        StoragePage {
            status: first_pool.then(|| fl!("no-pools")),
            banners,
            pools,
            placeholder: Some(NewPoolPlaceholder {
                key: 0,
                prompt,
                first_pool,
                available_disks: available,
            }),
        }
    }

    /// Start a new draft pool; returns its draft index
    pub fn handle_volume_add(&self) -> usize {
        let mut state = self.state.borrow_mut();
        state.drafts.push(DraftVolume::fresh());
        let index = state.drafts.len() - 1;
        tracing::debug!(draft = index, "draft pool added");
        index
    }

    /// Replace draft `index` with a fresh one, releasing its disks
    pub fn handle_volume_reset(&self, index: usize) -> Result<(), EditError> {
        logged("reset pool", self.reset(index))
    }

    fn reset(&self, index: usize) -> Result<(), EditError> {
        let mut state = self.state.borrow_mut();
        let previous = std::mem::take(state.draft_mut(index)?);
        state.release(previous.claimed_disks());
        state.submitted.remove(&previous.name);
        tracing::debug!(draft = index, "draft pool reset");
        Ok(())
    }

    /// Append an empty `disk` vdev to a group; returns the vdev index
    pub fn handle_vdev_add(&self, index: usize, group: TopologyGroup) -> Result<usize, EditError> {
        logged("add vdev", {
            let mut state = self.state.borrow_mut();
            state
                .draft_mut(index)
                .map(|draft| draft.add_vdev(group))
        })
    }

    /// Remove a whole vdev, releasing every disk it held
    pub fn handle_vdev_remove(
        &self,
        index: usize,
        group: TopologyGroup,
        vdev: usize,
    ) -> Result<(), EditError> {
        logged("remove vdev", self.remove_vdev(index, group, vdev))
    }

    fn remove_vdev(&self, index: usize, group: TopologyGroup, vdev: usize) -> Result<(), EditError> {
        let mut state = self.state.borrow_mut();
        let removed = state.draft_mut(index)?.remove_vdev(group, vdev)?;
        state.release(&removed.disks);
        tracing::debug!(draft = index, %group, vdev, "vdev removed");
        Ok(())
    }

    pub fn handle_vdev_type_change(
        &self,
        index: usize,
        group: TopologyGroup,
        vdev: usize,
        vdev_type: VdevType,
    ) -> Result<(), EditError> {
        logged("change vdev type", {
            let mut state = self.state.borrow_mut();
            state
                .draft_mut(index)
                .and_then(|draft| {
                    draft
                        .set_vdev_type(group, vdev, vdev_type)
                        .map_err(EditError::from)
                })
        })
    }

    /// Put an available, unclaimed disk into a vdev and claim it
    pub fn handle_disk_add(
        &self,
        index: usize,
        group: TopologyGroup,
        vdev: usize,
        disk: DiskId,
    ) -> Result<(), EditError> {
        logged("add disk", self.add_disk(index, group, vdev, disk))
    }

    fn add_disk(
        &self,
        index: usize,
        group: TopologyGroup,
        vdev: usize,
        disk: DiskId,
    ) -> Result<(), EditError> {
        let mut state = self.state.borrow_mut();
        if !state.available_disks.contains(&disk) {
            return Err(EditError::DiskUnavailable(disk));
        }
        if state.selected_disks.contains(&disk) {
            return Err(EditError::DiskClaimed(disk));
        }

        state.draft_mut(index)?.add_disk(group, vdev, disk.clone())?;
        tracing::debug!(draft = index, %group, vdev, %disk, "disk claimed");
        state.selected_disks.insert(disk);
        Ok(())
    }

    /// Take a disk out of a vdev and release it; returns the disk
    pub fn handle_disk_remove(
        &self,
        index: usize,
        group: TopologyGroup,
        vdev: usize,
        disk_index: usize,
    ) -> Result<DiskId, EditError> {
        logged("remove disk", {
            let mut state = self.state.borrow_mut();
            let removed = state
                .draft_mut(index)
                .and_then(|draft| {
                    draft
                        .remove_disk(group, vdev, disk_index)
                        .map_err(EditError::from)
                });
            if let Ok(disk) = &removed {
                tracing::debug!(draft = index, %group, vdev, %disk, "disk released");
                state.selected_disks.remove(disk);
            }
            removed
        })
    }

    pub fn handle_volume_name_change(
        &self,
        index: usize,
        name: impl Into<String>,
    ) -> Result<(), EditError> {
        logged("rename pool", self.rename(index, name.into()))
    }

    fn rename(&self, index: usize, name: String) -> Result<(), EditError> {
        let mut state = self.state.borrow_mut();
        let previous = std::mem::replace(&mut state.draft_mut(index)?.name, name);
        state.submitted.remove(&previous);
        Ok(())
    }

    /// Validate draft `index` and ask the middleware to create it.
    ///
    /// The draft is kept until the store reports a pool with its name. If the
    /// server rejects the creation the draft stays editable and can be sent
    /// again.
    pub fn handle_volume_submit(&self, index: usize) -> Result<RequestId, EditError> {
        logged("create pool", self.submit(index))
    }

    fn submit(&self, index: usize) -> Result<RequestId, EditError> {
        let request = {
            let state = self.state.borrow();
            let draft = state.draft(index)?;
            if state.volumes.iter().any(|volume| volume.name == draft.name) {
                return Err(EditError::NameTaken(draft.name.clone()));
            }
            draft.to_create_request()?
        };

        let name = request.name.clone();
        let request_id = self.middleware.create_volume(request)?;
        tracing::info!(%name, %request_id, "pool creation requested");

        let mut state = self.state.borrow_mut();
        state.submitted.insert(name, request_id);
        state.drop_confirmed_drafts();
        Ok(request_id)
    }
}
