// SPDX-License-Identifier: GPL-3.0-only

use std::cell::{Ref, RefCell};
use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use pool_contracts::protocol::masks;
use pool_contracts::{
    Action, EntityChange, EntityOperation, EventData, MiddlewareError, RequestId, RequestKind,
};
use pool_types::{ConfirmedVolume, DiskId};

use super::{ChangeListeners, Store};

#[derive(Debug, Default)]
struct VolumeState {
    volumes: Vec<ConfirmedVolume>,
    available_disks: Vec<DiskId>,
    initialized: bool,
    /// Last failed request; cleared by the next volume list
    last_error: Option<MiddlewareError>,
    /// Last failed subscribe or unsubscribe; cleared by a new subscription
    /// or by a storage event arriving
    subscription_error: Option<MiddlewareError>,
    /// Latest outstanding request per kind; older responses are superseded
    pending: HashMap<RequestKind, RequestId>,
    /// Pool creations are independent of each other and never superseded
    creates: HashSet<RequestId>,
    failed_creates: HashMap<RequestId, MiddlewareError>,
    last_refreshed: Option<DateTime<Utc>>,
}

/// Pools and disks as last reported by the middleware
#[derive(Debug, Default)]
pub struct VolumeStore {
    state: RefCell<VolumeState>,
    listeners: ChangeListeners,
}

fn supersedes(kind: RequestKind) -> bool {
    matches!(kind, RequestKind::Volumes | RequestKind::AvailableDisks)
}

fn is_storage_mask(mask: &str) -> bool {
    matches!(mask, masks::VOLUME_CHANGED | masks::DISK_CHANGED)
}

fn same_disk(disk: &DiskId, path: &str) -> bool {
    disk.as_str() == path || disk.device_name() == DiskId::from(path).device_name()
}

impl VolumeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list_volumes(&self) -> Ref<'_, [ConfirmedVolume]> {
        Ref::map(self.state.borrow(), |state| state.volumes.as_slice())
    }

    pub fn available_disks(&self) -> Ref<'_, [DiskId]> {
        Ref::map(self.state.borrow(), |state| state.available_disks.as_slice())
    }

    /// True once the first volume list has arrived
    pub fn is_initialized(&self) -> bool {
        self.state.borrow().initialized
    }

    pub fn last_error(&self) -> Option<MiddlewareError> {
        self.state.borrow().last_error.clone()
    }

    pub fn subscription_error(&self) -> Option<MiddlewareError> {
        self.state.borrow().subscription_error.clone()
    }

    /// Why the pool creation `request_id` failed, if it did
    pub fn create_failure(&self, request_id: RequestId) -> Option<MiddlewareError> {
        self.state.borrow().failed_creates.get(&request_id).cloned()
    }

    pub fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        self.state.borrow().last_refreshed
    }

    pub fn find_volume(&self, name: &str) -> Option<ConfirmedVolume> {
        self.state
            .borrow()
            .volumes
            .iter()
            .find(|volume| volume.name == name)
            .cloned()
    }

    /// Accept a response only when it answers the latest request of its kind.
    fn settle(state: &mut VolumeState, kind: RequestKind, request_id: RequestId) -> bool {
        match state.pending.get(&kind) {
            Some(pending) if *pending == request_id => {
                state.pending.remove(&kind);
                true
            }
            Some(pending) => {
                tracing::debug!(%request_id, latest = %pending, ?kind, "discarding superseded response");
                false
            }
            None => {
                tracing::debug!(%request_id, ?kind, "discarding unexpected response");
                false
            }
        }
    }

    fn apply_event(state: &mut VolumeState, event: &EventData) -> bool {
        match event.name.as_str() {
            masks::VOLUME_CHANGED => match event.entity_change::<ConfirmedVolume>() {
                Ok(change) => Self::apply_volume_change(state, change),
                Err(error) => {
                    tracing::warn!(%error, "ignoring malformed volume event");
                    false
                }
            },
            masks::DISK_CHANGED => match event.entity_change::<serde_json::Value>() {
                Ok(change) => Self::apply_disk_change(state, change),
                Err(error) => {
                    tracing::warn!(%error, "ignoring malformed disk event");
                    false
                }
            },
            _ => false,
        }
    }

    fn apply_volume_change(state: &mut VolumeState, change: EntityChange<ConfirmedVolume>) -> bool {
        match change.operation {
            EntityOperation::Create | EntityOperation::Update => {
                if change.entities.is_empty() {
                    return false;
                }
                for volume in change.entities {
                    // Disks now backing a pool are no longer available.
                    let members: Vec<String> = volume
                        .topology
                        .groups()
                        .flat_map(|(_, vdevs)| vdevs.iter())
                        .flat_map(|vdev| vdev.disk_paths())
                        .map(str::to_string)
                        .collect();
                    state
                        .available_disks
                        .retain(|disk| !members.iter().any(|path| same_disk(disk, path)));

                    match state
                        .volumes
                        .iter_mut()
                        .find(|existing| existing.key() == volume.key())
                    {
                        Some(existing) => *existing = volume,
                        None => {
                            tracing::info!(name = %volume.name, "pool appeared");
                            state.volumes.push(volume);
                        }
                    }
                }
                true
            }
            EntityOperation::Delete => {
                let before = state.volumes.len();
                state.volumes.retain(|volume| {
                    !change
                        .ids
                        .iter()
                        .any(|id| id == volume.key() || *id == volume.name)
                });
                before != state.volumes.len()
            }
        }
    }

    fn apply_disk_change(state: &mut VolumeState, change: EntityChange<serde_json::Value>) -> bool {
        match change.operation {
            EntityOperation::Create => {
                let mut changed = false;
                for id in change.ids {
                    let disk = DiskId::from(id);
                    if !state.available_disks.contains(&disk) {
                        state.available_disks.push(disk);
                        changed = true;
                    }
                }
                changed
            }
            EntityOperation::Delete => {
                let before = state.available_disks.len();
                state
                    .available_disks
                    .retain(|disk| !change.ids.iter().any(|id| same_disk(disk, id)));
                before != state.available_disks.len()
            }
            EntityOperation::Update => false,
        }
    }
}

impl Store for VolumeStore {
    fn name(&self) -> &'static str {
        "VolumeStore"
    }

    fn handle(&self, action: &Action) -> bool {
        let mut state = self.state.borrow_mut();

        match action {
            Action::RequestIssued { request_id, kind } if supersedes(*kind) => {
                state.pending.insert(*kind, *request_id);
                false
            }
            Action::RequestIssued {
                request_id,
                kind: RequestKind::CreateVolume,
            } => {
                state.creates.insert(*request_id);
                false
            }
            Action::ReceiveVolumes {
                request_id,
                volumes,
            } => {
                if !Self::settle(&mut state, RequestKind::Volumes, *request_id) {
                    return false;
                }
                state.volumes = volumes.clone();
                state.initialized = true;
                state.last_error = None;
                state.last_refreshed = Some(Utc::now());
                true
            }
            Action::ReceiveAvailableDisks { request_id, disks } => {
                if !Self::settle(&mut state, RequestKind::AvailableDisks, *request_id) {
                    return false;
                }
                state.available_disks = disks.clone();
                true
            }
            Action::RequestFailed {
                request_id,
                kind,
                error,
            } => match kind {
                RequestKind::Subscribe | RequestKind::Unsubscribe => {
                    state.subscription_error = Some(error.clone());
                    true
                }
                RequestKind::CreateVolume => {
                    if !state.creates.remove(request_id) {
                        tracing::debug!(%request_id, "discarding unexpected create failure");
                        return false;
                    }
                    state.failed_creates.insert(*request_id, error.clone());
                    state.last_error = Some(error.clone());
                    true
                }
                kind if supersedes(*kind) => {
                    if !Self::settle(&mut state, *kind, *request_id) {
                        return false;
                    }
                    state.last_error = Some(error.clone());
                    true
                }
                _ => false,
            },
            Action::SubscribeToMask { mask } if is_storage_mask(mask.as_str()) => {
                state.subscription_error.take().is_some()
            }
            Action::MiddlewareEvent { event } => {
                let live =
                    is_storage_mask(&event.name) && state.subscription_error.take().is_some();
                Self::apply_event(&mut state, event) || live
            }
            _ => false,
        }
    }

    fn listeners(&self) -> &ChangeListeners {
        &self.listeners
    }
}

#[cfg(test)]
mod tests {
    use pool_contracts::{MiddlewareErrorKind, SubscriptionMask};
    use serde_json::json;

    use super::*;

    fn volume(name: &str) -> ConfirmedVolume {
        serde_json::from_value(json!({ "name": name })).expect("volume fixture")
    }

    fn issue(store: &VolumeStore, kind: RequestKind) -> RequestId {
        let request_id = RequestId::new();
        store.handle(&Action::RequestIssued { request_id, kind });
        request_id
    }

    #[test]
    fn starts_uninitialized_and_empty() {
        let store = VolumeStore::new();
        assert!(!store.is_initialized());
        assert!(store.list_volumes().is_empty());
        assert!(store.last_error().is_none());
    }

    #[test]
    fn latest_volume_response_initializes() {
        let store = VolumeStore::new();
        let request_id = issue(&store, RequestKind::Volumes);

        assert!(store.handle(&Action::ReceiveVolumes {
            request_id,
            volumes: vec![volume("tank"), volume("scratch")],
        }));

        assert!(store.is_initialized());
        assert_eq!(store.list_volumes().len(), 2);
        assert!(store.last_refreshed().is_some());
    }

    #[test]
    fn superseded_response_is_discarded() {
        let store = VolumeStore::new();
        let stale = issue(&store, RequestKind::Volumes);
        let latest = issue(&store, RequestKind::Volumes);

        assert!(!store.handle(&Action::ReceiveVolumes {
            request_id: stale,
            volumes: vec![volume("old")],
        }));
        assert!(!store.is_initialized());

        assert!(store.handle(&Action::ReceiveVolumes {
            request_id: latest,
            volumes: vec![volume("new")],
        }));
        assert_eq!(store.list_volumes()[0].name, "new");

        // Answered once; a duplicate delivery is ignored.
        assert!(!store.handle(&Action::ReceiveVolumes {
            request_id: latest,
            volumes: vec![],
        }));
        assert_eq!(store.list_volumes().len(), 1);
    }

    #[test]
    fn failed_request_sets_last_error() {
        let store = VolumeStore::new();
        let request_id = issue(&store, RequestKind::AvailableDisks);

        assert!(store.handle(&Action::RequestFailed {
            request_id,
            kind: RequestKind::AvailableDisks,
            error: MiddlewareError::new(MiddlewareErrorKind::Timeout, "slow"),
        }));
        assert_eq!(
            store.last_error().map(|error| error.kind),
            Some(MiddlewareErrorKind::Timeout)
        );
    }

    fn refuse_subscription(store: &VolumeStore) {
        assert!(store.handle(&Action::RequestFailed {
            request_id: RequestId::new(),
            kind: RequestKind::Subscribe,
            error: MiddlewareError::subscription("refused"),
        }));
    }

    #[test]
    fn subscription_failure_is_recorded_without_a_pending_request() {
        let store = VolumeStore::new();
        refuse_subscription(&store);
        assert!(store.subscription_error().is_some_and(|error| error.is_subscription()));
        assert!(store.last_error().is_none());
    }

    #[test]
    fn volume_list_after_a_refused_subscription_keeps_the_failure() {
        let store = VolumeStore::new();
        let request_id = issue(&store, RequestKind::Volumes);
        refuse_subscription(&store);

        assert!(store.handle(&Action::ReceiveVolumes {
            request_id,
            volumes: vec![volume("tank")],
        }));
        assert!(store.is_initialized());
        assert!(store.subscription_error().is_some());
    }

    #[test]
    fn new_subscription_or_live_event_clears_the_failure() {
        let store = VolumeStore::new();
        refuse_subscription(&store);

        let other = SubscriptionMask::from("entity-subscriber.alert.changed");
        assert!(!store.handle(&Action::SubscribeToMask { mask: other }));
        assert!(store.subscription_error().is_some());

        let storage = SubscriptionMask::from(masks::VOLUME_CHANGED);
        assert!(store.handle(&Action::SubscribeToMask { mask: storage }));
        assert!(store.subscription_error().is_none());

        refuse_subscription(&store);
        let event = EventData::new(
            masks::DISK_CHANGED,
            json!({ "operation": "update", "ids": ["/dev/da0"] }),
        );
        assert!(store.handle(&Action::MiddlewareEvent { event }));
        assert!(store.subscription_error().is_none());
    }

    #[test]
    fn overlapping_pool_creations_each_report_their_failure() {
        let store = VolumeStore::new();
        let first = issue(&store, RequestKind::CreateVolume);
        let second = issue(&store, RequestKind::CreateVolume);

        assert!(store.handle(&Action::RequestFailed {
            request_id: first,
            kind: RequestKind::CreateVolume,
            error: MiddlewareError::new(MiddlewareErrorKind::Conflict, "disk in use"),
        }));
        assert_eq!(
            store.create_failure(first).map(|error| error.message),
            Some("disk in use".to_string())
        );
        assert!(store.create_failure(second).is_none());
        assert!(store.last_error().is_some());

        // Only once per request.
        assert!(!store.handle(&Action::RequestFailed {
            request_id: first,
            kind: RequestKind::CreateVolume,
            error: MiddlewareError::new(MiddlewareErrorKind::Conflict, "disk in use"),
        }));
    }

    #[test]
    fn volume_events_upsert_and_delete() {
        let store = VolumeStore::new();
        let request_id = issue(&store, RequestKind::Volumes);
        store.handle(&Action::ReceiveVolumes {
            request_id,
            volumes: vec![volume("tank")],
        });

        let update = EventData::new(
            masks::VOLUME_CHANGED,
            json!({
                "operation": "update",
                "ids": ["tank"],
                "entities": [{ "name": "tank", "status": "DEGRADED" }],
            }),
        );
        assert!(store.handle(&Action::MiddlewareEvent { event: update }));
        assert_eq!(store.list_volumes().len(), 1);
        assert_eq!(store.list_volumes()[0].status.as_deref(), Some("DEGRADED"));

        let create = EventData::new(
            masks::VOLUME_CHANGED,
            json!({ "operation": "create", "ids": ["fast"], "entities": [{ "name": "fast" }] }),
        );
        assert!(store.handle(&Action::MiddlewareEvent { event: create }));
        assert!(store.find_volume("fast").is_some());

        let delete = EventData::new(
            masks::VOLUME_CHANGED,
            json!({ "operation": "delete", "ids": ["tank"] }),
        );
        assert!(store.handle(&Action::MiddlewareEvent { event: delete }));
        assert!(store.find_volume("tank").is_none());
    }

    #[test]
    fn created_pool_takes_its_disks_out_of_the_available_list() {
        let store = VolumeStore::new();
        let request_id = issue(&store, RequestKind::AvailableDisks);
        store.handle(&Action::ReceiveAvailableDisks {
            request_id,
            disks: vec!["ada0".into(), "ada1".into(), "ada2".into()],
        });

        let create = EventData::new(
            masks::VOLUME_CHANGED,
            json!({
                "operation": "create",
                "entities": [{
                    "name": "tank",
                    "topology": { "data": [{
                        "type": "mirror",
                        "children": [
                            { "type": "disk", "path": "/dev/ada0" },
                            { "type": "disk", "path": "/dev/ada1" },
                        ],
                    }] },
                }],
            }),
        );
        store.handle(&Action::MiddlewareEvent { event: create });

        assert_eq!(&*store.available_disks(), &[DiskId::from("ada2")]);
    }

    #[test]
    fn disk_events_track_availability() {
        let store = VolumeStore::new();

        let attach = EventData::new(
            masks::DISK_CHANGED,
            json!({ "operation": "create", "ids": ["/dev/da4"] }),
        );
        assert!(store.handle(&Action::MiddlewareEvent { event: attach }));
        assert_eq!(store.available_disks().len(), 1);

        let detach = EventData::new(
            masks::DISK_CHANGED,
            json!({ "operation": "delete", "ids": ["/dev/da4"] }),
        );
        assert!(store.handle(&Action::MiddlewareEvent { event: detach }));
        assert!(store.available_disks().is_empty());
    }

    #[test]
    fn malformed_event_is_ignored() {
        let store = VolumeStore::new();
        let event = EventData::new(masks::VOLUME_CHANGED, json!("garbage"));
        assert!(!store.handle(&Action::MiddlewareEvent { event }));
        assert!(store.list_volumes().is_empty());
    }
}
