// SPDX-License-Identifier: GPL-3.0-only

//! Synchronous stand-in for the middleware client

use std::cell::{Cell, RefCell};

use pool_contracts::client::STORAGE_MASKS;
use pool_contracts::{
    ActionSender, EntityOperation, MiddlewareActions, MiddlewareError, MiddlewareErrorKind,
    RequestId, RequestKind, SubscriptionMask, SubscriptionRegistry, ZfsMiddleware,
};
use pool_types::{ConfirmedVolume, CreateVolumeRequest, DiskId};

use crate::fixtures;

#[derive(Debug, Clone, PartialEq)]
pub enum MiddlewareCall {
    RequestVolumes(RequestId),
    RequestAvailableDisks(RequestId),
    Subscribe(String),
    Unsubscribe(String),
    CreateVolume(CreateVolumeRequest),
}

/// Records every call. When given an action sender it also answers like the
/// real client would: announce the request, then deliver the configured
/// pools and disks.
#[derive(Debug, Default)]
pub struct RecordingMiddleware {
    actions: Option<MiddlewareActions<ActionSender>>,
    calls: RefCell<Vec<MiddlewareCall>>,
    volumes: RefCell<Vec<ConfirmedVolume>>,
    disks: RefCell<Vec<DiskId>>,
    registry: RefCell<SubscriptionRegistry>,
    refuse_subscriptions: Cell<bool>,
    /// Answer `create_volume` with a pool-created event
    confirm_creates: Cell<bool>,
    /// Fail the next `create_volume` with this message
    reject_next_create: RefCell<Option<String>>,
}

impl RecordingMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answering(sender: ActionSender) -> Self {
        Self {
            actions: Some(MiddlewareActions::new(sender)),
            ..Self::default()
        }
    }

    pub fn with_volumes(self, volumes: Vec<ConfirmedVolume>) -> Self {
        *self.volumes.borrow_mut() = volumes;
        self
    }

    pub fn with_disks(self, disks: Vec<DiskId>) -> Self {
        *self.disks.borrow_mut() = disks;
        self
    }

    pub fn refuse_subscriptions(&self, refuse: bool) {
        self.refuse_subscriptions.set(refuse);
    }

    pub fn confirm_creates(&self, confirm: bool) {
        self.confirm_creates.set(confirm);
    }

    pub fn reject_next_create(&self, message: &str) {
        *self.reject_next_create.borrow_mut() = Some(message.to_string());
    }

    pub fn set_volumes(&self, volumes: Vec<ConfirmedVolume>) {
        *self.volumes.borrow_mut() = volumes;
    }

    pub fn calls(&self) -> Vec<MiddlewareCall> {
        self.calls.borrow().clone()
    }

    pub fn subscribe_calls(&self, key: &str) -> usize {
        self.count(|call| matches!(call, MiddlewareCall::Subscribe(k) if k == key))
    }

    pub fn unsubscribe_calls(&self, key: &str) -> usize {
        self.count(|call| matches!(call, MiddlewareCall::Unsubscribe(k) if k == key))
    }

    pub fn created(&self) -> Vec<CreateVolumeRequest> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                MiddlewareCall::CreateVolume(request) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    fn count(&self, predicate: impl Fn(&MiddlewareCall) -> bool) -> usize {
        self.calls.borrow().iter().filter(|call| predicate(call)).count()
    }

    fn record(&self, call: MiddlewareCall) {
        self.calls.borrow_mut().push(call);
    }

    fn sent(result: Result<(), pool_contracts::DispatchError>) -> Result<(), MiddlewareError> {
        result.map_err(|error| {
            MiddlewareError::new(pool_contracts::MiddlewareErrorKind::Unavailable, error.to_string())
        })
    }
}

impl ZfsMiddleware for RecordingMiddleware {
    fn request_volumes(&self) -> Result<RequestId, MiddlewareError> {
        let request_id = RequestId::new();
        self.record(MiddlewareCall::RequestVolumes(request_id));

        if let Some(actions) = &self.actions {
            Self::sent(actions.request_issued(request_id, RequestKind::Volumes))?;
            Self::sent(actions.receive_volumes(request_id, self.volumes.borrow().clone()))?;
        }
        Ok(request_id)
    }

    fn request_available_disks(&self) -> Result<RequestId, MiddlewareError> {
        let request_id = RequestId::new();
        self.record(MiddlewareCall::RequestAvailableDisks(request_id));

        if let Some(actions) = &self.actions {
            Self::sent(actions.request_issued(request_id, RequestKind::AvailableDisks))?;
            Self::sent(actions.receive_available_disks(request_id, self.disks.borrow().clone()))?;
        }
        Ok(request_id)
    }

    fn subscribe(&self, key: &str) -> Result<(), MiddlewareError> {
        self.record(MiddlewareCall::Subscribe(key.to_string()));

        let masks: Vec<SubscriptionMask> = STORAGE_MASKS.into_iter().map(Into::into).collect();
        let delta = self.registry.borrow_mut().subscribe(key, &masks);

        if let Some(actions) = &self.actions {
            for mask in delta.changed {
                Self::sent(actions.increase_subscription_count(mask))?;
            }
            if self.refuse_subscriptions.get() && !delta.server.is_empty() {
                Self::sent(actions.receive_request_failure(
                    RequestId::new(),
                    RequestKind::Subscribe,
                    MiddlewareError::subscription("subscription refused"),
                ))?;
            }
        }
        Ok(())
    }

    fn unsubscribe(&self, key: &str) -> Result<(), MiddlewareError> {
        self.record(MiddlewareCall::Unsubscribe(key.to_string()));

        let delta = self.registry.borrow_mut().unsubscribe(key);
        if let Some(actions) = &self.actions {
            for mask in delta.changed {
                Self::sent(actions.decrease_subscription_count(mask))?;
            }
        }
        Ok(())
    }

    fn create_volume(&self, request: CreateVolumeRequest) -> Result<RequestId, MiddlewareError> {
        let request_id = RequestId::new();
        self.record(MiddlewareCall::CreateVolume(request.clone()));

        if let Some(actions) = &self.actions {
            Self::sent(actions.request_issued(request_id, RequestKind::CreateVolume))?;

            if let Some(message) = self.reject_next_create.borrow_mut().take() {
                Self::sent(actions.receive_request_failure(
                    request_id,
                    RequestKind::CreateVolume,
                    MiddlewareError::new(MiddlewareErrorKind::Conflict, message),
                ))?;
            } else if self.confirm_creates.get() {
                let created = ConfirmedVolume {
                    id: None,
                    name: request.name.clone(),
                    volume_type: request.volume_type.clone(),
                    topology: request.topology.clone(),
                    properties: Default::default(),
                    datasets: Vec::new(),
                    status: Some("ONLINE".to_string()),
                };
                self.volumes.borrow_mut().push(created.clone());
                Self::sent(actions.receive_event_data(fixtures::volume_event(
                    EntityOperation::Create,
                    &[created],
                )))?;
            }
        }
        Ok(request_id)
    }
}
