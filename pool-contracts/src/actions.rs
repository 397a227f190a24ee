// SPDX-License-Identifier: GPL-3.0-only

//! Middleware action creators
//!
//! Each creator shapes one intent (auth change, subscription change, pushed
//! event, service discovery, request outcome) into an `Action` and hands it to
//! a single sink. Nothing is validated or retried here; a sink failure is
//! returned to the caller as is.

use std::rc::Rc;
use std::sync::Arc;

use pool_types::{ConfirmedVolume, DiskId};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

use crate::protocol::{
    Action, ActionType, AuthState, EventData, MiddlewareError, RequestId, RequestKind,
    SubscriptionMask,
};

/// Sender half of the channel drained by the console's event loop
pub type ActionSender = UnboundedSender<Action>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("action channel closed")]
    Closed,

    #[error("cannot dispatch {0} in the middle of a dispatch")]
    Reentrant(ActionType),
}

/// Anything that accepts dispatch envelopes
pub trait ActionSink {
    fn handle_middleware_action(&self, action: Action) -> Result<(), DispatchError>;
}

impl ActionSink for UnboundedSender<Action> {
    fn handle_middleware_action(&self, action: Action) -> Result<(), DispatchError> {
        self.send(action).map_err(|_| DispatchError::Closed)
    }
}

impl<S: ActionSink + ?Sized> ActionSink for Rc<S> {
    fn handle_middleware_action(&self, action: Action) -> Result<(), DispatchError> {
        (**self).handle_middleware_action(action)
    }
}

impl<S: ActionSink + ?Sized> ActionSink for Arc<S> {
    fn handle_middleware_action(&self, action: Action) -> Result<(), DispatchError> {
        (**self).handle_middleware_action(action)
    }
}

#[derive(Debug, Clone)]
pub struct MiddlewareActions<S> {
    sink: S,
}

impl<S: ActionSink> MiddlewareActions<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn receive_authentication_change(&self, auth_state: AuthState) -> Result<(), DispatchError> {
        self.sink
            .handle_middleware_action(Action::UpdateAuthState { auth_state })
    }

    /// Callers must already have requested the server-side subscription
    pub fn increase_subscription_count(&self, mask: SubscriptionMask) -> Result<(), DispatchError> {
        self.sink
            .handle_middleware_action(Action::SubscribeToMask { mask })
    }

    /// Pairs 1:1 with a prior `increase_subscription_count`
    pub fn decrease_subscription_count(&self, mask: SubscriptionMask) -> Result<(), DispatchError> {
        self.sink
            .handle_middleware_action(Action::UnsubscribeFromMask { mask })
    }

    pub fn receive_event_data(&self, event: EventData) -> Result<(), DispatchError> {
        self.sink
            .handle_middleware_action(Action::MiddlewareEvent { event })
    }

    pub fn receive_available_services(&self, services: Vec<String>) -> Result<(), DispatchError> {
        self.sink
            .handle_middleware_action(Action::ReceiveRpcServices { services })
    }

    pub fn receive_available_service_methods(
        &self,
        service: String,
        methods: Vec<String>,
    ) -> Result<(), DispatchError> {
        self.sink
            .handle_middleware_action(Action::ReceiveRpcServiceMethods { service, methods })
    }

    pub fn request_issued(&self, request_id: RequestId, kind: RequestKind) -> Result<(), DispatchError> {
        self.sink
            .handle_middleware_action(Action::RequestIssued { request_id, kind })
    }

    pub fn receive_volumes(
        &self,
        request_id: RequestId,
        volumes: Vec<ConfirmedVolume>,
    ) -> Result<(), DispatchError> {
        self.sink.handle_middleware_action(Action::ReceiveVolumes {
            request_id,
            volumes,
        })
    }

    pub fn receive_available_disks(
        &self,
        request_id: RequestId,
        disks: Vec<DiskId>,
    ) -> Result<(), DispatchError> {
        self.sink
            .handle_middleware_action(Action::ReceiveAvailableDisks { request_id, disks })
    }

    pub fn receive_request_failure(
        &self,
        request_id: RequestId,
        kind: RequestKind,
        error: MiddlewareError,
    ) -> Result<(), DispatchError> {
        self.sink.handle_middleware_action(Action::RequestFailed {
            request_id,
            kind,
            error,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        actions: RefCell<Vec<Action>>,
    }

    impl ActionSink for RecordingSink {
        fn handle_middleware_action(&self, action: Action) -> Result<(), DispatchError> {
            self.actions.borrow_mut().push(action);
            Ok(())
        }
    }

    struct ClosedSink;

    impl ActionSink for ClosedSink {
        fn handle_middleware_action(&self, _action: Action) -> Result<(), DispatchError> {
            Err(DispatchError::Closed)
        }
    }

    #[test]
    fn each_creator_submits_exactly_one_envelope() {
        let actions = MiddlewareActions::new(Rc::new(RecordingSink::default()));
        let mask = SubscriptionMask::from("entity-subscriber.volume.changed");

        actions
            .receive_authentication_change(AuthState {
                authenticated: true,
                username: Some("root".to_string()),
            })
            .unwrap();
        actions.increase_subscription_count(mask.clone()).unwrap();
        actions.decrease_subscription_count(mask.clone()).unwrap();
        actions
            .receive_event_data(EventData::new(mask.as_str(), serde_json::Value::Null))
            .unwrap();
        actions
            .receive_available_services(vec!["volume".to_string()])
            .unwrap();
        actions
            .receive_available_service_methods("volume".to_string(), vec!["query".to_string()])
            .unwrap();

        let recorded = actions.sink().actions.borrow();
        let types: Vec<_> = recorded.iter().map(Action::action_type).collect();
        assert_eq!(
            types,
            vec![
                ActionType::UpdateAuthState,
                ActionType::SubscribeToMask,
                ActionType::UnsubscribeFromMask,
                ActionType::MiddlewareEvent,
                ActionType::ReceiveRpcServices,
                ActionType::ReceiveRpcServiceMethods,
            ]
        );
        assert_eq!(recorded[1], Action::SubscribeToMask { mask: mask.clone() });
        assert_eq!(
            recorded[5],
            Action::ReceiveRpcServiceMethods {
                service: "volume".to_string(),
                methods: vec!["query".to_string()],
            }
        );
    }

    #[test]
    fn sink_failure_is_returned_to_caller() {
        let actions = MiddlewareActions::new(ClosedSink);
        assert_eq!(
            actions.receive_available_services(Vec::new()),
            Err(DispatchError::Closed)
        );
    }

    #[test]
    fn channel_sink_fails_once_receiver_is_dropped() {
        let (sender, receiver) = tokio::sync::mpsc::unbounded_channel();
        let actions = MiddlewareActions::new(sender);

        actions
            .request_issued(RequestId::new(), RequestKind::Volumes)
            .unwrap();
        drop(receiver);

        assert_eq!(
            actions.receive_volumes(RequestId::new(), Vec::new()),
            Err(DispatchError::Closed)
        );
    }
}
