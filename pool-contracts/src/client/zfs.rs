// SPDX-License-Identifier: GPL-3.0-only

//! ZFS middleware client
//!
//! Requests are issued from the UI thread and complete on the tokio runtime.
//! Before a request task is spawned its id is announced with a
//! `RequestIssued` action, so the stores can tell the latest request of a kind
//! from a superseded one. Outcomes come back through the same action channel.

use std::sync::{Arc, Mutex, MutexGuard};

use futures_util::StreamExt;
use pool_types::{ConfirmedVolume, CreateVolumeRequest, DiskId};
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::protocol::{masks, methods};
use crate::{
    ActionSender, AuthState, DispatchError, MiddlewareActions, MiddlewareError, MiddlewareTransport,
    RequestId, RequestKind, SubscriptionDelta, SubscriptionMask, SubscriptionRegistry,
    ZfsMiddleware,
};

/// Event masks the storage views subscribe to
pub const STORAGE_MASKS: [&str; 2] = [masks::VOLUME_CHANGED, masks::DISK_CHANGED];

type Actions = MiddlewareActions<ActionSender>;

pub struct ZfsMiddlewareClient<T> {
    transport: Arc<T>,
    actions: Actions,
    subscriptions: Mutex<SubscriptionRegistry>,
    runtime: Handle,
}

impl<T> std::fmt::Debug for ZfsMiddlewareClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZfsMiddlewareClient").finish_non_exhaustive()
    }
}

fn decode<R: DeserializeOwned>(method: &str, value: serde_json::Value) -> Result<R, MiddlewareError> {
    serde_json::from_value(value).map_err(|error| {
        MiddlewareError::new(
            crate::MiddlewareErrorKind::Internal,
            format!("unexpected result from {method}: {error}"),
        )
    })
}

fn log_undelivered(result: Result<(), DispatchError>, what: &str) {
    if let Err(error) = result {
        // The console is shutting down; late results are dropped.
        tracing::debug!(%error, what, "middleware result not delivered");
    }
}

impl<T: MiddlewareTransport> ZfsMiddlewareClient<T> {
    /// Create a client spawning its requests on the current tokio runtime.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(transport: T, sender: ActionSender) -> Self {
        Self::with_runtime(transport, sender, Handle::current())
    }

    pub fn with_runtime(transport: T, sender: ActionSender, runtime: Handle) -> Self {
        Self {
            transport: Arc::new(transport),
            actions: MiddlewareActions::new(sender),
            subscriptions: Mutex::new(SubscriptionRegistry::new()),
            runtime,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn registry(&self) -> MutexGuard<'_, SubscriptionRegistry> {
        // The registry holds plain data; a poisoned lock still has a usable value.
        self.subscriptions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Report the connection as authenticated and forward pushed events into
    /// the action channel until the event stream ends.
    pub fn start_event_forwarding(&self) -> JoinHandle<()> {
        let transport = Arc::clone(&self.transport);
        let actions = self.actions.clone();

        self.runtime.spawn(async move {
            let mut events = match transport.events().await {
                Ok(events) => events,
                Err(error) => {
                    tracing::error!(%error, "failed to listen for middleware events");
                    log_undelivered(
                        actions.receive_authentication_change(AuthState::default()),
                        "auth state",
                    );
                    return;
                }
            };

            log_undelivered(
                actions.receive_authentication_change(AuthState {
                    authenticated: true,
                    username: None,
                }),
                "auth state",
            );

            while let Some(event) = events.next().await {
                tracing::trace!(name = %event.name, "middleware event");
                if actions.receive_event_data(event).is_err() {
                    tracing::debug!("action channel closed, stopping event forwarding");
                    return;
                }
            }

            tracing::warn!("middleware event stream ended");
            log_undelivered(
                actions.receive_authentication_change(AuthState::default()),
                "auth state",
            );
        })
    }

    /// Fetch the RPC service list and each service's methods
    pub fn discover_services(&self) -> Result<RequestId, MiddlewareError> {
        let request_id = self.announce(RequestKind::Services)?;
        let transport = Arc::clone(&self.transport);
        let actions = self.actions.clone();

        self.runtime.spawn(async move {
            let services = match transport
                .call(methods::DISCOVERY_SERVICES, json!([]))
                .await
                .and_then(|value| decode::<Vec<String>>(methods::DISCOVERY_SERVICES, value))
            {
                Ok(services) => services,
                Err(error) => {
                    log_undelivered(
                        actions.receive_request_failure(request_id, RequestKind::Services, error),
                        "service discovery failure",
                    );
                    return;
                }
            };

            log_undelivered(
                actions.receive_available_services(services.clone()),
                "service list",
            );

            for service in services {
                match transport
                    .call(methods::DISCOVERY_METHODS, json!([service]))
                    .await
                    .and_then(|value| decode::<Vec<String>>(methods::DISCOVERY_METHODS, value))
                {
                    Ok(methods) => log_undelivered(
                        actions.receive_available_service_methods(service, methods),
                        "service methods",
                    ),
                    Err(error) => {
                        tracing::warn!(%error, %service, "failed to list service methods");
                        log_undelivered(
                            actions.receive_request_failure(
                                request_id,
                                RequestKind::ServiceMethods,
                                error,
                            ),
                            "service methods failure",
                        );
                    }
                }
            }
        });

        Ok(request_id)
    }

    fn announce(&self, kind: RequestKind) -> Result<RequestId, MiddlewareError> {
        let request_id = RequestId::new();
        self.actions
            .request_issued(request_id, kind)
            .map_err(|error| {
                MiddlewareError::new(
                    crate::MiddlewareErrorKind::Unavailable,
                    format!("cannot issue {kind:?} request: {error}"),
                )
            })?;
        tracing::debug!(%request_id, ?kind, "middleware request issued");
        Ok(request_id)
    }

    fn spawn_call<R, F>(
        &self,
        kind: RequestKind,
        method: &'static str,
        args: serde_json::Value,
        deliver: F,
    ) -> Result<RequestId, MiddlewareError>
    where
        R: DeserializeOwned + Send + 'static,
        F: FnOnce(&Actions, RequestId, R) -> Result<(), DispatchError> + Send + 'static,
    {
        let request_id = self.announce(kind)?;
        let transport = Arc::clone(&self.transport);
        let actions = self.actions.clone();

        self.runtime.spawn(async move {
            let result = transport
                .call(method, args)
                .await
                .and_then(|value| decode::<R>(method, value));

            let delivered = match result {
                Ok(value) => deliver(&actions, request_id, value),
                Err(error) => {
                    tracing::warn!(%error, %request_id, method, "middleware request failed");
                    actions.receive_request_failure(request_id, kind, error)
                }
            };
            log_undelivered(delivered, method);
        });

        Ok(request_id)
    }

    fn spawn_subscription_change(&self, kind: RequestKind, masks: Vec<SubscriptionMask>) {
        if masks.is_empty() {
            return;
        }

        let request_id = RequestId::new();
        let transport = Arc::clone(&self.transport);
        let actions = self.actions.clone();

        self.runtime.spawn(async move {
            let result = match kind {
                RequestKind::Unsubscribe => transport.unsubscribe(&masks).await,
                _ => transport.subscribe(&masks).await,
            };
            if let Err(error) = result {
                tracing::warn!(%error, ?masks, "server-side subscription change failed");
                let error = if error.is_subscription() {
                    error
                } else {
                    MiddlewareError::subscription(error.message)
                };
                log_undelivered(
                    actions.receive_request_failure(request_id, kind, error),
                    "subscription failure",
                );
            }
        });
    }

    fn report_counts(
        &self,
        delta: &SubscriptionDelta,
        increase: bool,
    ) -> Result<(), MiddlewareError> {
        for mask in &delta.changed {
            let result = if increase {
                self.actions.increase_subscription_count(mask.clone())
            } else {
                self.actions.decrease_subscription_count(mask.clone())
            };
            result.map_err(|error| MiddlewareError::subscription(error.to_string()))?;
        }
        Ok(())
    }
}

impl<T: MiddlewareTransport> ZfsMiddleware for ZfsMiddlewareClient<T> {
    fn request_volumes(&self) -> Result<RequestId, MiddlewareError> {
        self.spawn_call(
            RequestKind::Volumes,
            methods::VOLUME_QUERY,
            json!([]),
            |actions, request_id, volumes: Vec<ConfirmedVolume>| {
                actions.receive_volumes(request_id, volumes)
            },
        )
    }

    fn request_available_disks(&self) -> Result<RequestId, MiddlewareError> {
        self.spawn_call(
            RequestKind::AvailableDisks,
            methods::VOLUME_AVAILABLE_DISKS,
            json!([]),
            |actions, request_id, disks: Vec<DiskId>| {
                actions.receive_available_disks(request_id, disks)
            },
        )
    }

    fn subscribe(&self, key: &str) -> Result<(), MiddlewareError> {
        let masks: Vec<SubscriptionMask> = STORAGE_MASKS.into_iter().map(Into::into).collect();
        let delta = self.registry().subscribe(key, &masks);
        if delta.is_empty() {
            tracing::debug!(key, "already subscribed");
            return Ok(());
        }

        tracing::info!(key, server = ?delta.server, "subscribing to storage events");
        self.spawn_subscription_change(RequestKind::Subscribe, delta.server.clone());
        self.report_counts(&delta, true)
    }

    fn unsubscribe(&self, key: &str) -> Result<(), MiddlewareError> {
        let delta = self.registry().unsubscribe(key);
        if delta.is_empty() {
            tracing::debug!(key, "nothing subscribed under key");
            return Ok(());
        }

        tracing::info!(key, server = ?delta.server, "unsubscribing from storage events");
        self.spawn_subscription_change(RequestKind::Unsubscribe, delta.server.clone());
        self.report_counts(&delta, false)
    }

    fn create_volume(&self, request: CreateVolumeRequest) -> Result<RequestId, MiddlewareError> {
        let args = serde_json::Value::Array(vec![serde_json::to_value(&request)?]);
        tracing::info!(name = %request.name, disks = ?request.disk_paths(), "creating pool");
        self.spawn_call(
            RequestKind::CreateVolume,
            methods::VOLUME_CREATE,
            args,
            |_, request_id, _: serde_json::Value| {
                // The new pool arrives through the volume change event.
                tracing::info!(%request_id, "pool creation accepted");
                Ok(())
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use futures_util::stream::{self, BoxStream};
    use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};

    use super::*;
    use crate::{Action, EventData, MiddlewareErrorKind};

    #[derive(Default)]
    struct FakeTransport {
        responses: HashMap<&'static str, Result<serde_json::Value, MiddlewareError>>,
        subscribe_error: Option<MiddlewareError>,
        subscribed: Mutex<Vec<Vec<SubscriptionMask>>>,
        unsubscribed: Mutex<Vec<Vec<SubscriptionMask>>>,
        events: Vec<EventData>,
    }

    impl FakeTransport {
        fn respond(
            mut self,
            method: &'static str,
            response: Result<serde_json::Value, MiddlewareError>,
        ) -> Self {
            self.responses.insert(method, response);
            self
        }
    }

    #[async_trait]
    impl MiddlewareTransport for FakeTransport {
        async fn call(
            &self,
            method: &str,
            _args: serde_json::Value,
        ) -> Result<serde_json::Value, MiddlewareError> {
            self.responses.get(method).cloned().unwrap_or_else(|| {
                Err(MiddlewareError::new(
                    MiddlewareErrorKind::NotFound,
                    format!("no such method {method}"),
                ))
            })
        }

        async fn subscribe(&self, masks: &[SubscriptionMask]) -> Result<(), MiddlewareError> {
            self.subscribed.lock().unwrap().push(masks.to_vec());
            match &self.subscribe_error {
                Some(error) => Err(error.clone()),
                None => Ok(()),
            }
        }

        async fn unsubscribe(&self, masks: &[SubscriptionMask]) -> Result<(), MiddlewareError> {
            self.unsubscribed.lock().unwrap().push(masks.to_vec());
            Ok(())
        }

        async fn events(&self) -> Result<BoxStream<'static, EventData>, MiddlewareError> {
            Ok(stream::iter(self.events.clone()).boxed())
        }
    }

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    fn drain(receiver: &mut UnboundedReceiver<Action>) -> Vec<Action> {
        let mut actions = Vec::new();
        while let Ok(action) = receiver.try_recv() {
            actions.push(action);
        }
        actions
    }

    #[tokio::test]
    async fn volume_request_is_announced_then_answered_with_same_id() {
        let (sender, mut receiver) = unbounded_channel();
        let transport = FakeTransport::default().respond(
            methods::VOLUME_QUERY,
            Ok(json!([{ "name": "tank", "properties": { "size": { "value": 10 } } }])),
        );
        let client = ZfsMiddlewareClient::new(transport, sender);

        let request_id = client.request_volumes().expect("issue request");

        assert_eq!(
            receiver.recv().await,
            Some(Action::RequestIssued {
                request_id,
                kind: RequestKind::Volumes
            })
        );
        match receiver.recv().await {
            Some(Action::ReceiveVolumes {
                request_id: answered,
                volumes,
            }) => {
                assert_eq!(answered, request_id);
                assert_eq!(volumes.len(), 1);
                assert_eq!(volumes[0].name, "tank");
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_request_reports_its_id_and_kind() {
        let (sender, mut receiver) = unbounded_channel();
        let client = ZfsMiddlewareClient::new(FakeTransport::default(), sender);

        let request_id = client.request_available_disks().expect("issue request");
        settle().await;

        let actions = drain(&mut receiver);
        assert_eq!(actions.len(), 2);
        match &actions[1] {
            Action::RequestFailed {
                request_id: failed,
                kind,
                error,
            } => {
                assert_eq!(*failed, request_id);
                assert_eq!(*kind, RequestKind::AvailableDisks);
                assert_eq!(error.kind, MiddlewareErrorKind::NotFound);
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_result_becomes_request_failure() {
        let (sender, mut receiver) = unbounded_channel();
        let transport = FakeTransport::default()
            .respond(methods::VOLUME_AVAILABLE_DISKS, Ok(json!({ "not": "a list" })));
        let client = ZfsMiddlewareClient::new(transport, sender);

        client.request_available_disks().expect("issue request");
        settle().await;

        let actions = drain(&mut receiver);
        assert!(matches!(
            actions.last(),
            Some(Action::RequestFailed {
                kind: RequestKind::AvailableDisks,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn repeated_subscribe_under_one_key_hits_server_once() {
        let (sender, mut receiver) = unbounded_channel();
        let client = ZfsMiddlewareClient::new(FakeTransport::default(), sender);

        client.subscribe("Storage").expect("subscribe");
        client.subscribe("Storage").expect("subscribe again");
        settle().await;

        assert_eq!(client.transport().subscribed.lock().unwrap().len(), 1);
        let actions = drain(&mut receiver);
        let increases = actions
            .iter()
            .filter(|action| matches!(action, Action::SubscribeToMask { .. }))
            .count();
        assert_eq!(increases, STORAGE_MASKS.len());

        client.unsubscribe("Storage").expect("unsubscribe");
        client.unsubscribe("Storage").expect("unsubscribe again");
        settle().await;

        assert_eq!(client.transport().unsubscribed.lock().unwrap().len(), 1);
        let decreases = drain(&mut receiver)
            .iter()
            .filter(|action| matches!(action, Action::UnsubscribeFromMask { .. }))
            .count();
        assert_eq!(decreases, STORAGE_MASKS.len());
    }

    #[tokio::test]
    async fn rejected_server_subscription_is_reported() {
        let (sender, mut receiver) = unbounded_channel();
        let transport = FakeTransport {
            subscribe_error: Some(MiddlewareError::new(
                MiddlewareErrorKind::PermissionDenied,
                "not allowed",
            )),
            ..FakeTransport::default()
        };
        let client = ZfsMiddlewareClient::new(transport, sender);

        client.subscribe("Storage").expect("subscribe is issued");
        settle().await;

        let failure = drain(&mut receiver)
            .into_iter()
            .find_map(|action| match action {
                Action::RequestFailed { kind, error, .. } => Some((kind, error)),
                _ => None,
            })
            .expect("subscription failure action");
        assert_eq!(failure.0, RequestKind::Subscribe);
        assert!(failure.1.is_subscription());
    }

    #[tokio::test]
    async fn subscribe_fails_when_action_channel_is_closed() {
        let (sender, receiver) = unbounded_channel();
        let client = ZfsMiddlewareClient::new(FakeTransport::default(), sender);
        drop(receiver);

        let error = client.subscribe("Storage").unwrap_err();
        assert!(error.is_subscription());
        assert!(client.request_volumes().is_err());
    }

    #[tokio::test]
    async fn events_are_forwarded_between_auth_updates() {
        let (sender, mut receiver) = unbounded_channel();
        let transport = FakeTransport {
            events: vec![EventData::new(masks::VOLUME_CHANGED, json!({ "operation": "update" }))],
            ..FakeTransport::default()
        };
        let client = ZfsMiddlewareClient::new(transport, sender);

        client
            .start_event_forwarding()
            .await
            .expect("forwarding task");

        let types: Vec<_> = drain(&mut receiver)
            .iter()
            .map(Action::action_type)
            .collect();
        assert_eq!(
            types,
            vec![
                crate::ActionType::UpdateAuthState,
                crate::ActionType::MiddlewareEvent,
                crate::ActionType::UpdateAuthState,
            ]
        );
    }

    #[tokio::test]
    async fn discovery_reports_services_and_methods() {
        let (sender, mut receiver) = unbounded_channel();
        let transport = FakeTransport::default()
            .respond(methods::DISCOVERY_SERVICES, Ok(json!(["volume"])))
            .respond(methods::DISCOVERY_METHODS, Ok(json!(["query", "create"])));
        let client = ZfsMiddlewareClient::new(transport, sender);

        client.discover_services().expect("discover");
        settle().await;

        let actions = drain(&mut receiver);
        assert!(actions.contains(&Action::ReceiveRpcServices {
            services: vec!["volume".to_string()]
        }));
        assert!(actions.contains(&Action::ReceiveRpcServiceMethods {
            service: "volume".to_string(),
            methods: vec!["query".to_string(), "create".to_string()],
        }));
    }
}
