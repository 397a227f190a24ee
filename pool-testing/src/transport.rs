// SPDX-License-Identifier: GPL-3.0-only

//! In-memory middleware transport for driving the real client

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use pool_contracts::{
    EventData, MiddlewareError, MiddlewareErrorKind, MiddlewareTransport, SubscriptionMask,
};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

#[derive(Debug, Clone, PartialEq)]
pub enum TransportCall {
    Call {
        method: String,
        args: serde_json::Value,
    },
    Subscribe(Vec<SubscriptionMask>),
    Unsubscribe(Vec<SubscriptionMask>),
}

/// Answers RPC calls from a fixed table and pushes events on demand
#[derive(Debug)]
pub struct ScriptedTransport {
    responses: Mutex<HashMap<String, Result<serde_json::Value, MiddlewareError>>>,
    calls: Mutex<Vec<TransportCall>>,
    events_tx: UnboundedSender<EventData>,
    events_rx: Mutex<Option<UnboundedReceiver<EventData>>>,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        let (events_tx, events_rx) = unbounded_channel();
        Self {
            responses: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        }
    }
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, method: &str, result: serde_json::Value) -> Self {
        self.set_response(method, Ok(result));
        self
    }

    pub fn fail(self, method: &str, error: MiddlewareError) -> Self {
        self.set_response(method, Err(error));
        self
    }

    pub fn set_response(&self, method: &str, response: Result<serde_json::Value, MiddlewareError>) {
        self.responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(method.to_string(), response);
    }

    /// Push an event to whoever listens on `events()`
    pub fn push_event(&self, event: EventData) {
        let _ = self.events_tx.send(event);
    }

    /// Sender that pushes events; dropping every clone ends the stream
    pub fn event_sender(&self) -> UnboundedSender<EventData> {
        self.events_tx.clone()
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn methods_called(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TransportCall::Call { method, .. } => Some(method),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: TransportCall) {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(call);
    }
}

#[async_trait]
impl MiddlewareTransport for ScriptedTransport {
    async fn call(
        &self,
        method: &str,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, MiddlewareError> {
        self.record(TransportCall::Call {
            method: method.to_string(),
            args,
        });

        self.responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(method)
            .cloned()
            .unwrap_or_else(|| {
                Err(MiddlewareError::new(
                    MiddlewareErrorKind::NotFound,
                    format!("method not scripted: {method}"),
                ))
            })
    }

    async fn subscribe(&self, masks: &[SubscriptionMask]) -> Result<(), MiddlewareError> {
        self.record(TransportCall::Subscribe(masks.to_vec()));
        Ok(())
    }

    async fn unsubscribe(&self, masks: &[SubscriptionMask]) -> Result<(), MiddlewareError> {
        self.record(TransportCall::Unsubscribe(masks.to_vec()));
        Ok(())
    }

    async fn events(&self) -> Result<BoxStream<'static, EventData>, MiddlewareError> {
        let receiver = self
            .events_rx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
            .ok_or_else(|| {
                MiddlewareError::new(MiddlewareErrorKind::Busy, "event stream already taken")
            })?;

        Ok(stream::unfold(receiver, |mut receiver| async move {
            receiver.recv().await.map(|event| (event, receiver))
        })
        .boxed())
    }
}
