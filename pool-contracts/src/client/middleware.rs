// SPDX-License-Identifier: GPL-3.0-only

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use zbus::proxy;

use crate::client::connection::{BusKind, shared_connection};
use crate::client::error::ClientError;
use crate::{EventData, MiddlewareError, MiddlewareTransport, SubscriptionMask};

/// D-Bus proxy interface for the middleware RPC and event channel
#[proxy(
    interface = "org.freenas.Middleware",
    default_service = "org.freenas.Middleware",
    default_path = "/org/freenas/Middleware"
)]
pub trait MiddlewareInterface {
    /// Invoke an RPC method; arguments and result are JSON encoded
    async fn invoke(&self, method: &str, args_json: &str) -> zbus::Result<String>;

    /// Start receiving events published under the given masks
    async fn subscribe(&self, masks: Vec<String>) -> zbus::Result<()>;

    /// Stop receiving events published under the given masks
    async fn unsubscribe(&self, masks: Vec<String>) -> zbus::Result<()>;

    /// Signal emitted for every pushed event on a subscribed mask
    #[zbus(signal)]
    async fn event(&self, name: &str, args_json: &str) -> zbus::Result<()>;
}

/// Middleware transport over D-Bus
#[derive(Clone)]
pub struct DbusTransport {
    proxy: MiddlewareInterfaceProxy<'static>,
}

impl std::fmt::Debug for DbusTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbusTransport").finish_non_exhaustive()
    }
}

impl DbusTransport {
    pub async fn new(bus: BusKind) -> Result<Self, ClientError> {
        let conn = shared_connection(bus).await?;
        let proxy = MiddlewareInterfaceProxy::new(conn).await.map_err(|error| {
            ClientError::Connection(format!("Failed to create middleware proxy: {error}"))
        })?;

        Ok(Self { proxy })
    }

    /// Get the underlying proxy for signal subscriptions
    pub fn proxy(&self) -> &MiddlewareInterfaceProxy<'static> {
        &self.proxy
    }
}

fn mask_names(masks: &[SubscriptionMask]) -> Vec<String> {
    masks.iter().map(|mask| mask.as_str().to_string()).collect()
}

#[async_trait]
impl MiddlewareTransport for DbusTransport {
    async fn call(
        &self,
        method: &str,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, MiddlewareError> {
        let args_json = serde_json::to_string(&args).map_err(ClientError::from)?;
        let result = self
            .proxy
            .invoke(method, &args_json)
            .await
            .map_err(ClientError::from)?;

        if result.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&result).map_err(|error| {
            ClientError::ParseError(format!("Failed to parse result of {method}: {error}")).into()
        })
    }

    async fn subscribe(&self, masks: &[SubscriptionMask]) -> Result<(), MiddlewareError> {
        self.proxy
            .subscribe(mask_names(masks))
            .await
            .map_err(|error| MiddlewareError::subscription(ClientError::from(error).to_string()))
    }

    async fn unsubscribe(&self, masks: &[SubscriptionMask]) -> Result<(), MiddlewareError> {
        self.proxy
            .unsubscribe(mask_names(masks))
            .await
            .map_err(|error| MiddlewareError::subscription(ClientError::from(error).to_string()))
    }

    async fn events(&self) -> Result<BoxStream<'static, EventData>, MiddlewareError> {
        let stream = self
            .proxy
            .receive_event()
            .await
            .map_err(ClientError::from)?;

        Ok(stream
            .filter_map(|signal| async move {
                let args = match signal.args() {
                    Ok(args) => args,
                    Err(error) => {
                        tracing::warn!(%error, "dropping middleware event with unreadable arguments");
                        return None;
                    }
                };
                let payload = if args.args_json.is_empty() {
                    serde_json::Value::Null
                } else {
                    match serde_json::from_str(args.args_json) {
                        Ok(payload) => payload,
                        Err(error) => {
                            tracing::warn!(%error, name = args.name, "dropping malformed middleware event");
                            return None;
                        }
                    }
                };
                Some(EventData::new(args.name, payload))
            })
            .boxed())
    }
}
