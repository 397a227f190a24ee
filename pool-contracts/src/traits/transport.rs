// SPDX-License-Identifier: GPL-3.0-only

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::{EventData, MiddlewareError, SubscriptionMask};

/// Wire-level access to the middleware service
#[async_trait]
pub trait MiddlewareTransport: Send + Sync + 'static {
    /// Invoke an RPC method with JSON arguments and return its JSON result
    async fn call(
        &self,
        method: &str,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, MiddlewareError>;

    async fn subscribe(&self, masks: &[SubscriptionMask]) -> Result<(), MiddlewareError>;

    async fn unsubscribe(&self, masks: &[SubscriptionMask]) -> Result<(), MiddlewareError>;

    /// Stream of every event pushed on masks this connection subscribed to
    async fn events(&self) -> Result<BoxStream<'static, EventData>, MiddlewareError>;
}
