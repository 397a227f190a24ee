// SPDX-License-Identifier: GPL-3.0-only

use pool_types::CreateVolumeRequest;

use crate::{MiddlewareError, RequestId};

/// ZFS-facing middleware calls made by the views.
///
/// Every call is fire-and-forget: it returns once the request is issued and
/// the outcome is delivered later as an `Action` carrying the returned id.
pub trait ZfsMiddleware {
    fn request_volumes(&self) -> Result<RequestId, MiddlewareError>;

    fn request_available_disks(&self) -> Result<RequestId, MiddlewareError>;

    /// Subscribe to the pool and disk event masks under `key`
    fn subscribe(&self, key: &str) -> Result<(), MiddlewareError>;

    /// Release everything subscribed under `key`
    fn unsubscribe(&self, key: &str) -> Result<(), MiddlewareError>;

    fn create_volume(&self, request: CreateVolumeRequest) -> Result<RequestId, MiddlewareError>;
}
