// SPDX-License-Identifier: GPL-3.0-only

pub mod middleware;
pub mod transport;

pub use middleware::ZfsMiddleware;
pub use transport::MiddlewareTransport;
