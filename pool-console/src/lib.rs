// SPDX-License-Identifier: GPL-3.0-only

//! ZFS pool console core
//!
//! Actions from the middleware client are queued on a channel and drained on
//! one thread into the [`dispatcher::Dispatcher`], which fans them out to the
//! stores. The Storage view listens to the volume store, renders a
//! [`views::StoragePage`] and edits draft pools until they are submitted.

pub mod app;
pub mod config;
pub mod dispatcher;
pub mod i18n;
pub mod logging;
pub mod stores;
pub mod views;

pub use app::{Console, RunOptions, run};
pub use dispatcher::Dispatcher;
