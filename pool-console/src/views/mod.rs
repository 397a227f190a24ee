// SPDX-License-Identifier: GPL-3.0-only

pub mod storage;
pub mod text;
pub mod widgets;

pub use storage::{DISPLAY_NAME, EditError, Lifecycle, StorageView};
pub use widgets::{NewPoolPlaceholder, PoolWidget, StoragePage, VdevWidget};
