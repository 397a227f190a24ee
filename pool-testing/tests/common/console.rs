use std::rc::Rc;
use std::time::Duration;

use pool_contracts::{Action, ZfsMiddleware};
use pool_testing::middleware::RecordingMiddleware;
use pool_types::{ConfirmedVolume, DiskId};
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use zfs_pool_console::Console;
use zfs_pool_console::views::StoragePage;

/// A console wired to a `RecordingMiddleware` that answers through the action channel
pub struct Harness {
    pub console: Console<RecordingMiddleware>,
    pub middleware: Rc<RecordingMiddleware>,
    pub actions: UnboundedReceiver<Action>,
}

impl Harness {
    pub fn new(volumes: Vec<ConfirmedVolume>, disks: Vec<DiskId>) -> Self {
        let (sender, actions) = unbounded_channel();
        let middleware = Rc::new(
            RecordingMiddleware::answering(sender)
                .with_volumes(volumes)
                .with_disks(disks),
        );
        let console = Console::new(Rc::clone(&middleware));

        Self {
            console,
            middleware,
            actions,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    /// Mount the Storage view and dispatch everything it triggered
    pub fn mount(&mut self) {
        self.console.view_mut().mount().expect("mount storage view");
        self.settle();
    }

    pub fn unmount(&mut self) {
        self.console.view_mut().unmount().expect("unmount storage view");
        self.settle();
    }

    pub fn settle(&mut self) -> usize {
        self.console.pump(&mut self.actions)
    }

    pub fn page(&self) -> StoragePage {
        self.console.view().render()
    }
}

/// Dispatch actions as they arrive until `done` holds. Returns false on
/// timeout or when the channel closes first.
pub async fn pump_until<M, F>(
    console: &Console<M>,
    actions: &mut UnboundedReceiver<Action>,
    mut done: F,
) -> bool
where
    M: ZfsMiddleware,
    F: FnMut(&Console<M>) -> bool,
{
    let wait = async {
        while !done(console) {
            let Some(action) = actions.recv().await else {
                return false;
            };
            if let Err(error) = console.dispatch(action) {
                panic!("dispatch failed: {error}");
            }
        }
        true
    };

    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .unwrap_or(false)
}
